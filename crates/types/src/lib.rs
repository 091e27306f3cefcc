//! Core types, codec, and identifiers for the committee ledger.
//!
//! This crate provides the foundational types shared by the SDK and the CLI:
//! - Committee member records and the closed [`Role`] set
//! - JSON codec for member records and the identifier index
//! - Snowflake-style member identifier generation
//! - Input validation for join requests
//! - Store key layout for records and the index

pub mod codec;
pub mod keys;
pub mod snowflake;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use codec::CodecError;
pub use keys::RegistryKeys;
pub use types::*;
pub use validation::ValidationError;
