//! Shared test utilities for the committee ledger crates.
//!
//! - [`TestDir`] - Managed temporary directory with path helpers
//! - [`assert_eventually`] - Poll a condition until it's true or timeout
//! - [`strategies`] - Proptest generators for roles, reputations, addresses and records

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::assert_eventually;

pub mod strategies;
