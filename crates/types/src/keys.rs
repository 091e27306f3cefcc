//! Store key layout for the committee registry.
//!
//! ```text
//! member_keys        -> JSON array of member ids (the identifier index)
//! member_{id}        -> JSON member record
//! ```

use crate::types::MemberId;

/// Default key of the identifier index blob.
pub const DEFAULT_INDEX_KEY: &str = "member_keys";

/// Default prefix of member record keys.
pub const DEFAULT_RECORD_PREFIX: &str = "member_";

/// Key layout used by the registry reader and writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryKeys {
    index_key: String,
    record_prefix: String,
}

impl Default for RegistryKeys {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_KEY, DEFAULT_RECORD_PREFIX)
    }
}

impl RegistryKeys {
    /// Creates a key layout with a custom index key and record prefix.
    pub fn new(index_key: impl Into<String>, record_prefix: impl Into<String>) -> Self {
        Self { index_key: index_key.into(), record_prefix: record_prefix.into() }
    }

    /// Returns the key of the identifier index.
    #[must_use]
    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Returns the record prefix.
    #[must_use]
    pub fn record_prefix(&self) -> &str {
        &self.record_prefix
    }

    /// Returns the key under which a member's record is stored.
    #[must_use]
    pub fn record_key(&self, id: &MemberId) -> String {
        format!("{}{}", self.record_prefix, id)
    }
}
