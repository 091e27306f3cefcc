//! Contract of the external ledger store.
//!
//! The store is a generic key→bytes map living on a ledger. It offers no indexing
//! and no multi-key transactions. Every round trip is asynchronous with unbounded
//! latency (chain confirmation time).
//!
//! Beyond plain reads and writes, the registry needs one primitive to update the
//! shared identifier index safely: each read reports the version that last wrote the
//! key, and a write can carry a [`WriteCondition`] that the store checks atomically
//! for that single key. A failed condition is reported as
//! [`SdkError::Conflict`](crate::SdkError::Conflict).

use std::{future::Future, sync::Arc};

use crate::error::Result;

/// A stored value together with the version that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// Raw value bytes.
    pub value: Vec<u8>,
    /// Monotonically increasing version assigned by the store on write.
    pub version: u64,
}

/// Precondition checked by the store before applying a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Only write if the key doesn't exist.
    NotExists,
    /// Only write if the key was last written at exactly this version.
    Version(u64),
}

impl WriteCondition {
    /// Returns the condition that protects a read-modify-write of a value read as `current`.
    #[must_use]
    pub fn matching(current: Option<&VersionedValue>) -> Self {
        current.map_or(Self::NotExists, |v| Self::Version(v.version))
    }

    /// Returns true if a key currently at `actual` satisfies this condition.
    #[must_use]
    pub fn holds(self, actual: Option<u64>) -> bool {
        match self {
            Self::NotExists => actual.is_none(),
            Self::Version(expected) => actual == Some(expected),
        }
    }

    /// Version the writer expects the key to have (`None` = absent).
    #[must_use]
    pub fn expected_version(self) -> Option<u64> {
        match self {
            Self::NotExists => None,
            Self::Version(v) => Some(v),
        }
    }
}

/// Confirmation of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Version now held by the written key.
    pub version: u64,
    /// Transaction identifier reported by the ledger.
    pub tx_id: String,
}

/// Asynchronous ledger key-value store.
///
/// Implementations must be safe to share between concurrent operations; the store
/// itself provides no locking across keys.
pub trait LedgerStore: Send + Sync {
    /// Reports whether the store is reachable and accepting operations.
    fn is_available(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Reads a key. Returns `None` if the key is absent.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<VersionedValue>>> + Send;

    /// Writes a key, optionally guarded by a precondition.
    ///
    /// Resolves once the ledger confirms the write. May fail with
    /// `UserRejected`, `Chain`, `Conflict`, or `Transport`.
    fn write(
        &self,
        key: &str,
        value: Vec<u8>,
        condition: Option<WriteCondition>,
    ) -> impl Future<Output = Result<WriteReceipt>> + Send;
}

impl<S: LedgerStore + ?Sized> LedgerStore for Arc<S> {
    fn is_available(&self) -> impl Future<Output = Result<bool>> + Send {
        (**self).is_available()
    }

    fn read(&self, key: &str) -> impl Future<Output = Result<Option<VersionedValue>>> + Send {
        (**self).read(key)
    }

    fn write(
        &self,
        key: &str,
        value: Vec<u8>,
        condition: Option<WriteCondition>,
    ) -> impl Future<Output = Result<WriteReceipt>> + Send {
        (**self).write(key, value, condition)
    }
}
