//! Temporary directory management for tests.
//!
//! [`TestDir`] wraps [`tempfile::TempDir`] for tests that persist a ledger snapshot.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A managed temporary directory for tests.
///
/// The directory is removed when this struct is dropped.
///
/// # Example
///
/// ```
/// use committee_ledger_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let ledger = dir.join("ledger.json");
/// assert!(ledger.starts_with(dir.path()));
/// ```
#[derive(Debug)]
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: TempDir::new().expect("failed to create temp directory") }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Joins a relative path onto the temporary directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
