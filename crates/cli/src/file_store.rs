//! Ledger store kept in a local JSON file.
//!
//! The whole store is one JSON document holding every key with the version that last
//! wrote it. Writes replace the document through a temporary file and a rename, so a
//! crash leaves either the old or the new state.
//!
//! Every operation holds an OS-level lock on a sidecar `<path>.lock` file: shared for
//! reads, exclusive for the load, condition check and persist of a write. The lock is
//! taken per operation, so handles in different processes (or several handles in one
//! process) never interleave a conditional write.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::Arc,
};

use committee_ledger_sdk::{
    LedgerStore, Result, SdkError, VersionedValue, WriteCondition, WriteReceipt,
};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

/// Failures of the backing file.
#[derive(Debug, Snafu)]
pub enum FileStoreError {
    /// The file could not be read or replaced.
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file does not hold a ledger document.
    #[snafu(display("Malformed ledger file {}: {source}", path.display()))]
    Malformed {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

impl From<FileStoreError> for SdkError {
    fn from(err: FileStoreError) -> Self {
        SdkError::Unknown { message: err.to_string() }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    last_version: u64,
    entries: BTreeMap<String, StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    value: Vec<u8>,
    version: u64,
}

/// [`LedgerStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: Arc<PathBuf>,
    lock_path: Arc<PathBuf>,
}

impl FileLedgerStore {
    /// Opens the store at `path`. The file is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");
        Self { path: Arc::new(path), lock_path: Arc::new(PathBuf::from(lock_path)) }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Blocks until the sidecar lock is held. The lock is released when the returned
    /// file is dropped.
    fn lock(&self, exclusive: bool) -> std::result::Result<File, FileStoreError> {
        let path = self.lock_path.as_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .context(IoSnafu { path: path.to_path_buf() })?;
        let locked =
            if exclusive { FileExt::lock_exclusive(&file) } else { FileExt::lock_shared(&file) };
        locked.context(IoSnafu { path: path.to_path_buf() })?;
        Ok(file)
    }

    fn load(&self) -> std::result::Result<LedgerDocument, FileStoreError> {
        let bytes = match std::fs::read(self.path.as_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LedgerDocument::default());
            },
            Err(source) => return Err(FileStoreError::Io { path: self.path.to_path_buf(), source }),
        };
        serde_json::from_slice(&bytes).context(MalformedSnafu { path: self.path.to_path_buf() })
    }

    fn persist(&self, document: &LedgerDocument) -> std::result::Result<(), FileStoreError> {
        let bytes = serde_json::to_vec_pretty(document)
            .context(MalformedSnafu { path: self.path.to_path_buf() })?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, bytes).context(IoSnafu { path: tmp.clone() })?;
        std::fs::rename(&tmp, self.path.as_path()).context(IoSnafu { path: self.path.to_path_buf() })
    }
}

impl LedgerStore for FileLedgerStore {
    async fn is_available(&self) -> Result<bool> {
        Ok(self.directory().is_dir())
    }

    async fn read(&self, key: &str) -> Result<Option<VersionedValue>> {
        let _lock = self.lock(false)?;
        let document = self.load()?;
        Ok(document
            .entries
            .get(key)
            .map(|entry| VersionedValue { value: entry.value.clone(), version: entry.version }))
    }

    async fn write(
        &self,
        key: &str,
        value: Vec<u8>,
        condition: Option<WriteCondition>,
    ) -> Result<WriteReceipt> {
        let _lock = self.lock(true)?;
        let mut document = self.load()?;

        if let Some(condition) = condition {
            let actual = document.entries.get(key).map(|entry| entry.version);
            if !condition.holds(actual) {
                tracing::debug!(key, ?actual, "write precondition failed");
                return Err(SdkError::Conflict {
                    key: key.to_owned(),
                    expected: condition.expected_version(),
                    actual,
                });
            }
        }

        document.last_version += 1;
        let version = document.last_version;
        document.entries.insert(key.to_owned(), StoredEntry { value, version });
        self.persist(&document)?;

        tracing::debug!(key, version, path = %self.path.display(), "ledger file updated");
        Ok(WriteReceipt { version, tx_id: format!("file-{version}") })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use committee_ledger_sdk::{ClientConfig, RegistryReader, RegistryWriter, RetryPolicy};
    use committee_ledger_test_utils::TestDir;

    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TestDir::new();
        let store = FileLedgerStore::open(dir.join("ledger.json"));

        assert!(store.is_available().await.unwrap());
        assert!(store.read("member_keys").await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = TestDir::new();
        let path = dir.join("ledger.json");

        let receipt = FileLedgerStore::open(&path).write("a", b"one".to_vec(), None).await.unwrap();
        let reopened = FileLedgerStore::open(&path);
        let value = reopened.read("a").await.unwrap().unwrap();

        assert_eq!(value.value, b"one");
        assert_eq!(value.version, receipt.version);
    }

    #[tokio::test]
    async fn test_versions_increase_across_keys() {
        let dir = TestDir::new();
        let store = FileLedgerStore::open(dir.join("ledger.json"));

        let a = store.write("a", b"1".to_vec(), None).await.unwrap();
        let b = store.write("b", b"2".to_vec(), None).await.unwrap();
        assert!(b.version > a.version);
    }

    #[tokio::test]
    async fn test_conditions_are_enforced() {
        let dir = TestDir::new();
        let store = FileLedgerStore::open(dir.join("ledger.json"));

        let first = store.write("k", b"1".to_vec(), Some(WriteCondition::NotExists)).await.unwrap();
        let err =
            store.write("k", b"2".to_vec(), Some(WriteCondition::NotExists)).await.unwrap_err();
        assert!(matches!(err, SdkError::Conflict { actual: Some(v), .. } if v == first.version));

        let stale = Some(WriteCondition::Version(first.version + 10));
        assert!(matches!(
            store.write("k", b"2".to_vec(), stale).await.unwrap_err(),
            SdkError::Conflict { .. }
        ));

        store.write("k", b"3".to_vec(), Some(WriteCondition::Version(first.version))).await.unwrap();
        assert_eq!(store.read("k").await.unwrap().unwrap().value, b"3");
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = TestDir::new();
        let path = dir.join("ledger.json");
        std::fs::write(&path, b"not a ledger").unwrap();

        let err = FileLedgerStore::open(&path).read("a").await.unwrap_err();
        assert!(matches!(err, SdkError::Unknown { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = TestDir::new();
        let store = FileLedgerStore::open(dir.join("absent").join("ledger.json"));
        assert!(!store.is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_handle_write_conflicts() {
        let dir = TestDir::new();
        let path = dir.join("ledger.json");
        let first = FileLedgerStore::open(&path);
        let second = FileLedgerStore::open(&path);

        first.write("member_keys", b"[]".to_vec(), None).await.unwrap();
        let seen = first.read("member_keys").await.unwrap().unwrap();
        second.write("member_keys", br#"["1"]"#.to_vec(), None).await.unwrap();

        let err = first
            .write("member_keys", br#"["2"]"#.to_vec(), Some(WriteCondition::matching(Some(&seen))))
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Conflict { .. }));
        assert_eq!(second.read("member_keys").await.unwrap().unwrap().value, br#"["1"]"#);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_handles_keep_every_join() {
        let dir = TestDir::new();
        let path = dir.join("ledger.json");
        let config = ClientConfig::builder()
            .with_retry_policy(
                RetryPolicy::builder()
                    .with_max_attempts(100)
                    .with_initial_backoff(Duration::from_millis(1))
                    .with_max_backoff(Duration::from_millis(10))
                    .build(),
            )
            .build()
            .unwrap();

        let mut tasks = Vec::new();
        for handle in 0..2 {
            let writer = Arc::new(RegistryWriter::new(FileLedgerStore::open(&path), config.clone()));
            for i in 0..10 {
                let writer = Arc::clone(&writer);
                tasks.push(tokio::spawn(async move {
                    writer.join(&format!("0x{handle}{i:03}"), "Delegate", 1).await
                }));
            }
        }

        let mut joined = HashSet::new();
        for task in tasks {
            joined.insert(task.await.unwrap().unwrap().id);
        }

        let members =
            RegistryReader::new(FileLedgerStore::open(&path), config).load_all().await.unwrap();
        let indexed: HashSet<_> = members.into_iter().map(|m| m.id).collect();
        assert_eq!(indexed.len(), 20);
        assert_eq!(indexed, joined);
    }
}
