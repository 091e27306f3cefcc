//! Concurrent joins against a shared identifier index.
//!
//! The index is one blob that every join rewrites. These tests pin two writers to the
//! same index version and check what survives:
//!
//! - An unconditional read-modify-write loses one of the two ids.
//! - The registry writer, which writes the index under a version condition, keeps both.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use committee_ledger_sdk::{
    ClientConfig, LedgerStore, MemberId, MemberRecord, RegistryReader, RegistryWriter, Result,
    RetryPolicy, Role, SdkError, VersionedValue, WriteCondition, WriteReceipt,
    mock::MockLedgerStore,
};
use committee_ledger_types::codec;
use tokio::sync::Barrier;

const INDEX_KEY: &str = "member_keys";

/// Store wrapper that holds the first `gated` index reads until they all arrived, so
/// the readers observe the same version.
#[derive(Debug)]
struct LockstepStore {
    inner: MockLedgerStore,
    barrier: Barrier,
    gated: AtomicUsize,
}

impl LockstepStore {
    fn new(inner: MockLedgerStore, writers: usize) -> Self {
        Self { inner, barrier: Barrier::new(writers), gated: AtomicUsize::new(writers) }
    }
}

impl LedgerStore for LockstepStore {
    async fn is_available(&self) -> Result<bool> {
        self.inner.is_available().await
    }

    async fn read(&self, key: &str) -> Result<Option<VersionedValue>> {
        let value = self.inner.read(key).await?;
        let gate = key == INDEX_KEY
            && self.gated.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if gate {
            self.barrier.wait().await;
        }
        Ok(value)
    }

    async fn write(
        &self,
        key: &str,
        value: Vec<u8>,
        condition: Option<WriteCondition>,
    ) -> Result<WriteReceipt> {
        self.inner.write(key, value, condition).await
    }
}

fn config() -> ClientConfig {
    ClientConfig::builder()
        .with_retry_policy(
            RetryPolicy::builder()
                .with_max_attempts(5)
                .with_initial_backoff(Duration::from_millis(1))
                .build(),
        )
        .build()
        .unwrap()
}

fn record(address: &str) -> MemberRecord {
    MemberRecord { address: address.to_owned(), joined_date: 1, role: Role::Delegate, reputation: 1 }
}

/// The join sequence without any precondition, as two clients would run it.
async fn unconditional_join(store: &LockstepStore, id: &str) {
    let id = MemberId::new(id);
    store
        .write(&format!("member_{id}"), codec::encode_record(&record("0xAA")).unwrap(), None)
        .await
        .unwrap();

    let mut ids = match store.read(INDEX_KEY).await.unwrap() {
        Some(blob) => codec::decode_index(&blob.value).unwrap(),
        None => Vec::new(),
    };
    ids.push(id);
    store.write(INDEX_KEY, codec::encode_index(&ids).unwrap(), None).await.unwrap();
}

#[tokio::test]
async fn test_unconditional_read_modify_write_loses_a_member() {
    let mock = MockLedgerStore::new();
    let store = LockstepStore::new(mock.clone(), 2);

    tokio::join!(unconditional_join(&store, "1"), unconditional_join(&store, "2"));

    let members = RegistryReader::new(mock.clone(), config()).load_all().await.unwrap();
    assert_eq!(members.len(), 1, "one of the two joins must have been overwritten");
    assert!(mock.get_raw("member_1").is_some());
    assert!(mock.get_raw("member_2").is_some());
}

#[tokio::test]
async fn test_versioned_index_write_keeps_both_members() {
    let mock = MockLedgerStore::new();
    let store = Arc::new(LockstepStore::new(mock.clone(), 2));
    let writer = RegistryWriter::new(Arc::clone(&store), config());

    let (a, b) = tokio::join!(
        writer.join("0xAA11", "Delegate", 50),
        writer.join("0xBB22", "Validator", 80)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let members = RegistryReader::new(mock.clone(), config()).load_all().await.unwrap();
    let ids: HashSet<MemberId> = members.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, HashSet::from([a.id, b.id]));
}

#[tokio::test]
async fn test_many_concurrent_joins_all_indexed() {
    let mock = MockLedgerStore::new();
    let writer = Arc::new(RegistryWriter::new(
        mock.clone(),
        ClientConfig::builder()
            .with_retry_policy(
                RetryPolicy::builder()
                    .with_max_attempts(50)
                    .with_initial_backoff(Duration::from_millis(1))
                    .with_max_backoff(Duration::from_millis(5))
                    .build(),
            )
            .build()
            .unwrap(),
    ));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let writer = Arc::clone(&writer);
        tasks.push(tokio::spawn(async move {
            writer.join(&format!("0x{i:04}"), "Contributor", i).await
        }));
    }

    let mut joined = HashSet::new();
    for task in tasks {
        joined.insert(task.await.unwrap().unwrap().id);
    }

    let members = RegistryReader::new(mock.clone(), ClientConfig::default()).load_all().await.unwrap();
    let indexed: HashSet<MemberId> = members.into_iter().map(|m| m.id).collect();
    assert_eq!(indexed, joined);
}

#[tokio::test]
async fn test_conflict_exhaustion_leaves_invisible_orphan() {
    let mock = MockLedgerStore::new();
    mock.set_raw(INDEX_KEY, codec::encode_index(&[]).unwrap());
    mock.inject_index_conflicts(INDEX_KEY, usize::MAX);
    let writer = RegistryWriter::new(mock.clone(), config());

    let err = writer.join("0xAA11", "Delegate", 50).await.unwrap_err();
    assert!(matches!(err, SdkError::RegistryConflict { attempts: 5 }));

    let orphans: Vec<String> =
        mock.keys().into_iter().filter(|k| k.starts_with("member_") && k != INDEX_KEY).collect();
    assert_eq!(orphans.len(), 1);
    assert!(RegistryReader::new(mock.clone(), config()).load_all().await.unwrap().is_empty());
}
