//! In-memory test doubles for SDK testing.
//!
//! This module provides controllable implementations of the SDK's collaborators so
//! registry behavior can be tested without a real ledger.
//!
//! # Features
//!
//! - **Versioned storage**: every write bumps a store-wide version, conditions are checked
//! - **Failure injection**: unavailability, transport failures, write rejections, index
//!   conflicts and delays for resilience tests
//! - **Request counting**: track reads and writes for verification
//! - **Deterministic inputs**: [`ManualClock`] and [`ScriptedIds`] pin join dates and ids
//!
//! # Example
//!
//! ```no_run
//! use committee_ledger_sdk::{RegistryReader, RegistryWriter, ClientConfig};
//! use committee_ledger_sdk::mock::MockLedgerStore;
//!
//! #[tokio::test]
//! async fn test_join() {
//!     let store = MockLedgerStore::new();
//!     let writer = RegistryWriter::new(store.clone(), ClientConfig::default());
//!     writer.join("0xAA11", "Delegate", 50).await.unwrap();
//!
//!     let reader = RegistryReader::new(store.clone(), ClientConfig::default());
//!     assert_eq!(reader.load_all().await.unwrap().len(), 1);
//!     assert_eq!(store.write_count(), 2);
//! }
//! ```

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use committee_ledger_types::MemberId;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::{
    account::AccountProvider,
    clock::{Clock, IdGenerator},
    error::{Result, SdkError, TransportSnafu},
    store::{LedgerStore, VersionedValue, WriteCondition, WriteReceipt},
};

/// A write failure to inject into [`MockLedgerStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    /// The account holder declines to sign.
    UserRejected(String),
    /// The chain rejects the transaction.
    Chain(String),
}

impl InjectedFailure {
    fn into_error(self) -> SdkError {
        match self {
            Self::UserRejected(message) => SdkError::UserRejected { message },
            Self::Chain(message) => SdkError::Chain { message },
        }
    }
}

/// Shared state for the mock store.
#[derive(Debug)]
struct MockState {
    /// Storage: key -> (value, version)
    entries: RwLock<HashMap<String, (Vec<u8>, u64)>>,

    /// Whether `is_available` reports true
    available: AtomicBool,

    /// Number of transport failures to inject for next reads/writes
    transport_failures: AtomicUsize,

    /// Write failures to return, in order
    write_failures: Mutex<VecDeque<InjectedFailure>>,

    /// Key -> number of conditional writes to reject as conflicts
    conflicts: Mutex<HashMap<String, usize>>,

    /// Delay to inject for each request (milliseconds)
    delay_ms: AtomicU64,

    /// Total write requests received
    write_count: AtomicUsize,

    /// Total read requests received
    read_count: AtomicUsize,

    /// Last assigned version (incremented on each write)
    version: AtomicU64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            transport_failures: AtomicUsize::new(0),
            write_failures: Mutex::new(VecDeque::new()),
            conflicts: Mutex::new(HashMap::new()),
            delay_ms: AtomicU64::new(0),
            write_count: AtomicUsize::new(0),
            read_count: AtomicUsize::new(0),
            version: AtomicU64::new(0),
        }
    }
}

impl MockState {
    /// Applies injected delay and transport failures.
    async fn check_injection(&self) -> Result<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failed = self
            .transport_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return TransportSnafu { message: "injected transport failure" }.fail();
        }
        Ok(())
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Consumes one injected conflict for `key`, simulating a concurrent writer.
    fn take_conflict(&self, key: &str) -> bool {
        let mut conflicts = self.conflicts.lock();
        match conflicts.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            },
            _ => false,
        }
    }
}

/// In-memory [`LedgerStore`] with failure injection.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerStore {
    state: Arc<MockState>,
}

impl MockLedgerStore {
    /// Creates an empty, available store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what `is_available` reports.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Injects transport failures for the next `count` reads or writes.
    pub fn inject_transport_failures(&self, count: usize) {
        self.state.transport_failures.store(count, Ordering::SeqCst);
    }

    /// Queues a failure for the next write.
    pub fn inject_write_failure(&self, failure: InjectedFailure) {
        self.state.write_failures.lock().push_back(failure);
    }

    /// Rejects the next `count` version-conditioned writes to `key` as if another writer
    /// had just written it. The stored value keeps its bytes and gets a new version.
    pub fn inject_index_conflicts(&self, key: &str, count: usize) {
        self.state.conflicts.lock().insert(key.to_owned(), count);
    }

    /// Injects a delay before every request.
    pub fn inject_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stores raw bytes under `key`, bypassing conditions and counters.
    pub fn set_raw(&self, key: &str, value: Vec<u8>) {
        let version = self.state.next_version();
        self.state.entries.write().insert(key.to_owned(), (value, version));
    }

    /// Returns the raw bytes stored under `key`.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.state.entries.read().get(key).map(|(value, _)| value.clone())
    }

    /// Returns all stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of write requests received.
    pub fn write_count(&self) -> usize {
        self.state.write_count.load(Ordering::SeqCst)
    }

    /// Returns the number of read requests received.
    pub fn read_count(&self) -> usize {
        self.state.read_count.load(Ordering::SeqCst)
    }

    /// Clears all data, injections and counters.
    pub fn reset(&self) {
        self.state.entries.write().clear();
        self.state.available.store(true, Ordering::SeqCst);
        self.state.transport_failures.store(0, Ordering::SeqCst);
        self.state.write_failures.lock().clear();
        self.state.conflicts.lock().clear();
        self.state.delay_ms.store(0, Ordering::SeqCst);
        self.state.write_count.store(0, Ordering::SeqCst);
        self.state.read_count.store(0, Ordering::SeqCst);
    }
}

impl LedgerStore for MockLedgerStore {
    async fn is_available(&self) -> Result<bool> {
        Ok(self.state.available.load(Ordering::SeqCst))
    }

    async fn read(&self, key: &str) -> Result<Option<VersionedValue>> {
        self.state.read_count.fetch_add(1, Ordering::SeqCst);
        self.state.check_injection().await?;

        Ok(self
            .state
            .entries
            .read()
            .get(key)
            .map(|(value, version)| VersionedValue { value: value.clone(), version: *version }))
    }

    async fn write(
        &self,
        key: &str,
        value: Vec<u8>,
        condition: Option<WriteCondition>,
    ) -> Result<WriteReceipt> {
        self.state.write_count.fetch_add(1, Ordering::SeqCst);
        self.state.check_injection().await?;

        if let Some(failure) = self.state.write_failures.lock().pop_front() {
            return Err(failure.into_error());
        }

        let mut entries = self.state.entries.write();
        let actual = entries.get(key).map(|(_, version)| *version);

        if let Some(condition) = condition {
            if condition.expected_version().is_some() && self.state.take_conflict(key) {
                let bumped = self.state.next_version();
                if let Some(entry) = entries.get_mut(key) {
                    entry.1 = bumped;
                }
                return Err(SdkError::Conflict {
                    key: key.to_owned(),
                    expected: condition.expected_version(),
                    actual: Some(bumped),
                });
            }
            if !condition.holds(actual) {
                return Err(SdkError::Conflict {
                    key: key.to_owned(),
                    expected: condition.expected_version(),
                    actual,
                });
            }
        }

        let version = self.state.next_version();
        entries.insert(key.to_owned(), (value, version));
        Ok(WriteReceipt { version, tx_id: format!("mock-tx-{version}") })
    }
}

/// [`AccountProvider`] with a fixed account list.
#[derive(Debug)]
pub struct StaticAccountProvider {
    accounts: Vec<String>,
    reject: bool,
    active: watch::Sender<Option<String>>,
}

impl StaticAccountProvider {
    /// Creates a provider that authorizes `accounts`, first one active.
    pub fn new<I, A>(accounts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let accounts: Vec<String> = accounts.into_iter().map(Into::into).collect();
        let (active, _) = watch::channel(accounts.first().cloned());
        Self { accounts, reject: false, active }
    }

    /// Creates a provider whose user declines every authorization request.
    pub fn rejecting() -> Self {
        let (active, _) = watch::channel(None);
        Self { accounts: Vec::new(), reject: true, active }
    }

    /// Reports a new active account, or a disconnect with `None`.
    pub fn switch_account(&self, account: Option<&str>) {
        self.active.send_replace(account.map(str::to_owned));
    }
}

impl AccountProvider for StaticAccountProvider {
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        let result = if self.reject {
            Err(SdkError::UserRejected { message: "user rejected account request".to_owned() })
        } else {
            Ok(self.accounts.clone())
        };
        std::future::ready(result)
    }

    fn account_changes(&self) -> watch::Receiver<Option<String>> {
        self.active.subscribe()
    }
}

/// [`Clock`] that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `now` unix seconds.
    pub fn new(now: i64) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    /// Sets the current time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// [`IdGenerator`] returning a fixed sequence of ids.
#[derive(Debug)]
pub struct ScriptedIds {
    ids: Mutex<VecDeque<MemberId>>,
}

impl ScriptedIds {
    /// Creates a generator that returns `ids` in order.
    pub fn new<I, A>(ids: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<MemberId>,
    {
        Self { ids: Mutex::new(ids.into_iter().map(Into::into).collect()) }
    }
}

impl IdGenerator for ScriptedIds {
    fn next_id(&self) -> Result<MemberId> {
        self.ids
            .lock()
            .pop_front()
            .ok_or_else(|| SdkError::Unknown { message: "scripted ids exhausted".to_owned() })
    }
}
