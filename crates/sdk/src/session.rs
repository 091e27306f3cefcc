//! Committee session: process-scoped client state.
//!
//! A session owns everything a front end needs between user actions: the active
//! account, the cached committee, the refreshing flag and the transaction lifecycle.
//! Observers subscribe to [`SessionSnapshot`] updates and unsubscribe by dropping the
//! receiver.
//!
//! All work started by a session runs under a [`CancellationToken`] that
//! [`disconnect`](CommitteeSession::disconnect) cancels and replaces. A result that
//! arrives after its token was cancelled, or after a newer refresh started, is dropped
//! instead of being written into the session.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use committee_ledger_types::{CommitteeMember, CommitteeStats};
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    account::AccountProvider,
    clock::{Clock, IdGenerator},
    config::ClientConfig,
    error::{Result, SdkError},
    lifecycle::{TransactionLifecycle, TransactionStatus},
    metrics::RegistryMetrics,
    reader::RegistryReader,
    sortition::{SelectionAlgorithm, SortitionOutcome, SortitionSeed, SortitionTrigger},
    store::LedgerStore,
    writer::{JoinRequest, RegistryWriter},
};

/// Lifecycle message while a join is in flight.
pub const JOIN_PENDING_MESSAGE: &str = "Adding committee member...";
/// Lifecycle message after a confirmed join.
pub const JOIN_SUCCESS_MESSAGE: &str = "Committee member added successfully!";
/// Prefix of the lifecycle message after a failed join.
pub const JOIN_FAILURE_PREFIX: &str = "Submission failed";
/// Lifecycle message while sortition runs.
pub const SORTITION_PENDING_MESSAGE: &str = "Initiating sortition process...";
/// Lifecycle message after a completed sortition.
pub const SORTITION_SUCCESS_MESSAGE: &str = "Sortition completed successfully!";
/// Prefix of the lifecycle message after a failed sortition.
pub const SORTITION_FAILURE_PREFIX: &str = "Sortition failed";

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Active account, `None` while disconnected.
    pub account: Option<String>,
    /// Committee as of the last completed refresh, newest join first.
    pub members: Vec<CommitteeMember>,
    /// True while a refresh is in flight.
    pub refreshing: bool,
}

#[derive(Debug)]
struct Shared {
    snapshot: watch::Sender<SessionSnapshot>,
    lifecycle: TransactionLifecycle,
    token: Mutex<CancellationToken>,
    generation: AtomicU64,
    follower: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn current_token(&self) -> CancellationToken {
        self.token.lock().clone()
    }

    fn disconnect(&self) {
        let old = std::mem::replace(&mut *self.token.lock(), CancellationToken::new());
        old.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.follower.lock().take() {
            handle.abort();
        }
        self.lifecycle.reset();
        self.snapshot.send_replace(SessionSnapshot::default());
        tracing::info!("session disconnected");
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.token.get_mut().cancel();
        if let Some(handle) = self.follower.get_mut().take() {
            handle.abort();
        }
    }
}

/// Builder for [`CommitteeSession`].
#[derive(Debug)]
pub struct SessionBuilder<S> {
    store: S,
    config: ClientConfig,
    metrics: Option<Arc<dyn RegistryMetrics>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    selection: Option<Arc<dyn SelectionAlgorithm>>,
}

impl<S: LedgerStore + Clone> SessionBuilder<S> {
    /// Sets the client configuration.
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the metrics sink shared by reader and writer.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn RegistryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the clock used for join dates.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the member id source.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Sets the sortition selection algorithm.
    #[must_use]
    pub fn with_selection(mut self, selection: Arc<dyn SelectionAlgorithm>) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Builds the session. It starts disconnected with an empty cache.
    pub fn build(self) -> CommitteeSession<S> {
        let mut reader = RegistryReader::new(self.store.clone(), self.config.clone());
        let mut writer = RegistryWriter::new(self.store, self.config.clone());
        if let Some(metrics) = self.metrics {
            reader = reader.with_metrics(Arc::clone(&metrics));
            writer = writer.with_metrics(metrics);
        }
        if let Some(clock) = self.clock {
            writer = writer.with_clock(clock);
        }
        if let Some(ids) = self.ids {
            writer = writer.with_id_generator(ids);
        }

        let mut sortition = SortitionTrigger::new(reader.clone());
        if let Some(selection) = self.selection {
            sortition = sortition.with_algorithm(selection);
        }

        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        let shared = Arc::new(Shared {
            snapshot,
            lifecycle: TransactionLifecycle::new(*self.config.lifecycle()),
            token: Mutex::new(CancellationToken::new()),
            generation: AtomicU64::new(0),
            follower: Mutex::new(None),
        });

        CommitteeSession { reader, writer, sortition, shared }
    }
}

/// Process-scoped registry client state.
#[derive(Debug)]
pub struct CommitteeSession<S> {
    reader: RegistryReader<S>,
    writer: RegistryWriter<S>,
    sortition: SortitionTrigger<S>,
    shared: Arc<Shared>,
}

impl<S: LedgerStore + Clone> CommitteeSession<S> {
    /// Creates a session builder over `store` with the default configuration.
    pub fn builder(store: S) -> SessionBuilder<S> {
        SessionBuilder {
            store,
            config: ClientConfig::default(),
            metrics: None,
            clock: None,
            ids: None,
            selection: None,
        }
    }

    /// Connects an account provider and loads the committee.
    ///
    /// The first authorized account becomes active. Later account changes reported
    /// by the provider are followed until [`disconnect`](Self::disconnect); a change
    /// to `None` disconnects the session. A failed initial refresh is logged and does
    /// not fail the connection.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if authorization fails, or
    /// [`SdkError::NotConnected`] if it authorizes no account.
    pub async fn connect<P: AccountProvider>(&self, provider: &P) -> Result<String> {
        let accounts = provider.request_accounts().await?;
        let Some(account) = accounts.into_iter().next() else {
            return Err(SdkError::NotConnected);
        };

        self.shared.snapshot.send_modify(|s| s.account = Some(account.clone()));
        let follower = tokio::spawn(follow_accounts(
            Arc::downgrade(&self.shared),
            provider.account_changes(),
            self.shared.current_token(),
        ));
        if let Some(previous) = self.shared.follower.lock().replace(follower) {
            previous.abort();
        }
        tracing::info!(account = %account, "account connected");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "initial committee load failed");
        }
        Ok(account)
    }

    /// Clears the account and cache, resets the lifecycle and cancels in-flight work.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Reloads the committee into the cache and returns it.
    ///
    /// # Errors
    ///
    /// Returns the reader's error, or [`SdkError::Cancelled`] if the session was
    /// disconnected while loading.
    pub async fn refresh(&self) -> Result<Vec<CommitteeMember>> {
        let token = self.shared.current_token();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.snapshot.send_modify(|s| s.refreshing = true);

        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(SdkError::Cancelled),
            result = self.reader.load_all() => result,
        };
        if token.is_cancelled() {
            return Err(SdkError::Cancelled);
        }

        let applied = self.shared.snapshot.send_if_modified(|s| {
            if self.shared.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.refreshing = false;
            if let Ok(members) = &result {
                s.members.clone_from(members);
            }
            true
        });
        if !applied {
            tracing::debug!(generation, "newer refresh in flight, dropping stale result");
        }
        result
    }

    /// Joins the committee with the active account as the member address.
    ///
    /// The lifecycle shows `Pending` while the writes confirm, then `Success` (after
    /// which the cache is refreshed) or `Error` with the failure message.
    ///
    /// # Errors
    ///
    /// - [`SdkError::NotConnected`] if no account is active.
    /// - [`SdkError::Validation`] for a bad role or reputation.
    ///
    /// Neither touches the lifecycle, since nothing was submitted. Any write failure
    /// is returned after being shown in the lifecycle.
    pub async fn join(&self, role: &str, reputation: i64) -> Result<CommitteeMember> {
        let account = self.account().ok_or(SdkError::NotConnected)?;
        let request = JoinRequest::new(&account, role, reputation)?;
        let token = self.shared.current_token();

        self.shared.lifecycle.start(JOIN_PENDING_MESSAGE);
        match self.writer.submit(&request, &token).await {
            Ok(member) => {
                if token.is_cancelled() {
                    return Ok(member);
                }
                self.shared.lifecycle.succeed(JOIN_SUCCESS_MESSAGE);
                if let Err(e) = self.refresh().await {
                    tracing::warn!(error = %e, "refresh after join failed");
                }
                Ok(member)
            },
            Err(e) => {
                if !token.is_cancelled() {
                    self.shared.lifecycle.fail(e.user_message(JOIN_FAILURE_PREFIX));
                }
                Err(e)
            },
        }
    }

    /// Runs sortition over the current committee.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::NotConnected`] if no account is active, otherwise the
    /// trigger's error after showing it in the lifecycle.
    pub async fn run_sortition(&self, seed: SortitionSeed) -> Result<SortitionOutcome> {
        if self.account().is_none() {
            return Err(SdkError::NotConnected);
        }
        let token = self.shared.current_token();

        self.shared.lifecycle.start(SORTITION_PENDING_MESSAGE);
        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(SdkError::Cancelled),
            result = self.sortition.run_sortition(seed) => result,
        };
        if token.is_cancelled() {
            return result;
        }

        match &result {
            Ok(_) => {
                self.shared.lifecycle.succeed(SORTITION_SUCCESS_MESSAGE);
            },
            Err(e) => {
                self.shared.lifecycle.fail(e.user_message(SORTITION_FAILURE_PREFIX));
            },
        }
        result
    }

    /// Subscribes to snapshot updates. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Returns the active account.
    pub fn account(&self) -> Option<String> {
        self.shared.snapshot.borrow().account.clone()
    }

    /// Returns the cached committee.
    pub fn members(&self) -> Vec<CommitteeMember> {
        self.shared.snapshot.borrow().members.clone()
    }

    /// Returns statistics over the cached committee.
    pub fn stats(&self) -> CommitteeStats {
        CommitteeStats::from_members(&self.shared.snapshot.borrow().members)
    }

    /// Returns the transaction lifecycle.
    pub fn lifecycle(&self) -> &TransactionLifecycle {
        &self.shared.lifecycle
    }

    /// Returns the current transaction status.
    pub fn status(&self) -> TransactionStatus {
        self.shared.lifecycle.status()
    }

    /// Tears the session down: disconnects and stops the lifecycle's revert timer.
    pub fn shutdown(&self) {
        self.shared.disconnect();
        self.shared.lifecycle.shutdown();
    }
}

async fn follow_accounts(
    shared: Weak<Shared>,
    mut changes: watch::Receiver<Option<String>>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
            },
        }

        let account = changes.borrow_and_update().clone();
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match account {
            Some(account) => {
                tracing::info!(account = %account, "active account changed");
                shared.snapshot.send_modify(|s| s.account = Some(account));
            },
            None => shared.disconnect(),
        }
    }
}
