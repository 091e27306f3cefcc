//! Registry writer: adds a member to the committee.
//!
//! A join is two writes that the store cannot make atomic:
//!
//! 1. The member record under `member_{id}`, guarded by
//!    [`WriteCondition::NotExists`] so an id collision is detected and a fresh id drawn.
//! 2. The identifier index, updated read-modify-write with a
//!    [`WriteCondition::Version`] precondition. When another writer moves the index
//!    between our read and our write, the store rejects the write and we re-read and
//!    retry with backoff. After the retry bound the join fails with
//!    [`SdkError::RegistryConflict`].
//!
//! A failure between the two writes leaves an orphaned record that no reader will ever
//! see, because readers only follow the index.

use std::sync::Arc;

use committee_ledger_types::{
    CommitteeMember, MemberId, MemberRecord, Role, codec,
    validation::{validate_address, validate_reputation, validate_role},
};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::{Clock, IdGenerator, SnowflakeIds, SystemClock},
    config::ClientConfig,
    error::{CodecSnafu, Result, SdkError},
    metrics::{RegistryMetrics, default_metrics},
    retry::retry_cancellable_with,
    store::{LedgerStore, WriteCondition},
};

/// A validated join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    address: String,
    role: Role,
    reputation: u8,
}

impl JoinRequest {
    /// Validates raw join input.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Validation`] for an empty or malformed address, a role
    /// outside the closed set, or a reputation outside `0..=100`.
    pub fn new(address: &str, role: &str, reputation: i64) -> Result<Self> {
        validate_address(address)?;
        let role = validate_role(role)?;
        let reputation = validate_reputation(reputation)?;
        Ok(Self { address: address.to_owned(), role, reputation })
    }

    /// Returns the member address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the requested role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the starting reputation.
    pub fn reputation(&self) -> u8 {
        self.reputation
    }
}

/// Writes new committee members.
#[derive(Debug, Clone)]
pub struct RegistryWriter<S> {
    store: S,
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    metrics: Arc<dyn RegistryMetrics>,
}

impl<S: LedgerStore> RegistryWriter<S> {
    /// Creates a writer over `store` using the system clock and Snowflake ids.
    pub fn new(store: S, config: ClientConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            ids: Arc::new(SnowflakeIds),
            metrics: default_metrics(),
        }
    }

    /// Replaces the clock used for `joined_date`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the member id source.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn RegistryMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Validates the input and adds a member.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Validation`] without touching the store when the input
    /// is invalid, and otherwise any error of [`submit`](Self::submit).
    pub async fn join(&self, address: &str, role: &str, reputation: i64) -> Result<CommitteeMember> {
        let request = JoinRequest::new(address, role, reputation)?;
        self.submit(&request, &CancellationToken::new()).await
    }

    /// Adds a validated member, stopping early if `token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`SdkError::Unavailable`] if the store reports itself unavailable.
    /// - [`SdkError::UserRejected`] or [`SdkError::Chain`] from either write.
    /// - [`SdkError::RegistryConflict`] if the index kept moving until retries ran out.
    /// - [`SdkError::Cancelled`] if `token` fires first.
    pub async fn submit(
        &self,
        request: &JoinRequest,
        token: &CancellationToken,
    ) -> Result<CommitteeMember> {
        let result = self.submit_inner(request, token).await;
        match &result {
            Ok(member) => {
                self.metrics.record_join("success");
                tracing::info!(
                    id = %member.id,
                    role = %member.role,
                    reputation = member.reputation,
                    "committee member added"
                );
            },
            Err(e) => {
                self.metrics.record_join(e.error_type());
                tracing::warn!(error = %e, error_type = e.error_type(), "join failed");
            },
        }
        result
    }

    async fn submit_inner(
        &self,
        request: &JoinRequest,
        token: &CancellationToken,
    ) -> Result<CommitteeMember> {
        if !self.store.is_available().await? {
            return Err(SdkError::Unavailable);
        }

        let record = MemberRecord {
            address: request.address.clone(),
            joined_date: self.clock.now_unix_secs(),
            role: request.role,
            reputation: request.reputation,
        };

        let id = self.write_record(&record, token).await?;
        self.append_to_index(&id, token).await?;
        Ok(CommitteeMember::from_record(id, record))
    }

    /// Writes the record under a fresh id. Returns the id used.
    async fn write_record(&self, record: &MemberRecord, token: &CancellationToken) -> Result<MemberId> {
        let bytes = codec::encode_record(record)
            .context(CodecSnafu { key: self.config.keys().record_prefix() })?;

        retry_cancellable_with(
            self.config.retry_policy(),
            token,
            "write_record",
            || self.try_write_record(bytes.clone()),
            |attempts, err| SdkError::RetryExhausted { attempts, last_error: err.to_string() },
        )
        .await
    }

    async fn try_write_record(&self, bytes: Vec<u8>) -> Result<MemberId> {
        let id = self.ids.next_id()?;
        let key = self.config.keys().record_key(&id);
        match self.store.write(&key, bytes, Some(WriteCondition::NotExists)).await {
            Ok(receipt) => {
                tracing::debug!(key = %key, tx_id = %receipt.tx_id, "member record written");
                Ok(id)
            },
            Err(e @ SdkError::Conflict { .. }) => {
                tracing::debug!(key = %key, "member id already taken, drawing a new one");
                Err(e)
            },
            Err(e) => Err(e),
        }
    }

    /// Appends `id` to the index under optimistic concurrency.
    async fn append_to_index(&self, id: &MemberId, token: &CancellationToken) -> Result<()> {
        retry_cancellable_with(
            self.config.retry_policy(),
            token,
            "append_to_index",
            || self.try_append_to_index(id),
            |attempts, err| match err {
                SdkError::Conflict { .. } => {
                    tracing::warn!(
                        id = %id,
                        attempts,
                        "committee index kept changing, member record left orphaned"
                    );
                    SdkError::RegistryConflict { attempts }
                },
                other => SdkError::RetryExhausted { attempts, last_error: other.to_string() },
            },
        )
        .await
    }

    /// One read-modify-write round of the index.
    async fn try_append_to_index(&self, id: &MemberId) -> Result<()> {
        let key = self.config.keys().index_key();
        let current = self.store.read(key).await?;

        let mut ids = match &current {
            Some(blob) if blob.value.is_empty() => Vec::new(),
            Some(blob) => codec::decode_index(&blob.value).unwrap_or_else(|e| {
                tracing::warn!(key, error = %e, "undecodable committee index, rewriting");
                Vec::new()
            }),
            None => Vec::new(),
        };

        if ids.contains(id) {
            return Ok(());
        }
        ids.push(id.clone());

        let bytes = codec::encode_index(&ids).context(CodecSnafu { key })?;
        let condition = WriteCondition::matching(current.as_ref());

        match self.store.write(key, bytes, Some(condition)).await {
            Ok(receipt) => {
                tracing::debug!(
                    key,
                    version = receipt.version,
                    members = ids.len(),
                    "committee index updated"
                );
                Ok(())
            },
            Err(e @ SdkError::Conflict { .. }) => {
                self.metrics.record_index_conflict();
                tracing::debug!(key, error = %e, "committee index moved, retrying");
                Err(e)
            },
            Err(e) => Err(e),
        }
    }
}
