//! Registry reader: reconstructs the committee from the ledger store.
//!
//! Loading is tolerant of corruption. Only an unavailable store (or an index that
//! cannot be fetched at all) fails the load; an absent, empty or undecodable index
//! reads as an empty committee, and an unreadable record drops only that member.

use std::{collections::HashSet, sync::Arc, time::Instant};

use committee_ledger_types::{CommitteeMember, MemberId, codec};

use crate::{
    config::ClientConfig,
    error::{Result, SdkError},
    metrics::{RegistryMetrics, SkipReason, default_metrics},
    retry::with_retry,
    store::LedgerStore,
};

/// Reads the committee roster.
#[derive(Debug, Clone)]
pub struct RegistryReader<S> {
    store: S,
    config: ClientConfig,
    metrics: Arc<dyn RegistryMetrics>,
}

impl<S: LedgerStore> RegistryReader<S> {
    /// Creates a reader over `store`.
    pub fn new(store: S, config: ClientConfig) -> Self {
        Self { store, config, metrics: default_metrics() }
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn RegistryMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads every indexed member, newest join first.
    ///
    /// Members with equal `joined_date` are ordered by reverse index position, so
    /// the later join comes first.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Unavailable`] if the store reports itself unavailable,
    /// or the retry error if the index cannot be read at all.
    pub async fn load_all(&self) -> Result<Vec<CommitteeMember>> {
        let started = Instant::now();

        if !self.store.is_available().await? {
            return Err(SdkError::Unavailable);
        }

        let ids = self.read_index().await?;
        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<&MemberId> = ids.iter().filter(|id| seen.insert(*id)).collect();
        for _ in unique.len()..ids.len() {
            self.metrics.record_skipped_entry(SkipReason::Duplicate);
        }

        let mut members = Vec::with_capacity(unique.len());
        for id in unique.into_iter().rev() {
            if let Some(member) = self.read_member(id).await {
                members.push(member);
            }
        }

        members.sort_by(|a, b| b.joined_date.cmp(&a.joined_date));

        self.metrics.record_load(started.elapsed());
        tracing::debug!(
            indexed = ids.len(),
            loaded = members.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "committee loaded"
        );
        Ok(members)
    }

    /// Reads the identifier index. Absent, empty or undecodable reads as empty.
    async fn read_index(&self) -> Result<Vec<MemberId>> {
        let key = self.config.keys().index_key();
        let policy = self.config.retry_policy();

        let blob = match with_retry(policy, "read_index", || self.store.read(key)).await? {
            Some(blob) if !blob.value.is_empty() => blob,
            _ => return Ok(Vec::new()),
        };

        match codec::decode_index(&blob.value) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                tracing::warn!(key, error = %e, "undecodable committee index, treating as empty");
                self.metrics.record_skipped_entry(SkipReason::Undecodable);
                Ok(Vec::new())
            },
        }
    }

    /// Reads and decodes one member record. Any failure skips the member.
    async fn read_member(&self, id: &MemberId) -> Option<CommitteeMember> {
        let key = self.config.keys().record_key(id);
        let policy = self.config.retry_policy();

        let blob = match with_retry(policy, "read_record", || self.store.read(&key)).await {
            Ok(Some(blob)) if !blob.value.is_empty() => blob,
            Ok(_) => {
                tracing::warn!(key = %key, "indexed member record is missing, skipping");
                self.metrics.record_skipped_entry(SkipReason::Missing);
                return None;
            },
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to read member record, skipping");
                self.metrics.record_skipped_entry(SkipReason::ReadFailed);
                return None;
            },
        };

        match codec::decode_record(&blob.value) {
            Ok(record) => Some(CommitteeMember::from_record(id.clone(), record)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "undecodable member record, skipping");
                self.metrics.record_skipped_entry(SkipReason::Undecodable);
                None
            },
        }
    }
}
