//! Sortition trigger.
//!
//! The trigger verifies the store is reachable, loads the committee and hands it to a
//! [`SelectionAlgorithm`] together with a caller-supplied public seed. The algorithm
//! itself is an extension point; the default [`UnspecifiedSelection`] selects nobody.

use std::{collections::HashSet, fmt, sync::Arc};

use committee_ledger_types::{CommitteeMember, MemberId};
use snafu::ensure;

use crate::{
    error::{Result, SdkError, SortitionSnafu},
    reader::RegistryReader,
    store::LedgerStore,
};

/// Public seed fed to the selection algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortitionSeed(String);

impl SortitionSeed {
    /// Creates a seed from its public representation.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the seed string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SortitionSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chooses members from the committee.
pub trait SelectionAlgorithm: Send + Sync + fmt::Debug {
    /// Returns the selected member ids.
    ///
    /// # Errors
    ///
    /// Implementations report their own failures as [`SdkError::Sortition`].
    fn select(&self, committee: &[CommitteeMember], seed: &SortitionSeed) -> Result<Vec<MemberId>>;
}

/// Selection that performs no selection and always returns an empty result.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnspecifiedSelection;

impl SelectionAlgorithm for UnspecifiedSelection {
    fn select(&self, _committee: &[CommitteeMember], _seed: &SortitionSeed) -> Result<Vec<MemberId>> {
        Ok(Vec::new())
    }
}

/// Result of a sortition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortitionOutcome {
    /// Seed the selection was run with.
    pub seed: SortitionSeed,
    /// Number of members the selection ran over.
    pub committee_size: usize,
    /// Selected member ids, in the order the algorithm returned them.
    pub selected: Vec<MemberId>,
}

/// Runs sortition over the current committee.
#[derive(Debug, Clone)]
pub struct SortitionTrigger<S> {
    reader: RegistryReader<S>,
    algorithm: Arc<dyn SelectionAlgorithm>,
}

impl<S: LedgerStore> SortitionTrigger<S> {
    /// Creates a trigger using [`UnspecifiedSelection`].
    pub fn new(reader: RegistryReader<S>) -> Self {
        Self { reader, algorithm: Arc::new(UnspecifiedSelection) }
    }

    /// Replaces the selection algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Arc<dyn SelectionAlgorithm>) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Runs the selection.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Unavailable`] if the store is unavailable, the algorithm's
    /// error if it fails, and [`SdkError::Sortition`] if it selects an id outside the
    /// committee or the same id twice.
    pub async fn run_sortition(&self, seed: SortitionSeed) -> Result<SortitionOutcome> {
        if !self.reader.store().is_available().await? {
            return Err(SdkError::Unavailable);
        }

        let committee = self.reader.load_all().await?;
        let selected = self.algorithm.select(&committee, &seed)?;

        let members: HashSet<&MemberId> = committee.iter().map(|m| &m.id).collect();
        let mut seen = HashSet::with_capacity(selected.len());
        for id in &selected {
            ensure!(
                members.contains(id),
                SortitionSnafu { message: format!("selected id {id} is not a committee member") }
            );
            ensure!(seen.insert(id), SortitionSnafu { message: format!("id {id} selected twice") });
        }

        tracing::info!(
            seed = %seed,
            committee_size = committee.len(),
            selected = selected.len(),
            "sortition completed"
        );
        Ok(SortitionOutcome { seed, committee_size: committee.len(), selected })
    }
}
