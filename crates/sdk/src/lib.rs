//! Client SDK for a committee registry kept in an append-only ledger store.
//!
//! The ledger store is a plain key→bytes map with unbounded write latency. This SDK
//! layers a committee roster on top of it and drives the status a user sees while
//! writes confirm.
//!
//! # Features
//!
//! - **Corruption-tolerant reads**: unreadable index entries are skipped, never fatal
//! - **Safe concurrent joins**: the identifier index is updated under optimistic
//!   concurrency with bounded, jittered retry
//! - **Transaction lifecycle**: single-slot `Pending`/`Success`/`Error` status with
//!   cancellable auto-revert
//! - **Explicit session state**: account, member cache and lifecycle owned by one
//!   [`CommitteeSession`] with subscribe/unsubscribe
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use committee_ledger_sdk::{CommitteeSession, mock::{MockLedgerStore, StaticAccountProvider}};
//!
//! #[tokio::main]
//! async fn main() -> committee_ledger_sdk::Result<()> {
//!     let session = CommitteeSession::builder(MockLedgerStore::new()).build();
//!     session.connect(&StaticAccountProvider::new(["0xAA11"])).await?;
//!
//!     let member = session.join("Delegate", 50).await?;
//!     println!("{} joined as {}", member.address, member.role);
//!     println!("{:?}", session.stats());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                CommitteeSession (Public API)                │
//! │  .connect() │ .join() │ .run_sortition() │ .subscribe()     │
//! ├──────────────────────┬──────────────────┬───────────────────┤
//! │  RegistryReader      │  RegistryWriter  │ SortitionTrigger  │
//! │  skip-on-corruption  │  versioned index │ SelectionAlgorithm│
//! ├──────────────────────┴──────────────────┴───────────────────┤
//! │              Resilience Layer (backon / tokio)              │
//! │   Exponential backoff │ Jitter │ Cancellation               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     LedgerStore (trait)                     │
//! │   is_available │ read → (bytes, version) │ conditional write│
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod clock;
mod config;
mod error;
mod lifecycle;
mod metrics;
pub mod mock;
mod reader;
mod retry;
mod session;
mod sortition;
mod store;
mod writer;

// Public API exports
pub use account::AccountProvider;
pub use clock::{Clock, IdGenerator, SnowflakeIds, SystemClock};
pub use config::{ClientConfig, ClientConfigBuilder, LifecycleConfig, RetryPolicy, RetryPolicyBuilder};
pub use error::{ErrorCategory, Result, SdkError, USER_REJECTED_MESSAGE};
pub use lifecycle::{TransactionLifecycle, TransactionStatus};
pub use metrics::{MetricsRegistryMetrics, NoopRegistryMetrics, RegistryMetrics, SkipReason};
pub use reader::RegistryReader;
pub use retry::{with_retry, with_retry_cancellable};
pub use session::{
    CommitteeSession, JOIN_FAILURE_PREFIX, JOIN_PENDING_MESSAGE, JOIN_SUCCESS_MESSAGE,
    SORTITION_FAILURE_PREFIX, SORTITION_PENDING_MESSAGE, SORTITION_SUCCESS_MESSAGE, SessionBuilder,
    SessionSnapshot,
};
pub use sortition::{
    SelectionAlgorithm, SortitionOutcome, SortitionSeed, SortitionTrigger, UnspecifiedSelection,
};
pub use store::{LedgerStore, VersionedValue, WriteCondition, WriteReceipt};
pub use writer::{JoinRequest, RegistryWriter};

// Re-export commonly used types from committee-ledger-types
pub use committee_ledger_types::{CommitteeMember, CommitteeStats, MemberId, MemberRecord, Role};
