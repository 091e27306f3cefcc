//! Transaction lifecycle: the single status slot shown while a write is in flight.
//!
//! ```text
//! Idle ──start──▶ Pending ──succeed──▶ Success ──(success_display)──▶ Idle
//!                    │
//!                    └──────fail──────▶ Error ────(error_display)────▶ Idle
//! ```
//!
//! `start` is accepted from any state and overwrites whatever is shown; there is no
//! queue. Every transition bumps an epoch and aborts the previously scheduled revert,
//! and a revert only applies if the epoch it was scheduled under is still current.
//!
//! Overlapping operations share the slot, so settling is last-writer-wins too: an
//! operation that settles after another one already did replaces its status. `fail`
//! applies even from `Idle`, so no failure goes unshown.

use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};

use crate::config::LifecycleConfig;

/// User-visible transaction status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A write was submitted and awaits confirmation.
    Pending(String),
    /// The last write was confirmed.
    Success(String),
    /// The last write failed.
    Error(String),
}

impl TransactionStatus {
    /// Returns the status message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Pending(m) | Self::Success(m) | Self::Error(m) => Some(m),
        }
    }

    /// Returns true while a write awaits confirmation.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending(m) => write!(f, "pending: {m}"),
            Self::Success(m) => write!(f, "success: {m}"),
            Self::Error(m) => write!(f, "error: {m}"),
        }
    }
}

#[derive(Debug, Default)]
struct RevertState {
    epoch: u64,
    revert: Option<JoinHandle<()>>,
}

impl RevertState {
    /// Starts a new epoch and aborts the revert scheduled under the old one.
    fn advance(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(handle) = self.revert.take() {
            handle.abort();
        }
        self.epoch
    }
}

#[derive(Debug)]
struct Inner {
    status: watch::Sender<TransactionStatus>,
    state: Mutex<RevertState>,
    config: LifecycleConfig,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().revert.take() {
            handle.abort();
        }
    }
}

/// Single-slot transaction status state machine.
///
/// Cloning yields another handle to the same slot. Transitions that schedule a revert
/// (`succeed`, `fail`) must run inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TransactionLifecycle {
    inner: Arc<Inner>,
}

impl Default for TransactionLifecycle {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

impl TransactionLifecycle {
    /// Creates a lifecycle in `Idle`.
    pub fn new(config: LifecycleConfig) -> Self {
        let (status, _) = watch::channel(TransactionStatus::Idle);
        Self { inner: Arc::new(Inner { status, state: Mutex::new(RevertState::default()), config }) }
    }

    /// Returns the current status.
    pub fn status(&self) -> TransactionStatus {
        self.inner.status.borrow().clone()
    }

    /// Subscribes to status changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
        self.inner.status.subscribe()
    }

    /// Enters `Pending(message)` from any state, replacing whatever was shown.
    pub fn start(&self, message: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.advance();
        let message = message.into();
        tracing::debug!(message = %message, "transaction pending");
        self.inner.status.send_replace(TransactionStatus::Pending(message));
    }

    /// Shows `Success(message)` and schedules the revert to `Idle`.
    ///
    /// Applies from `Pending`, and also over a `Success` or `Error` that an
    /// overlapping operation settled first (last writer wins). Returns false, leaving
    /// the state untouched, if the slot is `Idle`.
    pub fn succeed(&self, message: impl Into<String>) -> bool {
        let delay = self.inner.config.success_display;
        self.settle(TransactionStatus::Success(message.into()), delay, false)
    }

    /// Shows `Error(message)` and schedules the revert to `Idle`.
    ///
    /// Applies from every state, so a failure is always shown. Returns true.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let delay = self.inner.config.error_display;
        self.settle(TransactionStatus::Error(message.into()), delay, true)
    }

    /// Returns to `Idle` immediately, dropping any scheduled revert.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.advance();
        self.inner.status.send_replace(TransactionStatus::Idle);
    }

    /// Aborts any scheduled revert. The current status stays as it is.
    pub fn shutdown(&self) {
        self.inner.state.lock().advance();
    }

    fn settle(&self, next: TransactionStatus, delay: Duration, from_idle: bool) -> bool {
        let mut state = self.inner.state.lock();
        if !from_idle && *self.inner.status.borrow() == TransactionStatus::Idle {
            tracing::debug!(ignored = %next, "no transaction in flight, ignoring transition");
            return false;
        }

        let epoch = state.advance();
        let delay_ms = delay.as_millis() as u64;
        tracing::debug!(status = %next, delay_ms, "transaction settled");
        self.inner.status.send_replace(next);
        state.revert = Some(tokio::spawn(revert_after(Arc::downgrade(&self.inner), epoch, delay)));
        true
    }
}

async fn revert_after(inner: Weak<Inner>, epoch: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.state.lock();
    if state.epoch != epoch {
        return;
    }
    // Dropping our own handle; the task is finishing anyway.
    state.revert = None;
    state.epoch = state.epoch.wrapping_add(1);
    inner.status.send_replace(TransactionStatus::Idle);
}
