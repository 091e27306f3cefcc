//! Account provider contract.
//!
//! The provider stands in for the wallet: it hands out the chain accounts the user
//! authorized and reports when the active account changes or goes away. Key custody
//! and signing stay on the provider's side.

use std::future::Future;

use tokio::sync::watch;

use crate::error::Result;

/// Source of the user's chain account.
pub trait AccountProvider: Send + Sync {
    /// Asks the user to authorize accounts and returns them, active account first.
    ///
    /// May fail with [`SdkError::UserRejected`](crate::SdkError::UserRejected) when the
    /// user declines.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Returns a receiver of the active account.
    ///
    /// The value becomes `None` when the provider disconnects.
    fn account_changes(&self) -> watch::Receiver<Option<String>>;
}
