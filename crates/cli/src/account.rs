//! Account provider for a single account passed on the command line.

use std::future::Future;

use committee_ledger_sdk::{AccountProvider, Result, SdkError};
use tokio::sync::watch;

/// Provider authorizing one fixed account, or none.
#[derive(Debug)]
pub struct FixedAccount {
    account: Option<String>,
    active: watch::Sender<Option<String>>,
}

impl FixedAccount {
    /// Creates a provider for `account`.
    pub fn new(account: Option<String>) -> Self {
        let (active, _) = watch::channel(account.clone());
        Self { account, active }
    }
}

impl AccountProvider for FixedAccount {
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        let result = match &self.account {
            Some(account) => Ok(vec![account.clone()]),
            None => Err(SdkError::NotConnected),
        };
        std::future::ready(result)
    }

    fn account_changes(&self) -> watch::Receiver<Option<String>> {
        self.active.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_account_is_authorized() {
        let provider = FixedAccount::new(Some("0xAA11".to_owned()));
        assert_eq!(provider.request_accounts().await.unwrap(), vec!["0xAA11".to_owned()]);
        assert_eq!(provider.account_changes().borrow().as_deref(), Some("0xAA11"));
    }

    #[tokio::test]
    async fn test_missing_account_is_not_connected() {
        let provider = FixedAccount::new(None);
        assert!(matches!(provider.request_accounts().await, Err(SdkError::NotConnected)));
    }
}
