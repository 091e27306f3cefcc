//! Client configuration with builder pattern.
//!
//! Provides type-safe configuration for the registry client including:
//! - Store key layout
//! - Retry policy for transient failures and index conflicts
//! - Transaction lifecycle display timings

use std::time::Duration;

use committee_ledger_types::RegistryKeys;
use snafu::ensure;

use crate::error::{ConfigSnafu, Result};

/// How long a `Success` status stays visible before reverting to `Idle`.
const DEFAULT_SUCCESS_DISPLAY: Duration = Duration::from_millis(2000);

/// How long an `Error` status stays visible before reverting to `Idle`.
const DEFAULT_ERROR_DISPLAY: Duration = Duration::from_millis(3000);

/// Configuration for the committee registry client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store key layout.
    pub(crate) keys: RegistryKeys,

    /// Retry policy for transient failures and index conflicts.
    pub(crate) retry_policy: RetryPolicy,

    /// Transaction lifecycle timings.
    pub(crate) lifecycle: LifecycleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            keys: RegistryKeys::default(),
            retry_policy: RetryPolicy::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the store key layout.
    #[must_use]
    pub fn keys(&self) -> &RegistryKeys {
        &self.keys
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the lifecycle timings.
    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleConfig {
        &self.lifecycle
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    index_key: Option<String>,
    record_prefix: Option<String>,
    retry_policy: Option<RetryPolicy>,
    lifecycle: Option<LifecycleConfig>,
}

impl ClientConfigBuilder {
    /// Sets the key of the identifier index blob.
    ///
    /// Default: `member_keys`.
    #[must_use]
    pub fn with_index_key<S: Into<String>>(mut self, key: S) -> Self {
        self.index_key = Some(key.into());
        self
    }

    /// Sets the prefix of member record keys.
    ///
    /// Default: `member_`.
    #[must_use]
    pub fn with_record_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.record_prefix = Some(prefix.into());
        self
    }

    /// Sets the retry policy.
    ///
    /// Default: [`RetryPolicy::default()`].
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Sets the lifecycle timings.
    ///
    /// Default: [`LifecycleConfig::default()`].
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The index key or record prefix is empty
    /// - The index key is the record prefix followed by digits (it would shadow a member record)
    /// - The retry policy allows zero attempts or has a jitter outside `0.0..=1.0`
    /// - A lifecycle display duration is zero
    pub fn build(self) -> Result<ClientConfig> {
        let defaults = RegistryKeys::default();
        let index_key = self.index_key.unwrap_or_else(|| defaults.index_key().to_owned());
        let record_prefix =
            self.record_prefix.unwrap_or_else(|| defaults.record_prefix().to_owned());

        ensure!(!index_key.is_empty(), ConfigSnafu { message: "index_key cannot be empty" });
        ensure!(
            !record_prefix.is_empty(),
            ConfigSnafu { message: "record_prefix cannot be empty" }
        );
        ensure!(
            index_key
                .strip_prefix(record_prefix.as_str())
                .is_none_or(|tail| !tail.chars().all(|c| c.is_ascii_digit())),
            ConfigSnafu { message: "index_key collides with the member record key space" }
        );

        let retry_policy = self.retry_policy.unwrap_or_default();
        retry_policy.validate()?;

        let lifecycle = self.lifecycle.unwrap_or_default();
        lifecycle.validate()?;

        Ok(ClientConfig { keys: RegistryKeys::new(index_key, record_prefix), retry_policy, lifecycle })
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,

    /// Initial backoff duration before first retry.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential increase.
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0) for randomizing backoff.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.max_attempts > 0, ConfigSnafu { message: "max_attempts must be at least 1" });
        ensure!(
            (0.0..=1.0).contains(&self.jitter),
            ConfigSnafu { message: "jitter must be between 0.0 and 1.0" }
        );
        ensure!(self.multiplier >= 1.0, ConfigSnafu { message: "multiplier must be at least 1.0" });
        Ok(())
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the initial backoff duration.
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Sets the maximum backoff duration.
    #[must_use]
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Sets the jitter factor (0.0 to 1.0).
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Builds the retry policy.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: self.initial_backoff.unwrap_or(defaults.initial_backoff),
            max_backoff: self.max_backoff.unwrap_or(defaults.max_backoff),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

/// Display timings of the transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long `Success` is shown before reverting to `Idle`.
    pub success_display: Duration,
    /// How long `Error` is shown before reverting to `Idle`.
    pub error_display: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { success_display: DEFAULT_SUCCESS_DISPLAY, error_display: DEFAULT_ERROR_DISPLAY }
    }
}

impl LifecycleConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.success_display.is_zero(),
            ConfigSnafu { message: "success_display cannot be zero" }
        );
        ensure!(!self.error_display.is_zero(), ConfigSnafu { message: "error_display cannot be zero" });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::SdkError;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(config.keys().index_key(), "member_keys");
        assert_eq!(config.keys().record_prefix(), "member_");
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.lifecycle().success_display, Duration::from_millis(2000));
        assert_eq!(config.lifecycle().error_display, Duration::from_millis(3000));
    }

    #[test]
    fn test_custom_keys() {
        let config = ClientConfig::builder()
            .with_index_key("dao_index")
            .with_record_prefix("dao_member_")
            .build()
            .unwrap();
        assert_eq!(config.keys().index_key(), "dao_index");
        assert_eq!(config.keys().record_prefix(), "dao_member_");
    }

    #[test]
    fn test_empty_index_key_rejected() {
        let err = ClientConfig::builder().with_index_key("").build().unwrap_err();
        assert!(matches!(err, SdkError::Config { .. }));
    }

    #[test]
    fn test_index_key_inside_record_space_rejected() {
        let result = ClientConfig::builder().with_index_key("member_123").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let policy = RetryPolicy::builder().with_max_attempts(0).build();
        assert!(ClientConfig::builder().with_retry_policy(policy).build().is_err());
    }

    #[test]
    fn test_jitter_out_of_range_rejected() {
        let policy = RetryPolicy::builder().with_jitter(1.5).build();
        assert!(ClientConfig::builder().with_retry_policy(policy).build().is_err());
    }

    #[test]
    fn test_zero_lifecycle_display_rejected() {
        let lifecycle = LifecycleConfig { success_display: Duration::ZERO, ..Default::default() };
        assert!(ClientConfig::builder().with_lifecycle(lifecycle).build().is_err());
    }

    #[test]
    fn test_retry_policy_builder_overrides() {
        let policy = RetryPolicy::builder()
            .with_max_attempts(9)
            .with_initial_backoff(Duration::from_millis(1))
            .with_jitter(0.0)
            .build();
        assert_eq!(policy.max_attempts, 9);
        assert_eq!(policy.initial_backoff, Duration::from_millis(1));
        assert_eq!(policy.jitter, 0.0);
        assert_eq!(policy.max_backoff, RetryPolicy::default().max_backoff);
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
