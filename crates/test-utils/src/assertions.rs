//! Test assertion helpers.
//!
//! Polling-based assertions for state that another task updates, such as a session
//! following account changes.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Default polling interval for [`assert_eventually`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls a condition until it returns true or the timeout expires.
///
/// Returns `true` if the condition held before the timeout, `false` otherwise. The
/// condition is checked one final time after the timeout.
///
/// # Example
///
/// ```no_run
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use committee_ledger_test_utils::assert_eventually;
///
/// #[tokio::test]
/// async fn test_background_update() {
///     let refreshed = Arc::new(AtomicBool::new(false));
///     let flag = refreshed.clone();
///     tokio::spawn(async move {
///         tokio::time::sleep(Duration::from_millis(50)).await;
///         flag.store(true, Ordering::SeqCst);
///     });
///
///     let result = assert_eventually(Duration::from_millis(200), || {
///         refreshed.load(Ordering::SeqCst)
///     }).await;
///     assert!(result, "refresh should complete");
/// }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    condition()
}
