//! Time and identifier sources used by the registry writer.
//!
//! Both are traits so tests can pin the join date and script identifier collisions.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use committee_ledger_types::{MemberId, snowflake};

use crate::error::{Result, SdkError};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in unix seconds.
    fn now_unix_secs(&self) -> i64;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        // A clock before the epoch reports 0 rather than failing the join.
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs() as i64)
    }
}

/// Source of fresh member identifiers.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Returns an identifier not previously returned by this generator.
    ///
    /// # Errors
    ///
    /// Returns an error if no identifier can be produced.
    fn next_id(&self) -> Result<MemberId>;
}

/// [`IdGenerator`] producing Snowflake identifiers rendered as decimal strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeIds;

impl IdGenerator for SnowflakeIds {
    fn next_id(&self) -> Result<MemberId> {
        snowflake::generate_member_id().map_err(|e| SdkError::Unknown { message: e.to_string() })
    }
}
