//! Snowflake-style member identifier generation.
//!
//! Member ids combine the current time with a random component, like the informal
//! `timestamp-random` scheme other clients of the store use, but laid out so that ids
//! are unique within a process and roughly time-ordered across processes.
//!
//! # ID Structure
//!
//! ```text
//! | 42 bits: timestamp (ms since epoch) | 12 bits: worker | 10 bits: sequence |
//! ```
//!
//! - **Timestamp**: milliseconds since 2024-01-01 00:00:00 UTC
//! - **Worker**: per-process identifier from entropy mixed with PID (4096 values)
//! - **Sequence**: counter within each millisecond (1024 ids/ms per worker)
//!
//! Rendered as a decimal string when used as a [`MemberId`].
//!
//! # Uniqueness
//!
//! Two processes that pick the same worker value in the same millisecond can collide.
//! The registry writer therefore stores records with a `NotExists` condition and
//! regenerates the id when the store reports the key as taken.

use std::{
    sync::OnceLock,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use snafu::Snafu;

use crate::types::MemberId;

/// Custom epoch: 2024-01-01 00:00:00 UTC (milliseconds since Unix epoch).
const EPOCH_MS: u64 = 1_704_067_200_000;

/// Number of bits used for the random worker ID.
const WORKER_BITS: u32 = 12;

/// Number of bits used for the sequence portion.
const SEQUENCE_BITS: u32 = 10;

/// Mask for extracting the worker ID (12 bits).
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;

/// Mask for extracting the sequence portion (10 bits).
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

struct SnowflakeState {
    /// Last timestamp used for ID generation.
    last_timestamp: u64,
    /// Sequence counter within the current millisecond.
    sequence: u64,
}

static SNOWFLAKE_STATE: Mutex<SnowflakeState> =
    Mutex::new(SnowflakeState { last_timestamp: 0, sequence: 0 });

static WORKER_ID: OnceLock<u64> = OnceLock::new();

/// Returns the per-process worker ID, generating it on first call.
fn worker_id() -> u64 {
    *WORKER_ID.get_or_init(|| {
        use rand::Rng;
        let pid = u64::from(std::process::id());
        (rand::rng().random::<u64>() ^ pid) & WORKER_MASK
    })
}

/// Errors from Snowflake ID generation.
#[derive(Debug, Snafu)]
pub enum SnowflakeError {
    /// System clock is before the Unix epoch.
    #[snafu(display("system clock is before Unix epoch"))]
    SystemClock,
}

fn now_ms() -> Result<u64, SnowflakeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH).map_err(|_| SnowflakeError::SystemClock)?.as_millis()
        as u64)
}

/// Generates a new Snowflake ID.
///
/// # Errors
///
/// Returns [`SnowflakeError::SystemClock`] if the system clock is before the
/// Unix epoch.
pub fn generate() -> Result<u64, SnowflakeError> {
    let wid = worker_id();
    loop {
        let timestamp = now_ms()?.saturating_sub(EPOCH_MS);
        let mut state = SNOWFLAKE_STATE.lock();

        if timestamp > state.last_timestamp {
            state.last_timestamp = timestamp;
            state.sequence = 0;
        } else {
            // Same millisecond, or the clock went backwards: stay on the last timestamp
            // so ids remain monotonic.
            state.sequence += 1;
            if state.sequence > SEQUENCE_MASK {
                // More than 1024 ids in one millisecond; wait for the next one.
                drop(state);
                std::thread::sleep(std::time::Duration::from_millis(1));
                continue;
            }
        }

        return Ok((state.last_timestamp << (WORKER_BITS + SEQUENCE_BITS))
            | (wid << SEQUENCE_BITS)
            | state.sequence);
    }
}

/// Generates a new [`MemberId`] from a Snowflake ID.
///
/// # Errors
///
/// Returns [`SnowflakeError::SystemClock`] if the system clock is before the
/// Unix epoch.
pub fn generate_member_id() -> Result<MemberId, SnowflakeError> {
    generate().map(|id| MemberId::new(id.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn extract_timestamp(id: u64) -> u64 {
        id >> (WORKER_BITS + SEQUENCE_BITS)
    }

    fn extract_worker(id: u64) -> u64 {
        (id >> SEQUENCE_BITS) & WORKER_MASK
    }

    fn extract_sequence(id: u64) -> u64 {
        id & SEQUENCE_MASK
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let id1 = generate().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = generate().unwrap();

        assert!(extract_timestamp(id2) > extract_timestamp(id1));
        assert!(id2 > id1, "later ID should be higher: {id1} vs {id2}");
    }

    #[test]
    fn test_id_structure() {
        let id = generate().unwrap();
        let reconstructed = (extract_timestamp(id) << (WORKER_BITS + SEQUENCE_BITS))
            | (extract_worker(id) << SEQUENCE_BITS)
            | extract_sequence(id);
        assert_eq!(id, reconstructed, "ID should reconstruct from parts");
        assert!(extract_timestamp(id) > 0, "timestamp should be positive");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids = HashSet::new();
        for _ in 0..2000 {
            let id = generate().unwrap();
            assert!(ids.insert(id), "duplicate Snowflake ID: {id}");
        }
    }

    #[test]
    fn test_worker_id_is_consistent_within_process() {
        assert_eq!(extract_worker(generate().unwrap()), extract_worker(generate().unwrap()));
    }

    #[test]
    fn test_member_id_is_decimal() {
        let id = generate_member_id().unwrap();
        assert!(id.as_str().parse::<u64>().is_ok(), "member id should be decimal: {id}");
    }

    #[test]
    fn test_member_ids_are_unique() {
        let mut ids = HashSet::new();
        for _ in 0..200 {
            assert!(ids.insert(generate_member_id().unwrap()));
        }
    }
}
