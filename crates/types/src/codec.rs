//! Serialization of member records and the identifier index.
//!
//! Both are stored as UTF-8 JSON so that any client of the ledger store can read
//! them. Decoding is strict: a blob that does not parse, names an unknown role, or
//! carries an out-of-range reputation is reported as [`CodecError::Decode`] or
//! [`CodecError::Invalid`]. Callers decide how to recover (the registry reader skips
//! the entry).

use serde::{Serialize, de::DeserializeOwned};
use snafu::{Snafu, ensure};

use crate::types::{MAX_REPUTATION, MemberId, MemberRecord};

/// Error type for codec operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("Encoding failed: {source}"))]
    Encode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Decoding failed.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The blob parsed but violates a record invariant.
    #[snafu(display("Invalid record: {reason}"))]
    Invalid {
        /// Which invariant was violated.
        reason: String,
    },
}

/// Encodes a value to JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes JSON bytes to a value.
///
/// # Errors
///
/// Returns `CodecError::Decode` if the bytes are not valid UTF-8 JSON of the
/// expected shape.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode { source })
}

/// Encodes a member record body.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode_record(record: &MemberRecord) -> Result<Vec<u8>, CodecError> {
    encode(record)
}

/// Decodes a member record body and checks its invariants.
///
/// # Errors
///
/// Returns `CodecError::Decode` for malformed JSON or an unknown role, and
/// `CodecError::Invalid` for a reputation above 100.
pub fn decode_record(bytes: &[u8]) -> Result<MemberRecord, CodecError> {
    let record: MemberRecord = decode(bytes)?;
    ensure!(
        record.reputation <= MAX_REPUTATION,
        InvalidSnafu { reason: format!("reputation {} exceeds {MAX_REPUTATION}", record.reputation) }
    );
    Ok(record)
}

/// Encodes the identifier index.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode_index(ids: &[MemberId]) -> Result<Vec<u8>, CodecError> {
    encode(&ids)
}

/// Decodes the identifier index.
///
/// # Errors
///
/// Returns `CodecError::Decode` if the blob is not a JSON array of strings.
pub fn decode_index(bytes: &[u8]) -> Result<Vec<MemberId>, CodecError> {
    decode(bytes)
}
