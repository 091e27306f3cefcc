//! Input validation for join requests.
//!
//! Every check here runs before the registry writer touches the store, so a rejected
//! request has no side effects.
//!
//! - Role: one of the closed [`Role`] set, case-sensitive, non-empty.
//! - Reputation: integer in `0..=100`.
//! - Address: non-empty, at most [`MAX_ADDRESS_BYTES`], no whitespace or control characters.

use std::fmt;

use crate::types::{MAX_REPUTATION, Role};

/// Maximum UTF-8 length of a member address.
pub const MAX_ADDRESS_BYTES: usize = 256;

/// Validation error with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Parses and validates a role name.
///
/// # Errors
///
/// Returns [`ValidationError`] if the role is empty or not one of
/// Delegate, Validator, Contributor, Ambassador.
pub fn validate_role(role: &str) -> Result<Role, ValidationError> {
    role.parse::<Role>()
        .map_err(|e| ValidationError { field: "role".to_string(), constraint: e.to_string() })
}

/// Validates a reputation value and narrows it to `u8`.
///
/// # Errors
///
/// Returns [`ValidationError`] if the value is negative or above 100.
pub fn validate_reputation(reputation: i64) -> Result<u8, ValidationError> {
    match u8::try_from(reputation) {
        Ok(value) if value <= MAX_REPUTATION => Ok(value),
        _ => Err(ValidationError {
            field: "reputation".to_string(),
            constraint: format!("{reputation} is outside 0..={MAX_REPUTATION}"),
        }),
    }
}

/// Validates a member address.
///
/// # Errors
///
/// Returns [`ValidationError`] if the address is empty, too long, or contains
/// whitespace or control characters.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    if address.is_empty() {
        return Err(ValidationError {
            field: "address".to_string(),
            constraint: "must not be empty".to_string(),
        });
    }
    if address.len() > MAX_ADDRESS_BYTES {
        return Err(ValidationError {
            field: "address".to_string(),
            constraint: format!(
                "length {} bytes exceeds maximum {MAX_ADDRESS_BYTES} bytes",
                address.len()
            ),
        });
    }
    if let Some(pos) = address.find(|c: char| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError {
            field: "address".to_string(),
            constraint: format!("contains whitespace or control character at byte offset {pos}"),
        });
    }
    Ok(())
}
