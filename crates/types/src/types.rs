//! Core type definitions for the committee ledger.
//!
//! These types describe what the registry stores:
//! - Member identifiers ([`MemberId`])
//! - The closed set of committee roles ([`Role`])
//! - The on-store record body ([`MemberRecord`]) and its reconstructed form ([`CommitteeMember`])
//! - Aggregate statistics over a committee ([`CommitteeStats`])

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest reputation a member can hold.
pub const MAX_REPUTATION: u8 = 100;

// ============================================================================
// Identifier Types
// ============================================================================

/// Opaque identifier of a committee member.
///
/// Generated client-side at join time (see [`crate::snowflake`]). Identifiers written
/// by other clients of the same store may use a different scheme, so the value is
/// treated as an uninterpreted string everywhere except generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Creates a new identifier from a raw value.
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw identifier string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MemberId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MemberId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Committee role. The set is closed; anything else is rejected at the boundary.
///
/// Serialized as the exact variant name (`"Delegate"`, `"Validator"`, ...), which is
/// also how other clients of the store spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Votes on behalf of delegators.
    Delegate,
    /// Validates proposals and outcomes.
    Validator,
    /// Contributes work to the DAO.
    Contributor,
    /// Represents the DAO externally.
    Ambassador,
}

impl Role {
    /// All roles, in display order.
    pub const ALL: [Role; 4] = [Role::Delegate, Role::Validator, Role::Contributor, Role::Ambassador];

    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Delegate => "Delegate",
            Role::Validator => "Validator",
            Role::Contributor => "Contributor",
            Role::Ambassador => "Ambassador",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Role`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.input.is_empty() {
            write!(f, "role must not be empty")
        } else {
            write!(
                f,
                "unknown role {:?}; expected one of Delegate, Validator, Contributor, Ambassador",
                self.input
            )
        }
    }
}

impl std::error::Error for ParseRoleError {}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseRoleError { input: s.to_owned() })
    }
}

// ============================================================================
// Records
// ============================================================================

/// Record body stored under `member_{id}`.
///
/// Field names are camelCase on the wire so records written by other clients decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    /// Chain account identifier of the member.
    pub address: String,
    /// Join time in unix seconds.
    pub joined_date: i64,
    /// Committee role.
    pub role: Role,
    /// Reputation in `0..=100`.
    pub reputation: u8,
}

/// A committee member as reconstructed from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeMember {
    /// Member identifier (the suffix of the record key).
    pub id: MemberId,
    /// Chain account identifier of the member.
    pub address: String,
    /// Join time in unix seconds.
    pub joined_date: i64,
    /// Committee role.
    pub role: Role,
    /// Reputation in `0..=100`.
    pub reputation: u8,
}

impl CommitteeMember {
    /// Combines an identifier with its decoded record.
    #[must_use]
    pub fn from_record(id: MemberId, record: MemberRecord) -> Self {
        Self {
            id,
            address: record.address,
            joined_date: record.joined_date,
            role: record.role,
            reputation: record.reputation,
        }
    }

    /// Returns the record body as written to the store.
    #[must_use]
    pub fn record(&self) -> MemberRecord {
        MemberRecord {
            address: self.address.clone(),
            joined_date: self.joined_date,
            role: self.role,
            reputation: self.reputation,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Aggregate figures over a committee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommitteeStats {
    /// Number of members.
    pub total_members: usize,
    /// Mean reputation, `0.0` for an empty committee.
    pub average_reputation: f64,
}

impl CommitteeStats {
    /// Computes statistics over a member slice.
    #[must_use]
    pub fn from_members(members: &[CommitteeMember]) -> Self {
        let total_members = members.len();
        if total_members == 0 {
            return Self { total_members, average_reputation: 0.0 };
        }
        let sum: u64 = members.iter().map(|m| u64::from(m.reputation)).sum();
        Self { total_members, average_reputation: sum as f64 / total_members as f64 }
    }
}
