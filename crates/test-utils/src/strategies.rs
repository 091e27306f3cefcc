//! Proptest strategies for committee ledger domain types.
//!
//! Strategies produce well-formed values unless their name says otherwise, so
//! properties can focus on the behavior under test.
//!
//! # Usage
//!
//! ```no_run
//! use committee_ledger_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(record in strategies::arb_member_record()) {
//!         // test invariant with a randomly generated record
//!     }
//! }
//! ```

use committee_ledger_types::{MemberId, MemberRecord, Role, types::MAX_REPUTATION};
use proptest::prelude::*;

/// Generates one of the four committee roles.
pub fn arb_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Generates a role name outside the closed set, including near misses.
pub fn arb_invalid_role_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("delegate".to_owned()),
        Just("VALIDATOR".to_owned()),
        Just(" Contributor".to_owned()),
        "[A-Z][a-z]{2,12}".prop_filter("must not be a valid role", |s| {
            Role::ALL.iter().all(|r| r.as_str() != s.as_str())
        }),
    ]
}

/// Generates a reputation in `0..=100`.
pub fn arb_reputation() -> impl Strategy<Value = u8> {
    0..=MAX_REPUTATION
}

/// Generates a hex account address such as `0x1f...`.
pub fn arb_address() -> impl Strategy<Value = String> {
    "0x[0-9a-f]{40}"
}

/// Generates a decimal member id.
pub fn arb_member_id() -> impl Strategy<Value = MemberId> {
    (1u64..u64::MAX).prop_map(|n| MemberId::new(n.to_string()))
}

/// Generates a join time between 2020 and 2040 in unix seconds.
pub fn arb_joined_date() -> impl Strategy<Value = i64> {
    1_577_836_800i64..2_208_988_800i64
}

/// Generates a valid member record.
pub fn arb_member_record() -> impl Strategy<Value = MemberRecord> {
    (arb_address(), arb_joined_date(), arb_role(), arb_reputation()).prop_map(
        |(address, joined_date, role, reputation)| MemberRecord {
            address,
            joined_date,
            role,
            reputation,
        },
    )
}
