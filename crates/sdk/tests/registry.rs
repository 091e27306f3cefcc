//! Registry scenarios across reader, writer and the mock store.
//!
//! ## Test Categories
//!
//! - **Round trip**: sequential joins are read back exactly
//! - **Corruption**: undecodable index, dangling ids and bad records are tolerated
//! - **Closed role set**: invalid joins never reach the store
//! - **End to end**: a fresh store growing to two members

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use committee_ledger_sdk::{
    ClientConfig, CommitteeMember, MemberId, RegistryReader, RegistryWriter, Role, SdkError,
    mock::{ManualClock, MockLedgerStore},
};
use committee_ledger_test_utils::strategies::{
    arb_member_id, arb_member_record, arb_reputation, arb_role,
};
use committee_ledger_types::codec;
use proptest::prelude::*;

fn reader(store: &MockLedgerStore) -> RegistryReader<MockLedgerStore> {
    RegistryReader::new(store.clone(), ClientConfig::default())
}

fn writer(store: &MockLedgerStore, clock: &Arc<ManualClock>) -> RegistryWriter<MockLedgerStore> {
    RegistryWriter::new(store.clone(), ClientConfig::default()).with_clock(clock.clone())
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_empty_store_to_two_members() {
    let store = MockLedgerStore::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let writer = writer(&store, &clock);

    assert!(reader(&store).load_all().await.unwrap().is_empty());

    writer.join("0xAA11", "Delegate", 50).await.unwrap();
    let members = reader(&store).load_all().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, Role::Delegate);
    assert_eq!(members[0].reputation, 50);
    assert_eq!(members[0].address, "0xAA11");

    clock.advance(60);
    writer.join("0xBB22", "Validator", 80).await.unwrap();
    let members = reader(&store).load_all().await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].role, Role::Validator);
    assert_eq!(members[0].reputation, 80);
    assert_eq!(members[1].role, Role::Delegate);
}

#[tokio::test]
async fn test_store_layout() {
    let store = MockLedgerStore::new();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let member = writer(&store, &clock).join("0xAA11", "Ambassador", 7).await.unwrap();

    let index: serde_json::Value =
        serde_json::from_slice(&store.get_raw("member_keys").unwrap()).unwrap();
    assert_eq!(index, serde_json::json!([member.id.as_str()]));

    let record: serde_json::Value =
        serde_json::from_slice(&store.get_raw(&format!("member_{}", member.id)).unwrap()).unwrap();
    assert_eq!(
        record,
        serde_json::json!({
            "address": "0xAA11",
            "joinedDate": 1_700_000_000,
            "role": "Ambassador",
            "reputation": 7,
        })
    );
}

#[tokio::test]
async fn test_reads_records_written_by_other_clients() {
    let store = MockLedgerStore::new();
    store.set_raw(
        "member_1712345678901",
        br#"{"address":"0xCAFE","joinedDate":1712345678,"role":"Contributor","reputation":64}"#
            .to_vec(),
    );
    store.set_raw("member_keys", br#"["1712345678901"]"#.to_vec());

    let members = reader(&store).load_all().await.unwrap();

    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, MemberId::new("1712345678901"));
    assert_eq!(members[0].role, Role::Contributor);
    assert_eq!(members[0].joined_date, 1_712_345_678);
}

// ============================================================================
// Corruption
// ============================================================================

#[tokio::test]
async fn test_undecodable_index_yields_empty() {
    let store = MockLedgerStore::new();
    let clock = Arc::new(ManualClock::new(1));
    writer(&store, &clock).join("0xAA11", "Delegate", 1).await.unwrap();
    store.set_raw("member_keys", b"\xff\xfe not json".to_vec());

    assert!(reader(&store).load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_bad_record_of_many() {
    let store = MockLedgerStore::new();
    let clock = Arc::new(ManualClock::new(1_000));
    let writer = writer(&store, &clock);

    let mut ids = Vec::new();
    for i in 0..5i64 {
        clock.advance(1);
        ids.push(writer.join(&format!("0x{i:04}"), "Validator", i).await.unwrap().id);
    }
    store.set_raw(&format!("member_{}", ids[2]), br#"{"address":"0x","role":"Chair"}"#.to_vec());

    let members = reader(&store).load_all().await.unwrap();

    assert_eq!(members.len(), 4);
    assert!(members.iter().all(|m| m.id != ids[2]));
}

#[tokio::test]
async fn test_unavailable_store_is_the_only_failure() {
    let store = MockLedgerStore::new();
    store.set_raw("member_keys", b"garbage".to_vec());
    assert!(reader(&store).load_all().await.is_ok());

    store.set_available(false);
    let err = reader(&store).load_all().await.unwrap_err();
    assert!(matches!(err, SdkError::Unavailable));
}

// ============================================================================
// Closed role set
// ============================================================================

#[tokio::test]
async fn test_invalid_roles_write_nothing() {
    let store = MockLedgerStore::new();
    let clock = Arc::new(ManualClock::new(1));
    let writer = writer(&store, &clock);

    for role in ["", "Chair", "DELEGATE", " Delegate", "Validator "] {
        let err = writer.join("0xAA11", role, 50).await.unwrap_err();
        assert!(matches!(err, SdkError::Validation { .. }), "role {role:?} should be rejected");
    }

    assert_eq!(store.write_count(), 0);
    assert_eq!(store.read_count(), 0);
}

// ============================================================================
// Round trip
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sequential_joins_read_back_exactly(
        joins in proptest::collection::vec((arb_role(), arb_reputation()), 0..8)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let store = MockLedgerStore::new();
            let clock = Arc::new(ManualClock::new(1_700_000_000));
            let writer = writer(&store, &clock);

            let mut written: HashMap<MemberId, CommitteeMember> = HashMap::new();
            for (i, (role, reputation)) in joins.iter().enumerate() {
                clock.advance(1);
                let member = writer
                    .join(&format!("0x{i:04}"), role.as_str(), i64::from(*reputation))
                    .await
                    .unwrap();
                written.insert(member.id.clone(), member);
            }

            let loaded = reader(&store).load_all().await.unwrap();
            prop_assert_eq!(loaded.len(), written.len());
            for member in &loaded {
                prop_assert_eq!(Some(member), written.get(&member.id));
            }
            prop_assert!(loaded.windows(2).all(|w| w[0].joined_date >= w[1].joined_date));
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn dangling_and_repeated_index_entries_are_dropped(
        entries in proptest::collection::vec(
            (arb_member_id(), proptest::option::of(arb_member_record()), any::<bool>()),
            0..12,
        )
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let store = MockLedgerStore::new();
            let mut index = Vec::new();
            let mut expected = HashSet::new();
            for (id, record, repeat) in &entries {
                if let Some(record) = record {
                    store.set_raw(&format!("member_{id}"), codec::encode_record(record).unwrap());
                    expected.insert(id.clone());
                }
                index.push(id.clone());
                if *repeat {
                    index.push(id.clone());
                }
            }
            store.set_raw("member_keys", codec::encode_index(&index).unwrap());

            let loaded = reader(&store).load_all().await.unwrap();
            let ids: HashSet<MemberId> = loaded.iter().map(|m| m.id.clone()).collect();
            prop_assert_eq!(loaded.len(), ids.len());
            prop_assert_eq!(ids, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
