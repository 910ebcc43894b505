//! Black-box scenarios against the public engine API.

use std::sync::Arc;

use ngoledger_core::{DomainError, FixedClock, Identity, TransactionId, VerificationHash};
use ngoledger_events::{EventBus, InMemoryEventBus};
use ngoledger_ledger::{LedgerConfig, LedgerEngine, LedgerEntry, LedgerEvent};

const T: u64 = 1_700_000_000;

fn owner() -> Identity {
    Identity::new("0x5fbdb2315678afecb367f032d93f642f64180aa3")
}

fn engine() -> LedgerEngine {
    LedgerEngine::with_bus(
        LedgerConfig::new(owner()),
        Arc::new(InMemoryEventBus::new()),
        Arc::new(FixedClock(T)),
    )
}

fn proof() -> VerificationHash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xde;
    bytes[1] = 0xad;
    VerificationHash::from_bytes(bytes)
}

#[test]
fn two_donations_accumulate() {
    let ledger = engine();

    ledger.record_donation("N1", "D1", "Education", 5_000, T).unwrap();
    ledger.record_donation("N1", "D2", "Healthcare", 3_000, T + 1).unwrap();

    assert_eq!(ledger.total_donations(), 8_000);
    assert_eq!(ledger.get_ngo_balance("N1"), 8_000);
    assert_eq!(ledger.get_incoming_count(), 2);
}

#[test]
fn owner_spending_reduces_balance() {
    let ledger = engine();
    ledger.record_donation("N1", "D1", "Education", 10_000, T).unwrap();

    let id = ledger
        .record_spending(&owner(), "N1", "V1", "Supplies", 3_000, T, proof())
        .unwrap();

    assert_eq!(ledger.get_ngo_balance("N1"), 7_000);
    assert_eq!(ledger.get_outgoing_count(), 1);

    let record = ledger.get_outgoing(0).unwrap();
    assert_eq!(record.transaction_id, id);
    assert_eq!(record.verification_hash, proof());
    assert_eq!(record.receiver_id.as_str(), "V1");
}

#[test]
fn overspending_fails_and_changes_nothing() {
    let ledger = engine();
    ledger.record_donation("N1", "D1", "Education", 10_000, T).unwrap();
    ledger
        .record_spending(&owner(), "N1", "V1", "Supplies", 3_000, T, proof())
        .unwrap();
    let next_id = ledger.next_transaction_id();

    let err = ledger
        .record_spending(&owner(), "N1", "V1", "Supplies", 15_000, T, proof())
        .unwrap_err();

    assert_eq!(
        err,
        DomainError::InsufficientBalance {
            ngo_id: "N1".to_string(),
            requested: 15_000,
            available: 7_000,
        }
    );
    assert_eq!(ledger.get_ngo_balance("N1"), 7_000);
    assert_eq!(ledger.get_outgoing_count(), 1);
    assert_eq!(ledger.next_transaction_id(), next_id);
}

#[test]
fn overspending_on_fresh_balance_keeps_full_amount() {
    let ledger = engine();
    ledger.record_donation("N1", "D1", "Education", 10_000, T).unwrap();

    assert!(matches!(
        ledger.record_spending(&owner(), "N1", "V1", "Supplies", 15_000, T, proof()),
        Err(DomainError::InsufficientBalance { .. })
    ));
    assert_eq!(ledger.get_ngo_balance("N1"), 10_000);
}

#[test]
fn non_owner_cannot_spend_or_seed() {
    let ledger = engine();
    ledger.record_donation("N1", "D1", "Education", 10_000, T).unwrap();
    let sub = ledger.bus().subscribe();
    let stranger = Identity::new("0x70997970c51812dc3a010c7d01b50e0d17dc79c8");

    assert_eq!(
        ledger.record_spending(&stranger, "N1", "V1", "Supplies", 100, T, proof()),
        Err(DomainError::Unauthorized)
    );
    assert_eq!(
        ledger.record_initial_balance(&stranger, "N1", 100, T),
        Err(DomainError::Unauthorized)
    );

    assert_eq!(ledger.get_ngo_balance("N1"), 10_000);
    assert_eq!(ledger.get_outgoing_count(), 0);
    assert_eq!(ledger.get_incoming_count(), 1);
    assert!(sub.try_recv().is_err());
}

#[test]
fn empty_ngo_id_is_invalid_input() {
    let ledger = engine();

    assert!(matches!(
        ledger.record_donation("", "D1", "X", 100, T),
        Err(DomainError::InvalidInput(_))
    ));
    assert!(matches!(
        ledger.record_donation("N1", "D1", "X", 0, T),
        Err(DomainError::InvalidInput(_))
    ));
    assert!(matches!(
        ledger.record_initial_balance(&owner(), "N1", 0, T),
        Err(DomainError::InvalidInput(_))
    ));
    assert_eq!(ledger.get_incoming_count(), 0);
    assert_eq!(ledger.next_transaction_id(), TransactionId::new(1));
}

#[test]
fn initial_balance_is_an_auditable_incoming_record() {
    let ledger = engine();

    let id = ledger.record_initial_balance(&owner(), "N2", 50_000, 0).unwrap();

    assert_eq!(ledger.get_ngo_balance("N2"), 50_000);
    let record = ledger.get_incoming(0).unwrap();
    assert_eq!(record.donor_id.as_str(), "INITIAL_BALANCE");
    assert!(record.is_initial_balance());
    assert_eq!(record.timestamp, T);
    assert_eq!(record.transaction_id, id);
    assert_eq!(ledger.total_donations(), 50_000);

    // Seeding again is allowed.
    ledger.record_initial_balance(&owner(), "N2", 1_000, T).unwrap();
    assert_eq!(ledger.get_ngo_balance("N2"), 51_000);
}

#[test]
fn out_of_range_reads_are_not_found() {
    let ledger = engine();
    ledger.record_donation("N1", "D1", "Education", 100, T).unwrap();

    assert!(matches!(ledger.get_incoming(1), Err(DomainError::NotFound(_))));
    assert!(matches!(ledger.get_outgoing(0), Err(DomainError::NotFound(_))));
    assert!(matches!(ledger.get_ngo_incoming("N1", 1), Err(DomainError::NotFound(_))));
    assert!(matches!(ledger.get_ngo_incoming("N9", 0), Err(DomainError::NotFound(_))));
    assert!(matches!(ledger.get_ngo_outgoing("N1", 0), Err(DomainError::NotFound(_))));
    assert!(matches!(
        ledger.find_transaction(TransactionId::new(99)),
        Err(DomainError::NotFound(_))
    ));
    assert_eq!(ledger.get_ngo_balance("unknown"), 0);
}

#[test]
fn per_ngo_indices_preserve_recording_order() {
    let ledger = engine();
    ledger.record_donation("N1", "D1", "A", 100, T).unwrap();
    ledger.record_donation("N2", "D2", "B", 200, T).unwrap();
    ledger.record_donation("N1", "D3", "C", 300, T).unwrap();
    ledger
        .record_spending(&owner(), "N1", "V1", "Supplies", 50, T, VerificationHash::zero())
        .unwrap();

    assert_eq!(ledger.get_ngo_incoming_count("N1"), 2);
    assert_eq!(ledger.get_ngo_incoming("N1", 0).unwrap().donor_id.as_str(), "D1");
    assert_eq!(ledger.get_ngo_incoming("N1", 1).unwrap().donor_id.as_str(), "D3");
    assert_eq!(ledger.get_ngo_outgoing_count("N1"), 1);
    assert_eq!(ledger.get_ngo_outgoing_count("N2"), 0);

    let summary = ledger.get_ngo_summary("N1");
    assert_eq!(summary.total_received, 400);
    assert_eq!(summary.total_spent, 50);
    assert_eq!(summary.balance, 350);
    assert_eq!(summary.incoming_count, ledger.get_ngo_incoming_count("N1"));
    assert_eq!(summary.outgoing_count, ledger.get_ngo_outgoing_count("N1"));
}

#[test]
fn active_ngos_are_first_seen_and_truncated() {
    let ledger = engine();
    for ngo in ["N3", "N1", "N3", "N2", "N1"] {
        ledger.record_donation(ngo, "D1", "Food", 10, T).unwrap();
    }

    let ids = |limit| -> Vec<String> {
        ledger
            .get_active_ngo_ids(limit)
            .into_iter()
            .map(|id| id.into_inner())
            .collect()
    };

    assert_eq!(ids(10), vec!["N3", "N1", "N2"]);
    assert_eq!(ids(2), vec!["N3", "N1"]);
    assert!(ids(0).is_empty());
}

#[test]
fn transaction_ids_are_shared_across_directions() {
    let ledger = LedgerEngine::with_bus(
        LedgerConfig::new(owner()).with_first_transaction_id(1_000),
        Arc::new(InMemoryEventBus::new()),
        Arc::new(FixedClock(T)),
    );

    let a = ledger.record_donation("N1", "D1", "Food", 100, T).unwrap();
    let b = ledger
        .record_spending(&owner(), "N1", "V1", "Food", 40, T, VerificationHash::zero())
        .unwrap();
    let c = ledger.record_initial_balance(&owner(), "N2", 10, T).unwrap();

    assert_eq!((a.value(), b.value(), c.value()), (1_000, 1_001, 1_002));
    assert!(matches!(ledger.find_transaction(b), Ok(LedgerEntry::Outgoing(_))));
    assert!(matches!(ledger.find_transaction(c), Ok(LedgerEntry::Incoming(_))));
    assert_eq!(ledger.find_transaction(c).unwrap().ngo_id().as_str(), "N2");
}

#[test]
fn recent_views_are_newest_first() {
    let ledger = engine();
    for amount in [1, 2, 3] {
        ledger.record_donation("N1", "D1", "Food", amount, T).unwrap();
    }

    let amounts: Vec<u64> = ledger.recent_incoming(2).iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![3, 2]);
    assert!(ledger.recent_outgoing(5).is_empty());
}

#[test]
fn donation_event_carries_full_record() {
    let ledger = engine();
    let sub = ledger.bus().subscribe();

    let id = ledger.record_donation("N1", "D1", "Education", 5_000, T).unwrap();

    let envelope = sub.try_recv().unwrap();
    match envelope.payload() {
        LedgerEvent::DonationReceived(e) => {
            assert_eq!(e.transaction_id, id);
            assert_eq!(e.ngo_id.as_str(), "N1");
            assert_eq!(e.donor_id.as_str(), "D1");
            assert_eq!(e.cause, "Education");
            assert_eq!(e.amount, 5_000);
            assert_eq!(e.timestamp, T);
        }
        other => panic!("expected DonationReceived, got {other:?}"),
    }
}

#[test]
fn owner_is_fixed_at_construction() {
    let ledger = LedgerEngine::new("0xabc");
    assert_eq!(ledger.owner().as_str(), "0xabc");
}
