//! Ledger records and derived per-NGO views.

use serde::{Deserialize, Serialize};

use ngoledger_core::{
    DonorId, Entity, NgoId, ReceiverId, TransactionId, ValueObject, VerificationHash,
};

/// Money moving into an NGO: a donation or a seeded initial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRecord {
    pub transaction_id: TransactionId,
    pub ngo_id: NgoId,
    pub donor_id: DonorId,
    pub cause: String,
    /// Smallest currency unit; always > 0.
    pub amount: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl IncomingRecord {
    /// True if this record seeds a pre-existing balance rather than a donation.
    pub fn is_initial_balance(&self) -> bool {
        self.donor_id.is_initial_balance()
    }
}

impl ValueObject for IncomingRecord {}

/// Money moving out of an NGO (verified spending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingRecord {
    pub transaction_id: TransactionId,
    pub ngo_id: NgoId,
    pub receiver_id: ReceiverId,
    pub cause: String,
    pub amount: u64,
    pub timestamp: u64,
    pub verification_hash: VerificationHash,
}

impl ValueObject for OutgoingRecord {}

/// Either direction of money movement, as returned by mixed-history queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum LedgerEntry {
    Incoming(IncomingRecord),
    Outgoing(OutgoingRecord),
}

impl LedgerEntry {
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            LedgerEntry::Incoming(r) => r.transaction_id,
            LedgerEntry::Outgoing(r) => r.transaction_id,
        }
    }

    pub fn ngo_id(&self) -> &NgoId {
        match self {
            LedgerEntry::Incoming(r) => &r.ngo_id,
            LedgerEntry::Outgoing(r) => &r.ngo_id,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            LedgerEntry::Incoming(r) => r.amount,
            LedgerEntry::Outgoing(r) => r.amount,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            LedgerEntry::Incoming(r) => r.timestamp,
            LedgerEntry::Outgoing(r) => r.timestamp,
        }
    }

    pub fn is_incoming(&self) -> bool {
        matches!(self, LedgerEntry::Incoming(_))
    }
}

/// Per-NGO running balance plus positions of its records in the global logs.
///
/// Positions index into the ledger's incoming/outgoing logs, so each record
/// has exactly one stored copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgoAccount {
    ngo_id: NgoId,
    balance: u64,
    incoming: Vec<usize>,
    outgoing: Vec<usize>,
}

impl NgoAccount {
    pub(crate) fn open(ngo_id: NgoId) -> Self {
        Self {
            ngo_id,
            balance: 0,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Positions in the global incoming log, in recording order.
    pub fn incoming_positions(&self) -> &[usize] {
        &self.incoming
    }

    /// Positions in the global outgoing log, in recording order.
    pub fn outgoing_positions(&self) -> &[usize] {
        &self.outgoing
    }

    pub(crate) fn credit(&mut self, position: usize, amount: u64) {
        self.incoming.push(position);
        self.balance += amount;
    }

    pub(crate) fn debit(&mut self, position: usize, amount: u64) {
        self.outgoing.push(position);
        self.balance -= amount;
    }
}

impl Entity for NgoAccount {
    type Id = NgoId;

    fn id(&self) -> &Self::Id {
        &self.ngo_id
    }
}

/// Aggregate figures for one NGO.
///
/// Always satisfies `balance == total_received - total_spent`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgoSummary {
    pub total_received: u64,
    pub total_spent: u64,
    pub incoming_count: usize,
    pub outgoing_count: usize,
    pub balance: u64,
}

impl NgoSummary {
    pub fn is_consistent(&self) -> bool {
        self.total_received.checked_sub(self.total_spent) == Some(self.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(tx: u64, amount: u64) -> IncomingRecord {
        IncomingRecord {
            transaction_id: TransactionId::new(tx),
            ngo_id: NgoId::new("N1"),
            donor_id: DonorId::new("D1"),
            cause: "Education".to_string(),
            amount,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn account_tracks_positions_and_balance() {
        let mut account = NgoAccount::open(NgoId::new("N1"));
        account.credit(0, 500);
        account.credit(3, 250);
        account.debit(1, 100);

        assert_eq!(account.balance(), 650);
        assert_eq!(account.incoming_positions(), &[0, 3]);
        assert_eq!(account.outgoing_positions(), &[1]);
        assert_eq!(account.id().as_str(), "N1");
    }

    #[test]
    fn entry_serializes_with_direction_tag() {
        let entry = LedgerEntry::Incoming(incoming(7, 100));
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["direction"], "incoming");
        assert_eq!(json["transaction_id"], 7);
        assert_eq!(entry.amount(), 100);
        assert!(entry.is_incoming());
    }

    #[test]
    fn summary_consistency_check() {
        let ok = NgoSummary {
            total_received: 10_000,
            total_spent: 3_000,
            incoming_count: 1,
            outgoing_count: 1,
            balance: 7_000,
        };
        assert!(ok.is_consistent());
        assert!(!NgoSummary { balance: 6_999, ..ok }.is_consistent());
    }
}
