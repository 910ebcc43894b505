//! Read models built from ledger events.
//!
//! These are consumers of the bus (or of a journal replay), never sources of
//! truth. Drop and rebuild with `ProjectionRunner::rebuild_from_scratch`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use ngoledger_core::{DonorId, NgoId, TransactionId};
use ngoledger_events::{EventEnvelope, Projection};

use crate::ledger::LedgerEvent;

/// What one donor has given, overall and per NGO.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DonorTotals {
    pub total: u64,
    pub donations: usize,
    pub per_ngo: BTreeMap<NgoId, u64>,
}

/// Projection: donations grouped by donor (receipts, "my donations" views).
///
/// Seeded initial balances are not donations and are left out.
#[derive(Debug, Default)]
pub struct DonorContributions {
    donors: HashMap<DonorId, DonorTotals>,
}

impl DonorContributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, donor_id: &DonorId) -> Option<&DonorTotals> {
        self.donors.get(donor_id)
    }

    pub fn donor_count(&self) -> usize {
        self.donors.len()
    }

    /// Donors ordered by total given, largest first; ties by donor id.
    pub fn top_donors(&self, limit: usize) -> Vec<(&DonorId, &DonorTotals)> {
        let mut donors: Vec<_> = self.donors.iter().collect();
        donors.sort_by(|(a_id, a), (b_id, b)| b.total.cmp(&a.total).then_with(|| a_id.cmp(b_id)));
        donors.truncate(limit);
        donors
    }
}

impl Projection for DonorContributions {
    type Ev = LedgerEvent;

    fn apply(&mut self, envelope: &EventEnvelope<LedgerEvent>) {
        let LedgerEvent::DonationReceived(e) = envelope.payload() else {
            return;
        };
        if e.donor_id.is_initial_balance() {
            return;
        }

        let totals = self.donors.entry(e.donor_id.clone()).or_default();
        totals.total += e.amount;
        totals.donations += 1;
        *totals.per_ngo.entry(e.ngo_id.clone()).or_insert(0) += e.amount;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceChange {
    Donation,
    Spending,
    Initial,
}

/// One balance-change notification for UI refresh consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceNotice {
    pub ngo_id: NgoId,
    pub new_balance: u64,
    pub change: BalanceChange,
    /// Set for donations and spending; seeding notices follow their donation.
    pub transaction_id: Option<TransactionId>,
}

/// Projection: latest balance per NGO plus an ordered feed of changes.
#[derive(Debug, Default)]
pub struct NgoBalanceFeed {
    balances: HashMap<NgoId, u64>,
    notices: Vec<BalanceNotice>,
}

impl NgoBalanceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, ngo_id: &NgoId) -> u64 {
        self.balances.get(ngo_id).copied().unwrap_or(0)
    }

    pub fn notices(&self) -> &[BalanceNotice] {
        &self.notices
    }

    fn push(&mut self, ngo_id: &NgoId, change: BalanceChange, transaction_id: Option<TransactionId>) {
        self.notices.push(BalanceNotice {
            ngo_id: ngo_id.clone(),
            new_balance: self.balance(ngo_id),
            change,
            transaction_id,
        });
    }
}

impl Projection for NgoBalanceFeed {
    type Ev = LedgerEvent;

    fn apply(&mut self, envelope: &EventEnvelope<LedgerEvent>) {
        match envelope.payload() {
            LedgerEvent::DonationReceived(e) => {
                *self.balances.entry(e.ngo_id.clone()).or_insert(0) += e.amount;
                self.push(&e.ngo_id, BalanceChange::Donation, Some(e.transaction_id));
            }
            LedgerEvent::FundsSpent(e) => {
                let balance = self.balances.entry(e.ngo_id.clone()).or_insert(0);
                *balance = balance.saturating_sub(e.amount);
                self.push(&e.ngo_id, BalanceChange::Spending, Some(e.transaction_id));
            }
            LedgerEvent::NgoBalanceUpdated(e) => {
                self.balances.insert(e.ngo_id.clone(), e.new_balance);
                self.push(&e.ngo_id, BalanceChange::Initial, None);
            }
            LedgerEvent::LedgerOpened(_) => {}
        }
    }
}
