use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ngoledger_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, DonorId, Identity, NgoId, ReceiverId,
    TransactionId, VerificationHash,
};
use ngoledger_events::Event;

use crate::model::{IncomingRecord, LedgerEntry, NgoAccount, NgoSummary, OutgoingRecord};

/// Ledger identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(Uuid);

impl LedgerId {
    /// Create a new time-ordered (v7) identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Command: RecordDonation (permissionless).
///
/// `timestamp` must already be resolved; the engine substitutes the current
/// time for a caller-supplied `0` before building the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDonation {
    pub ngo_id: NgoId,
    pub donor_id: DonorId,
    pub cause: String,
    pub amount: u64,
    pub timestamp: u64,
}

/// Command: RecordSpending (owner only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpending {
    pub caller: Identity,
    pub ngo_id: NgoId,
    pub receiver_id: ReceiverId,
    pub cause: String,
    pub amount: u64,
    pub timestamp: u64,
    pub verification_hash: VerificationHash,
}

/// Command: RecordInitialBalance (owner only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInitialBalance {
    pub caller: Identity,
    pub ngo_id: NgoId,
    pub initial_balance: u64,
    pub record_date: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordDonation(RecordDonation),
    RecordSpending(RecordSpending),
    RecordInitialBalance(RecordInitialBalance),
}

/// Event: LedgerOpened. Always the first event of a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOpened {
    pub ledger_id: LedgerId,
    pub owner: Identity,
    pub first_transaction_id: TransactionId,
    pub opened_at: u64,
}

/// Event: DonationReceived. Carries the full incoming record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationReceived {
    pub transaction_id: TransactionId,
    pub ngo_id: NgoId,
    pub donor_id: DonorId,
    pub cause: String,
    pub amount: u64,
    pub timestamp: u64,
}

/// Event: FundsSpent. Carries the full outgoing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsSpent {
    pub transaction_id: TransactionId,
    pub ngo_id: NgoId,
    pub receiver_id: ReceiverId,
    pub cause: String,
    pub amount: u64,
    pub timestamp: u64,
    pub verification_hash: VerificationHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceAction {
    /// Balance seeded by the owner.
    Initial,
}

impl BalanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceAction::Initial => "initial",
        }
    }
}

/// Event: NgoBalanceUpdated. Informational; the balance change itself is
/// carried by the preceding `DonationReceived`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgoBalanceUpdated {
    pub ngo_id: NgoId,
    pub new_balance: u64,
    pub action: BalanceAction,
    /// Timestamp of the record that caused the update.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    LedgerOpened(LedgerOpened),
    DonationReceived(DonationReceived),
    FundsSpent(FundsSpent),
    NgoBalanceUpdated(NgoBalanceUpdated),
}

impl LedgerEvent {
    /// Transaction id allocated by this event, if it records money movement.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            LedgerEvent::DonationReceived(e) => Some(e.transaction_id),
            LedgerEvent::FundsSpent(e) => Some(e.transaction_id),
            LedgerEvent::LedgerOpened(_) | LedgerEvent::NgoBalanceUpdated(_) => None,
        }
    }

    fn timestamp(&self) -> u64 {
        match self {
            LedgerEvent::LedgerOpened(e) => e.opened_at,
            LedgerEvent::DonationReceived(e) => e.timestamp,
            LedgerEvent::FundsSpent(e) => e.timestamp,
            LedgerEvent::NgoBalanceUpdated(e) => e.timestamp,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::LedgerOpened(_) => "ledger.opened",
            LedgerEvent::DonationReceived(_) => "ledger.donation_received",
            LedgerEvent::FundsSpent(_) => "ledger.funds_spent",
            LedgerEvent::NgoBalanceUpdated(_) => "ledger.ngo_balance_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.timestamp()).unwrap_or(i64::MAX);
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Position {
    Incoming(usize),
    Outgoing(usize),
}

/// Aggregate root: the donation ledger.
///
/// Owns every balance and both logs. State only changes through `apply`,
/// and `handle` rejects anything that would break an invariant, so a
/// rejected command never leaves a trace.
#[derive(Debug, Clone)]
pub struct Ledger {
    id: LedgerId,
    owner: Identity,
    version: u64,
    opened: bool,

    next_transaction_id: TransactionId,
    total_donations: u64,

    incoming: Vec<IncomingRecord>,
    outgoing: Vec<OutgoingRecord>,
    accounts: HashMap<NgoId, NgoAccount>,
    /// ngo ids in first-seen order
    active_ngos: Vec<NgoId>,
    by_transaction: HashMap<TransactionId, Position>,
}

impl Ledger {
    /// Empty aggregate for rehydration. Expects `LedgerOpened` as its first event.
    pub fn empty() -> Self {
        Self {
            id: LedgerId::from_uuid(Uuid::nil()),
            owner: Identity::new(""),
            version: 0,
            opened: false,
            next_transaction_id: TransactionId::new(0),
            total_donations: 0,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            accounts: HashMap::new(),
            active_ngos: Vec::new(),
            by_transaction: HashMap::new(),
        }
    }

    /// Open a fresh ledger. Returns the ledger and its genesis event.
    pub fn open(
        ledger_id: LedgerId,
        owner: Identity,
        first_transaction_id: TransactionId,
        opened_at: u64,
    ) -> (Self, LedgerEvent) {
        let event = LedgerEvent::LedgerOpened(LedgerOpened {
            ledger_id,
            owner,
            first_transaction_id,
            opened_at,
        });
        let mut ledger = Self::empty();
        ledger.apply(&event);
        (ledger, event)
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn total_donations(&self) -> u64 {
        self.total_donations
    }

    pub fn next_transaction_id(&self) -> TransactionId {
        self.next_transaction_id
    }

    /// Balance of an NGO; 0 for an NGO the ledger has never seen.
    pub fn ngo_balance(&self, ngo_id: &NgoId) -> u64 {
        self.accounts.get(ngo_id).map(NgoAccount::balance).unwrap_or(0)
    }

    pub fn account(&self, ngo_id: &NgoId) -> Option<&NgoAccount> {
        self.accounts.get(ngo_id)
    }

    pub fn incoming_count(&self) -> usize {
        self.incoming.len()
    }

    pub fn outgoing_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn incoming(&self, index: usize) -> DomainResult<&IncomingRecord> {
        self.incoming.get(index).ok_or_else(|| {
            DomainError::not_found(format!(
                "incoming record #{index} (count {})",
                self.incoming.len()
            ))
        })
    }

    pub fn outgoing(&self, index: usize) -> DomainResult<&OutgoingRecord> {
        self.outgoing.get(index).ok_or_else(|| {
            DomainError::not_found(format!(
                "outgoing record #{index} (count {})",
                self.outgoing.len()
            ))
        })
    }

    pub fn ngo_incoming_count(&self, ngo_id: &NgoId) -> usize {
        self.accounts
            .get(ngo_id)
            .map(|a| a.incoming_positions().len())
            .unwrap_or(0)
    }

    pub fn ngo_outgoing_count(&self, ngo_id: &NgoId) -> usize {
        self.accounts
            .get(ngo_id)
            .map(|a| a.outgoing_positions().len())
            .unwrap_or(0)
    }

    /// The `index`-th incoming record of one NGO, in recording order.
    pub fn ngo_incoming(&self, ngo_id: &NgoId, index: usize) -> DomainResult<&IncomingRecord> {
        self.accounts
            .get(ngo_id)
            .and_then(|a| a.incoming_positions().get(index))
            .and_then(|&pos| self.incoming.get(pos))
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "incoming record #{index} of ngo '{ngo_id}' (count {})",
                    self.ngo_incoming_count(ngo_id)
                ))
            })
    }

    /// The `index`-th outgoing record of one NGO, in recording order.
    pub fn ngo_outgoing(&self, ngo_id: &NgoId, index: usize) -> DomainResult<&OutgoingRecord> {
        self.accounts
            .get(ngo_id)
            .and_then(|a| a.outgoing_positions().get(index))
            .and_then(|&pos| self.outgoing.get(pos))
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "outgoing record #{index} of ngo '{ngo_id}' (count {})",
                    self.ngo_outgoing_count(ngo_id)
                ))
            })
    }

    pub fn ngo_summary(&self, ngo_id: &NgoId) -> NgoSummary {
        let Some(account) = self.accounts.get(ngo_id) else {
            return NgoSummary::default();
        };

        let total_received = account
            .incoming_positions()
            .iter()
            .filter_map(|&pos| self.incoming.get(pos))
            .map(|r| r.amount)
            .sum();
        let total_spent = account
            .outgoing_positions()
            .iter()
            .filter_map(|&pos| self.outgoing.get(pos))
            .map(|r| r.amount)
            .sum();

        NgoSummary {
            total_received,
            total_spent,
            incoming_count: account.incoming_positions().len(),
            outgoing_count: account.outgoing_positions().len(),
            balance: account.balance(),
        }
    }

    /// NGO ids in first-seen order, at most `limit` of them.
    pub fn active_ngo_ids(&self, limit: usize) -> &[NgoId] {
        &self.active_ngos[..limit.min(self.active_ngos.len())]
    }

    /// Most recent incoming records first.
    pub fn recent_incoming(&self, limit: usize) -> impl Iterator<Item = &IncomingRecord> {
        self.incoming.iter().rev().take(limit)
    }

    /// Most recent outgoing records first.
    pub fn recent_outgoing(&self, limit: usize) -> impl Iterator<Item = &OutgoingRecord> {
        self.outgoing.iter().rev().take(limit)
    }

    /// Both directions for one NGO, newest first.
    ///
    /// Ordered by timestamp, then transaction id, both descending.
    pub fn ngo_history(&self, ngo_id: &NgoId, limit: usize) -> Vec<LedgerEntry> {
        let Some(account) = self.accounts.get(ngo_id) else {
            return Vec::new();
        };

        let incoming = account
            .incoming_positions()
            .iter()
            .filter_map(|&pos| self.incoming.get(pos))
            .cloned()
            .map(LedgerEntry::Incoming);
        let outgoing = account
            .outgoing_positions()
            .iter()
            .filter_map(|&pos| self.outgoing.get(pos))
            .cloned()
            .map(LedgerEntry::Outgoing);

        let mut entries: Vec<LedgerEntry> = incoming.chain(outgoing).collect();
        entries.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| b.transaction_id().cmp(&a.transaction_id()))
        });
        entries.truncate(limit);
        entries
    }

    /// Look up a record of either direction by its transaction id.
    pub fn find_transaction(&self, transaction_id: TransactionId) -> DomainResult<LedgerEntry> {
        let found = match self.by_transaction.get(&transaction_id) {
            Some(Position::Incoming(pos)) => self.incoming.get(*pos).cloned().map(LedgerEntry::Incoming),
            Some(Position::Outgoing(pos)) => self.outgoing.get(*pos).cloned().map(LedgerEntry::Outgoing),
            None => None,
        };
        found.ok_or_else(|| DomainError::not_found(format!("transaction {transaction_id}")))
    }

    /// Check that a journaled event is one this ledger could have produced.
    ///
    /// Used when rebuilding from a journal, where events did not pass through
    /// `handle`.
    pub fn verify_replay(&self, event: &LedgerEvent) -> DomainResult<()> {
        match event {
            LedgerEvent::LedgerOpened(_) if self.opened => {
                Err(DomainError::conflict("ledger opened twice"))
            }
            LedgerEvent::LedgerOpened(_) => Ok(()),
            _ if !self.opened => Err(DomainError::conflict(
                "journal does not start with a ledger opening",
            )),
            LedgerEvent::DonationReceived(e) => {
                self.expect_transaction_id(e.transaction_id)?;
                self.validate_credit(&e.ngo_id, e.amount)
                    .map_err(|err| DomainError::conflict(format!("transaction {}: {err}", e.transaction_id)))
            }
            LedgerEvent::FundsSpent(e) => {
                self.expect_transaction_id(e.transaction_id)?;
                self.validate_debit(&e.ngo_id, e.amount)
                    .map_err(|err| DomainError::conflict(format!("transaction {}: {err}", e.transaction_id)))
            }
            LedgerEvent::NgoBalanceUpdated(e) => {
                let actual = self.ngo_balance(&e.ngo_id);
                if actual != e.new_balance {
                    return Err(DomainError::conflict(format!(
                        "balance update for ngo '{}' claims {}, ledger has {actual}",
                        e.ngo_id, e.new_balance
                    )));
                }
                Ok(())
            }
        }
    }

    fn expect_transaction_id(&self, found: TransactionId) -> DomainResult<()> {
        if found != self.next_transaction_id {
            return Err(DomainError::conflict(format!(
                "expected transaction {}, found {found}",
                self.next_transaction_id
            )));
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &Identity) -> DomainResult<()> {
        if caller != &self.owner {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    fn validate_credit(&self, ngo_id: &NgoId, amount: u64) -> DomainResult<()> {
        if ngo_id.is_empty() {
            return Err(DomainError::invalid_input("ngo id must not be empty"));
        }
        if amount == 0 {
            return Err(DomainError::invalid_input("amount must be positive"));
        }
        let overflows = self.total_donations.checked_add(amount).is_none()
            || self.ngo_balance(ngo_id).checked_add(amount).is_none();
        if overflows {
            return Err(DomainError::invalid_input("amount overflows ledger totals"));
        }
        self.ensure_transaction_ids_left()
    }

    fn validate_debit(&self, ngo_id: &NgoId, amount: u64) -> DomainResult<()> {
        if ngo_id.is_empty() {
            return Err(DomainError::invalid_input("ngo id must not be empty"));
        }
        if amount == 0 {
            return Err(DomainError::invalid_input("amount must be positive"));
        }
        let available = self.ngo_balance(ngo_id);
        if amount > available {
            return Err(DomainError::insufficient_balance(ngo_id.as_str(), amount, available));
        }
        self.ensure_transaction_ids_left()
    }

    // The counter must be able to move past the id about to be allocated.
    fn ensure_transaction_ids_left(&self) -> DomainResult<()> {
        if self.next_transaction_id.checked_next().is_none() {
            return Err(DomainError::conflict(format!(
                "transaction ids exhausted at {}",
                self.next_transaction_id
            )));
        }
        Ok(())
    }

    fn handle_donation(&self, cmd: &RecordDonation) -> DomainResult<Vec<LedgerEvent>> {
        self.validate_credit(&cmd.ngo_id, cmd.amount)?;

        Ok(vec![LedgerEvent::DonationReceived(DonationReceived {
            transaction_id: self.next_transaction_id,
            ngo_id: cmd.ngo_id.clone(),
            donor_id: cmd.donor_id.clone(),
            cause: cmd.cause.clone(),
            amount: cmd.amount,
            timestamp: cmd.timestamp,
        })])
    }

    fn handle_spending(&self, cmd: &RecordSpending) -> DomainResult<Vec<LedgerEvent>> {
        self.ensure_owner(&cmd.caller)?;
        self.validate_debit(&cmd.ngo_id, cmd.amount)?;

        Ok(vec![LedgerEvent::FundsSpent(FundsSpent {
            transaction_id: self.next_transaction_id,
            ngo_id: cmd.ngo_id.clone(),
            receiver_id: cmd.receiver_id.clone(),
            cause: cmd.cause.clone(),
            amount: cmd.amount,
            timestamp: cmd.timestamp,
            verification_hash: cmd.verification_hash,
        })])
    }

    fn handle_initial_balance(&self, cmd: &RecordInitialBalance) -> DomainResult<Vec<LedgerEvent>> {
        self.ensure_owner(&cmd.caller)?;
        self.validate_credit(&cmd.ngo_id, cmd.initial_balance)?;

        let new_balance = self.ngo_balance(&cmd.ngo_id) + cmd.initial_balance;

        Ok(vec![
            LedgerEvent::DonationReceived(DonationReceived {
                transaction_id: self.next_transaction_id,
                ngo_id: cmd.ngo_id.clone(),
                donor_id: DonorId::initial_balance(),
                cause: "Initial Balance".to_string(),
                amount: cmd.initial_balance,
                timestamp: cmd.record_date,
            }),
            LedgerEvent::NgoBalanceUpdated(NgoBalanceUpdated {
                ngo_id: cmd.ngo_id.clone(),
                new_balance,
                action: BalanceAction::Initial,
                timestamp: cmd.record_date,
            }),
        ])
    }

    fn account_mut(&mut self, ngo_id: &NgoId) -> &mut NgoAccount {
        if !self.accounts.contains_key(ngo_id) {
            self.active_ngos.push(ngo_id.clone());
        }
        self.accounts
            .entry(ngo_id.clone())
            .or_insert_with(|| NgoAccount::open(ngo_id.clone()))
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::LedgerOpened(e) => {
                self.id = e.ledger_id;
                self.owner = e.owner.clone();
                self.next_transaction_id = e.first_transaction_id;
                self.opened = true;
            }
            LedgerEvent::DonationReceived(e) => {
                let position = self.incoming.len();
                self.incoming.push(IncomingRecord {
                    transaction_id: e.transaction_id,
                    ngo_id: e.ngo_id.clone(),
                    donor_id: e.donor_id.clone(),
                    cause: e.cause.clone(),
                    amount: e.amount,
                    timestamp: e.timestamp,
                });
                self.account_mut(&e.ngo_id).credit(position, e.amount);
                self.total_donations += e.amount;
                self.by_transaction
                    .insert(e.transaction_id, Position::Incoming(position));
                if let Some(next) = e.transaction_id.checked_next() {
                    self.next_transaction_id = next;
                }
            }
            LedgerEvent::FundsSpent(e) => {
                let position = self.outgoing.len();
                self.outgoing.push(OutgoingRecord {
                    transaction_id: e.transaction_id,
                    ngo_id: e.ngo_id.clone(),
                    receiver_id: e.receiver_id.clone(),
                    cause: e.cause.clone(),
                    amount: e.amount,
                    timestamp: e.timestamp,
                    verification_hash: e.verification_hash,
                });
                self.account_mut(&e.ngo_id).debit(position, e.amount);
                self.by_transaction
                    .insert(e.transaction_id, Position::Outgoing(position));
                if let Some(next) = e.transaction_id.checked_next() {
                    self.next_transaction_id = next;
                }
            }
            LedgerEvent::NgoBalanceUpdated(_) => {}
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if !self.opened {
            return Err(DomainError::conflict("ledger has not been opened"));
        }

        match command {
            LedgerCommand::RecordDonation(cmd) => self.handle_donation(cmd),
            LedgerCommand::RecordSpending(cmd) => self.handle_spending(cmd),
            LedgerCommand::RecordInitialBalance(cmd) => self.handle_initial_balance(cmd),
        }
    }
}
