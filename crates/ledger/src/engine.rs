//! Ledger engine: the single entry point for recording and reading.
//!
//! ```text
//! record_* ─▶ write lock ─▶ Ledger::handle ─▶ Ledger::apply ─▶ journal ─▶ EventBus
//! get_*    ─▶ read lock  ─▶ Ledger (consistent snapshot)
//! ```
//!
//! All mutations are serialized behind one `RwLock`, so ledger-wide counters
//! (`total_donations`, the transaction id) never see interleaved writers.
//! Events are journaled before any is published, and published while the
//! write lock is still held, so bus order matches transaction order.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ngoledger_core::{
    AggregateRoot, Clock, DomainError, DomainResult, DonorId, Identity, NgoId, ReceiverId,
    SystemClock, TransactionId, VerificationHash,
};
use ngoledger_events::{EventBus, EventEnvelope, InMemoryEventBus, execute};

use crate::config::LedgerConfig;
use crate::ledger::{
    Ledger, LedgerCommand, LedgerEvent, LedgerId, RecordDonation, RecordInitialBalance,
    RecordSpending,
};
use crate::model::{IncomingRecord, LedgerEntry, NgoSummary, OutgoingRecord};

/// Aggregate type written into every journal envelope.
pub const AGGREGATE_TYPE: &str = "ngo_ledger";

pub type LedgerEnvelope = EventEnvelope<LedgerEvent>;

/// Default bus: in-process fan-out of ledger envelopes.
pub type InMemoryLedgerBus = Arc<InMemoryEventBus<LedgerEnvelope>>;

#[derive(Debug)]
struct State {
    ledger: Ledger,
    journal: Vec<LedgerEnvelope>,
}

/// Thread-safe donation ledger with event publication.
pub struct LedgerEngine<B = InMemoryLedgerBus> {
    state: RwLock<State>,
    bus: B,
    clock: Arc<dyn Clock>,
}

impl LedgerEngine {
    /// Fresh ledger owned by `owner`, using the system clock and an in-memory bus.
    pub fn new(owner: impl Into<Identity>) -> Self {
        Self::from_config(LedgerConfig::new(owner))
    }

    pub fn from_config(config: LedgerConfig) -> Self {
        Self::with_bus(config, Arc::new(InMemoryEventBus::new()), Arc::new(SystemClock))
    }

    /// Rebuild a ledger from its journal, with an in-memory bus.
    pub fn restore(
        envelopes: impl IntoIterator<Item = LedgerEnvelope>,
        clock: Arc<dyn Clock>,
    ) -> DomainResult<Self> {
        Self::restore_with_bus(envelopes, Arc::new(InMemoryEventBus::new()), clock)
    }
}

impl<B> LedgerEngine<B>
where
    B: EventBus<LedgerEnvelope>,
{
    pub fn with_bus(config: LedgerConfig, bus: B, clock: Arc<dyn Clock>) -> Self {
        let (ledger, genesis) = Ledger::open(
            LedgerId::new(),
            config.owner,
            config.first_transaction_id,
            clock.now_unix(),
        );
        let envelope = EventEnvelope::wrap(AGGREGATE_TYPE, 1, genesis);

        tracing::info!(
            ledger_id = %ledger.id_typed(),
            owner = %ledger.owner(),
            first_transaction_id = %ledger.next_transaction_id(),
            "ledger opened"
        );

        let engine = Self {
            state: RwLock::new(State {
                ledger,
                journal: vec![envelope.clone()],
            }),
            bus,
            clock,
        };
        engine.publish(envelope);
        engine
    }

    /// Rebuild a ledger by re-applying a journal.
    ///
    /// Every event is checked against the state rebuilt so far: sequence
    /// numbers must strictly increase, the first event must open the ledger,
    /// transaction ids must follow the counter and no spending may overdraw.
    /// Nothing is published; subscribers only see new activity.
    pub fn restore_with_bus(
        envelopes: impl IntoIterator<Item = LedgerEnvelope>,
        bus: B,
        clock: Arc<dyn Clock>,
    ) -> DomainResult<Self> {
        let mut ledger = Ledger::empty();
        let mut journal: Vec<LedgerEnvelope> = Vec::new();

        for envelope in envelopes {
            if let Some(last) = journal.last() {
                if envelope.sequence_number() <= last.sequence_number() {
                    return Err(DomainError::conflict(format!(
                        "non-monotonic sequence number (last={}, found={})",
                        last.sequence_number(),
                        envelope.sequence_number()
                    )));
                }
            }
            ledger.verify_replay(envelope.payload())?;
            ngoledger_core::Aggregate::apply(&mut ledger, envelope.payload());
            journal.push(envelope);
        }

        if !ledger.is_opened() {
            return Err(DomainError::conflict("journal is empty"));
        }

        tracing::info!(
            ledger_id = %ledger.id_typed(),
            events = journal.len(),
            incoming = ledger.incoming_count(),
            outgoing = ledger.outgoing_count(),
            "ledger restored from journal"
        );

        Ok(Self {
            state: RwLock::new(State { ledger, journal }),
            bus,
            clock,
        })
    }

    /// The bus ledger events are published on. Subscribe here.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Record a donation. Anyone may donate.
    pub fn record_donation(
        &self,
        ngo_id: impl Into<NgoId>,
        donor_id: impl Into<DonorId>,
        cause: impl Into<String>,
        amount: u64,
        timestamp: u64,
    ) -> DomainResult<TransactionId> {
        let command = LedgerCommand::RecordDonation(RecordDonation {
            ngo_id: ngo_id.into(),
            donor_id: donor_id.into(),
            cause: cause.into(),
            amount,
            timestamp: self.resolve_timestamp(timestamp),
        });

        self.dispatch(&command)
    }

    /// Record verified spending. Only the owner may call this.
    #[allow(clippy::too_many_arguments)]
    pub fn record_spending(
        &self,
        caller: &Identity,
        ngo_id: impl Into<NgoId>,
        receiver_id: impl Into<ReceiverId>,
        cause: impl Into<String>,
        amount: u64,
        timestamp: u64,
        verification_hash: VerificationHash,
    ) -> DomainResult<TransactionId> {
        let command = LedgerCommand::RecordSpending(RecordSpending {
            caller: caller.clone(),
            ngo_id: ngo_id.into(),
            receiver_id: receiver_id.into(),
            cause: cause.into(),
            amount,
            timestamp: self.resolve_timestamp(timestamp),
            verification_hash,
        });

        self.dispatch(&command)
    }

    /// Seed a pre-existing NGO balance. Only the owner may call this.
    ///
    /// Recorded as an ordinary incoming record from the `INITIAL_BALANCE`
    /// donor. May be repeated for the same NGO.
    pub fn record_initial_balance(
        &self,
        caller: &Identity,
        ngo_id: impl Into<NgoId>,
        initial_balance: u64,
        record_date: u64,
    ) -> DomainResult<TransactionId> {
        let command = LedgerCommand::RecordInitialBalance(RecordInitialBalance {
            caller: caller.clone(),
            ngo_id: ngo_id.into(),
            initial_balance,
            record_date: self.resolve_timestamp(record_date),
        });

        self.dispatch(&command)
    }

    pub fn get_ngo_balance(&self, ngo_id: &str) -> u64 {
        self.read().ledger.ngo_balance(&NgoId::new(ngo_id))
    }

    pub fn get_incoming_count(&self) -> usize {
        self.read().ledger.incoming_count()
    }

    pub fn get_outgoing_count(&self) -> usize {
        self.read().ledger.outgoing_count()
    }

    pub fn get_incoming(&self, index: usize) -> DomainResult<IncomingRecord> {
        self.read().ledger.incoming(index).cloned()
    }

    pub fn get_outgoing(&self, index: usize) -> DomainResult<OutgoingRecord> {
        self.read().ledger.outgoing(index).cloned()
    }

    pub fn get_ngo_incoming_count(&self, ngo_id: &str) -> usize {
        self.read().ledger.ngo_incoming_count(&NgoId::new(ngo_id))
    }

    pub fn get_ngo_outgoing_count(&self, ngo_id: &str) -> usize {
        self.read().ledger.ngo_outgoing_count(&NgoId::new(ngo_id))
    }

    pub fn get_ngo_incoming(&self, ngo_id: &str, index: usize) -> DomainResult<IncomingRecord> {
        self.read().ledger.ngo_incoming(&NgoId::new(ngo_id), index).cloned()
    }

    pub fn get_ngo_outgoing(&self, ngo_id: &str, index: usize) -> DomainResult<OutgoingRecord> {
        self.read().ledger.ngo_outgoing(&NgoId::new(ngo_id), index).cloned()
    }

    pub fn get_ngo_summary(&self, ngo_id: &str) -> NgoSummary {
        self.read().ledger.ngo_summary(&NgoId::new(ngo_id))
    }

    pub fn get_active_ngo_ids(&self, limit: usize) -> Vec<NgoId> {
        self.read().ledger.active_ngo_ids(limit).to_vec()
    }

    pub fn total_donations(&self) -> u64 {
        self.read().ledger.total_donations()
    }

    pub fn owner(&self) -> Identity {
        self.read().ledger.owner().clone()
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.read().ledger.id_typed()
    }

    /// Id the next successful recording will receive.
    pub fn next_transaction_id(&self) -> TransactionId {
        self.read().ledger.next_transaction_id()
    }

    /// Number of events applied so far, genesis included.
    pub fn version(&self) -> u64 {
        self.read().ledger.version()
    }

    pub fn recent_incoming(&self, limit: usize) -> Vec<IncomingRecord> {
        self.read().ledger.recent_incoming(limit).cloned().collect()
    }

    pub fn recent_outgoing(&self, limit: usize) -> Vec<OutgoingRecord> {
        self.read().ledger.recent_outgoing(limit).cloned().collect()
    }

    pub fn ngo_history(&self, ngo_id: &str, limit: usize) -> Vec<LedgerEntry> {
        self.read().ledger.ngo_history(&NgoId::new(ngo_id), limit)
    }

    pub fn find_transaction(&self, transaction_id: TransactionId) -> DomainResult<LedgerEntry> {
        self.read().ledger.find_transaction(transaction_id)
    }

    /// Copy of the full journal, genesis first.
    pub fn journal(&self) -> Vec<LedgerEnvelope> {
        let state = self.read();
        tracing::debug!(events = state.journal.len(), "journal snapshot taken");
        state.journal.clone()
    }

    /// Journal entries with a sequence number greater than `after`.
    pub fn journal_since(&self, after: u64) -> Vec<LedgerEnvelope> {
        self.read()
            .journal
            .iter()
            .filter(|e| e.sequence_number() > after)
            .cloned()
            .collect()
    }

    /// Run `f` against a consistent snapshot of the ledger.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
        f(&self.read().ledger)
    }

    fn resolve_timestamp(&self, timestamp: u64) -> u64 {
        if timestamp == 0 {
            self.clock.now_unix()
        } else {
            timestamp
        }
    }

    fn dispatch(&self, command: &LedgerCommand) -> DomainResult<TransactionId> {
        let mut state = self.write();

        let events = match execute(&mut state.ledger, command) {
            Ok(events) => events,
            Err(err) => {
                log_rejection(command, &err);
                return Err(err);
            }
        };

        let transaction_id = events
            .iter()
            .find_map(LedgerEvent::transaction_id)
            .ok_or_else(|| DomainError::conflict("recording produced no transaction"))?;

        let first_sequence = state.journal.last().map(|e| e.sequence_number()).unwrap_or(0) + 1;
        let envelopes: Vec<LedgerEnvelope> = events
            .into_iter()
            .zip(first_sequence..)
            .map(|(event, seq)| EventEnvelope::wrap(AGGREGATE_TYPE, seq, event))
            .collect();
        state.journal.extend(envelopes.iter().cloned());

        for envelope in envelopes {
            log_applied(envelope.payload());
            self.publish(envelope);
        }

        Ok(transaction_id)
    }

    fn publish(&self, envelope: LedgerEnvelope) {
        let sequence_number = envelope.sequence_number();
        let event_type = ngoledger_events::Event::event_type(envelope.payload());
        if let Err(err) = self.bus.publish(envelope) {
            tracing::warn!(sequence_number, event_type, error = %err, "event publication failed");
        }
    }

    // `apply` cannot fail part-way, so a poisoned lock still guards a
    // consistent ledger.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_applied(event: &LedgerEvent) {
    match event {
        LedgerEvent::DonationReceived(e) => tracing::info!(
            transaction_id = %e.transaction_id,
            ngo_id = %e.ngo_id,
            donor_id = %e.donor_id,
            amount = e.amount,
            "donation recorded"
        ),
        LedgerEvent::FundsSpent(e) => tracing::info!(
            transaction_id = %e.transaction_id,
            ngo_id = %e.ngo_id,
            receiver_id = %e.receiver_id,
            amount = e.amount,
            proof_attached = !e.verification_hash.is_zero(),
            "spending recorded"
        ),
        LedgerEvent::NgoBalanceUpdated(e) => tracing::info!(
            ngo_id = %e.ngo_id,
            new_balance = e.new_balance,
            action = e.action.as_str(),
            "ngo balance updated"
        ),
        LedgerEvent::LedgerOpened(_) => {}
    }
}

fn log_rejection(command: &LedgerCommand, err: &DomainError) {
    match (command, err) {
        (LedgerCommand::RecordSpending(cmd), DomainError::Unauthorized) => {
            tracing::warn!(caller = %cmd.caller, ngo_id = %cmd.ngo_id, "rejected spending from non-owner");
        }
        (LedgerCommand::RecordInitialBalance(cmd), DomainError::Unauthorized) => {
            tracing::warn!(caller = %cmd.caller, ngo_id = %cmd.ngo_id, "rejected balance seeding from non-owner");
        }
        (_, err) => {
            tracing::debug!(error = %err, "ledger command rejected");
        }
    }
}

impl<B> core::fmt::Debug for LedgerEngine<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LedgerEngine")
            .field("ledger_id", &state.ledger.id_typed())
            .field("version", &state.ledger.version())
            .field("journal_len", &state.journal.len())
            .finish_non_exhaustive()
    }
}
