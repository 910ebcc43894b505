//! Donation ledger: money into NGOs (donations, seeded balances) and out of
//! NGOs (verified spending), with a running balance per NGO.
//!
//! Pure domain logic plus an in-process engine: no HTTP, no payment gateway,
//! no notification delivery. Those consume the events published here.

pub mod audit;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod projections;

pub use audit::{AuditReport, JournalReadError, NgoAuditLine, audit, read_journal, write_journal};
pub use config::{ConfigError, LedgerConfig};
pub use engine::{AGGREGATE_TYPE, InMemoryLedgerBus, LedgerEngine, LedgerEnvelope};
pub use ledger::{
    BalanceAction, DonationReceived, FundsSpent, Ledger, LedgerCommand, LedgerEvent, LedgerId,
    LedgerOpened, NgoBalanceUpdated, RecordDonation, RecordInitialBalance, RecordSpending,
};
pub use model::{IncomingRecord, LedgerEntry, NgoAccount, NgoSummary, OutgoingRecord};
pub use projections::{BalanceChange, BalanceNotice, DonorContributions, DonorTotals, NgoBalanceFeed};
