//! Offline audit of a ledger journal.
//!
//! A journal is stored as JSON lines, one `EventEnvelope<LedgerEvent>` per
//! line. Auditing restores a ledger from it (which re-validates every event)
//! and then cross-checks the aggregates against the logs.

use std::io::BufRead;

use serde::Serialize;
use thiserror::Error;

use ngoledger_core::{Identity, NgoId};
use ngoledger_events::EventBus;

use crate::engine::{LedgerEngine, LedgerEnvelope};
use crate::ledger::LedgerId;
use crate::model::NgoSummary;

#[derive(Debug, Error)]
pub enum JournalReadError {
    #[error("failed to read journal: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a JSON-lines journal. Blank lines are skipped.
pub fn read_journal(reader: impl BufRead) -> Result<Vec<LedgerEnvelope>, JournalReadError> {
    let mut envelopes = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = serde_json::from_str(&line)
            .map_err(|source| JournalReadError::Parse { line: idx + 1, source })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

/// Serialize a journal as JSON lines.
pub fn write_journal(envelopes: &[LedgerEnvelope]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for envelope in envelopes {
        out.push_str(&serde_json::to_string(envelope)?);
        out.push('\n');
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NgoAuditLine {
    pub ngo_id: NgoId,
    #[serde(flatten)]
    pub summary: NgoSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub ledger_id: LedgerId,
    pub owner: Identity,
    pub events: usize,
    pub total_donations: u64,
    pub incoming_total: u64,
    pub outgoing_total: u64,
    pub ngos: Vec<NgoAuditLine>,
    pub issues: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Cross-check a ledger's aggregates against its logs.
pub fn audit<B>(engine: &LedgerEngine<B>) -> AuditReport
where
    B: EventBus<LedgerEnvelope>,
{
    engine.with_ledger(|ledger| {
        let mut issues = Vec::new();

        let incoming_total: u64 = (0..ledger.incoming_count())
            .filter_map(|i| ledger.incoming(i).ok())
            .map(|r| r.amount)
            .sum();
        let outgoing_total: u64 = (0..ledger.outgoing_count())
            .filter_map(|i| ledger.outgoing(i).ok())
            .map(|r| r.amount)
            .sum();

        if ledger.total_donations() != incoming_total {
            issues.push(format!(
                "total donations {} differ from incoming sum {incoming_total}",
                ledger.total_donations()
            ));
        }

        let ngos: Vec<NgoAuditLine> = ledger
            .active_ngo_ids(usize::MAX)
            .iter()
            .map(|ngo_id| NgoAuditLine {
                ngo_id: ngo_id.clone(),
                summary: ledger.ngo_summary(ngo_id),
            })
            .collect();

        for line in &ngos {
            if !line.summary.is_consistent() {
                issues.push(format!(
                    "ngo '{}': balance {} != received {} - spent {}",
                    line.ngo_id,
                    line.summary.balance,
                    line.summary.total_received,
                    line.summary.total_spent
                ));
            }
        }

        let balance_sum: u64 = ngos.iter().map(|l| l.summary.balance).sum();
        if incoming_total.checked_sub(outgoing_total) != Some(balance_sum) {
            issues.push(format!(
                "sum of balances {balance_sum} != incoming {incoming_total} - outgoing {outgoing_total}"
            ));
        }

        AuditReport {
            ledger_id: ledger.id_typed(),
            owner: ledger.owner().clone(),
            events: usize::try_from(ngoledger_core::AggregateRoot::version(ledger)).unwrap_or(usize::MAX),
            total_donations: ledger.total_donations(),
            incoming_total,
            outgoing_total,
            ngos,
            issues,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use ngoledger_core::{DomainError, FixedClock, VerificationHash};

    use super::*;
    use crate::config::LedgerConfig;
    use crate::ledger::LedgerEvent;

    const T: u64 = 1_700_000_000;

    fn sample() -> LedgerEngine {
        let owner = Identity::new("0xowner");
        let engine = LedgerEngine::with_bus(
            LedgerConfig::new(owner.clone()),
            Arc::new(ngoledger_events::InMemoryEventBus::new()),
            Arc::new(FixedClock(T)),
        );
        engine.record_donation("N1", "D1", "Education", 5_000, T).unwrap();
        engine.record_initial_balance(&owner, "N2", 50_000, T).unwrap();
        engine
            .record_spending(&owner, "N1", "V1", "Supplies", 1_500, T, VerificationHash::zero())
            .unwrap();
        engine
    }

    #[test]
    fn journal_text_restores_a_clean_ledger() {
        let engine = sample();
        let text = write_journal(&engine.journal()).unwrap();

        let envelopes = read_journal(Cursor::new(text)).unwrap();
        let restored = LedgerEngine::restore(envelopes, Arc::new(FixedClock(T))).unwrap();
        let report = audit(&restored);

        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.events, 5);
        assert_eq!(report.incoming_total, 55_000);
        assert_eq!(report.outgoing_total, 1_500);
        assert_eq!(report.ngos.len(), 2);
        assert_eq!(report.ngos[0].summary.balance, 3_500);
    }

    #[test]
    fn report_serializes_flat_ngo_lines() {
        let report = audit(&sample());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ngos"][1]["ngo_id"], "N2");
        assert_eq!(json["ngos"][1]["balance"], 50_000);
    }

    #[test]
    fn malformed_line_is_reported_with_number() {
        let engine = sample();
        let mut text = write_journal(&engine.journal()).unwrap();
        text.push_str("{not json}\n");

        match read_journal(Cursor::new(text)) {
            Err(JournalReadError::Parse { line, .. }) => assert_eq!(line, 6),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn tampered_amount_fails_restore() {
        let engine = sample();
        let mut journal = engine.journal();

        let last = journal.pop().unwrap();
        let LedgerEvent::FundsSpent(mut spent) = last.payload().clone() else {
            panic!("expected spending as last event");
        };
        spent.amount = 9_999;
        journal.push(ngoledger_events::EventEnvelope::new(
            last.event_id(),
            last.aggregate_type(),
            last.sequence_number(),
            LedgerEvent::FundsSpent(spent),
        ));

        let err = LedgerEngine::restore(journal, Arc::new(FixedClock(T))).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
