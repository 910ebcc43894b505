use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};

use ngoledger_core::SystemClock;
use ngoledger_ledger::{LedgerEngine, audit, read_journal};

fn run() -> anyhow::Result<bool> {
    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: ngoledger-audit <journal.jsonl>");
    };

    let file = File::open(&path).with_context(|| format!("opening {path}"))?;
    let envelopes = read_journal(BufReader::new(file)).with_context(|| format!("reading {path}"))?;

    let engine = LedgerEngine::restore(envelopes, Arc::new(SystemClock))
        .with_context(|| format!("replaying {path}"))?;
    let report = audit(&engine);

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_clean() {
        for issue in &report.issues {
            tracing::error!(%issue, "audit issue");
        }
    }
    Ok(report.is_clean())
}

fn main() -> ExitCode {
    ngoledger_observability::init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            tracing::error!(error = ?err, "audit failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
