//! Ledger configuration.
//!
//! Read from the environment at process start:
//!
//! - `LEDGER_OWNER` (required): identity allowed to record spending and seed balances.
//! - `LEDGER_FIRST_TRANSACTION_ID` (optional, default `1`): id given to the first recording.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ngoledger_core::{Identity, TransactionId};

pub const OWNER_VAR: &str = "LEDGER_OWNER";
pub const FIRST_TRANSACTION_ID_VAR: &str = "LEDGER_FIRST_TRANSACTION_ID";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub owner: Identity,
    pub first_transaction_id: TransactionId,
}

impl LedgerConfig {
    pub const DEFAULT_FIRST_TRANSACTION_ID: u64 = 1;

    pub fn new(owner: impl Into<Identity>) -> Self {
        Self {
            owner: owner.into(),
            first_transaction_id: TransactionId::new(Self::DEFAULT_FIRST_TRANSACTION_ID),
        }
    }

    pub fn with_first_transaction_id(mut self, id: u64) -> Self {
        self.first_transaction_id = TransactionId::new(id);
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let owner = lookup(OWNER_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(OWNER_VAR))?;

        let mut config = Self::new(owner);

        if let Some(raw) = lookup(FIRST_TRANSACTION_ID_VAR) {
            let id = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: FIRST_TRANSACTION_ID_VAR,
                reason: e.to_string(),
            })?;
            config = config.with_first_transaction_id(id);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn owner_is_required() {
        assert_eq!(
            LedgerConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing(OWNER_VAR))
        );
        assert_eq!(
            LedgerConfig::from_lookup(lookup(&[(OWNER_VAR, "  ")])),
            Err(ConfigError::Missing(OWNER_VAR))
        );
    }

    #[test]
    fn first_transaction_id_defaults_to_one() {
        let config = LedgerConfig::from_lookup(lookup(&[(OWNER_VAR, "0xabc")])).unwrap();
        assert_eq!(config.owner.as_str(), "0xabc");
        assert_eq!(config.first_transaction_id.value(), 1);
    }

    #[test]
    fn first_transaction_id_is_parsed() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (OWNER_VAR, "0xabc"),
            (FIRST_TRANSACTION_ID_VAR, "1000"),
        ]))
        .unwrap();
        assert_eq!(config.first_transaction_id.value(), 1000);

        let err = LedgerConfig::from_lookup(lookup(&[
            (OWNER_VAR, "0xabc"),
            (FIRST_TRANSACTION_ID_VAR, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: FIRST_TRANSACTION_ID_VAR, .. }));
    }
}
