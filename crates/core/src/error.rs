//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic outcome of a single call. A call that
/// returns an error has not changed any ledger state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (empty NGO id, zero amount, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller is not the ledger owner.
    #[error("unauthorized")]
    Unauthorized,

    /// A spending would drive the NGO balance below zero.
    #[error("insufficient balance for ngo '{ngo_id}': requested {requested}, available {available}")]
    InsufficientBalance {
        ngo_id: String,
        requested: u64,
        available: u64,
    },

    /// A lookup (by position or transaction id) found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// State could not be accessed or rebuilt consistently.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn insufficient_balance(ngo_id: impl Into<String>, requested: u64, available: u64) -> Self {
        Self::InsufficientBalance {
            ngo_id: ngo_id.into(),
            requested,
            available,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
