//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an NGO (the balance-holding entity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NgoId(String);

/// Identifier of a donor. May be the seeding sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonorId(String);

/// Identifier of the party receiving spent funds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverId(String);

/// Identity asserted by a caller (e.g. an account address).
///
/// Proving that a caller really holds this identity happens outside the
/// ledger; the ledger only compares identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

impl_string_newtype!(NgoId);
impl_string_newtype!(DonorId);
impl_string_newtype!(ReceiverId);
impl_string_newtype!(Identity);

impl DonorId {
    /// Donor id reserved for balance-seeding records.
    pub const INITIAL_BALANCE: &'static str = "INITIAL_BALANCE";

    pub fn initial_balance() -> Self {
        Self(Self::INITIAL_BALANCE.to_string())
    }

    /// True if this donor id marks a seeded balance rather than a donation.
    pub fn is_initial_balance(&self) -> bool {
        self.0 == Self::INITIAL_BALANCE
    }
}

/// Ledger-wide transaction identifier.
///
/// Incoming and outgoing records share one counter, so an id is unique across
/// both logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The id allocated after this one, or `None` once the id space is used up.
    pub fn checked_next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for TransactionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TransactionId> for u64 {
    fn from(value: TransactionId) -> Self {
        value.0
    }
}

/// 32-byte digest referencing off-ledger proof of spending.
///
/// Opaque to the ledger. All-zero means no proof has been attached yet.
/// Serialized as a 64-character lowercase hex string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationHash([u8; 32]);

impl VerificationHash {
    pub const LEN: usize = 32;

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl core::fmt::Display for VerificationHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for VerificationHash {
    type Err = DomainError;

    /// Parses 64 hex characters, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        if hex.len() != Self::LEN * 2 {
            return Err(DomainError::invalid_id(format!(
                "VerificationHash: expected {} hex characters, got {}",
                Self::LEN * 2,
                hex.len()
            )));
        }

        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = hex
                .get(i * 2..i * 2 + 2)
                .filter(|p| p.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(|| {
                    DomainError::invalid_id(format!(
                        "VerificationHash: non-hex input at offset {}",
                        i * 2
                    ))
                })?;
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|e| DomainError::invalid_id(format!("VerificationHash: {e}")))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for VerificationHash {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VerificationHash> for String {
    fn from(value: VerificationHash) -> Self {
        value.to_string()
    }
}

impl From<[u8; 32]> for VerificationHash {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}
