//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Ledger records
/// are value objects: once recorded they never change, and two records with
/// the same fields are the same fact.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Receipt {
///     transaction_id: u64,
///     amount: u64,
/// }
///
/// impl ValueObject for Receipt {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
