//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// An NGO account is an entity: its balance changes, its identity does not.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
