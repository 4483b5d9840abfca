//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Devices, offers and reservations are entities: two records with the same
/// id are the same record even if their status or stock differs.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
