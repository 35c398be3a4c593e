//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products keep their identity while their balance changes; movements keep
/// theirs forever (they are never updated).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
