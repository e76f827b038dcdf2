//! Entity trait: identity + continuity across review transitions.

/// Entity marker + minimal interface.
///
/// Price and code changes are entities: a record keeps its identity while its
/// review status moves from detected to a terminal state.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Persisted revision of the record (1 once recorded, +1 per transition).
    fn version(&self) -> u64;
}
