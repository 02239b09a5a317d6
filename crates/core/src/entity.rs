//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// BOM headers and BOM lines are entities: two lines with the same item and quantity
/// are still distinct rows, told apart by their identity.
pub trait Entity {
    /// Identifier, unique within the entity's owning scope.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
