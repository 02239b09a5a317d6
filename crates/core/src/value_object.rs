//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Quantities,
/// wastage percentages and units of measure are value objects; a BOM line is not.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct WastagePercent(Decimal);
///
/// impl ValueObject for WastagePercent {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
