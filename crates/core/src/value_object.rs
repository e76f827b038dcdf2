//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are compared by their attributes
/// (e.g. a price in minor currency units, an invoice reference). To "change"
/// one, build a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
