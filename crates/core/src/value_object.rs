//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects (amounts, tax rates, line snapshots) have no identity: two
/// instances with the same attributes are the same value. They are immutable;
/// "changing" one means constructing a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
