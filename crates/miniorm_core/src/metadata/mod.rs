//! Metadata registry: which entity types a context manages and how each one
//! maps onto its table.
//!
//! # Responsibility
//! - Validate declared set, table and column identifiers.
//! - Build immutable `EntityTypeBinding`s from entity descriptors and the
//!   physical columns reported by the database gateway.

pub mod identifier;
pub mod registry;

pub use identifier::is_valid_identifier;
pub use registry::{ColumnBinding, EntityTypeBinding, Registry};
