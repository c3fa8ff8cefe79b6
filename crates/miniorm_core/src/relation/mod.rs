//! In-memory wiring of navigation references and back-collections.
//!
//! # Responsibility
//! - Link every loaded entity to the entities its foreign keys name.
//! - Fill back-collections from the foreign keys pointing at each owner.
//!
//! # Invariants
//! - Runs without a database connection.
//! - The navigation pass completes before the collection pass starts.
//! - Re-running produces the same links for the same key values.

pub(crate) mod resolver;

pub(crate) use resolver::resolve_relations;
