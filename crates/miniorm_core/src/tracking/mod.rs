//! Entity sets and their change trackers.
//!
//! # Responsibility
//! - Hold the live entities of every registered type.
//! - Classify mutations into added, modified and removed.

pub mod change_tracker;
pub mod entity_set;
pub(crate) mod erased;

pub use change_tracker::ChangeTracker;
pub use entity_set::EntitySet;
