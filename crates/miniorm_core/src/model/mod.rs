//! Entity-side building blocks.
//!
//! # Responsibility
//! - Define storable column values and their Rust field mappings.
//! - Define the per-type accessor table every entity provides.
//! - Define entity handles and read-only relation holders.

pub mod entity;
pub mod handle;
pub mod value;
