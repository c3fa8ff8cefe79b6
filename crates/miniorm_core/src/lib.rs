//! Minimal object-relational persistence engine.
//! Binds typed entity sets to tables, tracks their changes and writes the net
//! effect back inside one transaction.

pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod model;
mod relation;
pub mod tracking;

pub use context::{Context, ContextBuilder, DeclaredRules, SaveSummary, Validatable, Validator};
pub use db::{
    ConnectionScope, DatabaseGateway, GatewayError, GatewayResult, GatewayTransaction, Row,
    SqliteGateway,
};
pub use error::{MappingError, OrmError, OrmResult, ValidationError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use metadata::{ColumnBinding, EntityTypeBinding, Registry};
pub use model::entity::{Entity, EntityDescriptor};
pub use model::handle::{Collection, EntityRef, Reference};
pub use model::value::{ColumnKind, ColumnValue, Value, ValueError};
pub use tracking::{ChangeTracker, EntitySet};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
