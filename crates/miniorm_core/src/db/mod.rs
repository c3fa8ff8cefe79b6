//! Database gateway boundary and its SQLite implementation.
//!
//! # Responsibility
//! - Define the storage contract the engine consumes (`DatabaseGateway`,
//!   `GatewayTransaction`).
//! - Scope connections so they are released on every exit path.
//! - Provide a `rusqlite`-backed gateway.
//!
//! # Invariants
//! - Entities cross this boundary only as rows of `Value`s paired with
//!   `ColumnBinding`s.
//! - A transaction dropped without commit is rolled back.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod gateway;
mod open;
mod sqlite;

pub use gateway::{ConnectionScope, DatabaseGateway, GatewayTransaction, Row};
pub use open::{open_connection, ConnectionTarget};
pub use sqlite::SqliteGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug)]
pub enum GatewayError {
    Sqlite(rusqlite::Error),
    /// An operation needed a connection outside an open scope.
    NotOpen,
    MissingTable(String),
    /// An update or delete matched no row.
    RowNotFound {
        table: String,
        operation: &'static str,
    },
    /// Stored data cannot be represented in the bound column kind.
    InvalidData(String),
    /// Failure reported by a non-SQLite gateway implementation.
    Other(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::NotOpen => write!(f, "database connection is not open"),
            Self::MissingTable(table) => write!(f, "table `{table}` does not exist"),
            Self::RowNotFound { table, operation } => {
                write!(f, "{operation} on `{table}` matched no row")
            }
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
