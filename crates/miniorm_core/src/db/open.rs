//! SQLite connection bootstrap.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure pragmas the engine relies on.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections wait up to `BUSY_TIMEOUT` on a locked database.
//! - Schema is never created or migrated here.

use super::GatewayResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a SQLite gateway connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    File(PathBuf),
    Memory,
}

impl ConnectionTarget {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens and configures one SQLite connection.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(target: &ConnectionTarget) -> GatewayResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();

    let opened = match target {
        ConnectionTarget::File(path) => Connection::open(path),
        ConnectionTarget::Memory => Connection::open_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = configure_connection(&conn) {
        error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code=db_configure_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err.into());
    }

    info!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)
}
