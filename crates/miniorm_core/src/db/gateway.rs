//! Storage contract consumed by the engine.

use super::GatewayResult;
use crate::metadata::ColumnBinding;
use crate::model::value::Value;
use log::{debug, warn};
use std::ops::{Deref, DerefMut};

/// One entity as column values, ordered like the accompanying column list.
pub type Row = Vec<Value>;

/// Physical database access.
///
/// Implementations block the calling thread for every call.
pub trait DatabaseGateway {
    fn open(&mut self) -> GatewayResult<()>;
    fn close(&mut self);
    fn fetch_column_names(&self, table: &str) -> GatewayResult<Vec<String>>;
    /// Fetches every row of `table`, values ordered like `columns`.
    fn fetch_rows(&self, table: &str, columns: &[ColumnBinding]) -> GatewayResult<Vec<Row>>;
    fn begin_transaction(&mut self) -> GatewayResult<Box<dyn GatewayTransaction + '_>>;
}

/// Writes performed inside one transaction.
///
/// `update` and `delete` locate rows through the columns flagged
/// `primary_key`.
pub trait GatewayTransaction {
    fn fetch_column_names(&self, table: &str) -> GatewayResult<Vec<String>>;
    fn insert(&mut self, table: &str, columns: &[ColumnBinding], rows: &[Row])
        -> GatewayResult<()>;
    fn update(&mut self, table: &str, columns: &[ColumnBinding], rows: &[Row])
        -> GatewayResult<()>;
    fn delete(&mut self, table: &str, columns: &[ColumnBinding], rows: &[Row])
        -> GatewayResult<()>;
    fn commit(self: Box<Self>) -> GatewayResult<()>;
    fn rollback(self: Box<Self>) -> GatewayResult<()>;
}

/// Open connection that is closed when the scope is dropped.
pub struct ConnectionScope<'g, G: DatabaseGateway + ?Sized> {
    gateway: &'g mut G,
}

impl<'g, G: DatabaseGateway + ?Sized> ConnectionScope<'g, G> {
    pub fn open(gateway: &'g mut G) -> GatewayResult<Self> {
        if let Err(err) = gateway.open() {
            warn!("event=connection_scope module=db status=error error={err}");
            return Err(err);
        }
        debug!("event=connection_scope module=db status=open");
        Ok(Self { gateway })
    }
}

impl<G: DatabaseGateway + ?Sized> Deref for ConnectionScope<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.gateway
    }
}

impl<G: DatabaseGateway + ?Sized> DerefMut for ConnectionScope<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.gateway
    }
}

impl<G: DatabaseGateway + ?Sized> Drop for ConnectionScope<'_, G> {
    fn drop(&mut self) {
        self.gateway.close();
        debug!("event=connection_scope module=db status=closed");
    }
}
