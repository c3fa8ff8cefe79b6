//! SQLite implementation of the database gateway.
//!
//! # Responsibility
//! - Read table metadata and whole tables.
//! - Execute inserts, key-addressed updates and deletes inside one transaction.
//! - Map `Value`s to SQLite storage classes and back.
//!
//! # Invariants
//! - Identifiers are always double-quoted.
//! - `Bool` is stored as INTEGER 0/1; `Decimal`, `DateTime` and `Uuid` as
//!   TEXT.
//! - An in-memory gateway keeps its connection across scopes; the database
//!   would not survive the connection otherwise.

use super::gateway::{DatabaseGateway, GatewayTransaction, Row};
use super::open::{open_connection, ConnectionTarget};
use super::{GatewayError, GatewayResult};
use crate::metadata::ColumnBinding;
use crate::model::value::{ColumnKind, Value};
use chrono::NaiveDateTime;
use log::debug;
use rust_decimal::Decimal;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql, Transaction};
use std::path::Path;
use uuid::Uuid;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATETIME_FORMAT_ISO: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// `rusqlite`-backed gateway.
pub struct SqliteGateway {
    target: ConnectionTarget,
    conn: Option<Connection>,
}

impl SqliteGateway {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            target: ConnectionTarget::File(path.as_ref().to_path_buf()),
            conn: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            target: ConnectionTarget::Memory,
            conn: None,
        }
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Runs raw SQL outside any context, e.g. to create tables in tests or
    /// tools. Opens and closes its own connection scope.
    pub fn execute_batch(&mut self, sql: &str) -> GatewayResult<()> {
        self.open()?;
        let result = self.connection().and_then(|conn| {
            conn.execute_batch(sql)?;
            Ok(())
        });
        self.close();
        result
    }

    fn connection(&self) -> GatewayResult<&Connection> {
        self.conn.as_ref().ok_or(GatewayError::NotOpen)
    }
}

impl DatabaseGateway for SqliteGateway {
    fn open(&mut self) -> GatewayResult<()> {
        if self.conn.is_none() {
            self.conn = Some(open_connection(&self.target)?);
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.target == ConnectionTarget::Memory {
            return;
        }
        self.conn = None;
    }

    fn fetch_column_names(&self, table: &str) -> GatewayResult<Vec<String>> {
        table_columns(self.connection()?, table)
    }

    fn fetch_rows(&self, table: &str, columns: &[ColumnBinding]) -> GatewayResult<Vec<Row>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {} FROM {};",
            column_list(columns.iter().map(|column| column.name)),
            quote_ident(table)
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut loaded = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                values.push(read_value(row.get_ref(index)?, table, column)?);
            }
            loaded.push(values);
        }

        debug!(
            "event=fetch_rows module=db status=ok table={} rows={}",
            table,
            loaded.len()
        );
        Ok(loaded)
    }

    fn begin_transaction(&mut self) -> GatewayResult<Box<dyn GatewayTransaction + '_>> {
        let conn = self.conn.as_mut().ok_or(GatewayError::NotOpen)?;
        let tx = conn.transaction()?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl GatewayTransaction for SqliteTransaction<'_> {
    fn fetch_column_names(&self, table: &str) -> GatewayResult<Vec<String>> {
        table_columns(&self.tx, table)
    }

    fn insert(
        &mut self,
        table: &str,
        columns: &[ColumnBinding],
        rows: &[Row],
    ) -> GatewayResult<()> {
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            quote_ident(table),
            column_list(columns.iter().map(|column| column.name)),
            placeholders
        );

        let mut stmt = self.tx.prepare(&sql)?;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
        Ok(())
    }

    fn update(
        &mut self,
        table: &str,
        columns: &[ColumnBinding],
        rows: &[Row],
    ) -> GatewayResult<()> {
        let (keys, values) = split_key_positions(columns);
        if values.is_empty() {
            return Ok(());
        }

        let assignments = values
            .iter()
            .enumerate()
            .map(|(slot, position)| {
                format!("{} = ?{}", quote_ident(columns[*position].name), slot + 1)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {};",
            quote_ident(table),
            assignments,
            key_predicate(columns, &keys, values.len())
        );

        let mut stmt = self.tx.prepare(&sql)?;
        for row in rows {
            let bound = values.iter().chain(keys.iter()).map(|position| &row[*position]);
            let changed = stmt.execute(params_from_iter(bound))?;
            if changed == 0 {
                return Err(GatewayError::RowNotFound {
                    table: table.to_string(),
                    operation: "update",
                });
            }
        }
        Ok(())
    }

    fn delete(
        &mut self,
        table: &str,
        columns: &[ColumnBinding],
        rows: &[Row],
    ) -> GatewayResult<()> {
        let (keys, _) = split_key_positions(columns);
        let sql = format!(
            "DELETE FROM {} WHERE {};",
            quote_ident(table),
            key_predicate(columns, &keys, 0)
        );

        let mut stmt = self.tx.prepare(&sql)?;
        for row in rows {
            let changed =
                stmt.execute(params_from_iter(keys.iter().map(|position| &row[*position])))?;
            if changed == 0 {
                return Err(GatewayError::RowNotFound {
                    table: table.to_string(),
                    operation: "delete",
                });
            }
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> GatewayResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> GatewayResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            Self::Decimal(value) => ToSqlOutput::Owned(SqlValue::Text(value.to_string())),
            Self::Bool(value) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*value))),
            Self::DateTime(value) => {
                ToSqlOutput::Owned(SqlValue::Text(value.format(DATETIME_FORMAT).to_string()))
            }
            Self::Uuid(value) => ToSqlOutput::Owned(SqlValue::Text(value.to_string())),
        })
    }
}

fn read_value(raw: ValueRef<'_>, table: &str, column: &ColumnBinding) -> GatewayResult<Value> {
    let invalid = |detail: String| {
        GatewayError::InvalidData(format!("{table}.{}: {detail}", column.name))
    };

    match (column.kind, raw) {
        (_, ValueRef::Null) => Ok(Value::Null),
        (ColumnKind::Integer, ValueRef::Integer(value)) => Ok(Value::Integer(value)),
        (ColumnKind::Real, ValueRef::Real(value)) => Ok(Value::Real(value)),
        (ColumnKind::Real, ValueRef::Integer(value)) => Ok(Value::Real(value as f64)),
        (ColumnKind::Decimal, ValueRef::Integer(value)) => Ok(Value::Decimal(value.into())),
        (ColumnKind::Decimal, ValueRef::Real(value)) => Decimal::try_from(value)
            .map(Value::Decimal)
            .map_err(|_| invalid(format!("invalid decimal `{value}`"))),
        (ColumnKind::Decimal, ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            text.parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|_| invalid(format!("invalid decimal `{text}`")))
        }
        (ColumnKind::Bool, ValueRef::Integer(0)) => Ok(Value::Bool(false)),
        (ColumnKind::Bool, ValueRef::Integer(1)) => Ok(Value::Bool(true)),
        (ColumnKind::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .map(|text| Value::Text(text.to_string()))
            .map_err(|_| invalid("text is not valid UTF-8".to_string())),
        (ColumnKind::DateTime, ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT_ISO))
                .map(Value::DateTime)
                .map_err(|_| invalid(format!("invalid datetime `{text}`")))
        }
        (ColumnKind::Uuid, ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            Uuid::parse_str(&text)
                .map(Value::Uuid)
                .map_err(|_| invalid(format!("invalid uuid `{text}`")))
        }
        (kind, other) => Err(invalid(format!(
            "expected {kind:?}, found {:?}",
            other.data_type()
        ))),
    }
}

fn table_columns(conn: &Connection, table: &str) -> GatewayResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote_ident(table)))?;
    let mut rows = stmt.query([])?;
    let mut names = Vec::new();
    while let Some(row) = rows.next()? {
        names.push(row.get::<_, String>(1)?);
    }

    if names.is_empty() {
        return Err(GatewayError::MissingTable(table.to_string()));
    }
    Ok(names)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.map(quote_ident).collect::<Vec<_>>().join(", ")
}

fn split_key_positions(columns: &[ColumnBinding]) -> (Vec<usize>, Vec<usize>) {
    (0..columns.len()).partition(|position| columns[*position].primary_key)
}

fn key_predicate(columns: &[ColumnBinding], keys: &[usize], offset: usize) -> String {
    keys.iter()
        .enumerate()
        .map(|(slot, position)| {
            format!(
                "{} = ?{}",
                quote_ident(columns[*position].name),
                offset + slot + 1
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}
