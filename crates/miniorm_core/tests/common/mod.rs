#![allow(dead_code)]

use chrono::NaiveDateTime;
use miniorm_core::{
    Collection, ColumnBinding, Context, ContextBuilder, DatabaseGateway, Entity,
    EntityDescriptor, GatewayError, GatewayResult, GatewayTransaction, Reference, Row,
    SqliteGateway, Value,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub orders: Collection<Order>,
}

impl Entity for Customer {
    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::new()
            .key("id", |c| &c.id, |c| &mut c.id)
            .column("name", |c| &c.name, |c| &mut c.name)
            .column("email", |c| &c.email, |c| &mut c.email)
            .collection("orders", |c| &mut c.orders)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("customer {} has no name", self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Order {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub total: f64,
    pub note: Option<String>,
    pub customer: Reference<Customer>,
}

impl Entity for Order {
    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::new()
            .key("id", |o| &o.id, |o| &mut o.id)
            .foreign_key(
                "customer_id",
                "customer",
                |o| &o.customer_id,
                |o| &mut o.customer_id,
            )
            .column("total", |o| &o.total, |o| &mut o.total)
            .column("note", |o| &o.note, |o| &mut o.note)
            .navigation("customer", |o| &mut o.customer)
    }
}

#[derive(Debug, Default)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub draft_label: String,
}

impl Entity for Product {
    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::new()
            .table("products")
            .key("id", |p| &p.id, |p| &mut p.id)
            .column("name", |p| &p.name, |p| &mut p.name)
            .column("price", |p| &p.price, |p| &mut p.price)
            .column("active", |p| &p.active, |p| &mut p.active)
            .column("created_at", |p| &p.created_at, |p| &mut p.created_at)
            .not_mapped("draft_label", |p| &p.draft_label, |p| &mut p.draft_label)
    }
}

#[derive(Debug, Default)]
pub struct Employee {
    pub id: i64,
    pub manager_id: Option<i64>,
    pub name: String,
    pub manager: Reference<Employee>,
    pub reports: Collection<Employee>,
}

impl Entity for Employee {
    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::new()
            .key("id", |e| &e.id, |e| &mut e.id)
            .foreign_key(
                "manager_id",
                "manager",
                |e| &e.manager_id,
                |e| &mut e.manager_id,
            )
            .column("name", |e| &e.name, |e| &mut e.name)
            .navigation("manager", |e| &mut e.manager)
            .collection("reports", |e| &mut e.reports)
    }
}

pub const SCHEMA: &str = "
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    total REAL NOT NULL,
    note TEXT
);
CREATE TABLE products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price REAL NOT NULL,
    active INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE employees (
    id INTEGER PRIMARY KEY,
    manager_id INTEGER,
    name TEXT NOT NULL
);
";

pub const SEED: &str = "
INSERT INTO customers (id, name, email) VALUES
    (7, 'Ada', 'ada@example.com'),
    (9, 'Grace', NULL),
    (11, 'Linus', NULL);
INSERT INTO orders (id, customer_id, total, note) VALUES
    (1, 7, 10.5, NULL),
    (2, 7, 20.0, 'gift'),
    (3, 9, 5.0, NULL),
    (4, NULL, 1.0, NULL);
INSERT INTO products (id, name, price, active, created_at) VALUES
    ('6f1c2a34-5b7d-4e8f-9a0b-1c2d3e4f5a6b', 'Widget', 2.5, 1, '2024-03-01 09:30:00');
INSERT INTO employees (id, manager_id, name) VALUES
    (1, NULL, 'Root'),
    (2, 1, 'Lead'),
    (3, 2, 'Dev'),
    (4, 2, 'Ops');
";

pub const SEEDED_PRODUCT_ID: &str = "6f1c2a34-5b7d-4e8f-9a0b-1c2d3e4f5a6b";

/// In-memory SQLite gateway holding the schema and the seed rows.
pub fn seeded_gateway() -> SqliteGateway {
    let mut gateway = SqliteGateway::in_memory();
    gateway.execute_batch(SCHEMA).unwrap();
    gateway.execute_batch(SEED).unwrap();
    gateway
}

pub fn shop_builder() -> ContextBuilder {
    ContextBuilder::new()
        .register::<Customer>("customers")
        .register::<Order>("orders")
        .register::<Product>("catalog")
}

pub fn shop_context() -> Context<SqliteGateway> {
    shop_builder().build(seeded_gateway()).unwrap()
}

/// Rebuilds a context over the same database to observe what was committed.
pub fn reload(context: Context<SqliteGateway>) -> Context<SqliteGateway> {
    shop_builder().build(context.into_gateway()).unwrap()
}

pub fn datetime(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub struct RecordingState {
    pub tables: BTreeMap<String, FakeTable>,
    pub calls: Vec<String>,
    /// `(operation, table)` that fails with `GatewayError::Other`.
    pub fail_on: Option<(&'static str, String)>,
    pub fail_commit: bool,
    pub open: bool,
}

/// Gateway double recording every call instead of touching storage. Clones
/// share state, so a test can keep one while the context owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingGateway {
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        self.state.borrow_mut().tables.insert(
            name.to_string(),
            FakeTable {
                columns: columns.iter().map(|column| column.to_string()).collect(),
                rows,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn fail_on(&self, operation: &'static str, table: &str) {
        self.state.borrow_mut().fail_on = Some((operation, table.to_string()));
    }

    pub fn fail_commit(&self) {
        self.state.borrow_mut().fail_commit = true;
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }
}

fn column_names(state: &RefCell<RecordingState>, table: &str) -> GatewayResult<Vec<String>> {
    state
        .borrow()
        .tables
        .get(table)
        .map(|fake| fake.columns.clone())
        .ok_or_else(|| GatewayError::MissingTable(table.to_string()))
}

impl DatabaseGateway for RecordingGateway {
    fn open(&mut self) -> GatewayResult<()> {
        let mut state = self.state.borrow_mut();
        state.open = true;
        state.calls.push("open".to_string());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.calls.push("close".to_string());
    }

    fn fetch_column_names(&self, table: &str) -> GatewayResult<Vec<String>> {
        self.state
            .borrow_mut()
            .calls
            .push(format!("columns:{table}"));
        column_names(&self.state, table)
    }

    fn fetch_rows(&self, table: &str, columns: &[ColumnBinding]) -> GatewayResult<Vec<Row>> {
        self.state.borrow_mut().calls.push(format!("rows:{table}"));
        let state = self.state.borrow();
        let fake = state
            .tables
            .get(table)
            .ok_or_else(|| GatewayError::MissingTable(table.to_string()))?;
        let positions: Vec<usize> = columns
            .iter()
            .map(|column| {
                fake.columns
                    .iter()
                    .position(|name| name == column.name)
                    .unwrap()
            })
            .collect();
        Ok(fake
            .rows
            .iter()
            .map(|row| positions.iter().map(|position| row[*position].clone()).collect())
            .collect())
    }

    fn begin_transaction(&mut self) -> GatewayResult<Box<dyn GatewayTransaction + '_>> {
        self.state.borrow_mut().calls.push("begin".to_string());
        Ok(Box::new(RecordingTransaction {
            state: Rc::clone(&self.state),
        }))
    }
}

struct RecordingTransaction {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingTransaction {
    fn write(&mut self, operation: &'static str, table: &str, rows: &[Row]) -> GatewayResult<()> {
        let mut state = self.state.borrow_mut();
        state
            .calls
            .push(format!("{operation}:{table}:{}", rows.len()));
        let fails = state
            .fail_on
            .as_ref()
            .is_some_and(|(failing, failing_table)| {
                *failing == operation && failing_table == table
            });
        if fails {
            return Err(GatewayError::Other(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl GatewayTransaction for RecordingTransaction {
    fn fetch_column_names(&self, table: &str) -> GatewayResult<Vec<String>> {
        column_names(&self.state, table)
    }

    fn insert(
        &mut self,
        table: &str,
        _columns: &[ColumnBinding],
        rows: &[Row],
    ) -> GatewayResult<()> {
        self.write("insert", table, rows)
    }

    fn update(
        &mut self,
        table: &str,
        _columns: &[ColumnBinding],
        rows: &[Row],
    ) -> GatewayResult<()> {
        self.write("update", table, rows)
    }

    fn delete(
        &mut self,
        table: &str,
        _columns: &[ColumnBinding],
        rows: &[Row],
    ) -> GatewayResult<()> {
        self.write("delete", table, rows)
    }

    fn commit(self: Box<Self>) -> GatewayResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push("commit".to_string());
        if state.fail_commit {
            return Err(GatewayError::Other("injected commit failure".to_string()));
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> GatewayResult<()> {
        self.state.borrow_mut().calls.push("rollback".to_string());
        Ok(())
    }
}

/// Recording gateway with `customers` and `orders` tables matching the fixtures.
pub fn recording_gateway() -> RecordingGateway {
    RecordingGateway::default()
        .with_table(
            "customers",
            &["id", "name", "email"],
            vec![
                vec![7.into(), "Ada".into(), Value::Null],
                vec![9.into(), "Grace".into(), Value::Null],
            ],
        )
        .with_table(
            "orders",
            &["id", "customer_id", "total", "note"],
            vec![
                vec![1.into(), 7.into(), 10.5.into(), Value::Null],
                vec![2.into(), 9.into(), 3.0.into(), Value::Null],
            ],
        )
}
