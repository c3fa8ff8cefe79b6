mod common;

use common::{datetime, reload, shop_builder, shop_context, Customer, Order, Product, SCHEMA, SEED};
use miniorm_core::db::ConnectionTarget;
use miniorm_core::{
    ContextBuilder, DatabaseGateway, Entity, EntityDescriptor, GatewayError, OrmError,
    SqliteGateway, Value,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

#[test]
fn product_columns_round_trip_through_sqlite() {
    let mut context = shop_context();
    let id = Uuid::new_v4();
    let created_at = datetime("2024-06-30 23:59:58");
    context.set_mut::<Product>().unwrap().add(Product {
        id,
        name: "Gadget".to_string(),
        price: 19.99,
        active: false,
        created_at,
        draft_label: "never stored".to_string(),
    });
    context.save_changes().unwrap();

    let context = reload(context);
    let gadget = context
        .set::<Product>()
        .unwrap()
        .find_by_key(&[Value::Uuid(id)])
        .unwrap();
    let gadget = gadget.borrow();
    assert_eq!(gadget.name, "Gadget");
    assert_eq!(gadget.price, 19.99);
    assert!(!gadget.active);
    assert_eq!(gadget.created_at, created_at);
    assert_eq!(gadget.draft_label, "");
}

#[test]
fn seeded_values_are_decoded_by_column_kind() {
    let context = shop_context();
    let products = context.set::<Product>().unwrap();
    let widget = products
        .find_by_key(&[Value::Uuid(Uuid::parse_str(common::SEEDED_PRODUCT_ID).unwrap())])
        .unwrap();

    let widget = widget.borrow();
    assert!(widget.active);
    assert_eq!(widget.price, 2.5);
    assert_eq!(widget.created_at, datetime("2024-03-01 09:30:00"));
}

#[test]
fn file_gateway_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    let mut gateway = SqliteGateway::file(&path);
    gateway.execute_batch(SCHEMA).unwrap();
    gateway.execute_batch(SEED).unwrap();
    assert!(!gateway.is_open());

    let mut context = shop_builder().build(gateway).unwrap();
    assert!(!context.gateway().is_open());
    context
        .set::<Customer>()
        .unwrap()
        .find_by_key(&[Value::from(11)])
        .unwrap()
        .borrow_mut()
        .email = Some("linus@example.com".to_string());
    context.save_changes().unwrap();
    assert!(!context.gateway().is_open());

    let conn = Connection::open(&path).unwrap();
    let email: Option<String> = conn
        .query_row("SELECT email FROM customers WHERE id = 11", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(email.as_deref(), Some("linus@example.com"));
}

#[test]
fn in_memory_gateway_keeps_its_connection() {
    let mut gateway = SqliteGateway::in_memory();
    assert_eq!(gateway.target(), &ConnectionTarget::Memory);
    gateway.execute_batch(SCHEMA).unwrap();

    assert!(gateway.is_open());
    let columns = gateway.fetch_column_names("orders").unwrap();
    assert_eq!(columns, vec!["id", "customer_id", "total", "note"]);
}

#[test]
fn missing_table_fails_construction() {
    let mut gateway = SqliteGateway::in_memory();
    gateway
        .execute_batch("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, email TEXT);")
        .unwrap();

    let err = ContextBuilder::new()
        .register::<Customer>("customers")
        .register::<Order>("orders")
        .build(gateway)
        .err()
        .unwrap();

    match err {
        OrmError::Persistence(GatewayError::MissingTable(table)) => assert_eq!(table, "orders"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fields_without_a_physical_column_are_ignored() {
    let mut gateway = SqliteGateway::in_memory();
    gateway
        .execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, total REAL NOT NULL, note TEXT);
             INSERT INTO customers (id, name) VALUES (1, 'Niklaus');",
        )
        .unwrap();

    let mut context = ContextBuilder::new()
        .register::<Customer>("customers")
        .register::<Order>("orders")
        .build(gateway)
        .unwrap();
    let binding = context.registry().binding_of::<Customer>().unwrap();
    assert_eq!(binding.column_names(), vec!["id", "name"]);

    let customers = context.set_mut::<Customer>().unwrap();
    let niklaus = customers.find_by_key(&[Value::from(1)]).unwrap();
    niklaus.borrow_mut().email = Some("ignored@example.com".to_string());
    assert!(customers.modified().unwrap().is_empty());

    customers.add(Customer {
        id: 2,
        name: "Tony".to_string(),
        email: Some("dropped@example.com".to_string()),
        ..Customer::default()
    });
    assert_eq!(context.save_changes().unwrap().inserted, 1);
}

#[test]
fn stored_value_of_the_wrong_kind_is_rejected() {
    let mut gateway = SqliteGateway::in_memory();
    gateway
        .execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, total REAL NOT NULL, note TEXT);
             INSERT INTO orders (id, customer_id, total) VALUES (1, NULL, 'not a number');",
        )
        .unwrap();

    let err = ContextBuilder::new()
        .register::<Customer>("customers")
        .register::<Order>("orders")
        .build(gateway)
        .err()
        .unwrap();

    assert!(matches!(
        err,
        OrmError::Persistence(GatewayError::InvalidData(_))
    ));
}

#[derive(Debug, Default)]
struct LedgerEntry {
    id: i64,
    amount: Decimal,
    sequence: u64,
}

impl Entity for LedgerEntry {
    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::new()
            .table("ledger")
            .key("id", |e| &e.id, |e| &mut e.id)
            .column("amount", |e| &e.amount, |e| &mut e.amount)
            .column("sequence", |e| &e.sequence, |e| &mut e.sequence)
    }
}

#[test]
fn decimal_and_unsigned_columns_round_trip_exactly() {
    let mut gateway = SqliteGateway::in_memory();
    gateway
        .execute_batch(
            "CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount TEXT NOT NULL, sequence TEXT NOT NULL);
             INSERT INTO ledger (id, amount, sequence) VALUES (1, '10.25', '7');",
        )
        .unwrap();
    let mut context = ContextBuilder::new()
        .register::<LedgerEntry>("entries")
        .build(gateway)
        .unwrap();
    let amount = Decimal::from_str("1234567890.123456789").unwrap();
    context.set_mut::<LedgerEntry>().unwrap().add(LedgerEntry {
        id: 2,
        amount,
        sequence: u64::MAX,
    });
    context.save_changes().unwrap();

    let context = ContextBuilder::new()
        .register::<LedgerEntry>("entries")
        .build(context.into_gateway())
        .unwrap();
    let entries = context.set::<LedgerEntry>().unwrap();
    let seeded = entries.find_by_key(&[Value::from(1)]).unwrap();
    assert_eq!(seeded.borrow().amount, Decimal::from_str("10.25").unwrap());
    assert_eq!(seeded.borrow().sequence, 7);

    let added = entries.find_by_key(&[Value::from(2)]).unwrap();
    assert_eq!(added.borrow().amount, amount);
    assert_eq!(added.borrow().sequence, u64::MAX);
}
