//! Scalar column values exchanged between entities and storage.
//!
//! # Responsibility
//! - Define the closed set of storable column kinds.
//! - Convert Rust field types to and from dynamically typed `Value`s.
//!
//! # Invariants
//! - Only types implementing `ColumnValue` can be bound to a column, so a
//!   field outside the allowed kinds can never reach storage.
//! - `Value` equality is structural. `Real` compares by bit pattern with the
//!   sign of zero ignored, so values can be used as hash keys.
//! - `Decimal` compares numerically: `2.5` equals `2.50`.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Storable column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Decimal,
    Bool,
    DateTime,
    Uuid,
}

/// Dynamically typed column value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Decimal(Decimal),
    Bool(bool),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the column kind carried by this value, `None` for `Null`.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(ColumnKind::Text),
            Self::Integer(_) => Some(ColumnKind::Integer),
            Self::Real(_) => Some(ColumnKind::Real),
            Self::Decimal(_) => Some(ColumnKind::Decimal),
            Self::Bool(_) => Some(ColumnKind::Bool),
            Self::DateTime(_) => Some(ColumnKind::DateTime),
            Self::Uuid(_) => Some(ColumnKind::Uuid),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(left), Self::Text(right)) => left == right,
            (Self::Integer(left), Self::Integer(right)) => left == right,
            (Self::Real(left), Self::Real(right)) => real_bits(*left) == real_bits(*right),
            (Self::Decimal(left), Self::Decimal(right)) => left == right,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::DateTime(left), Self::DateTime(right)) => left == right,
            (Self::Uuid(left), Self::Uuid(right)) => left == right,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Text(value) => value.hash(state),
            Self::Integer(value) => value.hash(state),
            Self::Real(value) => real_bits(*value).hash(state),
            Self::Decimal(value) => value.hash(state),
            Self::Bool(value) => value.hash(state),
            Self::DateTime(value) => value.hash(state),
            Self::Uuid(value) => value.hash(state),
        }
    }
}

fn real_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Text(value) => write!(f, "'{value}'"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{value}"),
            Self::Uuid(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// Conversion failure between a `Value` and a Rust field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A non-nullable field received `Value::Null`.
    UnexpectedNull { expected: ColumnKind },
    /// The value kind does not match the field kind.
    KindMismatch {
        expected: ColumnKind,
        found: ColumnKind,
    },
    /// An integer does not fit into the narrower field type.
    OutOfRange { target: &'static str, value: i64 },
    /// A decimal is fractional or does not fit into the integer field type.
    NotIntegral { target: &'static str, value: Decimal },
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedNull { expected } => {
                write!(f, "null value for non-nullable {expected:?} field")
            }
            Self::KindMismatch { expected, found } => {
                write!(f, "expected {expected:?} value, found {found:?}")
            }
            Self::OutOfRange { target, value } => {
                write!(f, "integer {value} does not fit into {target}")
            }
            Self::NotIntegral { target, value } => {
                write!(f, "decimal {value} is not representable as {target}")
            }
        }
    }
}

impl Error for ValueError {}

fn mismatch(expected: ColumnKind, found: &Value) -> ValueError {
    found
        .kind()
        .map_or(ValueError::UnexpectedNull { expected }, |found| {
            ValueError::KindMismatch { expected, found }
        })
}

/// Rust field type that can be bound to a table column.
pub trait ColumnValue: Sized {
    const KIND: ColumnKind;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

macro_rules! integer_column {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const KIND: ColumnKind = ColumnKind::Integer;

                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Integer(raw) => <$ty>::try_from(raw).map_err(|_| {
                            ValueError::OutOfRange {
                                target: stringify!($ty),
                                value: raw,
                            }
                        }),
                        other => Err(mismatch(ColumnKind::Integer, &other)),
                    }
                }
            }
        )*
    };
}

integer_column!(i8, i16, i32, i64, u8, u16, u32);

impl ColumnValue for f64 {
    const KIND: ColumnKind = ColumnKind::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Real(raw) => Ok(raw),
            // SQLite hands back whole-number reals as integers.
            Value::Integer(raw) => Ok(raw as f64),
            other => Err(mismatch(ColumnKind::Real, &other)),
        }
    }
}

impl ColumnValue for f32 {
    const KIND: ColumnKind = ColumnKind::Real;

    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|raw| raw as f32)
    }
}

impl ColumnValue for Decimal {
    const KIND: ColumnKind = ColumnKind::Decimal;

    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Decimal(raw) => Ok(raw),
            Value::Integer(raw) => Ok(Decimal::from(raw)),
            other => Err(mismatch(ColumnKind::Decimal, &other)),
        }
    }
}

/// `u64` exceeds the signed 64-bit integer storage class, so it is carried
/// as an exact decimal.
impl ColumnValue for u64 {
    const KIND: ColumnKind = ColumnKind::Decimal;

    fn to_value(&self) -> Value {
        Value::Decimal(Decimal::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(raw) => u64::try_from(raw).map_err(|_| ValueError::OutOfRange {
                target: "u64",
                value: raw,
            }),
            Value::Decimal(raw) => raw
                .fract()
                .is_zero()
                .then(|| raw.to_u64())
                .flatten()
                .ok_or(ValueError::NotIntegral {
                    target: "u64",
                    value: raw,
                }),
            other => Err(mismatch(ColumnKind::Decimal, &other)),
        }
    }
}

impl ColumnValue for bool {
    const KIND: ColumnKind = ColumnKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(raw) => Ok(raw),
            other => Err(mismatch(ColumnKind::Bool, &other)),
        }
    }
}

impl ColumnValue for String {
    const KIND: ColumnKind = ColumnKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(raw) => Ok(raw),
            other => Err(mismatch(ColumnKind::Text, &other)),
        }
    }
}

impl ColumnValue for NaiveDateTime {
    const KIND: ColumnKind = ColumnKind::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(raw) => Ok(raw),
            other => Err(mismatch(ColumnKind::DateTime, &other)),
        }
    }
}

impl ColumnValue for Uuid {
    const KIND: ColumnKind = ColumnKind::Uuid;

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Uuid(raw) => Ok(raw),
            other => Err(mismatch(ColumnKind::Uuid, &other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const KIND: ColumnKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}
