//! Error taxonomy for context construction, relation wiring and saving.
//!
//! # Invariants
//! - Mapping failures are fatal and never retried.
//! - Validation failures are reported before any storage access.
//! - Gateway failures during a save are returned unchanged after rollback.

use crate::db::GatewayError;
use crate::model::value::ValueError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrmResult<T> = Result<T, OrmError>;

/// Top-level error returned by context operations.
#[derive(Debug)]
pub enum OrmError {
    Mapping(MappingError),
    Validation(ValidationError),
    Persistence(GatewayError),
}

impl Display for OrmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapping(err) => write!(f, "mapping error: {err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mapping(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<MappingError> for OrmError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}

impl From<ValidationError> for OrmError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<GatewayError> for OrmError {
    fn from(value: GatewayError) -> Self {
        Self::Persistence(value)
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(GatewayError::Sqlite(value))
    }
}

/// Metadata or key inconsistency between entities, sets and tables.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The same entity type was registered for two sets.
    DuplicateSet { entity: &'static str },
    /// A set, table or column name is not a plain SQL identifier.
    InvalidIdentifier(String),
    /// The entity type declares no key field.
    MissingPrimaryKey { entity: &'static str },
    /// A key field has no physical column in the table.
    MissingKeyColumn {
        entity: &'static str,
        table: String,
        column: &'static str,
    },
    /// A key field was null while comparing, diffing or persisting.
    NullPrimaryKey {
        entity: &'static str,
        field: &'static str,
    },
    /// No live entity carries the key of a snapshot row.
    UnmatchedSnapshot { entity: &'static str, key: String },
    /// More than one live entity carries the key of a snapshot row.
    AmbiguousSnapshot { entity: &'static str, key: String },
    /// A foreign key names a navigation field the entity does not declare.
    UnknownNavigation {
        entity: &'static str,
        foreign_key: &'static str,
        navigation: &'static str,
    },
    /// A navigation or collection field targets a type without a set.
    UnregisteredTarget {
        entity: &'static str,
        field: &'static str,
        target: &'static str,
    },
    /// A non-null foreign key matches no entity in the target set.
    DanglingForeignKey {
        entity: &'static str,
        foreign_key: &'static str,
        value: String,
    },
    /// A collection element type has no foreign key back to the owner.
    MissingBackReference {
        owner: &'static str,
        collection: &'static str,
        element: &'static str,
    },
    /// A relation field received an entity of an unexpected type.
    TargetTypeMismatch {
        entity: &'static str,
        field: &'static str,
    },
    /// A stored value could not be converted into the field type.
    ColumnConversion {
        entity: &'static str,
        column: &'static str,
        source: ValueError,
    },
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSet { entity } => {
                write!(f, "entity type `{entity}` is registered for more than one set")
            }
            Self::InvalidIdentifier(name) => write!(f, "`{name}` is not a valid SQL identifier"),
            Self::MissingPrimaryKey { entity } => {
                write!(f, "entity type `{entity}` declares no primary key")
            }
            Self::MissingKeyColumn {
                entity,
                table,
                column,
            } => write!(
                f,
                "primary key `{entity}.{column}` has no column in table `{table}`"
            ),
            Self::NullPrimaryKey { entity, field } => {
                write!(f, "primary key `{entity}.{field}` is null")
            }
            Self::UnmatchedSnapshot { entity, key } => write!(
                f,
                "no `{entity}` with key {key} remains in its set; primary keys cannot be reassigned"
            ),
            Self::AmbiguousSnapshot { entity, key } => {
                write!(f, "more than one `{entity}` carries key {key}")
            }
            Self::UnknownNavigation {
                entity,
                foreign_key,
                navigation,
            } => write!(
                f,
                "foreign key `{entity}.{foreign_key}` names unknown navigation field `{navigation}`"
            ),
            Self::UnregisteredTarget {
                entity,
                field,
                target,
            } => write!(
                f,
                "relation `{entity}.{field}` targets `{target}`, which has no entity set"
            ),
            Self::DanglingForeignKey {
                entity,
                foreign_key,
                value,
            } => write!(
                f,
                "foreign key `{entity}.{foreign_key}` = {value} matches no target entity"
            ),
            Self::MissingBackReference {
                owner,
                collection,
                element,
            } => write!(
                f,
                "collection `{owner}.{collection}` needs a foreign key on `{element}` navigating to `{owner}`"
            ),
            Self::TargetTypeMismatch { entity, field } => {
                write!(f, "relation `{entity}.{field}` received an entity of the wrong type")
            }
            Self::ColumnConversion {
                entity,
                column,
                source,
            } => write!(f, "cannot load `{entity}.{column}`: {source}"),
        }
    }
}

impl Error for MappingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ColumnConversion { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Entities failing validation blocked a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub set: String,
    pub invalid_count: usize,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} invalid entities found in set `{}`",
            self.invalid_count, self.set
        )
    }
}

impl Error for ValidationError {}
