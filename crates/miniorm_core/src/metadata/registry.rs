//! Entity-to-table binding discovery.
//!
//! # Responsibility
//! - Resolve table names for every registered set.
//! - Intersect each entity's storable fields with the table's physical columns.
//! - Extract key and column values from entities through their bindings.
//!
//! # Invariants
//! - Bindings are computed once per context and never mutated afterwards.
//! - Every binding has at least one key column, and every key field is bound.
//! - Discovery never writes to storage.

use crate::db::DatabaseGateway;
use crate::error::{MappingError, OrmResult};
use crate::metadata::identifier::ensure_identifier;
use crate::model::entity::{Entity, EntityDescriptor};
use crate::model::value::{ColumnKind, Value};
use crate::tracking::erased::SetFactory;
use log::debug;
use serde::Serialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

/// One storable field bound to a physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub primary_key: bool,
    /// Position of the field in the entity's accessor table.
    #[serde(skip)]
    pub(crate) field: usize,
}

/// Table binding for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityTypeBinding {
    pub entity: &'static str,
    pub set_name: String,
    pub table: String,
    pub columns: Vec<ColumnBinding>,
}

impl EntityTypeBinding {
    pub fn column(&self, name: &str) -> Option<&ColumnBinding> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.columns.iter().filter(|column| column.primary_key)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }

    /// Reads every key value of `entity`, failing on the first null.
    pub(crate) fn key_values<T: Entity>(
        &self,
        descriptor: &EntityDescriptor<T>,
        entity: &T,
    ) -> Result<Vec<Value>, MappingError> {
        self.key_columns()
            .map(|column| {
                let value = descriptor.fields()[column.field].read(entity);
                if value.is_null() {
                    Err(MappingError::NullPrimaryKey {
                        entity: self.entity,
                        field: column.name,
                    })
                } else {
                    Ok(value)
                }
            })
            .collect()
    }

    /// Reads the first key value; relations always target this field.
    pub(crate) fn primary_value<T: Entity>(
        &self,
        descriptor: &EntityDescriptor<T>,
        entity: &T,
    ) -> Result<Value, MappingError> {
        self.key_values(descriptor, entity)?
            .into_iter()
            .next()
            .ok_or(MappingError::MissingPrimaryKey {
                entity: self.entity,
            })
    }

    /// Reads `columns` from `entity` in order.
    pub(crate) fn row_values<T: Entity>(
        descriptor: &EntityDescriptor<T>,
        columns: &[ColumnBinding],
        entity: &T,
    ) -> Vec<Value> {
        columns
            .iter()
            .map(|column| descriptor.fields()[column.field].read(entity))
            .collect()
    }
}

/// Builds the binding of `T` against the physical columns of `table`.
pub(crate) fn bind_entity<T: Entity>(
    descriptor: &EntityDescriptor<T>,
    set_name: &str,
    table: &str,
    physical_columns: &[String],
) -> OrmResult<EntityTypeBinding> {
    let entity = descriptor.entity_name();
    if !descriptor.fields().iter().any(|field| field.is_key()) {
        return Err(MappingError::MissingPrimaryKey { entity }.into());
    }

    let mut columns = Vec::new();
    for (index, field) in descriptor.fields().iter().enumerate() {
        ensure_identifier(field.name())?;
        if !field.is_persisted() {
            continue;
        }

        let exists = physical_columns.iter().any(|column| column == field.name());
        if !exists {
            if field.is_key() {
                return Err(MappingError::MissingKeyColumn {
                    entity,
                    table: table.to_string(),
                    column: field.name(),
                }
                .into());
            }
            debug!(
                "event=bind_column module=metadata status=skipped entity={} column={} reason=no_physical_column",
                entity,
                field.name()
            );
            continue;
        }

        columns.push(ColumnBinding {
            name: field.name(),
            kind: field.kind(),
            nullable: field.nullable(),
            primary_key: field.is_key(),
            field: index,
        });
    }

    Ok(EntityTypeBinding {
        entity,
        set_name: set_name.to_string(),
        table: table.to_string(),
        columns,
    })
}

/// A set declared on a context, before discovery.
pub(crate) struct SetRegistration {
    pub(crate) set_name: String,
    pub(crate) factory: Box<dyn SetFactory>,
}

/// Discovered bindings, in registration order, indexed by entity type.
#[derive(Debug, Default)]
pub struct Registry {
    bindings: Vec<Rc<EntityTypeBinding>>,
    by_type: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &EntityTypeBinding> {
        self.bindings.iter().map(|binding| binding.as_ref())
    }

    pub fn binding_of<T: Entity>(&self) -> Option<&EntityTypeBinding> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|index| self.bindings[*index].as_ref())
    }

    pub(crate) fn shared(&self, index: usize) -> Rc<EntityTypeBinding> {
        Rc::clone(&self.bindings[index])
    }
}

/// Discovers the table binding of every registered set.
pub(crate) fn discover(
    registrations: &[SetRegistration],
    gateway: &dyn DatabaseGateway,
) -> OrmResult<Registry> {
    let mut registry = Registry::default();

    for registration in registrations {
        let factory = registration.factory.as_ref();
        if registry.by_type.contains_key(&factory.entity_type()) {
            return Err(MappingError::DuplicateSet {
                entity: factory.entity_name(),
            }
            .into());
        }

        ensure_identifier(&registration.set_name)?;
        let table = factory
            .table_override()
            .unwrap_or(registration.set_name.as_str());
        ensure_identifier(table)?;

        let physical_columns = gateway.fetch_column_names(table)?;
        let binding = factory.bind(&registration.set_name, table, &physical_columns)?;
        debug!(
            "event=discover_set module=metadata status=ok set={} table={} columns={}",
            binding.set_name,
            binding.table,
            binding.columns.len()
        );

        registry
            .by_type
            .insert(factory.entity_type(), registry.bindings.len());
        registry.bindings.push(Rc::new(binding));
    }

    Ok(registry)
}
