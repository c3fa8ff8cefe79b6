//! Type-erased per-type handlers.
//!
//! # Responsibility
//! - Capture, at registration, every operation the context runs over a set
//!   without knowing its entity type.
//! - Index loaded sets by `TypeId` for typed lookups and relation wiring.
//!
//! # Invariants
//! - `SetTable` keeps discovery order; save and relation passes follow it.
//! - One set per entity type.

use crate::context::save::{persist_set, SaveSummary};
use crate::context::validate::Validator;
use crate::db::{DatabaseGateway, GatewayTransaction};
use crate::error::OrmResult;
use crate::metadata::registry::bind_entity;
use crate::metadata::EntityTypeBinding;
use crate::model::entity::{Entity, EntityDescriptor};
use crate::model::handle::AnyEntity;
use crate::model::value::Value;
use crate::relation::resolver;
use crate::tracking::entity_set::EntitySet;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

/// Operations the context runs over one loaded set.
pub(crate) trait ErasedSet {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn binding(&self) -> &EntityTypeBinding;
    fn invalid_count(&self, validator: &dyn Validator) -> usize;
    fn persist(&self, tx: &mut dyn GatewayTransaction) -> OrmResult<SaveSummary>;
    fn accept_changes(&mut self);
    /// Every entity paired with its first key value.
    fn keyed_entities(&self) -> OrmResult<Vec<(Value, AnyEntity)>>;
    /// Foreign-key field whose navigation targets `owner`, if any.
    fn back_reference(&self, owner: TypeId) -> Option<&'static str>;
    /// Every entity paired with the value of `foreign_key`, in set order.
    fn entities_by_foreign_key(&self, foreign_key: &str) -> Vec<(Value, AnyEntity)>;
    fn resolve_navigations(&self, sets: &SetTable) -> OrmResult<()>;
    fn resolve_collections(&self, sets: &SetTable) -> OrmResult<()>;
}

impl<T: Entity> ErasedSet for EntitySet<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn binding(&self) -> &EntityTypeBinding {
        EntitySet::binding(self)
    }

    fn invalid_count(&self, validator: &dyn Validator) -> usize {
        self.iter()
            .filter(|entity| !validator.is_valid(&*entity.borrow()))
            .count()
    }

    fn persist(&self, tx: &mut dyn GatewayTransaction) -> OrmResult<SaveSummary> {
        persist_set(self, tx)
    }

    fn accept_changes(&mut self) {
        EntitySet::accept_changes(self);
    }

    fn keyed_entities(&self) -> OrmResult<Vec<(Value, AnyEntity)>> {
        let binding = EntitySet::binding(self);
        self.iter()
            .map(|entity| -> OrmResult<(Value, AnyEntity)> {
                let key = binding.primary_value(self.descriptor(), &entity.borrow())?;
                Ok((key, entity.erase()))
            })
            .collect()
    }

    fn back_reference(&self, owner: TypeId) -> Option<&'static str> {
        let descriptor = self.descriptor();
        descriptor
            .foreign_keys()
            .find(|(_, navigation)| {
                descriptor
                    .navigation_field(navigation)
                    .is_some_and(|navigation| navigation.target() == owner)
            })
            .map(|(field, _)| field.name())
    }

    fn entities_by_foreign_key(&self, foreign_key: &str) -> Vec<(Value, AnyEntity)> {
        let Some(field) = self.descriptor().field(foreign_key) else {
            return Vec::new();
        };
        self.iter()
            .map(|entity| (field.read(&entity.borrow()), entity.erase()))
            .collect()
    }

    fn resolve_navigations(&self, sets: &SetTable) -> OrmResult<()> {
        resolver::resolve_navigations(self, sets)
    }

    fn resolve_collections(&self, sets: &SetTable) -> OrmResult<()> {
        resolver::resolve_collections(self, sets)
    }
}

/// Loaded sets in discovery order, indexed by entity type.
#[derive(Default)]
pub(crate) struct SetTable {
    sets: Vec<Box<dyn ErasedSet>>,
    index: HashMap<TypeId, usize>,
}

impl SetTable {
    pub(crate) fn push(&mut self, entity_type: TypeId, set: Box<dyn ErasedSet>) {
        self.index.insert(entity_type, self.sets.len());
        self.sets.push(set);
    }

    pub(crate) fn get(&self, entity_type: TypeId) -> Option<&dyn ErasedSet> {
        self.index
            .get(&entity_type)
            .map(|position| self.sets[*position].as_ref())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn ErasedSet> {
        self.sets.iter().map(|set| set.as_ref())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ErasedSet>> {
        self.sets.iter_mut()
    }

    pub(crate) fn typed<T: Entity>(&self) -> Option<&EntitySet<T>> {
        self.get(TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<EntitySet<T>>()
    }

    pub(crate) fn typed_mut<T: Entity>(&mut self) -> Option<&mut EntitySet<T>> {
        let position = *self.index.get(&TypeId::of::<T>())?;
        self.sets[position]
            .as_any_mut()
            .downcast_mut::<EntitySet<T>>()
    }
}

/// Registration-time constructor of one typed set.
pub(crate) trait SetFactory {
    fn entity_type(&self) -> TypeId;
    fn entity_name(&self) -> &'static str;
    fn table_override(&self) -> Option<&'static str>;
    fn bind(
        &self,
        set_name: &str,
        table: &str,
        physical_columns: &[String],
    ) -> OrmResult<EntityTypeBinding>;
    /// Fetches the table and materializes the set.
    fn load(
        &self,
        binding: Rc<EntityTypeBinding>,
        gateway: &dyn DatabaseGateway,
    ) -> OrmResult<Box<dyn ErasedSet>>;
}

pub(crate) struct TypedSetFactory<T> {
    descriptor: Rc<EntityDescriptor<T>>,
}

impl<T: Entity> TypedSetFactory<T> {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: Rc::new(T::describe()),
        }
    }
}

impl<T: Entity> SetFactory for TypedSetFactory<T> {
    fn entity_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn entity_name(&self) -> &'static str {
        self.descriptor.entity_name()
    }

    fn table_override(&self) -> Option<&'static str> {
        self.descriptor.table_override()
    }

    fn bind(
        &self,
        set_name: &str,
        table: &str,
        physical_columns: &[String],
    ) -> OrmResult<EntityTypeBinding> {
        bind_entity(&self.descriptor, set_name, table, physical_columns)
    }

    fn load(
        &self,
        binding: Rc<EntityTypeBinding>,
        gateway: &dyn DatabaseGateway,
    ) -> OrmResult<Box<dyn ErasedSet>> {
        let rows = gateway.fetch_rows(&binding.table, &binding.columns)?;
        let set = EntitySet::from_rows(Rc::clone(&self.descriptor), binding, rows)?;
        Ok(Box::new(set))
    }
}
