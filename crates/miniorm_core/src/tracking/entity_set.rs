//! Typed, tracked collection of one entity type.
//!
//! # Responsibility
//! - Own the live entities of one table and route every mutation through the
//!   change tracker.
//!
//! # Invariants
//! - A set always starts from `load`, which seeds the tracker snapshot.
//! - Iteration follows load order, then insertion order.
//! - `remove_range` removes everything or nothing.

use crate::error::{MappingError, OrmResult};
use crate::metadata::{ColumnBinding, EntityTypeBinding};
use crate::model::entity::{Entity, EntityDescriptor};
use crate::model::handle::EntityRef;
use crate::model::value::Value;
use crate::tracking::change_tracker::ChangeTracker;
use std::rc::Rc;

pub struct EntitySet<T> {
    descriptor: Rc<EntityDescriptor<T>>,
    binding: Rc<EntityTypeBinding>,
    entities: Vec<EntityRef<T>>,
    tracker: ChangeTracker<T>,
}

impl<T: Entity> EntitySet<T> {
    pub(crate) fn load(
        descriptor: Rc<EntityDescriptor<T>>,
        binding: Rc<EntityTypeBinding>,
        initial: Vec<T>,
    ) -> Self {
        let entities: Vec<EntityRef<T>> = initial.into_iter().map(EntityRef::new).collect();
        let tracker = ChangeTracker::new(Rc::clone(&descriptor), Rc::clone(&binding), &entities);
        Self {
            descriptor,
            binding,
            entities,
            tracker,
        }
    }

    /// Materializes entities from rows ordered like the binding's columns.
    pub(crate) fn from_rows(
        descriptor: Rc<EntityDescriptor<T>>,
        binding: Rc<EntityTypeBinding>,
        rows: Vec<Vec<Value>>,
    ) -> OrmResult<Self> {
        let mut initial = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entity = T::default();
            for (column, value) in binding.columns.iter().zip(row) {
                descriptor.fields()[column.field]
                    .write(&mut entity, value)
                    .map_err(|source| MappingError::ColumnConversion {
                        entity: binding.entity,
                        column: column.name,
                        source,
                    })?;
            }
            initial.push(entity);
        }
        Ok(Self::load(descriptor, binding, initial))
    }

    /// Declared set name.
    pub fn name(&self) -> &str {
        &self.binding.set_name
    }

    pub fn binding(&self) -> &EntityTypeBinding {
        &self.binding
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: &EntityRef<T>) -> bool {
        self.entities.iter().any(|item| item.ptr_eq(entity))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityRef<T>> {
        self.entities.iter()
    }

    /// Adds a new entity and returns its handle.
    pub fn add(&mut self, entity: T) -> EntityRef<T> {
        let entity = EntityRef::new(entity);
        self.add_ref(entity.clone());
        entity
    }

    /// Adds an existing handle, e.g. one removed earlier. Returns `false` if
    /// the instance is already in the set.
    pub fn add_ref(&mut self, entity: EntityRef<T>) -> bool {
        if self.contains(&entity) {
            return false;
        }
        self.tracker.track_added(&entity);
        self.entities.push(entity);
        true
    }

    /// Removes `entity`; returns `false` if it is not in the set.
    pub fn remove(&mut self, entity: &EntityRef<T>) -> bool {
        let Some(position) = self.entities.iter().position(|item| item.ptr_eq(entity)) else {
            return false;
        };
        let removed = self.entities.remove(position);
        self.tracker.track_removed(&removed);
        true
    }

    /// Removes every entity in `entities`, or none of them if any is absent.
    pub fn remove_range(&mut self, entities: &[EntityRef<T>]) -> bool {
        let mut pending: Vec<&EntityRef<T>> = Vec::with_capacity(entities.len());
        for entity in entities {
            let repeated = pending.iter().any(|item| item.ptr_eq(entity));
            if repeated || !self.contains(entity) {
                return false;
            }
            pending.push(entity);
        }

        for entity in pending {
            self.remove(entity);
        }
        true
    }

    /// Removes every entity, one by one, through `remove`.
    pub fn clear(&mut self) {
        while let Some(first) = self.entities.first().cloned() {
            self.remove(&first);
        }
    }

    /// Returns the live entity whose key values equal `key`, in key order.
    pub fn find_by_key(&self, key: &[Value]) -> Option<EntityRef<T>> {
        self.entities
            .iter()
            .find(|entity| {
                self.binding
                    .key_values(&self.descriptor, &entity.borrow())
                    .is_ok_and(|values| values.as_slice() == key)
            })
            .cloned()
    }

    pub fn change_tracker(&self) -> &ChangeTracker<T> {
        &self.tracker
    }

    /// Entities changed since the last baseline.
    pub fn modified(&self) -> OrmResult<Vec<EntityRef<T>>> {
        self.tracker.modified(&self.entities)
    }

    pub(crate) fn descriptor(&self) -> &EntityDescriptor<T> {
        &self.descriptor
    }

    pub(crate) fn accept_changes(&mut self) {
        self.tracker.accept_changes(&self.entities);
    }

    /// Reads `columns` from `entities`, enforcing non-null keys.
    pub(crate) fn rows_for(
        &self,
        entities: &[EntityRef<T>],
        columns: &[ColumnBinding],
    ) -> OrmResult<Vec<Vec<Value>>> {
        entities
            .iter()
            .map(|entity| -> OrmResult<Vec<Value>> {
                let entity = entity.borrow();
                self.binding.key_values(&self.descriptor, &entity)?;
                Ok(EntityTypeBinding::row_values(
                    &self.descriptor,
                    columns,
                    &entity,
                ))
            })
            .collect()
    }
}

impl<'a, T: Entity> IntoIterator for &'a EntitySet<T> {
    type Item = &'a EntityRef<T>;
    type IntoIter = std::slice::Iter<'a, EntityRef<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
