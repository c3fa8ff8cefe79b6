//! Snapshot-based change classification for one entity set.
//!
//! # Responsibility
//! - Keep a column-level snapshot of every entity as loaded (or as last saved).
//! - Record entities added and removed through the owning set.
//! - Diff live entities against the snapshot to find modified ones.
//!
//! # Invariants
//! - Snapshots hold bound column values only; relation fields are never
//!   snapshotted or compared.
//! - Snapshot rows are matched to live entities by primary-key values, never
//!   by instance identity. Removed entities are the exception: they are paired
//!   with the row they were loaded from, so a rewritten key still deletes the
//!   stored row.
//! - `added` and `removed` never share an instance.
//! - Added entities are never reported modified; neither are removed ones.

use crate::error::{MappingError, OrmResult};
use crate::metadata::{ColumnBinding, EntityTypeBinding};
use crate::model::entity::{Entity, EntityDescriptor};
use crate::model::handle::EntityRef;
use crate::model::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

struct SnapshotRow<T> {
    source: EntityRef<T>,
    values: Vec<Value>,
}

/// Change tracker state of one entity set.
pub struct ChangeTracker<T> {
    descriptor: Rc<EntityDescriptor<T>>,
    binding: Rc<EntityTypeBinding>,
    snapshot: Vec<SnapshotRow<T>>,
    added: Vec<EntityRef<T>>,
    removed: Vec<EntityRef<T>>,
}

impl<T: Entity> ChangeTracker<T> {
    pub(crate) fn new(
        descriptor: Rc<EntityDescriptor<T>>,
        binding: Rc<EntityTypeBinding>,
        entities: &[EntityRef<T>],
    ) -> Self {
        let mut tracker = Self {
            descriptor,
            binding,
            snapshot: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
        };
        tracker.take_snapshot(entities);
        tracker
    }

    /// Entities added since the last baseline.
    pub fn added(&self) -> &[EntityRef<T>] {
        &self.added
    }

    /// Entities removed since the last baseline.
    pub fn removed(&self) -> &[EntityRef<T>] {
        &self.removed
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    pub(crate) fn track_added(&mut self, entity: &EntityRef<T>) {
        if let Some(position) = self.removed.iter().position(|item| item.ptr_eq(entity)) {
            self.removed.remove(position);
            return;
        }
        if !self.added.iter().any(|item| item.ptr_eq(entity)) {
            self.added.push(entity.clone());
        }
    }

    pub(crate) fn track_removed(&mut self, entity: &EntityRef<T>) {
        if let Some(position) = self.added.iter().position(|item| item.ptr_eq(entity)) {
            self.added.remove(position);
            return;
        }
        if !self.removed.iter().any(|item| item.ptr_eq(entity)) {
            self.removed.push(entity.clone());
        }
    }

    /// Returns the live entities whose column values differ from their
    /// snapshot.
    ///
    /// # Errors
    /// - `NullPrimaryKey` when any inspected entity has a null key field.
    /// - `UnmatchedSnapshot` when a snapshot row has no live counterpart and
    ///   was not removed (its key was rewritten).
    /// - `AmbiguousSnapshot` when several live entities share its key.
    pub fn modified(&self, live: &[EntityRef<T>]) -> OrmResult<Vec<EntityRef<T>>> {
        let mut counterparts: HashMap<Vec<Value>, Vec<&EntityRef<T>>> = HashMap::new();
        for entity in live {
            if self.added.iter().any(|item| item.ptr_eq(entity)) {
                continue;
            }
            let key = self.key_of(entity)?;
            counterparts.entry(key).or_default().push(entity);
        }

        let key_positions = self.key_positions();
        let mut modified: Vec<EntityRef<T>> = Vec::new();
        for row in &self.snapshot {
            if self.is_removed(&row.source) {
                continue;
            }
            let original = &row.values;
            let key = self.snapshot_key(original, &key_positions)?;
            let counterpart = match counterparts.get(&key).map(Vec::as_slice) {
                Some([single]) => *single,
                Some(_) => {
                    return Err(MappingError::AmbiguousSnapshot {
                        entity: self.binding.entity,
                        key: format_key(&key),
                    }
                    .into())
                }
                None => {
                    return Err(MappingError::UnmatchedSnapshot {
                        entity: self.binding.entity,
                        key: format_key(&key),
                    }
                    .into())
                }
            };

            if self.differs(original, counterpart)
                && !modified.iter().any(|item| item.ptr_eq(counterpart))
            {
                modified.push(counterpart.clone());
            }
        }

        Ok(modified)
    }

    /// Rows for deleting every removed entity, restricted to `columns`.
    ///
    /// Key columns carry the values the entity was loaded with, so a key
    /// rewritten before removal still addresses the stored row.
    pub(crate) fn removed_rows(&self, columns: &[ColumnBinding]) -> OrmResult<Vec<Vec<Value>>> {
        let key_positions = self.key_positions();
        self.removed
            .iter()
            .map(|entity| -> OrmResult<Vec<Value>> {
                let original = self
                    .snapshot
                    .iter()
                    .find(|row| row.source.ptr_eq(entity))
                    .map(|row| &row.values);
                let key = match original {
                    Some(values) => self.snapshot_key(values, &key_positions)?,
                    None => self.key_of(entity)?,
                };
                let mut stored_key = key.into_iter();
                let current = entity.borrow();
                let row = columns
                    .iter()
                    .map(|column| {
                        let value = self.descriptor.fields()[column.field].read(&current);
                        if column.primary_key {
                            stored_key.next().unwrap_or(value)
                        } else {
                            value
                        }
                    })
                    .collect();
                Ok(row)
            })
            .collect()
    }

    /// Makes the current live entities the new baseline.
    pub(crate) fn accept_changes(&mut self, live: &[EntityRef<T>]) {
        self.added.clear();
        self.removed.clear();
        self.take_snapshot(live);
    }

    fn take_snapshot(&mut self, entities: &[EntityRef<T>]) {
        self.snapshot = entities
            .iter()
            .map(|entity| SnapshotRow {
                source: entity.clone(),
                values: EntityTypeBinding::row_values(
                    &self.descriptor,
                    &self.binding.columns,
                    &entity.borrow(),
                ),
            })
            .collect();
    }

    fn is_removed(&self, entity: &EntityRef<T>) -> bool {
        self.removed.iter().any(|item| item.ptr_eq(entity))
    }

    fn key_positions(&self) -> Vec<usize> {
        self.binding
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(position, _)| position)
            .collect()
    }

    fn key_of(&self, entity: &EntityRef<T>) -> Result<Vec<Value>, MappingError> {
        self.binding.key_values(&self.descriptor, &entity.borrow())
    }

    fn snapshot_key(
        &self,
        original: &[Value],
        key_positions: &[usize],
    ) -> Result<Vec<Value>, MappingError> {
        key_positions
            .iter()
            .map(|position| {
                let value = &original[*position];
                if value.is_null() {
                    Err(MappingError::NullPrimaryKey {
                        entity: self.binding.entity,
                        field: self.binding.columns[*position].name,
                    })
                } else {
                    Ok(value.clone())
                }
            })
            .collect()
    }

    fn differs(&self, original: &[Value], entity: &EntityRef<T>) -> bool {
        let current = entity.borrow();
        self.binding
            .columns
            .iter()
            .zip(original)
            .any(|(column, before)| {
                let after = self.descriptor.fields()[column.field].read(&current);
                field_changed(before, &after)
            })
    }
}

/// Null on both sides is unchanged; otherwise value equality decides.
fn field_changed(before: &Value, after: &Value) -> bool {
    if before.is_null() && after.is_null() {
        return false;
    }
    before != after
}

fn format_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}
