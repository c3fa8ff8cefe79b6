use crate::error::{MappingError, OrmResult};
use crate::model::entity::Entity;
use crate::model::handle::AnyEntity;
use crate::model::value::Value;
use crate::tracking::entity_set::EntitySet;
use crate::tracking::erased::SetTable;
use log::{error, info};
use std::any::TypeId;
use std::collections::HashMap;
use std::time::Instant;

/// Runs the navigation pass over every set, then the collection pass.
pub(crate) fn resolve_relations(sets: &SetTable) -> OrmResult<()> {
    let started_at = Instant::now();

    let outcome = sets
        .iter()
        .try_for_each(|set| set.resolve_navigations(sets))
        .and_then(|()| {
            sets.iter()
                .try_for_each(|set| set.resolve_collections(sets))
        });

    match &outcome {
        Ok(()) => info!(
            "event=resolve_relations module=relation status=ok sets={} duration_ms={}",
            sets.iter().count(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=resolve_relations module=relation status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    outcome
}

/// Assigns every navigation field of `set` from its paired foreign key.
pub(crate) fn resolve_navigations<T: Entity>(set: &EntitySet<T>, sets: &SetTable) -> OrmResult<()> {
    let descriptor = set.descriptor();
    let entity = descriptor.entity_name();

    for (foreign_key, navigation_name) in descriptor.foreign_keys() {
        let navigation = descriptor
            .navigation_field(navigation_name)
            .ok_or(MappingError::UnknownNavigation {
                entity,
                foreign_key: foreign_key.name(),
                navigation: navigation_name,
            })?;
        let target_set = sets
            .get(navigation.target())
            .ok_or(MappingError::UnregisteredTarget {
                entity,
                field: navigation.name(),
                target: navigation.target_name(),
            })?;
        let targets = index_by_key(target_set.keyed_entities()?);

        for item in set.iter() {
            let value = foreign_key.read(&item.borrow());
            let target = if value.is_null() {
                None
            } else {
                let found = targets.get(&value).cloned().ok_or_else(|| {
                    MappingError::DanglingForeignKey {
                        entity,
                        foreign_key: foreign_key.name(),
                        value: value.to_string(),
                    }
                })?;
                Some(found)
            };

            if !navigation.assign(&mut item.borrow_mut(), target) {
                return Err(MappingError::TargetTypeMismatch {
                    entity,
                    field: navigation.name(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Assigns every collection field of `set` from the element type's foreign
/// key that navigates back to `T`.
pub(crate) fn resolve_collections<T: Entity>(set: &EntitySet<T>, sets: &SetTable) -> OrmResult<()> {
    let descriptor = set.descriptor();
    let owner = descriptor.entity_name();

    for collection in descriptor.collections() {
        let element_set = sets
            .get(collection.element())
            .ok_or(MappingError::UnregisteredTarget {
                entity: owner,
                field: collection.name(),
                target: collection.element_name(),
            })?;
        let foreign_key = element_set.back_reference(TypeId::of::<T>()).ok_or(
            MappingError::MissingBackReference {
                owner,
                collection: collection.name(),
                element: collection.element_name(),
            },
        )?;
        let members = group_by_foreign_key(element_set.entities_by_foreign_key(foreign_key));

        for item in set.iter() {
            let key = set.binding().primary_value(descriptor, &item.borrow())?;
            let assigned = members.get(&key).cloned().unwrap_or_default();
            if !collection.assign(&mut item.borrow_mut(), assigned) {
                return Err(MappingError::TargetTypeMismatch {
                    entity: owner,
                    field: collection.name(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// First entity wins when keys repeat.
fn index_by_key(entries: Vec<(Value, AnyEntity)>) -> HashMap<Value, AnyEntity> {
    let mut index = HashMap::with_capacity(entries.len());
    for (key, entity) in entries {
        index.entry(key).or_insert(entity);
    }
    index
}

/// Groups entities by foreign-key value, keeping set order and dropping nulls.
fn group_by_foreign_key(entries: Vec<(Value, AnyEntity)>) -> HashMap<Value, Vec<AnyEntity>> {
    let mut groups: HashMap<Value, Vec<AnyEntity>> = HashMap::new();
    for (value, entity) in entries {
        if value.is_null() {
            continue;
        }
        groups.entry(value).or_default().push(entity);
    }
    groups
}
