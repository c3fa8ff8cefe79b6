//! Entity trait and per-type field accessor tables.
//!
//! # Responsibility
//! - Let each entity type declare its table, keys, columns and relations once.
//! - Provide typed getter/setter function objects so the engine can read and
//!   write named fields without knowing the concrete type.
//!
//! # Invariants
//! - A descriptor is built once per type at registration and never mutated.
//! - Key and foreign-key fields are also storable columns.
//! - Navigation and collection fields are never columns.

use crate::model::handle::{AnyEntity, Collection, EntityRef, Reference};
use crate::model::value::{ColumnKind, ColumnValue, Value, ValueError};
use std::any::{type_name, TypeId};

/// Application record type bound to one table.
pub trait Entity: Default + 'static {
    /// Declares the accessor table for this type.
    fn describe() -> EntityDescriptor<Self>;

    /// Declared validation constraints. The default accepts every instance.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Short, human-readable entity type name used in diagnostics.
pub fn entity_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Key,
    Column,
    NotMapped,
}

type ReadFn<E> = Box<dyn Fn(&E) -> Value>;
type WriteFn<E> = Box<dyn Fn(&mut E, Value) -> Result<(), ValueError>>;

/// One scalar field of an entity.
pub struct FieldDescriptor<E> {
    name: &'static str,
    kind: ColumnKind,
    nullable: bool,
    role: FieldRole,
    navigation: Option<&'static str>,
    read: ReadFn<E>,
    write: WriteFn<E>,
}

impl<E> FieldDescriptor<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_key(&self) -> bool {
        self.role == FieldRole::Key
    }

    /// Returns `false` for fields marked not persisted.
    pub fn is_persisted(&self) -> bool {
        self.role != FieldRole::NotMapped
    }

    /// Paired navigation field name when this field is a foreign key.
    pub fn navigation(&self) -> Option<&'static str> {
        self.navigation
    }

    pub fn read(&self, entity: &E) -> Value {
        (self.read)(entity)
    }

    pub fn write(&self, entity: &mut E, value: Value) -> Result<(), ValueError> {
        (self.write)(entity, value)
    }
}

/// Navigation field holding a `Reference` to another entity type.
pub struct NavigationDescriptor<E> {
    name: &'static str,
    target: TypeId,
    target_name: &'static str,
    assign: Box<dyn Fn(&mut E, Option<AnyEntity>) -> bool>,
}

impl<E> NavigationDescriptor<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn target(&self) -> TypeId {
        self.target
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    /// Returns `false` when `target` is not an instance of the declared type.
    pub(crate) fn assign(&self, entity: &mut E, target: Option<AnyEntity>) -> bool {
        (self.assign)(entity, target)
    }
}

/// Collection field holding every entity that points back at the owner.
pub struct CollectionDescriptor<E> {
    name: &'static str,
    element: TypeId,
    element_name: &'static str,
    assign: Box<dyn Fn(&mut E, Vec<AnyEntity>) -> bool>,
}

impl<E> CollectionDescriptor<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn element(&self) -> TypeId {
        self.element
    }

    pub fn element_name(&self) -> &'static str {
        self.element_name
    }

    pub(crate) fn assign(&self, entity: &mut E, members: Vec<AnyEntity>) -> bool {
        (self.assign)(entity, members)
    }
}

/// Accessor table for one entity type.
///
/// Built through chained declarations:
///
/// ```
/// use miniorm_core::{Entity, EntityDescriptor};
///
/// #[derive(Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn describe() -> EntityDescriptor<Self> {
///         EntityDescriptor::<Self>::new()
///             .table("tags")
///             .key("id", |t| &t.id, |t| &mut t.id)
///             .column("label", |t| &t.label, |t| &mut t.label)
///     }
/// }
/// ```
pub struct EntityDescriptor<E> {
    entity_name: &'static str,
    table: Option<&'static str>,
    fields: Vec<FieldDescriptor<E>>,
    navigations: Vec<NavigationDescriptor<E>>,
    collections: Vec<CollectionDescriptor<E>>,
}

impl<E: 'static> EntityDescriptor<E> {
    pub fn new() -> Self {
        Self {
            entity_name: entity_name::<E>(),
            table: None,
            fields: Vec::new(),
            navigations: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Overrides the table name; otherwise the set name is used.
    pub fn table(mut self, name: &'static str) -> Self {
        self.table = Some(name);
        self
    }

    /// Declares a primary-key field. Repeat for composite keys.
    pub fn key<V: ColumnValue + 'static>(
        self,
        name: &'static str,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        self.push_field(name, FieldRole::Key, None, get, get_mut)
    }

    pub fn column<V: ColumnValue + 'static>(
        self,
        name: &'static str,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        self.push_field(name, FieldRole::Column, None, get, get_mut)
    }

    /// Declares a scalar field that is never read from or written to storage.
    pub fn not_mapped<V: ColumnValue + 'static>(
        self,
        name: &'static str,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        self.push_field(name, FieldRole::NotMapped, None, get, get_mut)
    }

    /// Declares a foreign-key column paired with the navigation field that
    /// holds the referenced entity.
    pub fn foreign_key<V: ColumnValue + 'static>(
        self,
        name: &'static str,
        navigation: &'static str,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        self.push_field(name, FieldRole::Column, Some(navigation), get, get_mut)
    }

    pub fn navigation<T: 'static>(
        mut self,
        name: &'static str,
        slot: fn(&mut E) -> &mut Reference<T>,
    ) -> Self {
        self.navigations.push(NavigationDescriptor {
            name,
            target: TypeId::of::<T>(),
            target_name: entity_name::<T>(),
            assign: Box::new(move |entity: &mut E, target: Option<AnyEntity>| match target {
                None => {
                    slot(entity).link(None);
                    true
                }
                Some(target) => match EntityRef::<T>::downcast(target) {
                    Some(target) => {
                        slot(entity).link(Some(&target));
                        true
                    }
                    None => false,
                },
            }),
        });
        self
    }

    pub fn collection<T: 'static>(
        mut self,
        name: &'static str,
        slot: fn(&mut E) -> &mut Collection<T>,
    ) -> Self {
        self.collections.push(CollectionDescriptor {
            name,
            element: TypeId::of::<T>(),
            element_name: entity_name::<T>(),
            assign: Box::new(move |entity: &mut E, members: Vec<AnyEntity>| {
                let typed: Option<Vec<EntityRef<T>>> =
                    members.into_iter().map(EntityRef::downcast).collect();
                match typed {
                    Some(typed) => {
                        slot(entity).replace(typed);
                        true
                    }
                    None => false,
                }
            }),
        });
        self
    }

    fn push_field<V: ColumnValue + 'static>(
        mut self,
        name: &'static str,
        role: FieldRole,
        navigation: Option<&'static str>,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            kind: V::KIND,
            nullable: V::NULLABLE,
            role,
            navigation,
            read: Box::new(move |entity: &E| get(entity).to_value()),
            write: Box::new(move |entity: &mut E, value: Value| {
                *get_mut(entity) = V::from_value(value)?;
                Ok(())
            }),
        });
        self
    }
}

impl<E: 'static> Default for EntityDescriptor<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EntityDescriptor<E> {
    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    pub fn table_override(&self) -> Option<&'static str> {
        self.table
    }

    pub fn fields(&self) -> &[FieldDescriptor<E>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Iterates foreign-key fields together with their navigation names.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&FieldDescriptor<E>, &'static str)> {
        self.fields
            .iter()
            .filter_map(|field| field.navigation.map(|navigation| (field, navigation)))
    }

    pub fn navigation_field(&self, name: &str) -> Option<&NavigationDescriptor<E>> {
        self.navigations
            .iter()
            .find(|navigation| navigation.name == name)
    }

    pub fn navigations(&self) -> &[NavigationDescriptor<E>] {
        &self.navigations
    }

    pub fn collections(&self) -> &[CollectionDescriptor<E>] {
        &self.collections
    }
}
