//! Entity handles and relation field holders.
//!
//! # Responsibility
//! - Give every tracked entity a shared, identity-bearing handle.
//! - Provide navigation (`Reference`) and back-collection (`Collection`) field
//!   types whose public surface is read-only.
//!
//! # Invariants
//! - `EntityRef` equality and hashing use instance identity, never field values.
//! - Relation holders keep weak links; entity sets own the entities.
//! - Only the relation resolver assigns relation holders.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// Type-erased entity handle used when wiring relations across sets.
pub(crate) type AnyEntity = Rc<dyn Any>;

/// Shared handle to one tracked entity instance.
pub struct EntityRef<T> {
    inner: Rc<RefCell<T>>,
}

impl<T: 'static> EntityRef<T> {
    pub(crate) fn new(entity: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(entity)),
        }
    }

    /// Immutably borrows the entity.
    ///
    /// Panics if the entity is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Mutably borrows the entity.
    ///
    /// Panics if the entity is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Returns whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn erase(&self) -> AnyEntity {
        self.inner.clone()
    }

    pub(crate) fn downcast(entity: AnyEntity) -> Option<Self> {
        entity
            .downcast::<RefCell<T>>()
            .ok()
            .map(|inner| Self { inner })
    }

    fn downgrade(&self) -> Weak<RefCell<T>> {
        Rc::downgrade(&self.inner)
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for EntityRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for EntityRef<T> {}

impl<T> Hash for EntityRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.inner), state);
    }
}

impl<T: Debug> Debug for EntityRef<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(entity) => f.debug_tuple("EntityRef").field(&*entity).finish(),
            Err(_) => f.write_str("EntityRef(<borrowed>)"),
        }
    }
}

/// Navigation field: the entity referenced through a foreign key.
pub struct Reference<T> {
    target: Option<Weak<RefCell<T>>>,
}

impl<T: 'static> Reference<T> {
    /// Returns the referenced entity, `None` for a null foreign key.
    pub fn get(&self) -> Option<EntityRef<T>> {
        self.target
            .as_ref()?
            .upgrade()
            .map(|inner| EntityRef { inner })
    }

    pub fn is_linked(&self) -> bool {
        self.get().is_some()
    }

    pub(crate) fn link(&mut self, target: Option<&EntityRef<T>>) {
        self.target = target.map(EntityRef::downgrade);
    }
}

impl<T> Default for Reference<T> {
    fn default() -> Self {
        Self { target: None }
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T> Debug for Reference<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let linked = self
            .target
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0);
        f.debug_struct("Reference").field("linked", &linked).finish()
    }
}

/// Back-collection field: every entity whose foreign key points at the owner.
pub struct Collection<T> {
    items: Vec<Weak<RefCell<T>>>,
}

impl<T: 'static> Collection<T> {
    /// Iterates members in the order of their entity set.
    pub fn iter(&self) -> impl Iterator<Item = EntityRef<T>> + '_ {
        self.items
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| EntityRef { inner })
    }

    /// Counts live members; entities dropped since the last resolution are skipped.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn contains(&self, entity: &EntityRef<T>) -> bool {
        self.iter().any(|member| member.ptr_eq(entity))
    }

    pub fn to_vec(&self) -> Vec<EntityRef<T>> {
        self.iter().collect()
    }

    pub(crate) fn replace(&mut self, members: Vec<EntityRef<T>>) {
        self.items = members.iter().map(EntityRef::downgrade).collect();
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> Debug for Collection<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let live = self
            .items
            .iter()
            .filter(|item| item.strong_count() > 0)
            .count();
        f.debug_struct("Collection").field("len", &live).finish()
    }
}
