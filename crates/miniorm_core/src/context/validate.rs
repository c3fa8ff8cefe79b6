//! Validation gate consulted before every save.

use crate::model::entity::{entity_name, Entity};
use std::any::Any;

/// Type-erased view of one entity handed to a `Validator`.
pub trait Validatable {
    fn entity_name(&self) -> &'static str;
    /// Outcome of the entity's declared rules.
    fn check(&self) -> Result<(), String>;
    /// Gives validators access to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> Validatable for T {
    fn entity_name(&self) -> &'static str {
        entity_name::<T>()
    }

    fn check(&self) -> Result<(), String> {
        Entity::validate(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decides whether an entity may be persisted.
pub trait Validator {
    fn is_valid(&self, entity: &dyn Validatable) -> bool;
}

impl<F> Validator for F
where
    F: Fn(&dyn Validatable) -> bool,
{
    fn is_valid(&self, entity: &dyn Validatable) -> bool {
        self(entity)
    }
}

/// Default validator: accepts exactly the entities whose `Entity::validate`
/// succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredRules;

impl Validator for DeclaredRules {
    fn is_valid(&self, entity: &dyn Validatable) -> bool {
        entity.check().is_ok()
    }
}
