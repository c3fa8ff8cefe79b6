//! Persistence context: construction, typed set access and transactional save.
//!
//! # Responsibility
//! - Discover bindings and load every registered set inside one connection
//!   scope, then wire relations with the connection released.
//! - Validate, then persist every set inside one transaction.
//!
//! # Invariants
//! - Validation failures never touch storage.
//! - A failed save rolls back and leaves trackers untouched.
//! - A successful save re-baselines every tracker.
//!
//! # See also
//! - `tracking::erased` for the per-type handlers this module drives.

pub(crate) mod save;
pub(crate) mod validate;

pub use save::SaveSummary;
pub use validate::{DeclaredRules, Validatable, Validator};

use crate::db::{ConnectionScope, DatabaseGateway};
use crate::error::{OrmResult, ValidationError};
use crate::metadata::registry::{discover, SetRegistration};
use crate::metadata::Registry;
use crate::model::entity::Entity;
use crate::relation::resolve_relations;
use crate::tracking::entity_set::EntitySet;
use crate::tracking::erased::{SetTable, TypedSetFactory};
use log::{error, info, warn};
use std::time::Instant;

/// Declares the sets of a context before it is built.
pub struct ContextBuilder {
    registrations: Vec<SetRegistration>,
    validator: Box<dyn Validator>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            validator: Box::new(DeclaredRules),
        }
    }

    /// Declares an entity set named `set_name` holding `T`.
    pub fn register<T: Entity>(mut self, set_name: impl Into<String>) -> Self {
        self.registrations.push(SetRegistration {
            set_name: set_name.into(),
            factory: Box::new(TypedSetFactory::<T>::new()),
        });
        self
    }

    /// Replaces the default `DeclaredRules` validator.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Discovers bindings, loads every set and resolves relations.
    ///
    /// # Errors
    /// - `Mapping` for inconsistent declarations, tables or foreign keys.
    /// - `Persistence` when the gateway cannot open or read.
    pub fn build<G: DatabaseGateway>(self, mut gateway: G) -> OrmResult<Context<G>> {
        let started_at = Instant::now();
        let Self {
            registrations,
            validator,
        } = self;

        let loaded = load_sets(&registrations, &mut gateway).and_then(|(registry, sets)| {
            resolve_relations(&sets)?;
            Ok((registry, sets))
        });
        let (registry, sets) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(
                    "event=context_build module=context status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=context_build module=context status=ok sets={} duration_ms={}",
            registry.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Context {
            gateway,
            registry,
            sets,
            validator,
        })
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn load_sets<G: DatabaseGateway>(
    registrations: &[SetRegistration],
    gateway: &mut G,
) -> OrmResult<(Registry, SetTable)> {
    let scope = ConnectionScope::open(gateway)?;
    let registry = discover(registrations, &*scope)?;

    let mut sets = SetTable::default();
    for (index, registration) in registrations.iter().enumerate() {
        let set = registration.factory.load(registry.shared(index), &*scope)?;
        sets.push(registration.factory.entity_type(), set);
    }
    Ok((registry, sets))
}

/// Owns the gateway, the discovered bindings and every loaded entity set.
pub struct Context<G: DatabaseGateway> {
    gateway: G,
    registry: Registry,
    sets: SetTable,
    validator: Box<dyn Validator>,
}

impl<G: DatabaseGateway> Context<G> {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// The set holding `T`, if `T` was registered.
    pub fn set<T: Entity>(&self) -> Option<&EntitySet<T>> {
        self.sets.typed::<T>()
    }

    pub fn set_mut<T: Entity>(&mut self) -> Option<&mut EntitySet<T>> {
        self.sets.typed_mut::<T>()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }

    /// Re-runs relation resolution against the current key values.
    pub fn refresh_relations(&self) -> OrmResult<()> {
        resolve_relations(&self.sets)
    }

    /// Validates every set, then writes all changes in one transaction.
    ///
    /// # Errors
    /// - `Validation` for the first set, in discovery order, holding invalid
    ///   entities. Storage is not touched.
    /// - `Mapping` for null or reassigned keys; the transaction is rolled back.
    /// - `Persistence` for any gateway failure; the transaction is rolled
    ///   back and the original error returned.
    pub fn save_changes(&mut self) -> OrmResult<SaveSummary> {
        let started_at = Instant::now();
        self.validate_sets()?;

        let summary = {
            let mut scope = ConnectionScope::open(&mut self.gateway)?;
            let mut tx = scope.begin_transaction()?;

            let mut summary = SaveSummary::default();
            let written = self.sets.iter().try_for_each(|set| -> OrmResult<()> {
                summary += set.persist(&mut *tx)?;
                Ok(())
            });

            if let Err(err) = written {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=save_changes module=context status=rollback_error error={}",
                        rollback_err
                    );
                }
                error!(
                    "event=save_changes module=context status=rolled_back duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }

            if let Err(err) = tx.commit() {
                error!(
                    "event=save_changes module=context status=commit_failed duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
            summary
        };

        for set in self.sets.iter_mut() {
            set.accept_changes();
        }

        info!(
            "event=save_changes module=context status=ok inserted={} updated={} deleted={} duration_ms={}",
            summary.inserted,
            summary.updated,
            summary.deleted,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    fn validate_sets(&self) -> Result<(), ValidationError> {
        for set in self.sets.iter() {
            let invalid_count = set.invalid_count(self.validator.as_ref());
            if invalid_count > 0 {
                let set_name = set.binding().set_name.clone();
                warn!(
                    "event=save_changes module=context status=invalid set={} invalid_count={}",
                    set_name, invalid_count
                );
                return Err(ValidationError {
                    set: set_name,
                    invalid_count,
                });
            }
        }
        Ok(())
    }
}
