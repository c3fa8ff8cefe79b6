//! Per-set write phase of `save_changes`.
//!
//! # Invariants
//! - Rows are computed before the first write of a set.
//! - Writes run in insert, update, delete order.
//! - Only columns both bound and physically present are written.

use crate::db::GatewayTransaction;
use crate::error::{MappingError, OrmResult};
use crate::metadata::ColumnBinding;
use crate::model::entity::Entity;
use crate::tracking::entity_set::EntitySet;
use log::debug;
use serde::Serialize;
use std::ops::AddAssign;

/// Row counts written by one save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for SaveSummary {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

pub(crate) fn persist_set<T: Entity>(
    set: &EntitySet<T>,
    tx: &mut dyn GatewayTransaction,
) -> OrmResult<SaveSummary> {
    let binding = set.binding();
    let physical = tx.fetch_column_names(&binding.table)?;
    let columns: Vec<ColumnBinding> = binding
        .columns
        .iter()
        .filter(|column| physical.iter().any(|name| name == column.name))
        .cloned()
        .collect();
    if let Some(key) = binding
        .key_columns()
        .find(|key| !columns.iter().any(|column| column.name == key.name))
    {
        return Err(MappingError::MissingKeyColumn {
            entity: binding.entity,
            table: binding.table.clone(),
            column: key.name,
        }
        .into());
    }

    let tracker = set.change_tracker();
    let added = set.rows_for(tracker.added(), &columns)?;
    let modified = set.rows_for(&set.modified()?, &columns)?;
    let removed = tracker.removed_rows(&columns)?;

    if !added.is_empty() {
        tx.insert(&binding.table, &columns, &added)?;
    }
    if !modified.is_empty() {
        tx.update(&binding.table, &columns, &modified)?;
    }
    if !removed.is_empty() {
        tx.delete(&binding.table, &columns, &removed)?;
    }

    debug!(
        "event=persist_set module=context status=ok set={} table={} inserted={} updated={} deleted={}",
        binding.set_name,
        binding.table,
        added.len(),
        modified.len(),
        removed.len()
    );
    Ok(SaveSummary {
        inserted: added.len(),
        updated: modified.len(),
        deleted: removed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::SaveSummary;

    #[test]
    fn summaries_accumulate_per_operation() {
        let mut total = SaveSummary::default();
        assert!(total.is_empty());

        total += SaveSummary {
            inserted: 2,
            updated: 1,
            deleted: 0,
        };
        total += SaveSummary {
            inserted: 0,
            updated: 3,
            deleted: 1,
        };

        assert_eq!(
            total,
            SaveSummary {
                inserted: 2,
                updated: 4,
                deleted: 1,
            }
        );
        assert_eq!(total.total(), 7);
    }
}
