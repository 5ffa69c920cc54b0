use crate::store::ShadowStore;
use crate::{Row, Value};

use super::rows::strip_prefix;
use super::DeleteTarget;

/// Removes the stored rows the DELETE selected. Without a primary key a
/// stored row goes when it agrees with a result row on every returned
/// column.
pub(super) fn apply_delete(store: &mut ShadowStore, table: &str, primary_keys: &[String], rows: &[Row]) {
    let mut deleted = 0;
    for row in rows {
        deleted += delete_row(store, table, primary_keys, row);
    }
    tracing::trace!(table, deleted, "applied shadow delete");
}

pub(super) fn apply_multi_delete(store: &mut ShadowStore, target: &DeleteTarget, rows: &[Row]) {
    let prefix = format!("{}.", target.alias);
    for row in rows {
        let scoped = strip_prefix(row, &prefix);
        if scoped.is_empty() || scoped.values().all(Value::is_null) {
            continue;
        }
        delete_row(store, &target.table, &target.primary_keys, &scoped);
    }
}

fn delete_row(store: &mut ShadowStore, table: &str, primary_keys: &[String], row: &Row) -> usize {
    let keys: Vec<String> = if primary_keys.is_empty() {
        row.keys().cloned().collect()
    } else {
        primary_keys.to_vec()
    };
    store.delete(table, std::slice::from_ref(row), &keys)
}
