use crate::store::ShadowStore;
use crate::types::rows_match;
use crate::{Row, Value};

use super::rows::strip_prefix;
use super::OLD_VALUE_PREFIX;

/// Writes updated values into the stored rows they came from.
///
/// Result rows carry the new value of every column; when the statement
/// changed key columns (or the table has none) they also carry the original
/// values under [`OLD_VALUE_PREFIX`], which is what the stored row is found
/// by. Matching runs against the rows as they were before this statement.
pub(super) fn apply_update(
    store: &mut ShadowStore,
    table: &str,
    primary_keys: &[String],
    columns: &[String],
    prefix: &str,
    rows: &[Row],
) {
    if !store.contains(table) || rows.is_empty() {
        return;
    }
    let snapshot = store.get(table).to_vec();
    let mut writes: Vec<(usize, Row)> = Vec::new();

    for row in rows {
        let scoped = strip_prefix(row, prefix);
        let mut new_values = Row::new();
        let mut old_values = Row::new();
        for (name, value) in scoped {
            if let Some(column) = name.strip_prefix(OLD_VALUE_PREFIX) {
                old_values.insert(column.to_string(), value);
            } else if columns.is_empty()
                || columns.iter().any(|known| known.eq_ignore_ascii_case(&name))
            {
                new_values.insert(name, value);
            }
        }
        // An outer join can yield rows without a partner in this table.
        if !prefix.is_empty() && new_values.values().all(Value::is_null) {
            continue;
        }

        let (lookup, keys) = if old_values.is_empty() {
            (&new_values, primary_keys.to_vec())
        } else if primary_keys.is_empty() {
            (&old_values, old_values.keys().cloned().collect())
        } else {
            (&old_values, primary_keys.to_vec())
        };
        if keys.is_empty() {
            continue;
        }
        for (index, existing) in snapshot.iter().enumerate() {
            if rows_match(existing, lookup, &keys) {
                writes.push((index, new_values.clone()));
            }
        }
    }

    let updated = writes.len();
    let stored = store.rows_mut(table);
    for (index, values) in writes {
        let Some(existing) = stored.get_mut(index) else {
            continue;
        };
        for (column, value) in values {
            let key = existing
                .keys()
                .find(|name| name.eq_ignore_ascii_case(&column))
                .cloned()
                .unwrap_or(column);
            existing.insert(key, value);
        }
    }
    tracing::trace!(table, updated, "applied shadow update");
}

#[cfg(test)]
mod tests {
    use crate::mutation::{ShadowMutation, UpdateTarget};
    use crate::schema::SchemaRegistry;
    use crate::store::ShadowStore;
    use crate::{row, Value};

    fn users() -> ShadowStore {
        let mut store = ShadowStore::new();
        store.insert(
            "users",
            vec![
                row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]),
                row([("id", Value::Integer(2)), ("name", Value::from("Bob"))]),
            ],
        );
        store
    }

    fn update() -> ShadowMutation {
        ShadowMutation::Update {
            table: "users".to_string(),
            primary_keys: vec!["id".to_string()],
            columns: vec!["id".to_string(), "name".to_string()],
        }
    }

    #[test]
    fn updates_rows_by_primary_key() {
        let mut store = users();
        update()
            .apply(
                &mut store,
                &mut SchemaRegistry::new(),
                &[row([("id", Value::Integer(2)), ("name", Value::from("Bobby"))])],
            )
            .expect("update");
        assert_eq!(
            store.get("users"),
            &[
                row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]),
                row([("id", Value::Integer(2)), ("name", Value::from("Bobby"))]),
            ]
        );
    }

    #[test]
    fn empty_result_is_a_noop() {
        let mut store = users();
        update()
            .apply(&mut store, &mut SchemaRegistry::new(), &[])
            .expect("update");
        assert_eq!(store, users());
    }

    #[test]
    fn key_changes_match_on_original_values() {
        let mut store = users();
        update()
            .apply(
                &mut store,
                &mut SchemaRegistry::new(),
                &[
                    row([
                        ("id", Value::Integer(2)),
                        ("name", Value::from("Alice")),
                        ("__shadow_old_id", Value::Integer(1)),
                    ]),
                    row([
                        ("id", Value::Integer(1)),
                        ("name", Value::from("Bob")),
                        ("__shadow_old_id", Value::Integer(2)),
                    ]),
                ],
            )
            .expect("swap ids");
        assert_eq!(
            store.get("users"),
            &[
                row([("id", Value::Integer(2)), ("name", Value::from("Alice"))]),
                row([("id", Value::Integer(1)), ("name", Value::from("Bob"))]),
            ]
        );
    }

    #[test]
    fn multi_update_scopes_columns_by_alias() {
        let mut store = users();
        store.insert(
            "orders",
            vec![row([("id", Value::Integer(7)), ("status", Value::from("new"))])],
        );
        let mutation = ShadowMutation::MultiUpdate {
            targets: vec![
                UpdateTarget {
                    table: "users".to_string(),
                    alias: "u".to_string(),
                    primary_keys: vec!["id".to_string()],
                    columns: vec!["id".to_string(), "name".to_string()],
                },
                UpdateTarget {
                    table: "orders".to_string(),
                    alias: "o".to_string(),
                    primary_keys: vec!["id".to_string()],
                    columns: vec!["id".to_string(), "status".to_string()],
                },
            ],
        };
        mutation
            .apply(
                &mut store,
                &mut SchemaRegistry::new(),
                &[row([
                    ("u.id", Value::Integer(1)),
                    ("u.name", Value::from("Ann")),
                    ("o.id", Value::Integer(7)),
                    ("o.status", Value::from("paid")),
                ])],
            )
            .expect("multi update");
        assert_eq!(store.get("users")[0].get("name"), Some(&Value::from("Ann")));
        assert_eq!(store.get("orders")[0].get("status"), Some(&Value::from("paid")));
    }
}
