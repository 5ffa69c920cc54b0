use indexmap::IndexMap;

use crate::types::rows_match;
use crate::Row;

/// Per-table virtual rows captured from simulated writes.
///
/// Rows keep insertion order; update and delete work in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowStore {
    tables: IndexMap<String, Vec<Row>>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, table: &str, rows: Vec<Row>) {
        self.tables.insert(table.to_string(), rows);
    }

    /// Makes sure the table is tracked, even with zero rows.
    pub fn ensure(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub fn insert(&mut self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Overwrites the columns of every stored row whose `keys` match one of
    /// `rows`. Columns absent from the new row are left untouched.
    pub fn update(&mut self, table: &str, rows: &[Row], keys: &[String]) -> usize {
        let Some(stored) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut updated = 0;
        for existing in stored.iter_mut() {
            let Some(replacement) = rows.iter().find(|row| rows_match(existing, row, keys)) else {
                continue;
            };
            for (column, value) in replacement {
                existing.insert(column.clone(), value.clone());
            }
            updated += 1;
        }
        updated
    }

    /// Removes every stored row matching any of `rows` on `keys`.
    pub fn delete(&mut self, table: &str, rows: &[Row], keys: &[String]) -> usize {
        let Some(stored) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = stored.len();
        stored.retain(|existing| !rows.iter().any(|row| rows_match(existing, row, keys)));
        before - stored.len()
    }

    pub fn remove(&mut self, table: &str) -> Option<Vec<Row>> {
        self.tables.shift_remove(table)
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(rows) = self.tables.shift_remove(from) {
            self.tables.insert(to.to_string(), rows);
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// True when no table is tracked at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn all(&self) -> &IndexMap<String, Vec<Row>> {
        &self.tables
    }

    pub(crate) fn rows_mut(&mut self, table: &str) -> &mut Vec<Row> {
        self.tables.entry(table.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::ShadowStore;
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

    #[test]
    fn update_replaces_matching_rows_in_place() {
        let mut store = users();
        let updated = store.update(
            "users",
            &[row([("id", Value::Integer(2)), ("name", Value::from("Bobby"))])],
            &["id".to_string()],
        );
        assert_eq!(updated, 1);
        assert_eq!(
            store.get("users"),
            &[
                row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]),
                row([("id", Value::Integer(2)), ("name", Value::from("Bobby"))]),
            ]
        );
    }

    #[test]
    fn update_and_delete_without_match_are_noops() {
        let mut store = users();
        let missing = [row([("id", Value::Integer(9))])];
        assert_eq!(store.update("users", &missing, &["id".to_string()]), 0);
        assert_eq!(store.delete("users", &missing, &["id".to_string()]), 0);
        assert_eq!(store.update("missing", &missing, &["id".to_string()]), 0);
        assert_eq!(store, users());
    }

    #[test]
    fn delete_matches_loosely_on_keys() {
        let mut store = users();
        let deleted = store.delete("users", &[row([("id", Value::from("1"))])], &["id".to_string()]);
        assert_eq!(deleted, 1);
        assert_eq!(store.get("users").len(), 1);
    }

    #[test]
    fn rename_moves_rows() {
        let mut store = users();
        store.rename("users", "people");
        assert!(!store.contains("users"));
        assert_eq!(store.get("people").len(), 2);
        assert!(store.get("users").is_empty());
    }
}
