use crate::schema::SchemaRegistry;
use crate::store::ShadowStore;
use crate::{Row, ShadowError};

use super::constraints::{check_not_null, has_key_conflict, identifies_same_row, unique_conflict};
use super::rows::{align_row, complete_row};

pub(super) struct InsertOptions<'a> {
    pub table: &'a str,
    pub primary_keys: &'a [String],
    pub columns: &'a [String],
    pub ignore: bool,
    pub validate: bool,
}

pub(super) fn apply_insert(
    store: &mut ShadowStore,
    registry: &SchemaRegistry,
    options: InsertOptions<'_>,
    rows: &[Row],
) -> Result<(), ShadowError> {
    let table = options.table;
    let definition = registry.definition(table);
    let not_null = registry.not_null_columns(table);
    let unique_constraints = registry.unique_constraints(table);
    let existing = store.get(table);

    let mut accepted: Vec<Row> = Vec::with_capacity(rows.len());
    for row in rows {
        let row = align_row(row, options.columns)?;
        if options.validate {
            check_not_null(table, &row, &not_null)?;
        }
        let row = complete_row(
            row,
            definition.as_ref(),
            existing.iter().chain(accepted.iter()),
        )?;

        if has_key_conflict(
            &row,
            existing.iter().chain(accepted.iter()),
            options.primary_keys,
        ) {
            if options.ignore {
                tracing::debug!(table, "INSERT IGNORE skipped duplicate primary key");
                continue;
            }
            return Err(ShadowError::DuplicatePrimaryKey {
                table: table.to_string(),
            });
        }
        if options.validate {
            if let Some(constraint) = unique_conflict(
                &row,
                existing.iter().chain(accepted.iter()),
                &unique_constraints,
            ) {
                if options.ignore {
                    tracing::debug!(table, constraint, "INSERT IGNORE skipped duplicate unique key");
                    continue;
                }
                return Err(ShadowError::UniqueViolation {
                    table: table.to_string(),
                    constraint: constraint.to_string(),
                });
            }
        }
        accepted.push(row);
    }

    store.insert(table, accepted);
    Ok(())
}

/// REPLACE: every stored row sharing the new row's primary key or a UNIQUE
/// value is removed before the new row is appended.
pub(super) fn apply_replace(
    store: &mut ShadowStore,
    registry: &SchemaRegistry,
    table: &str,
    primary_keys: &[String],
    columns: &[String],
    rows: &[Row],
) -> Result<(), ShadowError> {
    let definition = registry.definition(table);
    let unique_constraints = registry.unique_constraints(table);
    let stored = store.rows_mut(table);
    for row in rows {
        let row = align_row(row, columns)?;
        let row = complete_row(row, definition.as_ref(), stored.iter())?;
        stored.retain(|existing| {
            !identifies_same_row(existing, &row, primary_keys, &unique_constraints)
        });
        stored.push(row);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::mutation::ShadowMutation;
    use crate::schema::SchemaRegistry;
    use crate::store::ShadowStore;
    use crate::{row, ShadowError, Value};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "users",
                "CREATE TABLE users (id INT NOT NULL, name VARCHAR(20) NOT NULL, \
                 email VARCHAR(50), PRIMARY KEY (id), UNIQUE KEY uk_email (email))",
            )
            .expect("register");
        registry
    }

    fn insert(ignore: bool) -> ShadowMutation {
        ShadowMutation::Insert {
            table: "users".to_string(),
            primary_keys: vec!["id".to_string()],
            columns: vec!["id".to_string(), "name".to_string()],
            ignore,
            validate: true,
        }
    }

    #[test]
    fn insert_appends_in_order() {
        let mut store = ShadowStore::new();
        let mut registry = registry();
        insert(false)
            .apply(
                &mut store,
                &mut registry,
                &[
                    row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]),
                    row([("id", Value::Integer(2)), ("name", Value::from("Bob"))]),
                ],
            )
            .expect("insert");
        let names: Vec<_> = store
            .get("users")
            .iter()
            .map(|row| row.get("name").cloned())
            .collect();
        assert_eq!(
            names,
            vec![Some(Value::from("Alice")), Some(Value::from("Bob"))]
        );
        assert_eq!(store.get("users")[0].get("email"), Some(&Value::Null));
    }

    #[test]
    fn duplicate_primary_key_errors_unless_ignored() {
        let mut store = ShadowStore::new();
        let mut registry = registry();
        let rows = [
            row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]),
            row([("id", Value::Integer(1)), ("name", Value::from("Again"))]),
        ];
        let error = insert(false)
            .apply(&mut store, &mut registry, &rows)
            .expect_err("duplicate");
        assert_eq!(
            error,
            ShadowError::DuplicatePrimaryKey {
                table: "users".to_string()
            }
        );
        assert!(store.get("users").is_empty());

        insert(true)
            .apply(&mut store, &mut registry, &rows)
            .expect("ignore");
        assert_eq!(store.get("users").len(), 1);
        assert_eq!(store.get("users")[0].get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn explicit_null_in_not_null_column_fails() {
        let mut store = ShadowStore::new();
        let mut registry = registry();
        let error = insert(false)
            .apply(
                &mut store,
                &mut registry,
                &[row([("id", Value::Integer(1)), ("name", Value::Null)])],
            )
            .expect_err("not null");
        assert!(matches!(error, ShadowError::NotNullViolation { .. }));
    }

    #[test]
    fn unique_violation_is_reported() {
        let mut store = ShadowStore::new();
        let mut registry = registry();
        let mutation = ShadowMutation::Insert {
            table: "users".to_string(),
            primary_keys: vec!["id".to_string()],
            columns: vec!["id".to_string(), "name".to_string(), "email".to_string()],
            ignore: false,
            validate: true,
        };
        let error = mutation
            .apply(
                &mut store,
                &mut registry,
                &[
                    row([
                        ("id", Value::Integer(1)),
                        ("name", Value::from("a")),
                        ("email", Value::from("same@x")),
                    ]),
                    row([
                        ("id", Value::Integer(2)),
                        ("name", Value::from("b")),
                        ("email", Value::from("same@x")),
                    ]),
                ],
            )
            .expect_err("unique");
        assert_eq!(
            error,
            ShadowError::UniqueViolation {
                table: "users".to_string(),
                constraint: "uk_email".to_string()
            }
        );
    }

    #[test]
    fn replace_deletes_matching_key_then_inserts() {
        let mut store = ShadowStore::new();
        let mut registry = registry();
        store.insert(
            "users",
            vec![
                row([
                    ("id", Value::Integer(1)),
                    ("name", Value::from("Alice")),
                    ("email", Value::from("a@x")),
                ]),
                row([
                    ("id", Value::Integer(2)),
                    ("name", Value::from("Bob")),
                    ("email", Value::from("b@x")),
                ]),
            ],
        );
        let replace = ShadowMutation::Replace {
            table: "users".to_string(),
            primary_keys: vec!["id".to_string()],
            columns: vec!["id".to_string(), "name".to_string(), "email".to_string()],
        };
        replace
            .apply(
                &mut store,
                &mut registry,
                &[row([
                    ("id", Value::Integer(3)),
                    ("name", Value::from("Carol")),
                    ("email", Value::from("a@x")),
                ])],
            )
            .expect("replace");
        let ids: Vec<_> = store
            .get("users")
            .iter()
            .filter_map(|row| row.get("id").cloned())
            .collect();
        assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3)]);
    }
}
