use indexmap::IndexMap;

use crate::schema::SchemaRegistry;
use crate::store::ShadowStore;
use crate::{Row, ShadowError, Value};

use super::constraints::identifies_same_row;
use super::rows::{align_row, complete_row, lookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Right-hand side of one `ON DUPLICATE KEY UPDATE col = ...` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertExpr {
    Literal(Value),
    /// A column of the row already stored.
    Column(String),
    /// `VALUES(col)`: the value the INSERT tried to write.
    Inserted(String),
    Binary {
        left: Box<UpsertExpr>,
        op: ArithmeticOp,
        right: Box<UpsertExpr>,
    },
    /// Expression the shadow layer cannot evaluate; its text is stored.
    Raw(String),
}

impl UpsertExpr {
    pub fn evaluate(&self, existing: &Row, inserted: &Row) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Column(column) => lookup(existing, column).cloned().unwrap_or(Value::Null),
            Self::Inserted(column) => lookup(inserted, column).cloned().unwrap_or(Value::Null),
            Self::Binary { left, op, right } => arithmetic(
                left.evaluate(existing, inserted),
                *op,
                right.evaluate(existing, inserted),
            ),
            Self::Raw(text) => Value::Text(text.clone()),
        }
    }
}

fn arithmetic(left: Value, op: ArithmeticOp, right: Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    if let (Value::Integer(left), Value::Integer(right)) = (&left, &right) {
        let exact = match op {
            ArithmeticOp::Add => left.checked_add(*right),
            ArithmeticOp::Subtract => left.checked_sub(*right),
            ArithmeticOp::Multiply => left.checked_mul(*right),
            ArithmeticOp::Divide => None,
        };
        if let Some(result) = exact {
            return Value::Integer(result);
        }
    }
    let (Some(left), Some(right)) = (left.as_number(), right.as_number()) else {
        return Value::Null;
    };
    match op {
        ArithmeticOp::Add => Value::Real(left + right),
        ArithmeticOp::Subtract => Value::Real(left - right),
        ArithmeticOp::Multiply => Value::Real(left * right),
        ArithmeticOp::Divide if right == 0.0 => Value::Null,
        ArithmeticOp::Divide => Value::Real(left / right),
    }
}

pub(super) fn apply_upsert(
    store: &mut ShadowStore,
    registry: &SchemaRegistry,
    table: &str,
    primary_keys: &[String],
    columns: &[String],
    updates: &IndexMap<String, UpsertExpr>,
    rows: &[Row],
) -> Result<(), ShadowError> {
    let definition = registry.definition(table);
    let unique_constraints = registry.unique_constraints(table);
    let stored = store.rows_mut(table);
    for row in rows {
        let row = align_row(row, columns)?;
        let row = complete_row(row, definition.as_ref(), stored.iter())?;
        let matched = stored.iter().position(|existing| {
            (!primary_keys.is_empty() || !unique_constraints.is_empty())
                && identifies_same_row(existing, &row, primary_keys, &unique_constraints)
        });
        let Some(index) = matched else {
            stored.push(row);
            continue;
        };

        let existing = &mut stored[index];
        if updates.is_empty() {
            for (column, value) in &row {
                let is_key = primary_keys
                    .iter()
                    .any(|key| key.eq_ignore_ascii_case(column));
                if !is_key {
                    existing.insert(column.clone(), value.clone());
                }
            }
            continue;
        }
        let snapshot = existing.clone();
        for (column, expr) in updates {
            let value = expr.evaluate(&snapshot, &row);
            let key = snapshot
                .keys()
                .find(|name| name.eq_ignore_ascii_case(column))
                .cloned()
                .unwrap_or_else(|| column.clone());
            existing.insert(key, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{ArithmeticOp, UpsertExpr};
    use crate::mutation::ShadowMutation;
    use crate::schema::SchemaRegistry;
    use crate::store::ShadowStore;
    use crate::{row, Value};

    #[test]
    fn evaluates_arithmetic_over_stored_and_inserted_values() {
        let existing = row([("hits", Value::Integer(4))]);
        let inserted = row([("hits", Value::Integer(3))]);
        let expr = UpsertExpr::Binary {
            left: Box::new(UpsertExpr::Column("hits".to_string())),
            op: ArithmeticOp::Add,
            right: Box::new(UpsertExpr::Inserted("hits".to_string())),
        };
        assert_eq!(expr.evaluate(&existing, &inserted), Value::Integer(7));

        let halve = UpsertExpr::Binary {
            left: Box::new(UpsertExpr::Column("hits".to_string())),
            op: ArithmeticOp::Divide,
            right: Box::new(UpsertExpr::Literal(Value::Integer(0))),
        };
        assert_eq!(halve.evaluate(&existing, &inserted), Value::Null);
    }

    #[test]
    fn upsert_updates_on_key_match_and_inserts_otherwise() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("counters", "CREATE TABLE counters (id INT PRIMARY KEY, hits INT)")
            .expect("register");
        let mut store = ShadowStore::new();
        store.insert(
            "counters",
            vec![row([("id", Value::Integer(1)), ("hits", Value::Integer(10))])],
        );

        let mutation = ShadowMutation::Upsert {
            table: "counters".to_string(),
            primary_keys: vec!["id".to_string()],
            columns: vec!["id".to_string(), "hits".to_string()],
            updates: IndexMap::from([(
                "hits".to_string(),
                UpsertExpr::Binary {
                    left: Box::new(UpsertExpr::Column("hits".to_string())),
                    op: ArithmeticOp::Add,
                    right: Box::new(UpsertExpr::Inserted("hits".to_string())),
                },
            )]),
        };
        mutation
            .apply(
                &mut store,
                &mut registry,
                &[
                    row([("id", Value::Integer(1)), ("hits", Value::Integer(5))]),
                    row([("id", Value::Integer(2)), ("hits", Value::Integer(1))]),
                ],
            )
            .expect("upsert");

        assert_eq!(
            store.get("counters"),
            &[
                row([("id", Value::Integer(1)), ("hits", Value::Integer(15))]),
                row([("id", Value::Integer(2)), ("hits", Value::Integer(1))]),
            ]
        );
    }
}
