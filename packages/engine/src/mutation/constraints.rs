use indexmap::IndexMap;

use crate::types::rows_match;
use crate::{Row, ShadowError};

use super::rows::lookup;

/// A NOT NULL column explicitly given NULL fails; an omitted column is left
/// to defaults.
pub(crate) fn check_not_null(table: &str, row: &Row, not_null: &[String]) -> Result<(), ShadowError> {
    for column in not_null {
        if lookup(row, column).is_some_and(|value| value.is_null()) {
            return Err(ShadowError::NotNullViolation {
                table: table.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn has_key_conflict<'a>(
    row: &Row,
    mut others: impl Iterator<Item = &'a Row>,
    primary_keys: &[String],
) -> bool {
    !primary_keys.is_empty() && others.any(|other| rows_match(other, row, primary_keys))
}

/// Name of the first UNIQUE group `row` collides with. Groups where `row`
/// holds a NULL never collide.
pub(crate) fn unique_conflict<'a, 'u>(
    row: &Row,
    others: impl Iterator<Item = &'a Row> + Clone,
    unique_constraints: &'u IndexMap<String, Vec<String>>,
) -> Option<&'u str> {
    unique_constraints
        .iter()
        .find(|(_, columns)| {
            holds_all(row, columns)
                && others
                    .clone()
                    .any(|other| rows_match(other, row, columns.as_slice()))
        })
        .map(|(name, _)| name.as_str())
}

/// True when `stored` is the same logical row as `row`: same primary key,
/// same values on any UNIQUE group, or equal on every column when the table
/// declares neither.
pub(crate) fn identifies_same_row(
    stored: &Row,
    row: &Row,
    primary_keys: &[String],
    unique_constraints: &IndexMap<String, Vec<String>>,
) -> bool {
    if primary_keys.is_empty() && unique_constraints.is_empty() {
        return rows_match(stored, row, &[]);
    }
    if !primary_keys.is_empty() && rows_match(stored, row, primary_keys) {
        return true;
    }
    unique_constraints
        .values()
        .any(|columns| holds_all(row, columns) && rows_match(stored, row, columns))
}

fn holds_all(row: &Row, columns: &[String]) -> bool {
    columns
        .iter()
        .all(|column| lookup(row, column).is_some_and(|value| !value.is_null()))
}
