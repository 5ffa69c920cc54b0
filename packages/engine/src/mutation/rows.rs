use crate::schema::TableDefinition;
use crate::sql::default_literal_value;
use crate::{Row, ShadowError, Value};

pub(crate) fn lookup<'r>(row: &'r Row, column: &str) -> Option<&'r Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Maps a result row onto the target columns: by name when every target
/// column is present, otherwise by position.
pub(crate) fn align_row(row: &Row, columns: &[String]) -> Result<Row, ShadowError> {
    if columns.is_empty() {
        return Ok(row.clone());
    }
    if columns.iter().all(|column| lookup(row, column).is_some()) {
        return Ok(columns
            .iter()
            .map(|column| {
                let value = lookup(row, column).cloned().unwrap_or(Value::Null);
                (column.clone(), value)
            })
            .collect());
    }
    if row.len() != columns.len() {
        return Err(ShadowError::ColumnCountMismatch {
            expected: columns.len(),
            actual: row.len(),
        });
    }
    Ok(columns.iter().cloned().zip(row.values().cloned()).collect())
}

/// Fills columns the statement did not provide: AUTO_INCREMENT columns get
/// the next counter value, others their DEFAULT literal or NULL. Rows keep
/// the definition's column order.
pub(crate) fn complete_row<'a>(
    row: Row,
    definition: Option<&TableDefinition>,
    stored: impl Iterator<Item = &'a Row> + Clone,
) -> Result<Row, ShadowError> {
    let Some(definition) = definition else {
        return Ok(row);
    };
    let mut completed = Row::new();
    for column in &definition.columns {
        let provided = lookup(&row, &column.name).cloned();
        let value = match provided {
            Some(value) if !(value.is_null() && column.is_auto_increment()) => value,
            _ if column.is_auto_increment() => {
                next_auto_increment(&column.name, stored.clone())?
            }
            _ => column
                .default
                .as_deref()
                .map(default_literal_value)
                .unwrap_or(Value::Null),
        };
        completed.insert(column.name.clone(), value);
    }
    for (name, value) in row {
        if definition.column(&name).is_none() {
            completed.insert(name, value);
        }
    }
    Ok(completed)
}

fn next_auto_increment<'a>(
    column: &str,
    rows: impl Iterator<Item = &'a Row>,
) -> Result<Value, ShadowError> {
    let max = rows
        .filter_map(|row| match lookup(row, column)? {
            Value::Integer(value) => Some(*value),
            other => other.as_number().map(|value| value as i64),
        })
        .fold(0, i64::max);
    max.checked_add(1).map(Value::Integer).ok_or_else(|| {
        ShadowError::UnsupportedValue(format!("AUTO_INCREMENT `{column}` is past {max}"))
    })
}

/// Columns of `row` that start with `prefix`, with the prefix removed.
pub(crate) fn strip_prefix(row: &Row, prefix: &str) -> Row {
    if prefix.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(prefix)
                .map(|column| (column.to_string(), value.clone()))
        })
        .collect()
}

/// Reorders `row` to follow the definition's columns; unknown columns keep
/// their relative order at the end.
pub(crate) fn reorder_row(row: &mut Row, definition: &TableDefinition) {
    let mut ordered = Row::with_capacity(row.len());
    for column in &definition.columns {
        if let Some(key) = row
            .keys()
            .find(|key| key.eq_ignore_ascii_case(&column.name))
            .cloned()
        {
            if let Some(value) = row.shift_remove(&key) {
                ordered.insert(column.name.clone(), value);
            }
        }
    }
    ordered.extend(row.drain(..));
    *row = ordered;
}
