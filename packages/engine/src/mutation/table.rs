use crate::schema::{ColumnDefinition, SchemaRegistry, TableDefinition};
use crate::store::ShadowStore;
use crate::{Row, ShadowError, Value};

use super::rows::align_row;

/// `Ok(true)` when the table already exists and IF NOT EXISTS lets the
/// statement do nothing.
fn table_exists(
    store: &ShadowStore,
    registry: &SchemaRegistry,
    table: &str,
    if_not_exists: bool,
) -> Result<bool, ShadowError> {
    if !registry.contains(table) && !store.contains(table) {
        return Ok(false);
    }
    if if_not_exists {
        Ok(true)
    } else {
        Err(ShadowError::TableAlreadyExists(table.to_string()))
    }
}

pub(super) fn create_table(
    store: &mut ShadowStore,
    registry: &mut SchemaRegistry,
    table: &str,
    create_sql: &str,
    if_not_exists: bool,
) -> Result<(), ShadowError> {
    if table_exists(store, registry, table, if_not_exists)? {
        return Ok(());
    }
    registry.register(table, create_sql)?;
    store.ensure(table);
    Ok(())
}

pub(super) fn create_table_like(
    store: &mut ShadowStore,
    registry: &mut SchemaRegistry,
    table: &str,
    source: &str,
    if_not_exists: bool,
) -> Result<(), ShadowError> {
    let mut definition = registry
        .definition(source)
        .ok_or_else(|| ShadowError::TableNotFound(source.to_string()))?;
    if table_exists(store, registry, table, if_not_exists)? {
        return Ok(());
    }
    definition.name = table.to_string();
    registry.register_definition(definition);
    store.ensure(table);
    Ok(())
}

pub(super) fn create_table_as_select(
    store: &mut ShadowStore,
    registry: &mut SchemaRegistry,
    table: &str,
    columns: Option<&[String]>,
    if_not_exists: bool,
    rows: &[Row],
) -> Result<(), ShadowError> {
    if table_exists(store, registry, table, if_not_exists)? {
        return Ok(());
    }
    let columns: Vec<String> = match columns {
        Some(columns) if !columns.is_empty() => columns.to_vec(),
        _ => rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default(),
    };
    if columns.is_empty() {
        return Err(ShadowError::Unsupported(format!(
            "cannot determine the columns of `{table}` from its SELECT"
        )));
    }

    let rows = rows
        .iter()
        .map(|row| align_row(row, &columns))
        .collect::<Result<Vec<_>, _>>()?;
    let first = rows.first();
    let definition = TableDefinition {
        name: table.to_string(),
        columns: columns
            .iter()
            .map(|column| {
                let data_type = first
                    .and_then(|row| row.get(column))
                    .map(inferred_column_type)
                    .unwrap_or("TEXT");
                ColumnDefinition::new(column.clone(), data_type)
            })
            .collect(),
        ..TableDefinition::default()
    };
    registry.register_definition(definition);
    store.set(table, rows);
    Ok(())
}

fn inferred_column_type(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "BIGINT",
        Value::Real(_) => "DOUBLE",
        Value::Boolean(_) => "BOOLEAN",
        Value::Blob(_) => "BLOB",
        Value::Text(_) | Value::Null => "TEXT",
    }
}

pub(super) fn drop_tables(
    store: &mut ShadowStore,
    registry: &mut SchemaRegistry,
    tables: &[String],
    if_exists: bool,
) -> Result<(), ShadowError> {
    if !if_exists {
        if let Some(missing) = tables
            .iter()
            .find(|table| !registry.contains(table) && !store.contains(table))
        {
            return Err(ShadowError::TableNotFound(missing.clone()));
        }
    }
    for table in tables {
        registry.unregister(table);
        store.remove(table);
    }
    Ok(())
}
