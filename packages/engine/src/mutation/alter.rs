use crate::schema::{SchemaRegistry, TableDefinition};
use crate::sql::{default_literal_value, AlterOperation, ColumnPosition};
use crate::store::ShadowStore;
use crate::{Row, ShadowError, Value};

use super::rows::reorder_row;

/// Replays ALTER TABLE operations on the virtual definition and the stored
/// rows, then re-registers the table.
pub(super) fn alter_table(
    store: &mut ShadowStore,
    registry: &mut SchemaRegistry,
    table: &str,
    operations: &[AlterOperation],
) -> Result<(), ShadowError> {
    let mut definition = registry
        .definition(table)
        .ok_or_else(|| ShadowError::TableNotFound(table.to_string()))?;
    let tracked = store.contains(table);
    let mut rows = store.get(table).to_vec();
    let mut renamed_to: Option<String> = None;

    for operation in operations {
        match operation {
            AlterOperation::AddColumn {
                column,
                position,
                if_not_exists,
            } => {
                if definition.column(&column.name).is_some() {
                    if *if_not_exists {
                        continue;
                    }
                    return Err(ShadowError::column_already_exists(table, &column.name));
                }
                let index = insert_index(&definition, position.as_ref(), table)?;
                definition.columns.insert(index, column.clone());
                let fill = column
                    .default
                    .as_deref()
                    .map(default_literal_value)
                    .unwrap_or(Value::Null);
                for row in &mut rows {
                    row.insert(column.name.clone(), fill.clone());
                }
            }
            AlterOperation::DropColumn { name, if_exists } => {
                let Some(index) = definition.column_index(name) else {
                    if *if_exists {
                        continue;
                    }
                    return Err(ShadowError::column_not_found(table, name));
                };
                definition.columns.remove(index);
                definition.remove_column_references(name);
                for row in &mut rows {
                    remove_key(row, name);
                }
            }
            AlterOperation::ModifyColumn { column, position } => {
                let index = definition
                    .column_index(&column.name)
                    .ok_or_else(|| ShadowError::column_not_found(table, &column.name))?;
                definition.columns.remove(index);
                let index = match position {
                    Some(position) => insert_index(&definition, Some(position), table)?,
                    None => index,
                };
                definition.columns.insert(index, column.clone());
            }
            AlterOperation::ChangeColumn {
                old_name,
                column,
                position,
            } => {
                let index = definition
                    .column_index(old_name)
                    .ok_or_else(|| ShadowError::column_not_found(table, old_name))?;
                if !old_name.eq_ignore_ascii_case(&column.name)
                    && definition.column(&column.name).is_some()
                {
                    return Err(ShadowError::column_already_exists(table, &column.name));
                }
                definition.columns.remove(index);
                let index = match position {
                    Some(position) => insert_index(&definition, Some(position), table)?,
                    None => index,
                };
                definition.columns.insert(index, column.clone());
                definition.rename_column_references(old_name, &column.name);
                for row in &mut rows {
                    rename_key(row, old_name, &column.name);
                }
            }
            AlterOperation::RenameColumn { old_name, new_name } => {
                let index = definition
                    .column_index(old_name)
                    .ok_or_else(|| ShadowError::column_not_found(table, old_name))?;
                if !old_name.eq_ignore_ascii_case(new_name) && definition.column(new_name).is_some()
                {
                    return Err(ShadowError::column_already_exists(table, new_name));
                }
                definition.columns[index].name = new_name.clone();
                definition.rename_column_references(old_name, new_name);
                for row in &mut rows {
                    rename_key(row, old_name, new_name);
                }
            }
            AlterOperation::RenameTable(new_table) => {
                if new_table != table && (registry.contains(new_table) || store.contains(new_table))
                {
                    return Err(ShadowError::TableAlreadyExists(new_table.clone()));
                }
                renamed_to = Some(new_table.clone());
            }
            AlterOperation::AddPrimaryKey(columns) => {
                if let Some(missing) = columns
                    .iter()
                    .find(|column| definition.column(column).is_none())
                {
                    return Err(ShadowError::column_not_found(table, missing));
                }
                definition.primary_keys = columns.clone();
            }
            AlterOperation::DropPrimaryKey => definition.primary_keys.clear(),
            AlterOperation::AddForeignKey | AlterOperation::DropForeignKey => {}
        }
    }

    for row in &mut rows {
        reorder_row(row, &definition);
    }

    let target = match renamed_to {
        Some(new_table) if new_table != table => {
            registry.unregister(table);
            store.remove(table);
            new_table
        }
        _ => table.to_string(),
    };
    definition.name = target.clone();
    registry.register_definition(definition);
    if tracked || target != table {
        store.set(&target, rows);
    }
    Ok(())
}

fn insert_index(
    definition: &TableDefinition,
    position: Option<&ColumnPosition>,
    table: &str,
) -> Result<usize, ShadowError> {
    match position {
        None => Ok(definition.columns.len()),
        Some(ColumnPosition::First) => Ok(0),
        Some(ColumnPosition::After(column)) => definition
            .column_index(column)
            .map(|index| index + 1)
            .ok_or_else(|| ShadowError::column_not_found(table, column)),
    }
}

fn remove_key(row: &mut Row, column: &str) {
    if let Some(key) = row.keys().find(|key| key.eq_ignore_ascii_case(column)).cloned() {
        row.shift_remove(&key);
    }
}

fn rename_key(row: &mut Row, old: &str, new: &str) {
    let Some(index) = row.keys().position(|key| key.eq_ignore_ascii_case(old)) else {
        return;
    };
    let Some((_, value)) = row.shift_remove_index(index) else {
        return;
    };
    row.shift_insert(index, new.to_string(), value);
}
