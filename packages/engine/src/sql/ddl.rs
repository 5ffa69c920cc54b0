//! Maps `sqlparser`'s DDL nodes onto the shadow schema's table model.

use sqlparser::ast::{
    AlterTable, AlterTableOperation, ColumnOption, CreateTable, DataType, Expr, Ident,
    IndexColumn, MySQLColumnPosition, ObjectName, RenameTableNameKind, Statement, TableConstraint,
    UnaryOperator,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::schema::{ColumnDefinition, TableDefinition};
use crate::sql::ast_utils::{object_name_to_table, parse_statements};
use crate::sql::steps::insert::literal_value;
use crate::{ShadowError, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    First,
    After(String),
}

/// The ALTER TABLE operations the shadow schema can replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterOperation {
    AddColumn {
        column: ColumnDefinition,
        position: Option<ColumnPosition>,
        if_not_exists: bool,
    },
    DropColumn {
        name: String,
        if_exists: bool,
    },
    ModifyColumn {
        column: ColumnDefinition,
        position: Option<ColumnPosition>,
    },
    ChangeColumn {
        old_name: String,
        column: ColumnDefinition,
        position: Option<ColumnPosition>,
    },
    RenameColumn {
        old_name: String,
        new_name: String,
    },
    RenameTable(String),
    AddPrimaryKey(Vec<String>),
    DropPrimaryKey,
    AddForeignKey,
    DropForeignKey,
}

/// A column plus the key flags declared inline on it.
struct InlineColumn {
    column: ColumnDefinition,
    primary_key: bool,
    unique: bool,
}

/// Reads CREATE TABLE text, such as a reflected `SHOW CREATE TABLE` result.
pub(crate) fn parse_table_definition(sql: &str) -> Result<TableDefinition, ShadowError> {
    match parse_statements(sql)?.as_slice() {
        [Statement::CreateTable(create)]
            if create.like.is_none() && create.query.is_none() && !create.columns.is_empty() =>
        {
            table_definition(create)
        }
        _ => Err(ShadowError::Unsupported(
            "table definition must list its columns".to_string(),
        )),
    }
}

pub(crate) fn table_definition(create: &CreateTable) -> Result<TableDefinition, ShadowError> {
    let name = table_name_of(&create.name)?;
    let mut definition = TableDefinition {
        name,
        table_options: create.table_options.to_string(),
        ..TableDefinition::default()
    };

    for column_def in &create.columns {
        let inline = inline_column(
            &column_def.name,
            &column_def.data_type,
            column_def.options.iter().map(|option| &option.option),
        );
        if inline.primary_key {
            definition.primary_keys.push(inline.column.name.clone());
        }
        if inline.unique {
            let name = inline.column.name.clone();
            add_unique(&mut definition, name.clone(), vec![name]);
        }
        definition.columns.push(inline.column);
    }

    for constraint in &create.constraints {
        match constraint {
            TableConstraint::PrimaryKey(primary) => {
                definition.primary_keys = index_column_names(&primary.columns);
            }
            TableConstraint::Unique(unique) => {
                let columns = index_column_names(&unique.columns);
                let name = unique
                    .index_name
                    .as_ref()
                    .or(unique.name.as_ref())
                    .map(|ident| ident.value.clone())
                    .or_else(|| columns.first().cloned());
                if let Some(name) = name {
                    add_unique(&mut definition, name, columns);
                }
            }
            other => definition.extra_clauses.push(other.to_string()),
        }
    }
    Ok(definition)
}

pub(crate) fn alter_operations(alter: &AlterTable) -> Result<Vec<AlterOperation>, ShadowError> {
    let mut operations = Vec::with_capacity(alter.operations.len());
    for operation in &alter.operations {
        let unsupported = || ShadowError::Unsupported(format!("ALTER TABLE ... {operation}"));
        match operation {
            AlterTableOperation::AddColumn {
                if_not_exists,
                column_def,
                column_position,
                ..
            } => {
                let column = plain_column(inline_column(
                    &column_def.name,
                    &column_def.data_type,
                    column_def.options.iter().map(|option| &option.option),
                ))
                .ok_or_else(unsupported)?;
                operations.push(AlterOperation::AddColumn {
                    column,
                    position: column_position.as_ref().map(position),
                    if_not_exists: *if_not_exists,
                });
            }
            AlterTableOperation::DropColumn {
                column_names,
                if_exists,
                ..
            } => operations.extend(column_names.iter().map(|name| AlterOperation::DropColumn {
                name: name.value.clone(),
                if_exists: *if_exists,
            })),
            AlterTableOperation::ModifyColumn {
                col_name,
                data_type,
                options,
                column_position,
            } => {
                let column = plain_column(inline_column(col_name, data_type, options))
                    .ok_or_else(unsupported)?;
                operations.push(AlterOperation::ModifyColumn {
                    column,
                    position: column_position.as_ref().map(position),
                });
            }
            AlterTableOperation::ChangeColumn {
                old_name,
                new_name,
                data_type,
                options,
                column_position,
            } => {
                let column = plain_column(inline_column(new_name, data_type, options))
                    .ok_or_else(unsupported)?;
                operations.push(AlterOperation::ChangeColumn {
                    old_name: old_name.value.clone(),
                    column,
                    position: column_position.as_ref().map(position),
                });
            }
            AlterTableOperation::RenameColumn {
                old_column_name,
                new_column_name,
            } => operations.push(AlterOperation::RenameColumn {
                old_name: old_column_name.value.clone(),
                new_name: new_column_name.value.clone(),
            }),
            AlterTableOperation::RenameTable { table_name } => {
                let (RenameTableNameKind::As(name) | RenameTableNameKind::To(name)) = table_name;
                operations.push(AlterOperation::RenameTable(table_name_of(name)?));
            }
            AlterTableOperation::AddConstraint { constraint, .. } => match constraint {
                TableConstraint::PrimaryKey(primary) => operations.push(
                    AlterOperation::AddPrimaryKey(index_column_names(&primary.columns)),
                ),
                TableConstraint::ForeignKey(_) => operations.push(AlterOperation::AddForeignKey),
                _ => return Err(unsupported()),
            },
            AlterTableOperation::DropPrimaryKey { .. } => {
                operations.push(AlterOperation::DropPrimaryKey)
            }
            AlterTableOperation::DropForeignKey { .. } => {
                operations.push(AlterOperation::DropForeignKey)
            }
            _ => return Err(unsupported()),
        }
    }
    Ok(operations)
}

/// Converts a DEFAULT clause into the value stored rows receive. Anything
/// that is not a plain literal (functions, expressions) yields NULL.
pub(crate) fn default_literal_value(default: &str) -> Value {
    let dialect = MySqlDialect {};
    Parser::new(&dialect)
        .try_with_sql(default)
        .and_then(|mut parser| parser.parse_expr())
        .map(|expr| literal_expr_value(&expr))
        .unwrap_or(Value::Null)
}

fn literal_expr_value(expr: &Expr) -> Value {
    match expr {
        Expr::Value(value) => literal_value(&value.value).unwrap_or(Value::Null),
        Expr::Nested(inner) => literal_expr_value(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal_expr_value(expr) {
            Value::Integer(value) => value.checked_neg().map_or(Value::Null, Value::Integer),
            Value::Real(value) => Value::Real(-value),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

pub(crate) fn table_name_of(name: &ObjectName) -> Result<String, ShadowError> {
    object_name_to_table(name)
        .ok_or_else(|| ShadowError::Parse(format!("unsupported table name {name}")))
}

fn inline_column<'a>(
    name: &Ident,
    data_type: &DataType,
    options: impl IntoIterator<Item = &'a ColumnOption>,
) -> InlineColumn {
    let mut column = ColumnDefinition::new(name.value.clone(), data_type.to_string());
    let mut rendered = Vec::new();
    let mut primary_key = false;
    let mut unique = false;
    for option in options {
        match option {
            ColumnOption::PrimaryKey(_) => {
                primary_key = true;
                continue;
            }
            ColumnOption::Unique(_) => {
                unique = true;
                continue;
            }
            ColumnOption::NotNull => column.not_null = true,
            ColumnOption::Default(expr) => column.default = Some(expr.to_string()),
            _ => {}
        }
        rendered.push(option.to_string());
    }
    column.options = rendered.join(" ");
    InlineColumn {
        column,
        primary_key,
        unique,
    }
}

/// ALTER cannot declare keys inline; those need an index change.
fn plain_column(inline: InlineColumn) -> Option<ColumnDefinition> {
    (!inline.primary_key && !inline.unique).then_some(inline.column)
}

fn position(position: &MySQLColumnPosition) -> ColumnPosition {
    match position {
        MySQLColumnPosition::First => ColumnPosition::First,
        MySQLColumnPosition::After(column) => ColumnPosition::After(column.value.clone()),
    }
}

/// Column names of a key, ignoring prefix lengths and sort order.
fn index_column_names(columns: &[IndexColumn]) -> Vec<String> {
    columns
        .iter()
        .filter_map(|column| match &column.column.expr {
            Expr::Identifier(ident) => Some(ident.value.clone()),
            Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
            Expr::Function(function) => object_name_to_table(&function.name),
            _ => None,
        })
        .collect()
}

fn add_unique(definition: &mut TableDefinition, name: String, columns: Vec<String>) {
    if columns.is_empty() {
        return;
    }
    let mut key = name.clone();
    let mut suffix = 2;
    while definition.unique_constraints.contains_key(&key) {
        key = format!("{name}_{suffix}");
        suffix += 1;
    }
    definition.unique_constraints.insert(key, columns);
}
