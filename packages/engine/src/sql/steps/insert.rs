use indexmap::IndexMap;
use sqlparser::ast::{
    Assignment, AssignmentTarget, BinaryOperator, Expr, FunctionArg, FunctionArgExpr,
    FunctionArguments, Insert, ObjectNamePart, OnInsert, Query, SelectItem, SetExpr,
    TableObject, UnaryOperator, Value as SqlValue,
};

use crate::mutation::{ArithmeticOp, ShadowMutation, UpsertExpr};
use crate::schema::SchemaRegistry;
use crate::sql::ast_utils::{object_name_to_table, quote_ident};
use crate::sql::clauses::{aliased, select_sql, union_all};
use crate::store::ShadowStore;
use crate::{ShadowError, Value};

use super::Projection;

const SOURCE_ALIAS: &str = "__shadow_source";

/// Rewrites INSERT (plain, IGNORE, ON DUPLICATE KEY UPDATE) into a SELECT
/// producing the rows to insert.
pub struct InsertTransformer<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
    validate_constraints: bool,
}

impl<'a> InsertTransformer<'a> {
    pub fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            validate_constraints: true,
        }
    }

    pub fn with_constraint_validation(mut self, validate: bool) -> Self {
        self.validate_constraints = validate;
        self
    }

    pub(crate) fn transform(&self, insert: &Insert) -> Result<Projection, ShadowError> {
        let table = insert_table(insert)?;
        let columns = if !insert.columns.is_empty() {
            insert.columns.iter().map(|ident| ident.value.clone()).collect()
        } else if !insert.assignments.is_empty() {
            assignment_columns(&insert.assignments)?
        } else if let Some(columns) = self.registry.columns(&table) {
            columns
        } else if let Some(row) = self.store.get(&table).first() {
            row.keys().cloned().collect()
        } else {
            return Ok(Projection::UnknownSchema(table));
        };

        let sql = row_source_sql(insert, &columns, |expr, _| expr.to_string())?;
        let primary_keys = self.registry.primary_keys(&table);
        let mutation = match &insert.on {
            Some(OnInsert::DuplicateKeyUpdate(assignments)) => ShadowMutation::Upsert {
                table,
                primary_keys,
                columns,
                updates: upsert_updates(assignments)?,
            },
            Some(_) => {
                return Err(ShadowError::Unsupported(
                    "INSERT ... ON CONFLICT is not MySQL syntax".to_string(),
                ))
            }
            None => ShadowMutation::Insert {
                table,
                primary_keys,
                columns,
                ignore: insert.ignore,
                validate: self.validate_constraints,
            },
        };
        Ok(Projection::select(sql, mutation))
    }
}

pub(super) fn insert_table(insert: &Insert) -> Result<String, ShadowError> {
    let TableObject::TableName(name) = &insert.table else {
        return Err(ShadowError::Unsupported(
            "INSERT into a table function".to_string(),
        ));
    };
    object_name_to_table(name)
        .ok_or_else(|| ShadowError::Parse(format!("invalid table name `{name}`")))
}

pub(super) fn assignment_columns(assignments: &[Assignment]) -> Result<Vec<String>, ShadowError> {
    assignments.iter().map(assignment_column).collect()
}

fn assignment_column(assignment: &Assignment) -> Result<String, ShadowError> {
    let AssignmentTarget::ColumnName(name) = &assignment.target else {
        return Err(ShadowError::Unsupported("tuple assignment".to_string()));
    };
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
        .ok_or_else(|| ShadowError::Parse(format!("invalid assignment target `{name}`")))
}

/// SELECT text yielding the statement's rows under `columns`. `render`
/// formats one literal row expression for the column it lands in.
pub(super) fn row_source_sql(
    insert: &Insert,
    columns: &[String],
    render: impl Fn(&Expr, &str) -> String,
) -> Result<String, ShadowError> {
    if insert.source.is_none() && !insert.assignments.is_empty() {
        let projection: Vec<String> = insert
            .assignments
            .iter()
            .zip(columns)
            .map(|(assignment, column)| aliased(render(&assignment.value, column), column))
            .collect();
        return Ok(select_sql(&projection, &[]));
    }
    let Some(source) = insert.source.as_deref() else {
        return Err(ShadowError::Unsupported(
            "INSERT without VALUES, SET or SELECT".to_string(),
        ));
    };

    if let SetExpr::Values(values) = source.body.as_ref() {
        let mut selects = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            if row.len() != columns.len() {
                return Err(ShadowError::ColumnCountMismatch {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            let projection: Vec<String> = row
                .iter()
                .zip(columns)
                .map(|(expr, column)| aliased(render(expr, column), column))
                .collect();
            selects.push(select_sql(&projection, &[]));
        }
        return Ok(union_all(&selects));
    }

    if let Some(count) = projection_width(source) {
        if count != columns.len() {
            return Err(ShadowError::ColumnCountMismatch {
                expected: columns.len(),
                actual: count,
            });
        }
    }
    Ok(positional_source(source, columns))
}

/// INSERT ... SELECT matches by position, so the source's output columns
/// are renamed to the target columns through a derived column list.
fn positional_source(source: &Query, columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|column| quote_ident(column)).collect();
    format!(
        "SELECT * FROM ({source}) AS {} ({})",
        quote_ident(SOURCE_ALIAS),
        names.join(", ")
    )
}

/// Number of output columns, unless a wildcard makes it unknowable here.
fn projection_width(query: &Query) -> Option<usize> {
    fn width(body: &SetExpr) -> Option<usize> {
        match body {
            SetExpr::Select(select) => {
                let wildcard = select.projection.iter().any(|item| {
                    matches!(
                        item,
                        SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
                    )
                });
                (!wildcard).then_some(select.projection.len())
            }
            SetExpr::Query(query) => width(&query.body),
            SetExpr::SetOperation { left, .. } => width(left),
            _ => None,
        }
    }
    width(&query.body)
}

fn upsert_updates(
    assignments: &[Assignment],
) -> Result<IndexMap<String, UpsertExpr>, ShadowError> {
    let mut updates = IndexMap::with_capacity(assignments.len());
    for assignment in assignments {
        updates.insert(assignment_column(assignment)?, upsert_expr(&assignment.value));
    }
    Ok(updates)
}

pub(crate) fn upsert_expr(expr: &Expr) -> UpsertExpr {
    match expr {
        Expr::Value(value) => match literal_value(&value.value) {
            Some(value) => UpsertExpr::Literal(value),
            None => UpsertExpr::Raw(expr.to_string()),
        },
        Expr::Identifier(ident) => UpsertExpr::Column(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => match parts.last() {
            Some(ident) => UpsertExpr::Column(ident.value.clone()),
            None => UpsertExpr::Raw(expr.to_string()),
        },
        Expr::Nested(inner) => upsert_expr(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match upsert_expr(inner) {
            UpsertExpr::Literal(Value::Integer(value)) => UpsertExpr::Literal(Value::Integer(-value)),
            UpsertExpr::Literal(Value::Real(value)) => UpsertExpr::Literal(Value::Real(-value)),
            _ => UpsertExpr::Raw(expr.to_string()),
        },
        Expr::BinaryOp { left, op, right } => {
            let op = match op {
                BinaryOperator::Plus => ArithmeticOp::Add,
                BinaryOperator::Minus => ArithmeticOp::Subtract,
                BinaryOperator::Multiply => ArithmeticOp::Multiply,
                BinaryOperator::Divide => ArithmeticOp::Divide,
                _ => return UpsertExpr::Raw(expr.to_string()),
            };
            UpsertExpr::Binary {
                left: Box::new(upsert_expr(left)),
                op,
                right: Box::new(upsert_expr(right)),
            }
        }
        Expr::Function(function)
            if function
                .name
                .0
                .last()
                .and_then(ObjectNamePart::as_ident)
                .is_some_and(|ident| ident.value.eq_ignore_ascii_case("VALUES")) =>
        {
            match inserted_column(&function.args) {
                Some(column) => UpsertExpr::Inserted(column),
                None => UpsertExpr::Raw(expr.to_string()),
            }
        }
        _ => UpsertExpr::Raw(expr.to_string()),
    }
}

fn inserted_column(args: &FunctionArguments) -> Option<String> {
    let FunctionArguments::List(list) = args else {
        return None;
    };
    let [FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))] = list.args.as_slice() else {
        return None;
    };
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        _ => None,
    }
}

pub(crate) fn literal_value(value: &SqlValue) -> Option<Value> {
    match value {
        SqlValue::Null => Some(Value::Null),
        SqlValue::Boolean(value) => Some(Value::Boolean(*value)),
        SqlValue::Number(text, _) => Some(
            text.parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| text.parse::<f64>().map(Value::Real))
                .unwrap_or_else(|_| Value::Text(text.clone())),
        ),
        SqlValue::SingleQuotedString(text) | SqlValue::DoubleQuotedString(text) => {
            Some(Value::Text(text.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use sqlparser::ast::Statement;

    use super::{upsert_expr, InsertTransformer};
    use crate::mutation::{ArithmeticOp, ShadowMutation, UpsertExpr};
    use crate::schema::SchemaRegistry;
    use crate::sql::ast_utils::parse_statements;
    use crate::sql::steps::Projection;
    use crate::store::ShadowStore;
    use crate::{row, ShadowError, Value};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register("users", "CREATE TABLE users (id INT PRIMARY KEY, name TEXT)")
            .expect("users");
        registry
    }

    fn transform_with(store: &ShadowStore, sql: &str) -> Result<Projection, ShadowError> {
        let registry = registry();
        let mut statements = parse_statements(sql).expect("parse");
        let Statement::Insert(insert) = statements.remove(0) else {
            panic!("expected insert");
        };
        InsertTransformer::new(store, &registry).transform(&insert)
    }

    fn transform(sql: &str) -> Result<Projection, ShadowError> {
        transform_with(&ShadowStore::new(), sql)
    }

    #[test]
    fn values_rows_become_a_union() {
        let Projection::Select { sql, mutation } =
            transform("INSERT INTO users (id, name) VALUES (1, 'a'), (2, 'b')").expect("transform")
        else {
            panic!("expected select");
        };
        assert_eq!(
            sql,
            "SELECT 1 AS `id`, 'a' AS `name` UNION ALL SELECT 2 AS `id`, 'b' AS `name`"
        );
        assert_eq!(
            mutation,
            ShadowMutation::Insert {
                table: "users".to_string(),
                primary_keys: vec!["id".to_string()],
                columns: vec!["id".to_string(), "name".to_string()],
                ignore: false,
                validate: true,
            }
        );
    }

    #[test]
    fn columns_default_to_the_registered_schema() {
        let Projection::Select { sql, .. } =
            transform("INSERT INTO users VALUES (3, 'c')").expect("transform")
        else {
            panic!("expected select");
        };
        assert_eq!(sql, "SELECT 3 AS `id`, 'c' AS `name`");
    }

    #[test]
    fn set_form_projects_its_assignments() {
        let Projection::Select { sql, .. } =
            transform("INSERT INTO users SET id = 4, name = 'd'").expect("transform")
        else {
            panic!("expected select");
        };
        assert_eq!(sql, "SELECT 4 AS `id`, 'd' AS `name`");
    }

    #[test]
    fn shadow_rows_supply_columns_for_unregistered_tables() {
        let mut store = ShadowStore::new();
        store.insert("notes", vec![row([("body", Value::from("x"))])]);
        let Projection::Select { sql, .. } =
            transform_with(&store, "INSERT INTO notes VALUES ('y')").expect("transform")
        else {
            panic!("expected select");
        };
        assert_eq!(sql, "SELECT 'y' AS `body`");
        assert_eq!(
            transform("INSERT INTO notes VALUES ('y')").expect("transform"),
            Projection::UnknownSchema("notes".to_string())
        );
    }

    #[test]
    fn row_width_must_match_the_column_list() {
        assert_eq!(
            transform("INSERT INTO users (id, name) VALUES (1)"),
            Err(ShadowError::ColumnCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            transform("INSERT INTO users (id) SELECT id, name FROM staff"),
            Err(ShadowError::ColumnCountMismatch {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn insert_select_renames_source_columns_by_position() {
        let Projection::Select { sql, .. } =
            transform("INSERT INTO users SELECT * FROM staff").expect("transform")
        else {
            panic!("expected select");
        };
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT * FROM staff) AS `__shadow_source` (`id`, `name`)"
        );

        let Projection::Select { sql, .. } =
            transform("INSERT INTO users (name, id) SELECT id, name FROM staff")
                .expect("transform")
        else {
            panic!("expected select");
        };
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT id, name FROM staff) AS `__shadow_source` (`name`, `id`)"
        );
    }

    #[test]
    fn ignore_and_duplicate_key_select_the_mutation() {
        let Projection::Select { mutation, .. } =
            transform("INSERT IGNORE INTO users VALUES (1, 'a')").expect("transform")
        else {
            panic!("expected select");
        };
        assert!(matches!(mutation, ShadowMutation::Insert { ignore: true, .. }));

        let Projection::Select { mutation, .. } = transform(
            "INSERT INTO users VALUES (1, 'a') ON DUPLICATE KEY UPDATE name = VALUES(name)",
        )
        .expect("transform") else {
            panic!("expected select");
        };
        let ShadowMutation::Upsert { updates, .. } = mutation else {
            panic!("expected upsert");
        };
        assert_eq!(
            updates.get("name"),
            Some(&UpsertExpr::Inserted("name".to_string()))
        );
    }

    #[test]
    fn parses_upsert_expressions() {
        let expr = |sql: &str| {
            let mut statements = parse_statements(&format!("SELECT {sql}")).expect("parse");
            let Statement::Query(query) = statements.remove(0) else {
                panic!("expected query");
            };
            let sqlparser::ast::SetExpr::Select(select) = *query.body else {
                panic!("expected select");
            };
            let sqlparser::ast::SelectItem::UnnamedExpr(expr) = &select.projection[0] else {
                panic!("expected expression");
            };
            upsert_expr(expr)
        };
        assert_eq!(
            expr("hits + 1"),
            UpsertExpr::Binary {
                left: Box::new(UpsertExpr::Column("hits".to_string())),
                op: ArithmeticOp::Add,
                right: Box::new(UpsertExpr::Literal(Value::Integer(1))),
            }
        );
        assert_eq!(expr("-2"), UpsertExpr::Literal(Value::Integer(-2)));
        assert_eq!(expr("(1.5)"), UpsertExpr::Literal(Value::Real(1.5)));
        assert_eq!(expr("NOW()"), UpsertExpr::Raw("NOW()".to_string()));
    }
}
