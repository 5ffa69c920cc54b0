//! Text builders for the SELECT statements write projections emit.

use sqlparser::ast::{Expr, OrderByExpr, TableWithJoins};

use crate::sql::quote_ident;

pub(crate) fn projection_list(items: &[String]) -> String {
    items.join(", ")
}

pub(crate) fn from_clause(tables: &[TableWithJoins]) -> String {
    if tables.is_empty() {
        return String::new();
    }
    let tables = tables
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("FROM {tables}")
}

pub(crate) fn where_clause(selection: Option<&Expr>) -> String {
    selection
        .map(|selection| format!("WHERE {selection}"))
        .unwrap_or_default()
}

pub(crate) fn order_by_clause(order_by: &[OrderByExpr]) -> String {
    if order_by.is_empty() {
        return String::new();
    }
    let items = order_by
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("ORDER BY {items}")
}

pub(crate) fn limit_clause(limit: Option<&Expr>) -> String {
    limit
        .map(|limit| format!("LIMIT {limit}"))
        .unwrap_or_default()
}

/// `SELECT <projection> <clauses...>`, skipping empty clauses.
pub(crate) fn select_sql(projection: &[String], clauses: &[String]) -> String {
    let mut sql = format!("SELECT {}", projection_list(projection));
    for clause in clauses.iter().filter(|clause| !clause.is_empty()) {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql
}

pub(crate) fn union_all(selects: &[String]) -> String {
    selects.join(" UNION ALL ")
}

/// `` `qualifier`.`column` ``
pub(crate) fn qualified_column(qualifier: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(qualifier), quote_ident(column))
}

pub(crate) fn aliased(expr: impl std::fmt::Display, alias: &str) -> String {
    format!("{expr} AS {}", quote_ident(alias))
}
