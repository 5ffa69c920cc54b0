use sqlparser::ast::{
    AlterTable, CreateTable, CreateTableLikeKind, Expr, ObjectName, ObjectType, Query, SelectItem,
    SetExpr, Statement, Truncate,
};

use crate::mutation::ShadowMutation;
use crate::schema::SchemaRegistry;
use crate::sql::ddl::{alter_operations, table_name_of};
use crate::sql::shadowing::CteShadowing;
use crate::sql::RewritePlan;
use crate::store::ShadowStore;
use crate::ShadowError;

use super::EMPTY_RESULT_SQL;

/// Plans table DDL and TRUNCATE. None of them reach the real database; the
/// plan's mutation replays them on the virtual schema.
pub(crate) struct DdlPlanner<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
}

impl<'a> DdlPlanner<'a> {
    pub(crate) fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    pub(crate) fn plan(&self, sql: &str, statement: &Statement) -> Result<RewritePlan, ShadowError> {
        match statement {
            Statement::CreateTable(create) => self.create_table(sql, &statement.to_string(), create),
            Statement::AlterTable(alter) => self.alter_table(sql, alter),
            Statement::Drop {
                object_type: ObjectType::Table,
                if_exists,
                names,
                ..
            } => self.drop_table(sql, *if_exists, names),
            Statement::Truncate(truncate) => self.truncate(sql, truncate),
            _ => Ok(RewritePlan::forbidden(sql)),
        }
    }

    fn known(&self, table: &str) -> bool {
        self.registry.contains(table) || self.store.contains(table)
    }

    fn create_table(
        &self,
        sql: &str,
        text: &str,
        create: &CreateTable,
    ) -> Result<RewritePlan, ShadowError> {
        let table = table_name_of(&create.name)?;
        let if_not_exists = create.if_not_exists;
        if !if_not_exists && self.known(&table) {
            tracing::debug!(%table, "CREATE TABLE for an existing table");
            return Ok(RewritePlan::forbidden(sql));
        }

        if let Some(like) = &create.like {
            let (CreateTableLikeKind::Parenthesized(like) | CreateTableLikeKind::Plain(like)) = like;
            let source = table_name_of(&like.name)?;
            if !self.registry.contains(&source) {
                tracing::debug!(%table, %source, "CREATE TABLE LIKE an unknown table");
                return Ok(RewritePlan::forbidden(sql));
            }
            return Ok(RewritePlan::ddl(
                EMPTY_RESULT_SQL,
                ShadowMutation::CreateTableLike {
                    table,
                    source,
                    if_not_exists,
                },
            ));
        }

        if let Some(query) = create.query.as_deref() {
            let columns = projected_columns(query);
            let shadowed =
                CteShadowing::new(self.store, self.registry).apply_to_query(query.clone())?;
            return Ok(RewritePlan::ddl(
                shadowed,
                ShadowMutation::CreateTableAsSelect {
                    table,
                    columns,
                    if_not_exists,
                },
            ));
        }

        if create.columns.is_empty() {
            tracing::debug!(%table, "CREATE TABLE without column definitions");
            return Ok(RewritePlan::forbidden(sql));
        }
        Ok(RewritePlan::ddl(
            EMPTY_RESULT_SQL,
            ShadowMutation::CreateTable {
                table,
                create_sql: text.to_string(),
                if_not_exists,
            },
        ))
    }

    fn alter_table(&self, sql: &str, alter: &AlterTable) -> Result<RewritePlan, ShadowError> {
        let table = table_name_of(&alter.name)?;
        let operations = match alter_operations(alter) {
            Ok(operations) => operations,
            Err(ShadowError::Unsupported(reason)) => {
                tracing::debug!(%reason, "ALTER TABLE cannot be replayed");
                return Ok(RewritePlan::forbidden(sql));
            }
            Err(error) => return Err(error),
        };
        if !self.registry.contains(&table) {
            return Ok(RewritePlan::forbidden(sql));
        }
        Ok(RewritePlan::ddl(
            EMPTY_RESULT_SQL,
            ShadowMutation::AlterTable { table, operations },
        ))
    }

    fn drop_table(
        &self,
        sql: &str,
        if_exists: bool,
        names: &[ObjectName],
    ) -> Result<RewritePlan, ShadowError> {
        let tables = names
            .iter()
            .map(table_name_of)
            .collect::<Result<Vec<_>, _>>()?;
        if tables.is_empty() || (!if_exists && tables.iter().any(|name| !self.known(name))) {
            return Ok(RewritePlan::forbidden(sql));
        }
        Ok(RewritePlan::ddl(
            EMPTY_RESULT_SQL,
            ShadowMutation::DropTable { tables, if_exists },
        ))
    }

    fn truncate(&self, sql: &str, truncate: &Truncate) -> Result<RewritePlan, ShadowError> {
        let [target] = truncate.table_names.as_slice() else {
            return Ok(RewritePlan::forbidden(sql));
        };
        let table = table_name_of(&target.name)?;
        if !self.known(&table) {
            return Ok(RewritePlan::forbidden(sql));
        }
        Ok(RewritePlan::write(
            EMPTY_RESULT_SQL,
            ShadowMutation::Truncate { table },
        ))
    }
}

/// Output column names of a CTAS query; `None` when a wildcard hides them.
fn projected_columns(query: &Query) -> Option<Vec<String>> {
    let SetExpr::Select(select) = leftmost(&query.body) else {
        return None;
    };
    select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::ExprWithAlias { alias, .. } => Some(alias.value.clone()),
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Some(ident.value.clone()),
            SelectItem::UnnamedExpr(Expr::CompoundIdentifier(parts)) => {
                parts.last().map(|ident| ident.value.clone())
            }
            SelectItem::UnnamedExpr(expr) => Some(expr.to_string()),
            _ => None,
        })
        .collect()
}

fn leftmost(body: &SetExpr) -> &SetExpr {
    match body {
        SetExpr::SetOperation { left, .. } => leftmost(left),
        SetExpr::Query(query) => leftmost(&query.body),
        other => other,
    }
}
