use sqlparser::ast::Insert;

use crate::mutation::ShadowMutation;
use crate::schema::SchemaRegistry;
use crate::sql::cte::cast_type;
use crate::store::ShadowStore;
use crate::ShadowError;

use super::insert::{assignment_columns, insert_table, row_source_sql};
use super::Projection;

/// REPLACE INTO: rows are projected like an INSERT, with literals cast to
/// the declared column types so the shadow copy keeps them.
pub struct ReplaceTransformer<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
}

impl<'a> ReplaceTransformer<'a> {
    pub fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    pub(crate) fn transform(&self, insert: &Insert) -> Result<Projection, ShadowError> {
        let table = insert_table(insert)?;
        let columns = if !insert.columns.is_empty() {
            insert
                .columns
                .iter()
                .map(|ident| ident.value.clone())
                .collect()
        } else if !insert.assignments.is_empty() {
            assignment_columns(&insert.assignments)?
        } else if let Some(row) = self.store.get(&table).first() {
            row.keys().cloned().collect()
        } else if let Some(columns) = self.registry.columns(&table) {
            columns
        } else {
            tracing::debug!(%table, "REPLACE into a table without known columns");
            return Ok(Projection::Forbidden);
        };

        let column_types = self.registry.column_types(&table).unwrap_or_default();
        let sql = row_source_sql(insert, &columns, |expr, column| {
            match column_types
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
            {
                Some((_, declared)) => format!("CAST({expr} AS {})", cast_type(declared)),
                None => expr.to_string(),
            }
        })?;

        Ok(Projection::select(
            sql,
            ShadowMutation::Replace {
                primary_keys: self.registry.primary_keys(&table),
                table,
                columns,
            },
        ))
    }
}
