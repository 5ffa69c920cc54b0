use sqlparser::ast::{Delete, FromTable};

use crate::mutation::{DeleteTarget, ShadowMutation};
use crate::schema::SchemaRegistry;
use crate::sql::ast_utils::{object_name_to_table, quote_ident, table_has_partitions, table_refs};
use crate::sql::clauses::{
    aliased, from_clause, limit_clause, order_by_clause, qualified_column, select_sql,
    where_clause,
};
use crate::store::ShadowStore;
use crate::ShadowError;

use super::Projection;

/// Rewrites a DELETE into a SELECT of the rows it removes.
pub struct DeleteTransformer<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
}

impl<'a> DeleteTransformer<'a> {
    pub fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    pub(crate) fn transform(&self, delete: &Delete) -> Result<Projection, ShadowError> {
        let from_tables = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };
        if table_has_partitions(from_tables)
            || delete
                .using
                .as_deref()
                .is_some_and(table_has_partitions)
        {
            return Err(ShadowError::Unsupported(
                "DELETE with PARTITION is not supported".to_string(),
            ));
        }

        // `DELETE FROM a, b USING ...` names its targets in FROM and reads
        // from USING; `DELETE a, b FROM ...` names them before FROM.
        let (sources, target_names): (&[_], Vec<String>) = match &delete.using {
            Some(using) => (
                using.as_slice(),
                table_refs(from_tables)
                    .iter()
                    .map(|table| table.reference_name().to_string())
                    .collect(),
            ),
            None => (
                from_tables.as_slice(),
                delete
                    .tables
                    .iter()
                    .filter_map(object_name_to_table)
                    .collect(),
            ),
        };
        let refs = table_refs(sources);
        if refs.is_empty() {
            return Err(ShadowError::Unsupported(
                "DELETE source must be a plain table".to_string(),
            ));
        }

        let mut targets = Vec::new();
        for name in &target_names {
            let index = refs
                .iter()
                .position(|table| table.answers_to(name))
                .or_else(|| {
                    refs.iter()
                        .position(|table| table.table.eq_ignore_ascii_case(name))
                })
                .ok_or_else(|| {
                    ShadowError::Unsupported(format!("DELETE target `{name}` is not in FROM"))
                })?;
            if !targets.contains(&index) {
                targets.push(index);
            }
        }
        if targets.is_empty() {
            targets.push(0);
        }

        let clauses = [
            from_clause(sources),
            where_clause(delete.selection.as_ref()),
            order_by_clause(&delete.order_by),
            limit_clause(delete.limit.as_ref()),
        ];

        if let [target] = targets.as_slice() {
            let target = &refs[*target];
            let qualifier = target.reference_name();
            let columns = self.registry.columns(&target.table).or_else(|| {
                self.store
                    .get(&target.table)
                    .first()
                    .map(|row| row.keys().cloned().collect())
            });
            let projection: Vec<String> = match (&delete.returning, columns) {
                (Some(returning), _) => returning.iter().map(ToString::to_string).collect(),
                (None, Some(columns)) => columns
                    .iter()
                    .map(|column| aliased(qualified_column(qualifier, column), column))
                    .collect(),
                (None, None) => vec![format!("{}.*", quote_ident(qualifier))],
            };
            return Ok(Projection::select(
                select_sql(&projection, &clauses),
                ShadowMutation::Delete {
                    table: target.table.clone(),
                    primary_keys: self.registry.primary_keys(&target.table),
                },
            ));
        }

        let mut projection = Vec::new();
        let mut delete_targets = Vec::with_capacity(targets.len());
        for index in targets {
            let target = &refs[index];
            let Some(columns) = self.registry.columns(&target.table) else {
                return Ok(Projection::UnknownSchema(target.table.clone()));
            };
            let alias = target.reference_name().to_string();
            projection.extend(columns.iter().map(|column| {
                aliased(
                    qualified_column(&alias, column),
                    &format!("{alias}.{column}"),
                )
            }));
            delete_targets.push(DeleteTarget {
                table: target.table.clone(),
                alias,
                primary_keys: self.registry.primary_keys(&target.table),
            });
        }
        Ok(Projection::select(
            select_sql(&projection, &clauses),
            ShadowMutation::MultiDelete {
                targets: delete_targets,
            },
        ))
    }
}
