use sqlparser::ast::{
    AssignmentTarget, Expr, ObjectNamePart, OrderByExpr, TableWithJoins, Update,
    UpdateTableFromKind,
};

use crate::mutation::{ShadowMutation, UpdateTarget, OLD_VALUE_PREFIX};
use crate::schema::SchemaRegistry;
use crate::sql::ast_utils::{table_refs, TableRef};
use crate::sql::clauses::{
    aliased, from_clause, limit_clause, order_by_clause, qualified_column, select_sql,
    where_clause,
};
use crate::store::ShadowStore;
use crate::ShadowError;

use super::Projection;

struct Assigned<'u> {
    target: usize,
    column: String,
    value: &'u Expr,
}

/// Rewrites an UPDATE into a SELECT of the rows it changes, with the SET
/// expressions evaluated in place of the old column values.
pub struct UpdateTransformer<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
    order_by: &'a [OrderByExpr],
}

impl<'a> UpdateTransformer<'a> {
    pub fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            order_by: &[],
        }
    }

    /// Ordering of a single-table `UPDATE ... ORDER BY ... LIMIT`.
    pub fn with_order_by(mut self, order_by: &'a [OrderByExpr]) -> Self {
        self.order_by = order_by;
        self
    }

    pub(crate) fn transform(&self, update: &Update) -> Result<Projection, ShadowError> {
        let mut sources: Vec<TableWithJoins> = vec![update.table.clone()];
        if let Some(UpdateTableFromKind::BeforeSet(tables) | UpdateTableFromKind::AfterSet(tables)) =
            &update.from
        {
            sources.extend(tables.iter().cloned());
        }
        let refs = table_refs(&sources);
        if refs.is_empty() {
            return Err(ShadowError::Unsupported(
                "UPDATE target must be a plain table".to_string(),
            ));
        }
        if refs.len() > 1 && !self.order_by.is_empty() {
            return Err(ShadowError::Unsupported(
                "ORDER BY in a multiple-table UPDATE".to_string(),
            ));
        }

        let assigned = self.resolve_assignments(update, &refs)?;
        let mut targets: Vec<usize> = Vec::new();
        for assignment in &assigned {
            if !targets.contains(&assignment.target) {
                targets.push(assignment.target);
            }
        }

        let clauses = [
            from_clause(&sources),
            where_clause(update.selection.as_ref()),
            order_by_clause(self.order_by),
            limit_clause(update.limit.as_ref()),
        ];

        if let [target] = targets.as_slice() {
            let target = &refs[*target];
            let columns = match self.registry.columns(&target.table) {
                Some(columns) => columns,
                None => match self.store.get(&target.table).first() {
                    Some(row) => row.keys().cloned().collect(),
                    None => return Ok(Projection::UnknownSchema(target.table.clone())),
                },
            };
            let primary_keys = self.registry.primary_keys(&target.table);
            let projection = target_projection(target, &columns, &primary_keys, &assigned, None)?;
            return Ok(Projection::select(
                select_sql(&projection, &clauses),
                ShadowMutation::Update {
                    table: target.table.clone(),
                    primary_keys,
                    columns,
                },
            ));
        }

        let mut projection = Vec::new();
        let mut update_targets = Vec::with_capacity(targets.len());
        for index in targets {
            let target = &refs[index];
            let Some(columns) = self.registry.columns(&target.table) else {
                return Ok(Projection::UnknownSchema(target.table.clone()));
            };
            let primary_keys = self.registry.primary_keys(&target.table);
            let alias = target.reference_name().to_string();
            projection.extend(target_projection(
                target,
                &columns,
                &primary_keys,
                &assigned,
                Some((index, &alias)),
            )?);
            update_targets.push(UpdateTarget {
                table: target.table.clone(),
                alias,
                primary_keys,
                columns,
            });
        }
        Ok(Projection::select(
            select_sql(&projection, &clauses),
            ShadowMutation::MultiUpdate {
                targets: update_targets,
            },
        ))
    }

    /// Attributes every SET column to one of the statement's tables.
    fn resolve_assignments<'u>(
        &self,
        update: &'u Update,
        refs: &[TableRef],
    ) -> Result<Vec<Assigned<'u>>, ShadowError> {
        let mut assigned = Vec::with_capacity(update.assignments.len());
        for assignment in &update.assignments {
            let AssignmentTarget::ColumnName(name) = &assignment.target else {
                return Err(ShadowError::Unsupported(
                    "tuple assignment in UPDATE".to_string(),
                ));
            };
            let parts: Vec<&str> = name
                .0
                .iter()
                .filter_map(ObjectNamePart::as_ident)
                .map(|ident| ident.value.as_str())
                .collect();
            let (qualifier, column) = match parts.as_slice() {
                [column] => (None, *column),
                [.., qualifier, column] => (Some(*qualifier), *column),
                [] => {
                    return Err(ShadowError::Parse(format!(
                        "invalid UPDATE assignment target `{name}`"
                    )))
                }
            };
            let target = match qualifier {
                Some(qualifier) => refs
                    .iter()
                    .position(|table| table.answers_to(qualifier))
                    .ok_or_else(|| {
                        ShadowError::Unsupported(format!("unknown table `{qualifier}` in SET"))
                    })?,
                None if refs.len() == 1 => 0,
                None => refs
                    .iter()
                    .position(|table| self.registry.has_column(&table.table, column))
                    .unwrap_or(0),
            };
            assigned.push(Assigned {
                target,
                column: column.to_string(),
                value: &assignment.value,
            });
        }
        Ok(assigned)
    }
}

/// Projection items for one target. `scope` is `(index, alias)` for
/// multi-table statements, whose output columns are named `alias.column`.
fn target_projection(
    target: &TableRef,
    columns: &[String],
    primary_keys: &[String],
    assigned: &[Assigned<'_>],
    scope: Option<(usize, &str)>,
) -> Result<Vec<String>, ShadowError> {
    let qualifier = target.reference_name();
    let output = |column: &str| match scope {
        Some((_, alias)) => format!("{alias}.{column}"),
        None => column.to_string(),
    };
    let mine: Vec<&Assigned<'_>> = assigned
        .iter()
        .filter(|assignment| scope.map_or(true, |(index, _)| assignment.target == index))
        .collect();

    for assignment in &mine {
        if !columns
            .iter()
            .any(|column| column.eq_ignore_ascii_case(&assignment.column))
        {
            return Err(ShadowError::column_not_found(&target.table, &assignment.column));
        }
    }

    let mut projection = Vec::with_capacity(columns.len());
    for column in columns {
        let item = match mine
            .iter()
            .rev()
            .find(|assignment| assignment.column.eq_ignore_ascii_case(column))
        {
            Some(assignment) => aliased(assignment.value, &output(column)),
            None => aliased(qualified_column(qualifier, column), &output(column)),
        };
        projection.push(item);
    }

    let rewrites_key = primary_keys.iter().any(|key| {
        mine.iter()
            .any(|assignment| assignment.column.eq_ignore_ascii_case(key))
    });
    if primary_keys.is_empty() || rewrites_key {
        let match_columns = if primary_keys.is_empty() {
            columns
        } else {
            primary_keys
        };
        for column in match_columns {
            projection.push(aliased(
                qualified_column(qualifier, column),
                &output(&format!("{OLD_VALUE_PREFIX}{column}")),
            ));
        }
    }
    Ok(projection)
}
