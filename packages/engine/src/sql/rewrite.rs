use sqlparser::ast::{OrderByExpr, Query, Statement};

use crate::schema::SchemaRegistry;
use crate::sql::ast_utils::{parse_batch, referenced_tables, ParsedStatement};
use crate::sql::shadowing::CteShadowing;
use crate::sql::steps::ddl::DdlPlanner;
use crate::sql::write_projection::WriteProjection;
use crate::sql::{MultiRewritePlan, QueryGuard, QueryKind, RewritePlan};
use crate::store::ShadowStore;
use crate::ShadowError;

/// Entry point of the rewrite pipeline: parses, classifies and dispatches
/// each statement to the step that plans it.
pub struct SqlRewriter<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
    validate_constraints: bool,
}

impl<'a> SqlRewriter<'a> {
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

    /// Rewrites exactly one statement. Empty input or a batch yields a
    /// forbidden plan; use [`Self::rewrite_multiple`] for batches.
    pub fn rewrite(&self, sql: &str) -> Result<RewritePlan, ShadowError> {
        let parsed = parse_batch(sql)?;
        let [statement] = parsed.as_slice() else {
            tracing::debug!(statements = parsed.len(), "expected exactly one statement");
            return Ok(RewritePlan::forbidden(sql));
        };
        self.rewrite_parsed(sql, statement)
    }

    /// Rewrites every statement independently against the current state.
    pub fn rewrite_multiple(&self, sql: &str) -> Result<MultiRewritePlan, ShadowError> {
        let plans = parse_batch(sql)?
            .iter()
            .map(|statement| self.rewrite_parsed(&statement.to_string(), statement))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MultiRewritePlan { plans })
    }

    /// `sql` is the statement's own text; forbidden and unknown-schema plans
    /// carry it unchanged.
    pub fn rewrite_statement(
        &self,
        sql: &str,
        statement: &Statement,
    ) -> Result<RewritePlan, ShadowError> {
        self.rewrite_ordered(sql, statement, &[])
    }

    pub(crate) fn rewrite_parsed(
        &self,
        sql: &str,
        parsed: &ParsedStatement,
    ) -> Result<RewritePlan, ShadowError> {
        self.rewrite_ordered(sql, &parsed.statement, &parsed.update_order_by)
    }

    fn rewrite_ordered(
        &self,
        sql: &str,
        statement: &Statement,
        update_order_by: &[OrderByExpr],
    ) -> Result<RewritePlan, ShadowError> {
        let kind = QueryGuard::classify(statement);
        tracing::debug!(kind = kind.as_str(), "classified statement");

        let plan = match (kind, statement) {
            (QueryKind::Read, Statement::Query(query)) => self.rewrite_read(sql, query)?,
            // Writes nested in a WITH body have no single target to project.
            (QueryKind::WriteSimulated, Statement::Query(_)) => RewritePlan::forbidden(sql),
            (QueryKind::WriteSimulated, Statement::Truncate(_))
            | (QueryKind::DdlSimulated, _) => {
                DdlPlanner::new(self.store, self.registry).plan(sql, statement)?
            }
            (QueryKind::WriteSimulated, _) => WriteProjection::new(self.store, self.registry)
                .with_constraint_validation(self.validate_constraints)
                .with_update_order_by(update_order_by)
                .project(sql, statement)?,
            _ => RewritePlan::forbidden(sql),
        };

        tracing::debug!(
            kind = plan.kind.as_str(),
            mutation = plan.mutation.as_ref().map(|mutation| mutation.name()),
            sql = %plan.sql,
            "rewrote statement"
        );
        Ok(plan)
    }

    fn rewrite_read(&self, sql: &str, query: &Query) -> Result<RewritePlan, ShadowError> {
        let shadow_context = self.registry.has_any_tables()
            || self.registry.has_dropped_tables()
            || !self.store.is_empty();
        if shadow_context {
            let missing: Vec<String> = referenced_tables(query)
                .into_iter()
                .filter(|table| {
                    !table.eq_ignore_ascii_case("dual")
                        && !self.registry.contains(table)
                        && !self.store.contains(table)
                })
                .collect();
            // A table dropped in this session must not resolve to the real one.
            if let Some(table) = missing.iter().find(|table| self.registry.is_dropped(table)) {
                return Err(ShadowError::TableNotFound(table.clone()));
            }
            if let Some(table) = missing.into_iter().next() {
                return Ok(RewritePlan::unknown_schema(sql, table));
            }
        }
        let shadowed = CteShadowing::new(self.store, self.registry).apply_to_query(query.clone())?;
        Ok(RewritePlan::read(shadowed))
    }
}
