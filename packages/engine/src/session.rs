use sqlparser::ast::Statement;

use crate::error_classification::{is_missing_relation_error, missing_identifier};
use crate::schema::SchemaRegistry;
use crate::sql::{parse_batch, quote_ident, ParsedStatement, QueryGuard, QueryKind, SqlRewriter};
use crate::store::ShadowStore;
use crate::{
    QueryResult, ShadowBackend, ShadowConfig, ShadowError, ShadowMutation, UnknownSchemaBehavior,
    UnsupportedSqlBehavior,
};

/// Runs SQL against a real database while keeping every write in memory.
///
/// Reads see the shadow rows through CTE overlays; writes are executed as
/// SELECTs of the affected rows and folded into the shadow store, so the
/// real database is never modified.
pub struct ShadowSession<B> {
    backend: B,
    store: ShadowStore,
    registry: SchemaRegistry,
    config: ShadowConfig,
}

impl<B: ShadowBackend> ShadowSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ShadowConfig::default())
    }

    pub fn with_config(backend: B, config: ShadowConfig) -> Self {
        Self {
            backend,
            store: ShadowStore::new(),
            registry: SchemaRegistry::new(),
            config,
        }
    }

    /// Replaces the schema registry, e.g. with one backed by a reflector of
    /// the real database.
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn store(&self) -> &ShadowStore {
        &self.store
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_parts(self) -> (B, ShadowStore, SchemaRegistry) {
        (self.backend, self.store, self.registry)
    }

    /// Executes a batch statement by statement; each one sees the effects
    /// of those before it. Returns the result of the last statement.
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult, ShadowError> {
        let statements = parse_batch(sql)?;
        let single = statements.len() == 1;
        let mut result = QueryResult::default();
        for parsed in &statements {
            let text = if single {
                sql.trim().trim_end_matches(';').trim_end().to_string()
            } else {
                parsed.to_string()
            };
            result = self.execute_statement(&text, parsed)?;
        }
        Ok(result)
    }

    fn execute_statement(
        &mut self,
        sql: &str,
        parsed: &ParsedStatement,
    ) -> Result<QueryResult, ShadowError> {
        let statement = &parsed.statement;
        let plan = SqlRewriter::new(&self.store, &self.registry)
            .with_constraint_validation(self.config.validate_constraints)
            .rewrite_parsed(sql, parsed)?;

        match plan.kind {
            QueryKind::Forbidden => return self.refuse(sql),
            QueryKind::UnknownSchema => {
                let identifier = plan.unknown_identifier.unwrap_or_default();
                return self.unknown_schema(sql, statement, identifier);
            }
            _ => {}
        }

        let rows = match self.backend.execute(&plan.sql) {
            Ok(rows) => rows,
            Err(error) if plan.kind == QueryKind::Read && is_missing_relation_error(&error) => {
                let identifier = missing_identifier(&error).unwrap_or_default();
                return self.unknown_schema(sql, statement, identifier);
            }
            Err(error) => return Err(error),
        };

        let Some(mutation) = plan.mutation else {
            return Ok(QueryResult {
                rows,
                affected_rows: 0,
            });
        };
        if self.config.copy_on_write {
            self.seed_real_rows(&mutation)?;
        }
        mutation.apply(&mut self.store, &mut self.registry, &rows)?;
        let affected_rows = match plan.kind {
            QueryKind::WriteSimulated => rows.len(),
            _ => 0,
        };
        Ok(QueryResult {
            rows: Vec::new(),
            affected_rows,
        })
    }

    /// Copies the real rows of each untracked table the mutation writes, so
    /// the overlay that replaces the table still shows them.
    fn seed_real_rows(&mut self, mutation: &ShadowMutation) -> Result<(), ShadowError> {
        let tables: Vec<&str> = match mutation {
            ShadowMutation::Insert { table, .. }
            | ShadowMutation::Update { table, .. }
            | ShadowMutation::Delete { table, .. }
            | ShadowMutation::Replace { table, .. }
            | ShadowMutation::Upsert { table, .. }
            | ShadowMutation::AlterTable { table, .. } => vec![table.as_str()],
            ShadowMutation::MultiUpdate { targets } => {
                targets.iter().map(|target| target.table.as_str()).collect()
            }
            ShadowMutation::MultiDelete { targets } => {
                targets.iter().map(|target| target.table.as_str()).collect()
            }
            _ => Vec::new(),
        };
        for table in tables {
            if self.store.contains(table)
                || self.registry.has_virtual_table_definition(table)
                || !self.registry.contains(table)
            {
                continue;
            }
            let rows = self
                .backend
                .execute(&format!("SELECT * FROM {}", quote_ident(table)))?;
            tracing::debug!(%table, rows = rows.len(), "copied real rows into the shadow store");
            self.store.set(table, rows);
        }
        Ok(())
    }

    fn refuse(&self, sql: &str) -> Result<QueryResult, ShadowError> {
        match self.config.unsupported_sql {
            UnsupportedSqlBehavior::Ignore => Ok(QueryResult::default()),
            UnsupportedSqlBehavior::Notice => {
                tracing::warn!(%sql, "statement not supported by the shadow layer; skipped");
                Ok(QueryResult::default())
            }
            UnsupportedSqlBehavior::Exception => Err(ShadowError::Unsupported(sql.to_string())),
        }
    }

    fn unknown_schema(
        &mut self,
        sql: &str,
        statement: &Statement,
        identifier: String,
    ) -> Result<QueryResult, ShadowError> {
        let passthrough = match self.config.unknown_schema {
            UnknownSchemaBehavior::Passthrough => true,
            UnknownSchemaBehavior::Notice => {
                tracing::warn!(%sql, %identifier, "statement references unknown schema");
                true
            }
            UnknownSchemaBehavior::EmptyResult => false,
            UnknownSchemaBehavior::Exception => {
                return Err(ShadowError::UnknownSchema(identifier));
            }
        };
        // Only reads may reach the real database untouched.
        if !passthrough || QueryGuard::classify(statement) != QueryKind::Read {
            return Ok(QueryResult::default());
        }
        Ok(QueryResult {
            rows: self.backend.execute(sql)?,
            affected_rows: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ShadowSession;
    use crate::{row, Row, ShadowBackend, ShadowError, Value};

    #[derive(Default)]
    struct EchoBackend {
        executed: Vec<String>,
    }

    impl ShadowBackend for EchoBackend {
        fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ShadowError> {
            self.executed.push(sql.to_string());
            if sql.contains("missing") {
                return Err(ShadowError::Backend(
                    "Table 'app.missing' doesn't exist".to_string(),
                ));
            }
            Ok(vec![row([("id", Value::Integer(1))])])
        }
    }

    #[test]
    fn ddl_never_reaches_the_backend_verbatim() {
        let mut session = ShadowSession::new(EchoBackend::default());
        session
            .execute("CREATE TABLE t (id INT PRIMARY KEY)")
            .expect("create");
        assert!(session.registry().has_virtual_table_definition("t"));
        assert_eq!(session.backend().executed, vec!["SELECT 1 WHERE FALSE"]);
    }

    #[test]
    fn missing_relation_on_read_passes_through() {
        let mut session = ShadowSession::new(EchoBackend::default());
        let error = session.execute("SELECT * FROM missing");
        // Passthrough re-runs the original text, which fails the same way.
        assert!(matches!(error, Err(ShadowError::Backend(_))));
        assert_eq!(session.backend().executed.len(), 2);
    }
}
