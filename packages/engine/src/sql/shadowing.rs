use std::ops::ControlFlow;

use sqlparser::ast::{visit_relations_mut, Query, Statement};

use crate::schema::SchemaRegistry;
use crate::sql::ast_utils::{object_name_to_table, parse_statements, referenced_tables};
use crate::sql::CteGenerator;
use crate::store::ShadowStore;
use crate::ShadowError;

/// Overlays shadowed tables onto a query by prepending one CTE per
/// shadowed table the query reads.
pub struct CteShadowing<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
}

impl<'a> CteShadowing<'a> {
    pub fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    /// Rewrites a single SELECT; other statements pass through unchanged.
    pub fn apply(&self, sql: &str) -> Result<String, ShadowError> {
        let mut statements = parse_statements(sql)?;
        if statements.len() != 1 {
            return Ok(sql.to_string());
        }
        match statements.remove(0) {
            Statement::Query(query) => self.apply_to_query(*query),
            _ => Ok(sql.to_string()),
        }
    }

    pub(crate) fn apply_to_query(&self, mut query: Query) -> Result<String, ShadowError> {
        let shadowed: Vec<String> = referenced_tables(&query)
            .into_iter()
            .filter(|table| self.is_shadowed(table))
            .collect();

        let mut fragments = Vec::with_capacity(shadowed.len());
        for table in &shadowed {
            if let Some(fragment) = self.fragment(table)? {
                fragments.push((table.clone(), fragment));
            }
        }
        if fragments.is_empty() {
            return Ok(query.to_string());
        }

        // A CTE only answers to unqualified names.
        let _ = visit_relations_mut(&mut query, |name| {
            if name.0.len() > 1 {
                if let Some(table) = object_name_to_table(name) {
                    if fragments.iter().any(|(shadowed, _)| shadowed == &table) {
                        if let Some(last) = name.0.pop() {
                            name.0 = vec![last];
                        }
                    }
                }
            }
            ControlFlow::<()>::Continue(())
        });

        let mut ctes: Vec<String> = fragments.into_iter().map(|(_, fragment)| fragment).collect();
        let recursive = match query.with.take() {
            Some(with) => {
                ctes.extend(with.cte_tables.iter().map(ToString::to_string));
                with.recursive
            }
            None => false,
        };
        let keyword = if recursive { "WITH RECURSIVE" } else { "WITH" };
        Ok(format!("{keyword} {} {query}", ctes.join(", ")))
    }

    fn is_shadowed(&self, table: &str) -> bool {
        self.store.contains(table)
    }

    fn fragment(&self, table: &str) -> Result<Option<String>, ShadowError> {
        let columns = self.registry.columns(table).unwrap_or_default();
        let column_types = self.registry.column_types(table);
        CteGenerator::generate(
            table,
            self.store.get(table),
            &columns,
            column_types.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::CteShadowing;
    use crate::schema::SchemaRegistry;
    use crate::store::ShadowStore;
    use crate::{row, Value};

    fn state() -> (ShadowStore, SchemaRegistry) {
        let mut registry = SchemaRegistry::new();
        registry
            .register("users", "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(20))")
            .expect("register users");
        let mut store = ShadowStore::new();
        store.insert(
            "users",
            vec![row([("id", Value::Integer(1)), ("name", Value::from("Alice"))])],
        );
        (store, registry)
    }

    #[test]
    fn prepends_cte_for_referenced_shadow_tables() {
        let (store, registry) = state();
        let sql = CteShadowing::new(&store, &registry)
            .apply("SELECT name FROM users WHERE id = 1")
            .expect("shadow");
        assert_eq!(
            sql,
            "WITH `users` AS (SELECT CAST(1 AS SIGNED) AS `id`, CAST('Alice' AS CHAR) AS `name`) \
             SELECT name FROM users WHERE id = 1"
        );
    }

    #[test]
    fn leaves_queries_without_shadow_tables_alone() {
        let (store, registry) = state();
        let sql = CteShadowing::new(&store, &registry)
            .apply("SELECT * FROM orders")
            .expect("shadow");
        assert_eq!(sql, "SELECT * FROM orders");
    }

    #[test]
    fn merges_into_an_existing_with_clause() {
        let (store, registry) = state();
        let sql = CteShadowing::new(&store, &registry)
            .apply("WITH named AS (SELECT id FROM users) SELECT * FROM named")
            .expect("shadow");
        assert!(sql.starts_with("WITH `users` AS (SELECT "), "{sql}");
        assert!(sql.contains(", named AS (SELECT id FROM users) SELECT * FROM named"), "{sql}");
        assert_eq!(sql.matches("WITH").count(), 1, "{sql}");
    }

    #[test]
    fn strips_schema_qualifier_from_shadowed_tables() {
        let (store, registry) = state();
        let sql = CteShadowing::new(&store, &registry)
            .apply("SELECT * FROM app.users")
            .expect("shadow");
        assert!(sql.ends_with("SELECT * FROM users"), "{sql}");
    }
}
