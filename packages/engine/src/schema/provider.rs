/// Supplies CREATE TABLE text for tables that exist in the real database.
///
/// The registry consults the reflector only for tables it has not
/// registered itself and that have not been dropped in the shadow.
pub trait SchemaReflector {
    fn create_table_sql(&self, table: &str) -> Option<String>;
}

impl<F> SchemaReflector for F
where
    F: Fn(&str) -> Option<String>,
{
    fn create_table_sql(&self, table: &str) -> Option<String> {
        self(table)
    }
}

/// Reflector backed by a fixed set of definitions, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaReflector {
    tables: indexmap::IndexMap<String, String>,
}

impl StaticSchemaReflector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, create_sql: impl Into<String>) -> Self {
        self.tables.insert(table.into(), create_sql.into());
        self
    }
}

impl SchemaReflector for StaticSchemaReflector {
    fn create_table_sql(&self, table: &str) -> Option<String> {
        self.tables.get(table).cloned()
    }
}
