use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::sql::ddl::parse_table_definition;
use crate::ShadowError;

use super::definition::TableDefinition;
use super::provider::SchemaReflector;

struct RegisteredTable {
    create_sql: String,
    definition: TableDefinition,
}

/// Virtual table definitions layered over an optional reflector of the
/// real schema.
#[derive(Default)]
pub struct SchemaRegistry {
    tables: IndexMap<String, RegisteredTable>,
    dropped: BTreeSet<String>,
    reflector: Option<Box<dyn SchemaReflector>>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("dropped", &self.dropped)
            .field("reflector", &self.reflector.is_some())
            .finish()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reflector(reflector: impl SchemaReflector + 'static) -> Self {
        Self {
            reflector: Some(Box::new(reflector)),
            ..Self::default()
        }
    }

    /// Registers (or replaces) a virtual table from its CREATE TABLE text.
    pub fn register(&mut self, table: &str, create_sql: &str) -> Result<(), ShadowError> {
        let mut definition = parse_table_definition(create_sql)?;
        definition.name = table.to_string();
        self.tables.insert(
            table.to_string(),
            RegisteredTable {
                create_sql: create_sql.to_string(),
                definition,
            },
        );
        self.dropped.remove(table);
        Ok(())
    }

    /// Registers an already structured definition under its own name.
    pub fn register_definition(&mut self, definition: TableDefinition) {
        let name = definition.name.clone();
        self.dropped.remove(&name);
        self.tables.insert(
            name,
            RegisteredTable {
                create_sql: definition.to_create_sql(),
                definition,
            },
        );
    }

    /// Forgets a table and hides any reflected definition of it.
    pub fn unregister(&mut self, table: &str) -> bool {
        self.dropped.insert(table.to_string());
        self.tables.shift_remove(table).is_some()
    }

    pub fn get(&self, table: &str) -> Option<String> {
        if let Some(registered) = self.tables.get(table) {
            return Some(registered.create_sql.clone());
        }
        self.reflected_sql(table)
    }

    pub fn definition(&self, table: &str) -> Option<TableDefinition> {
        if let Some(registered) = self.tables.get(table) {
            return Some(registered.definition.clone());
        }
        let sql = self.reflected_sql(table)?;
        let mut definition = parse_table_definition(&sql).ok()?;
        definition.name = table.to_string();
        Some(definition)
    }

    pub fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.definition(table)
            .map(|definition| definition.column_names())
            .filter(|columns| !columns.is_empty())
    }

    pub fn column_types(&self, table: &str) -> Option<IndexMap<String, String>> {
        self.definition(table).map(|definition| {
            definition
                .columns
                .into_iter()
                .map(|column| (column.name, column.data_type))
                .collect()
        })
    }

    pub fn primary_keys(&self, table: &str) -> Vec<String> {
        self.definition(table)
            .map(|definition| definition.primary_keys)
            .unwrap_or_default()
    }

    /// Columns declared NOT NULL. Primary-key columns are not implied.
    pub fn not_null_columns(&self, table: &str) -> Vec<String> {
        self.definition(table)
            .map(|definition| {
                definition
                    .columns
                    .into_iter()
                    .filter(|column| column.not_null)
                    .map(|column| column.name)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn unique_constraints(&self, table: &str) -> IndexMap<String, Vec<String>> {
        self.definition(table)
            .map(|definition| definition.unique_constraints)
            .unwrap_or_default()
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.definition(table)
            .is_some_and(|definition| definition.column(column).is_some())
    }

    pub fn has_any_tables(&self) -> bool {
        !self.tables.is_empty()
    }

    /// Dropped during this session and hidden from the reflector.
    pub fn is_dropped(&self, table: &str) -> bool {
        self.dropped.contains(table)
    }

    pub fn has_dropped_tables(&self) -> bool {
        !self.dropped.is_empty()
    }

    pub fn has_virtual_table_definition(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Known either as a virtual table or through the reflector.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table) || self.reflected_sql(table).is_some()
    }

    pub fn virtual_tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    fn reflected_sql(&self, table: &str) -> Option<String> {
        if self.dropped.contains(table) {
            return None;
        }
        self.reflector.as_ref()?.create_table_sql(table)
    }
}
