use indexmap::IndexMap;

use crate::sql::quote_ident;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    /// Everything after the type (NOT NULL, DEFAULT, AUTO_INCREMENT, ...),
    /// with inline PRIMARY KEY / UNIQUE lifted to table level.
    pub options: String,
    pub not_null: bool,
    pub default: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            options: String::new(),
            not_null: false,
            default: None,
        }
    }

    pub fn is_auto_increment(&self) -> bool {
        self.options.to_ascii_uppercase().contains("AUTO_INCREMENT")
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.data_type);
        if !self.options.is_empty() {
            sql.push(' ');
            sql.push_str(&self.options);
        }
        sql
    }
}

/// Structured view of one CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_keys: Vec<String>,
    pub unique_constraints: IndexMap<String, Vec<String>>,
    /// Index, foreign-key and check clauses kept verbatim.
    pub extra_clauses: Vec<String>,
    pub table_options: String,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn to_create_sql(&self) -> String {
        let mut elements: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_keys.is_empty() {
            elements.push(format!("PRIMARY KEY ({})", quoted_list(&self.primary_keys)));
        }
        for (name, columns) in &self.unique_constraints {
            elements.push(format!(
                "UNIQUE KEY {} ({})",
                quote_ident(name),
                quoted_list(columns)
            ));
        }
        elements.extend(self.extra_clauses.iter().cloned());

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            quote_ident(&self.name),
            elements.join(", ")
        );
        if !self.table_options.is_empty() {
            sql.push(' ');
            sql.push_str(&self.table_options);
        }
        sql
    }

    /// Renames a column everywhere the definition mentions it.
    pub fn rename_column_references(&mut self, old: &str, new: &str) {
        for key in &mut self.primary_keys {
            if key.eq_ignore_ascii_case(old) {
                *key = new.to_string();
            }
        }
        for columns in self.unique_constraints.values_mut() {
            for column in columns.iter_mut() {
                if column.eq_ignore_ascii_case(old) {
                    *column = new.to_string();
                }
            }
        }
    }

    /// Forgets a dropped column in keys and unique groups; groups left
    /// without columns disappear.
    pub fn remove_column_references(&mut self, name: &str) {
        self.primary_keys.retain(|key| !key.eq_ignore_ascii_case(name));
        for columns in self.unique_constraints.values_mut() {
            columns.retain(|column| !column.eq_ignore_ascii_case(name));
        }
        self.unique_constraints.retain(|_, columns| !columns.is_empty());
    }
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ")
}
