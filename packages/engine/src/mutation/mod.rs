//! Folding captured result rows back into the shadow state.
//!
//! Every simulated write is rewritten into a SELECT; once the caller has run
//! it, the matching [`ShadowMutation`] applies the returned rows to the
//! [`ShadowStore`] and [`SchemaRegistry`].

mod alter;
mod constraints;
mod delete;
mod insert;
mod rows;
mod table;
mod update;
mod upsert;

use indexmap::IndexMap;

use crate::schema::SchemaRegistry;
use crate::sql::AlterOperation;
use crate::store::ShadowStore;
use crate::{Row, ShadowError};

pub use upsert::{ArithmeticOp, UpsertExpr};

/// Result columns carrying a row's pre-update value use this prefix, so an
/// UPDATE that rewrites key columns can still find the stored row.
pub(crate) const OLD_VALUE_PREFIX: &str = "__shadow_old_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    pub table: String,
    /// Name the statement uses for the table; result columns are
    /// `alias.column`.
    pub alias: String,
    pub primary_keys: Vec<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub table: String,
    pub alias: String,
    pub primary_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShadowMutation {
    Insert {
        table: String,
        primary_keys: Vec<String>,
        columns: Vec<String>,
        ignore: bool,
        validate: bool,
    },
    Update {
        table: String,
        primary_keys: Vec<String>,
        columns: Vec<String>,
    },
    Delete {
        table: String,
        primary_keys: Vec<String>,
    },
    Replace {
        table: String,
        primary_keys: Vec<String>,
        columns: Vec<String>,
    },
    Upsert {
        table: String,
        primary_keys: Vec<String>,
        columns: Vec<String>,
        /// Column -> ON DUPLICATE KEY UPDATE expression. Empty means every
        /// non-key column takes the inserted value.
        updates: IndexMap<String, UpsertExpr>,
    },
    Truncate {
        table: String,
    },
    MultiUpdate {
        targets: Vec<UpdateTarget>,
    },
    MultiDelete {
        targets: Vec<DeleteTarget>,
    },
    CreateTable {
        table: String,
        create_sql: String,
        if_not_exists: bool,
    },
    CreateTableLike {
        table: String,
        source: String,
        if_not_exists: bool,
    },
    CreateTableAsSelect {
        table: String,
        columns: Option<Vec<String>>,
        if_not_exists: bool,
    },
    DropTable {
        tables: Vec<String>,
        if_exists: bool,
    },
    AlterTable {
        table: String,
        operations: Vec<AlterOperation>,
    },
}

impl ShadowMutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Replace { .. } => "replace",
            Self::Upsert { .. } => "upsert",
            Self::Truncate { .. } => "truncate",
            Self::MultiUpdate { .. } => "multi_update",
            Self::MultiDelete { .. } => "multi_delete",
            Self::CreateTable { .. } => "create_table",
            Self::CreateTableLike { .. } => "create_table_like",
            Self::CreateTableAsSelect { .. } => "create_table_as_select",
            Self::DropTable { .. } => "drop_table",
            Self::AlterTable { .. } => "alter_table",
        }
    }

    /// Applies the rows returned by the rewritten SQL.
    pub fn apply(
        &self,
        store: &mut ShadowStore,
        registry: &mut SchemaRegistry,
        rows: &[Row],
    ) -> Result<(), ShadowError> {
        tracing::trace!(mutation = self.name(), rows = rows.len(), "applying shadow mutation");
        match self {
            Self::Insert {
                table,
                primary_keys,
                columns,
                ignore,
                validate,
            } => insert::apply_insert(
                store,
                registry,
                insert::InsertOptions {
                    table,
                    primary_keys,
                    columns,
                    ignore: *ignore,
                    validate: *validate,
                },
                rows,
            ),
            Self::Update {
                table,
                primary_keys,
                columns,
            } => {
                update::apply_update(store, table, primary_keys, columns, "", rows);
                Ok(())
            }
            Self::Delete {
                table,
                primary_keys,
            } => {
                delete::apply_delete(store, table, primary_keys, rows);
                Ok(())
            }
            Self::Replace {
                table,
                primary_keys,
                columns,
            } => insert::apply_replace(store, registry, table, primary_keys, columns, rows),
            Self::Upsert {
                table,
                primary_keys,
                columns,
                updates,
            } => upsert::apply_upsert(store, registry, table, primary_keys, columns, updates, rows),
            Self::Truncate { table } => {
                store.set(table, Vec::new());
                Ok(())
            }
            Self::MultiUpdate { targets } => {
                for target in targets {
                    let prefix = format!("{}.", target.alias);
                    update::apply_update(
                        store,
                        &target.table,
                        &target.primary_keys,
                        &target.columns,
                        &prefix,
                        rows,
                    );
                }
                Ok(())
            }
            Self::MultiDelete { targets } => {
                for target in targets {
                    delete::apply_multi_delete(store, target, rows);
                }
                Ok(())
            }
            Self::CreateTable {
                table,
                create_sql,
                if_not_exists,
            } => table::create_table(store, registry, table, create_sql, *if_not_exists),
            Self::CreateTableLike {
                table,
                source,
                if_not_exists,
            } => table::create_table_like(store, registry, table, source, *if_not_exists),
            Self::CreateTableAsSelect {
                table,
                columns,
                if_not_exists,
            } => table::create_table_as_select(
                store,
                registry,
                table,
                columns.as_deref(),
                *if_not_exists,
                rows,
            ),
            Self::DropTable { tables, if_exists } => {
                table::drop_tables(store, registry, tables, *if_exists)
            }
            Self::AlterTable { table, operations } => {
                alter::alter_table(store, registry, table, operations)
            }
        }
    }
}
