pub(crate) mod ddl;
pub(crate) mod delete;
pub(crate) mod insert;
pub(crate) mod replace;
pub(crate) mod update;

use crate::mutation::ShadowMutation;

/// SQL executed for DDL: the real database must not see the statement, and
/// no rows are needed to apply it.
pub const EMPTY_RESULT_SQL: &str = "SELECT 1 WHERE FALSE";

/// Outcome of turning one write statement into a read.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    /// SELECT producing the rows the mutation consumes; shadow CTEs are
    /// overlaid afterwards.
    Select {
        sql: String,
        mutation: ShadowMutation,
    },
    UnknownSchema(String),
    Forbidden,
}

impl Projection {
    pub(crate) fn select(sql: String, mutation: ShadowMutation) -> Self {
        Self::Select { sql, mutation }
    }
}
