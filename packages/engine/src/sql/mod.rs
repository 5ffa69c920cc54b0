mod ast_utils;
mod clauses;
mod cte;
pub(crate) mod ddl;
mod guard;
mod rewrite;
mod shadowing;
mod steps;
mod types;
mod write_projection;

pub(crate) use ast_utils::{parse_batch, quote_ident, ParsedStatement};
#[cfg(test)]
pub(crate) use ast_utils::parse_statements;
pub(crate) use ddl::default_literal_value;
pub use ddl::{AlterOperation, ColumnPosition};

pub use cte::CteGenerator;
pub use guard::QueryGuard;
pub use rewrite::SqlRewriter;
pub use shadowing::CteShadowing;
pub use steps::delete::DeleteTransformer;
pub use steps::insert::InsertTransformer;
pub use steps::replace::ReplaceTransformer;
pub use steps::update::UpdateTransformer;
pub use steps::EMPTY_RESULT_SQL;
pub use types::{MultiRewritePlan, QueryKind, RewritePlan};
pub use write_projection::WriteProjection;
