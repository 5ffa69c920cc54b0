mod backend;
mod config;
mod error;
mod error_classification;
mod mutation;
mod schema;
mod session;
mod sql;
mod store;
mod types;

pub use backend::ShadowBackend;
pub use config::{ShadowConfig, UnknownSchemaBehavior, UnsupportedSqlBehavior};
pub use error::{ErrorCode, ShadowError};
pub use mutation::{ArithmeticOp, DeleteTarget, ShadowMutation, UpdateTarget, UpsertExpr};
pub use schema::{
    ColumnDefinition, SchemaReflector, SchemaRegistry, StaticSchemaReflector, TableDefinition,
};
pub use session::ShadowSession;
pub use sql::{
    AlterOperation, ColumnPosition, CteGenerator, CteShadowing, DeleteTransformer,
    InsertTransformer, MultiRewritePlan, QueryGuard, QueryKind, ReplaceTransformer, RewritePlan,
    SqlRewriter, UpdateTransformer, WriteProjection, EMPTY_RESULT_SQL,
};
pub use store::ShadowStore;
pub use types::{row, QueryResult, Row, Value};
