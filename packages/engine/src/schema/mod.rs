mod definition;
mod provider;
mod registry;

pub use definition::{ColumnDefinition, TableDefinition};
pub use provider::{SchemaReflector, StaticSchemaReflector};
pub use registry::SchemaRegistry;
