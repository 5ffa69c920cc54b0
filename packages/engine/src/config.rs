use serde::{Deserialize, Serialize};

use crate::ShadowError;

/// What the session does with statements the shadow layer refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedSqlBehavior {
    /// Skip the statement silently.
    Ignore,
    /// Skip the statement and log a warning.
    #[default]
    Notice,
    Exception,
}

/// What the session does when a statement touches a table or column the
/// shadow layer knows nothing about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSchemaBehavior {
    /// Run the original SQL against the real database.
    #[default]
    Passthrough,
    EmptyResult,
    /// Passthrough, with a warning.
    Notice,
    Exception,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub unsupported_sql: UnsupportedSqlBehavior,
    pub unknown_schema: UnknownSchemaBehavior,
    pub validate_constraints: bool,
    /// Copy a real table's rows into the store the first time it is
    /// written, so reads keep seeing rows the write did not touch.
    pub copy_on_write: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            unsupported_sql: UnsupportedSqlBehavior::default(),
            unknown_schema: UnknownSchemaBehavior::default(),
            validate_constraints: true,
            copy_on_write: true,
        }
    }
}

impl ShadowConfig {
    pub fn from_json(json: &str) -> Result<Self, ShadowError> {
        serde_json::from_str(json)
            .map_err(|error| ShadowError::Parse(format!("invalid shadow config: {error}")))
    }
}
