use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Parse,
    Unsupported,
    UnknownSchema,
    TableNotFound,
    TableAlreadyExists,
    ColumnNotFound,
    ColumnAlreadyExists,
    NotNullViolation,
    UniqueViolation,
    DuplicatePrimaryKey,
    ColumnCountMismatch,
    UnsupportedValue,
    Backend,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "SHADOW_ERROR_PARSE",
            Self::Unsupported => "SHADOW_ERROR_UNSUPPORTED_SQL",
            Self::UnknownSchema => "SHADOW_ERROR_UNKNOWN_SCHEMA",
            Self::TableNotFound => "SHADOW_ERROR_TABLE_NOT_FOUND",
            Self::TableAlreadyExists => "SHADOW_ERROR_TABLE_ALREADY_EXISTS",
            Self::ColumnNotFound => "SHADOW_ERROR_COLUMN_NOT_FOUND",
            Self::ColumnAlreadyExists => "SHADOW_ERROR_COLUMN_ALREADY_EXISTS",
            Self::NotNullViolation => "SHADOW_ERROR_NOT_NULL_VIOLATION",
            Self::UniqueViolation => "SHADOW_ERROR_UNIQUE_VIOLATION",
            Self::DuplicatePrimaryKey => "SHADOW_ERROR_DUPLICATE_PRIMARY_KEY",
            Self::ColumnCountMismatch => "SHADOW_ERROR_COLUMN_COUNT_MISMATCH",
            Self::UnsupportedValue => "SHADOW_ERROR_UNSUPPORTED_VALUE",
            Self::Backend => "SHADOW_ERROR_BACKEND",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Parse,
            Self::Unsupported,
            Self::UnknownSchema,
            Self::TableNotFound,
            Self::TableAlreadyExists,
            Self::ColumnNotFound,
            Self::ColumnAlreadyExists,
            Self::NotNullViolation,
            Self::UniqueViolation,
            Self::DuplicatePrimaryKey,
            Self::ColumnCountMismatch,
            Self::UnsupportedValue,
            Self::Backend,
        ]
    }
}

/// Every failure the rewrite pipeline raises.
///
/// Classification outcomes (forbidden statements, unknown schema) are not
/// errors; they travel on [`crate::RewritePlan`]. The two matching variants
/// here exist for the session layer when its policy says to raise.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShadowError {
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    #[error("unsupported SQL: {0}")]
    Unsupported(String),

    #[error("unknown table or column `{0}`")]
    UnknownSchema(String),

    #[error("table `{0}` does not exist")]
    TableNotFound(String),

    #[error("table `{0}` already exists")]
    TableAlreadyExists(String),

    #[error("column `{column}` does not exist in table `{table}`")]
    ColumnNotFound { table: String, column: String },

    #[error("column `{column}` already exists in table `{table}`")]
    ColumnAlreadyExists { table: String, column: String },

    #[error("column `{column}` of table `{table}` cannot be null")]
    NotNullViolation { table: String, column: String },

    #[error("duplicate entry for unique constraint `{constraint}` on table `{table}`")]
    UniqueViolation { table: String, constraint: String },

    #[error("duplicate entry for primary key on table `{table}`")]
    DuplicatePrimaryKey { table: String },

    #[error("column count doesn't match value count: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("cannot render value as SQL literal: {0}")]
    UnsupportedValue(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl ShadowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::Parse,
            Self::Unsupported(_) => ErrorCode::Unsupported,
            Self::UnknownSchema(_) => ErrorCode::UnknownSchema,
            Self::TableNotFound(_) => ErrorCode::TableNotFound,
            Self::TableAlreadyExists(_) => ErrorCode::TableAlreadyExists,
            Self::ColumnNotFound { .. } => ErrorCode::ColumnNotFound,
            Self::ColumnAlreadyExists { .. } => ErrorCode::ColumnAlreadyExists,
            Self::NotNullViolation { .. } => ErrorCode::NotNullViolation,
            Self::UniqueViolation { .. } => ErrorCode::UniqueViolation,
            Self::DuplicatePrimaryKey { .. } => ErrorCode::DuplicatePrimaryKey,
            Self::ColumnCountMismatch { .. } => ErrorCode::ColumnCountMismatch,
            Self::UnsupportedValue(_) => ErrorCode::UnsupportedValue,
            Self::Backend(_) => ErrorCode::Backend,
        }
    }

    pub(crate) fn column_not_found(table: &str, column: &str) -> Self {
        Self::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub(crate) fn column_already_exists(table: &str, column: &str) -> Self {
        Self::ColumnAlreadyExists {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl From<sqlparser::parser::ParserError> for ShadowError {
    fn from(error: sqlparser::parser::ParserError) -> Self {
        Self::Parse(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{ErrorCode, ShadowError};

    #[test]
    fn error_codes_are_unique() {
        let codes: HashSet<_> = ErrorCode::all().iter().map(|code| code.as_str()).collect();
        assert_eq!(codes.len(), ErrorCode::all().len());
    }

    #[test]
    fn errors_report_their_code() {
        let error = ShadowError::column_not_found("users", "email");
        assert_eq!(error.code(), ErrorCode::ColumnNotFound);
        assert_eq!(
            error.to_string(),
            "column `email` does not exist in table `users`"
        );
    }
}
