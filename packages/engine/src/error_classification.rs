use crate::ShadowError;

/// True when a backend failure means the statement referenced a table or
/// column the real database does not know.
pub(crate) fn is_missing_relation_error(err: &ShadowError) -> bool {
    let ShadowError::Backend(message) = err else {
        return false;
    };
    let lower = message.to_lowercase();
    lower.contains("unknown column")
        || lower.contains("unknown table")
        || lower.contains("no such table")
        || lower.contains("no such column")
        || (lower.contains("table") && lower.contains("doesn't exist"))
}

/// Pulls the first quoted identifier out of a backend message, e.g.
/// `Unknown column 'email' in 'field list'` yields `email`.
pub(crate) fn missing_identifier(err: &ShadowError) -> Option<String> {
    let ShadowError::Backend(message) = err else {
        return None;
    };
    let start = message.find(['\'', '`'])?;
    let quote = message[start..].chars().next()?;
    let rest = &message[start + 1..];
    let end = rest.find(quote)?;
    let identifier = &rest[..end];
    let identifier = identifier.rsplit('.').next().unwrap_or(identifier);
    (!identifier.is_empty()).then(|| identifier.to_string())
}
