use indexmap::IndexMap;

/// A single column value as handed back by the real database or produced
/// by the shadow layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One row, keyed by column name in result order.
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub affected_rows: usize,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coercive equality used for key matching: `1`, `1.0`, `"1"` and
    /// `true` all compare equal, and NULL only equals NULL.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(left), Value::Integer(right)) => left == right,
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::Blob(left), Value::Blob(right)) => left == right,
            _ => match (self.as_number(), other.as_number()) {
                (Some(left), Some(right)) => left == right,
                _ => self.as_text() == other.as_text(),
            },
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Boolean(value) => Some(if *value { 1.0 } else { 0.0 }),
            Value::Integer(value) => Some(*value as f64),
            Value::Real(value) => Some(*value),
            Value::Text(value) => value.trim().parse::<f64>().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Boolean(value) => Some(if *value { "1" } else { "0" }.to_string()),
            Value::Integer(value) => Some(value.to_string()),
            Value::Real(value) => Some(value.to_string()),
            Value::Text(value) => Some(value.clone()),
            Value::Blob(value) => Some(String::from_utf8_lossy(value).into_owned()),
        }
    }

    /// Renders the value as a MySQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Real(value) => render_real(*value),
            Value::Text(value) => quote_string(value),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

pub(crate) fn quote_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "''");
    format!("'{escaped}'")
}

fn render_real(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Builds a [`Row`] from `(column, value)` pairs.
pub fn row<K, V, I>(pairs: I) -> Row
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// True when both rows agree on every key column, or on every column when
/// `keys` is empty.
pub(crate) fn rows_match(left: &Row, right: &Row, keys: &[String]) -> bool {
    if keys.is_empty() {
        return left.len() == right.len()
            && left.iter().all(|(column, value)| {
                right
                    .get(column)
                    .is_some_and(|other| value.loosely_equals(other))
            });
    }
    keys.iter().all(|key| {
        let left = left.get(key).unwrap_or(&Value::Null);
        let right = right.get(key).unwrap_or(&Value::Null);
        left.loosely_equals(right)
    })
}

#[cfg(test)]
mod tests {
    use super::{row, rows_match, Value};

    #[test]
    fn loose_equality_coerces_numbers_and_text() {
        assert!(Value::Integer(1).loosely_equals(&Value::Text("1".to_string())));
        assert!(Value::Real(2.0).loosely_equals(&Value::Integer(2)));
        assert!(Value::Boolean(true).loosely_equals(&Value::Integer(1)));
        assert!(Value::Null.loosely_equals(&Value::Null));
        assert!(!Value::Null.loosely_equals(&Value::Integer(0)));
        assert!(!Value::Text("a".to_string()).loosely_equals(&Value::Text("b".to_string())));
    }

    #[test]
    fn literals_escape_quotes_and_backslashes() {
        assert_eq!(Value::from("O'Neil").to_sql_literal(), "'O''Neil'");
        assert_eq!(Value::from("a\\b").to_sql_literal(), "'a\\\\b'");
        assert_eq!(Value::Real(1.0).to_sql_literal(), "1.0");
        assert_eq!(Value::Real(1.25).to_sql_literal(), "1.25");
        assert_eq!(Value::Blob(vec![0xAB, 0x01]).to_sql_literal(), "X'AB01'");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
    }

    #[test]
    fn rows_match_on_keys_or_whole_row() {
        let stored = row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]);
        let lookup = row([("id", Value::from("1")), ("name", Value::from("Other"))]);
        assert!(rows_match(&stored, &lookup, &["id".to_string()]));
        assert!(!rows_match(&stored, &lookup, &[]));
        let same = row([("name", Value::from("Alice")), ("id", Value::Integer(1))]);
        assert!(rows_match(&stored, &same, &[]));
    }

    #[test]
    fn values_deserialize_untagged() {
        let value: Value = serde_json::from_str("42").expect("integer");
        assert_eq!(value, Value::Integer(42));
        let value: Value = serde_json::from_str("\"x\"").expect("text");
        assert_eq!(value, Value::Text("x".to_string()));
        let value: Value = serde_json::from_str("null").expect("null");
        assert_eq!(value, Value::Null);
    }
}
