use indexmap::IndexMap;

use crate::sql::quote_ident;
use crate::{Row, ShadowError, Value};

/// Renders the virtual rows of one table as a CTE fragment
/// (`` `t` AS (SELECT ...) ``) so a query can read them in place of the
/// real table.
pub struct CteGenerator;

impl CteGenerator {
    /// Returns `None` when nothing is known about the table (no columns and
    /// no rows); such a table cannot be expressed as a SELECT.
    pub fn generate(
        table: &str,
        rows: &[Row],
        columns: &[String],
        column_types: Option<&IndexMap<String, String>>,
    ) -> Result<Option<String>, ShadowError> {
        let columns: Vec<String> = if columns.is_empty() {
            match rows.first() {
                Some(row) => row.keys().cloned().collect(),
                None => return Ok(None),
            }
        } else {
            columns.to_vec()
        };
        if columns.is_empty() {
            return Ok(None);
        }

        let cast_types: Vec<Option<String>> = columns
            .iter()
            .map(|column| {
                column_types
                    .and_then(|types| declared_type(types, column))
                    .map(cast_type)
            })
            .collect();

        let body = if rows.is_empty() {
            let projection = columns
                .iter()
                .zip(&cast_types)
                .map(|(column, cast)| match cast {
                    Some(cast) => format!("CAST(NULL AS {cast}) AS {}", quote_ident(column)),
                    None => format!("NULL AS {}", quote_ident(column)),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("SELECT {projection} FROM DUAL WHERE 0")
        } else {
            let mut selects = Vec::with_capacity(rows.len());
            for row in rows {
                let mut projection = Vec::with_capacity(columns.len());
                for (column, cast) in columns.iter().zip(&cast_types) {
                    let value = row.get(column).unwrap_or(&Value::Null);
                    let expression = match cast {
                        Some(cast) => format!("CAST({} AS {cast})", value.to_sql_literal()),
                        None => inferred_cast(value)?,
                    };
                    projection.push(format!("{expression} AS {}", quote_ident(column)));
                }
                selects.push(format!("SELECT {}", projection.join(", ")));
            }
            selects.join(" UNION ALL ")
        };

        Ok(Some(format!("{} AS ({body})", quote_ident(table))))
    }
}

fn declared_type<'a>(types: &'a IndexMap<String, String>, column: &str) -> Option<&'a str> {
    types
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, data_type)| data_type.as_str())
}

fn inferred_cast(value: &Value) -> Result<String, ShadowError> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Boolean(_) | Value::Real(_) => Ok(value.to_sql_literal()),
        Value::Integer(_) => Ok(format!("CAST({} AS SIGNED)", value.to_sql_literal())),
        Value::Text(_) => Ok(format!("CAST({} AS CHAR)", value.to_sql_literal())),
        Value::Blob(_) => Err(ShadowError::UnsupportedValue(
            "binary value in a column without a declared type".to_string(),
        )),
    }
}

/// Maps a declared column type to the target type MySQL's CAST accepts.
pub(crate) fn cast_type(declared: &str) -> String {
    let upper = declared.trim().to_ascii_uppercase();
    let base_end = upper
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(upper.len());
    let base = &upper[..base_end];
    let params = type_params(&upper);

    match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "BOOL"
        | "BOOLEAN" | "SERIAL" => "SIGNED".to_string(),
        "DECIMAL" | "NUMERIC" | "DEC" | "FIXED" => match params.as_slice() {
            [] => "DECIMAL(65,30)".to_string(),
            [precision] => format!("DECIMAL({precision},0)"),
            [precision, scale, ..] => format!("DECIMAL({precision},{scale})"),
        },
        "FLOAT" => "FLOAT".to_string(),
        "DOUBLE" | "REAL" => "DOUBLE".to_string(),
        "DATE" | "YEAR" => base.to_string(),
        "DATETIME" | "TIMESTAMP" | "TIME" => match params.first() {
            Some(precision) => format!("{base}({precision})"),
            None => base.to_string(),
        },
        "JSON" => "JSON".to_string(),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            "BINARY".to_string()
        }
        _ => "CHAR".to_string(),
    }
}

fn type_params(declared: &str) -> Vec<String> {
    let Some(open) = declared.find('(') else {
        return Vec::new();
    };
    let Some(close) = declared[open..].find(')') else {
        return Vec::new();
    };
    declared[open + 1..open + close]
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{cast_type, CteGenerator};
    use crate::{row, ShadowError, Value};

    fn types(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(column, data_type)| (column.to_string(), data_type.to_string()))
            .collect()
    }

    #[test]
    fn empty_typed_table_renders_a_null_row_filtered_out() {
        let fragment = CteGenerator::generate(
            "t",
            &[],
            &["id".to_string()],
            Some(&types(&[("id", "INT")])),
        )
        .expect("generate");
        assert_eq!(
            fragment.as_deref(),
            Some("`t` AS (SELECT CAST(NULL AS SIGNED) AS `id` FROM DUAL WHERE 0)")
        );
    }

    #[test]
    fn typed_rows_are_cast_and_unioned() {
        let rows = vec![
            row([("id", Value::Integer(1)), ("name", Value::from("Alice"))]),
            row([("id", Value::Integer(2)), ("name", Value::Null)]),
        ];
        let fragment = CteGenerator::generate(
            "users",
            &rows,
            &["id".to_string(), "name".to_string()],
            Some(&types(&[("id", "BIGINT"), ("name", "VARCHAR(64)")])),
        )
        .expect("generate")
        .expect("fragment");
        assert_eq!(
            fragment,
            "`users` AS (SELECT CAST(1 AS SIGNED) AS `id`, CAST('Alice' AS CHAR) AS `name` \
             UNION ALL SELECT CAST(2 AS SIGNED) AS `id`, CAST(NULL AS CHAR) AS `name`)"
        );
    }

    #[test]
    fn untyped_rows_infer_casts_per_value() {
        let rows = vec![row([
            ("a", Value::Integer(7)),
            ("b", Value::from("x")),
            ("c", Value::Boolean(true)),
            ("d", Value::Real(1.5)),
            ("e", Value::Null),
        ])];
        let fragment = CteGenerator::generate("t", &rows, &[], None)
            .expect("generate")
            .expect("fragment");
        assert_eq!(
            fragment,
            "`t` AS (SELECT CAST(7 AS SIGNED) AS `a`, CAST('x' AS CHAR) AS `b`, TRUE AS `c`, \
             1.5 AS `d`, NULL AS `e`)"
        );
    }

    #[test]
    fn untyped_blob_is_rejected() {
        let rows = vec![row([("data", Value::Blob(vec![1, 2]))])];
        let error = CteGenerator::generate("t", &rows, &[], None).expect_err("blob");
        assert!(matches!(error, ShadowError::UnsupportedValue(_)));
    }

    #[test]
    fn unknown_table_without_rows_is_skipped() {
        assert_eq!(CteGenerator::generate("t", &[], &[], None).expect("generate"), None);
    }

    #[test]
    fn maps_declared_types_to_cast_targets() {
        assert_eq!(cast_type("int(11) unsigned"), "SIGNED");
        assert_eq!(cast_type("TINYINT(1)"), "SIGNED");
        assert_eq!(cast_type("DECIMAL(10, 2)"), "DECIMAL(10,2)");
        assert_eq!(cast_type("NUMERIC(8)"), "DECIMAL(8,0)");
        assert_eq!(cast_type("DECIMAL"), "DECIMAL(65,30)");
        assert_eq!(cast_type("FLOAT"), "FLOAT");
        assert_eq!(cast_type("DOUBLE PRECISION"), "DOUBLE");
        assert_eq!(cast_type("REAL"), "DOUBLE");
        assert_eq!(cast_type("DATETIME(3)"), "DATETIME(3)");
        assert_eq!(cast_type("date"), "DATE");
        assert_eq!(cast_type("JSON"), "JSON");
        assert_eq!(cast_type("VARBINARY(16)"), "BINARY");
        assert_eq!(cast_type("LONGBLOB"), "BINARY");
        assert_eq!(cast_type("VARCHAR(255)"), "CHAR");
        assert_eq!(cast_type("ENUM('a','b')"), "CHAR");
    }
}
