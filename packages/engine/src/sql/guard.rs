use sqlparser::ast::{ObjectType, Query, SetExpr, Statement};

use crate::sql::QueryKind;

/// Classifies statements by how the shadow layer may handle them.
pub struct QueryGuard;

impl QueryGuard {
    pub fn classify(statement: &Statement) -> QueryKind {
        match statement {
            Statement::Query(query) => classify_query(query),
            Statement::Insert(_)
            | Statement::Update(_)
            | Statement::Delete(_)
            | Statement::Truncate(_) => QueryKind::WriteSimulated,
            Statement::CreateTable(_)
            | Statement::AlterTable(_)
            | Statement::Drop {
                object_type: ObjectType::Table,
                ..
            } => QueryKind::DdlSimulated,
            _ => QueryKind::Forbidden,
        }
    }
}

fn classify_query(query: &Query) -> QueryKind {
    let mut kind = classify_set_expr(&query.body);
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            kind = combine(kind, classify_query(&cte.query));
        }
    }
    kind
}

fn classify_set_expr(body: &SetExpr) -> QueryKind {
    match body {
        SetExpr::Select(select) if select.into.is_some() => QueryKind::Forbidden,
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => QueryKind::Read,
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            combine(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Insert(statement) | SetExpr::Update(statement) | SetExpr::Delete(statement) => {
            match QueryGuard::classify(statement) {
                QueryKind::Forbidden => QueryKind::Forbidden,
                _ => QueryKind::WriteSimulated,
            }
        }
        _ => QueryKind::Forbidden,
    }
}

/// Forbidden dominates, then writes; anything else reads.
fn combine(left: QueryKind, right: QueryKind) -> QueryKind {
    use QueryKind::{Forbidden, Read, WriteSimulated};
    match (left, right) {
        (Forbidden, _) | (_, Forbidden) => Forbidden,
        (WriteSimulated, _) | (_, WriteSimulated) => WriteSimulated,
        _ => Read,
    }
}

#[cfg(test)]
mod tests {
    use super::QueryGuard;
    use crate::sql::ast_utils::parse_statements;
    use crate::sql::QueryKind;

    fn classify(sql: &str) -> QueryKind {
        let statements = parse_statements(sql).expect("parse SQL");
        assert_eq!(statements.len(), 1, "{sql}");
        QueryGuard::classify(&statements[0])
    }

    #[test]
    fn selects_are_reads() {
        assert_eq!(classify("SELECT * FROM users WHERE id = 1"), QueryKind::Read);
        assert_eq!(
            classify("SELECT id FROM a UNION ALL SELECT id FROM b"),
            QueryKind::Read
        );
        assert_eq!(
            classify("WITH x AS (SELECT 1 AS a) SELECT a FROM x"),
            QueryKind::Read
        );
    }

    #[test]
    fn select_into_is_forbidden() {
        assert_eq!(
            classify("SELECT * INTO OUTFILE '/tmp/users.csv' FROM users"),
            QueryKind::Forbidden
        );
    }

    #[test]
    fn dml_is_simulated() {
        for sql in [
            "INSERT INTO users (id) VALUES (1)",
            "REPLACE INTO users (id) VALUES (1)",
            "UPDATE users SET name = 'x' WHERE id = 1",
            "DELETE FROM users WHERE id = 1",
            "TRUNCATE TABLE users",
        ] {
            assert_eq!(classify(sql), QueryKind::WriteSimulated, "{sql}");
        }
    }

    #[test]
    fn only_table_ddl_is_simulated() {
        assert_eq!(classify("CREATE TABLE t (id INT)"), QueryKind::DdlSimulated);
        assert_eq!(classify("ALTER TABLE t ADD COLUMN c INT"), QueryKind::DdlSimulated);
        assert_eq!(classify("DROP TABLE t"), QueryKind::DdlSimulated);
        assert_eq!(
            classify("CREATE OR REPLACE VIEW v AS SELECT 1"),
            QueryKind::Forbidden
        );
        assert_eq!(classify("DROP DATABASE app"), QueryKind::Forbidden);
        assert_eq!(classify("CREATE INDEX idx ON t (id)"), QueryKind::Forbidden);
        assert_eq!(classify("DROP VIEW v"), QueryKind::Forbidden);
    }

    #[test]
    fn session_and_admin_statements_are_forbidden() {
        assert_eq!(classify("SET autocommit = 0"), QueryKind::Forbidden);
        assert_eq!(classify("USE app"), QueryKind::Forbidden);
    }
}
