use crate::mutation::ShadowMutation;

/// How a statement is handled by the shadow layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Read,
    WriteSimulated,
    DdlSimulated,
    Forbidden,
    UnknownSchema,
}

impl QueryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::WriteSimulated => "write_simulated",
            Self::DdlSimulated => "ddl_simulated",
            Self::Forbidden => "forbidden",
            Self::UnknownSchema => "unknown_schema",
        }
    }
}

/// A rewritten statement: the SQL to run against the real database and,
/// for simulated writes, the mutation that folds its result rows back into
/// the shadow state.
#[derive(Debug, Clone, PartialEq)]
pub struct RewritePlan {
    pub sql: String,
    pub kind: QueryKind,
    pub mutation: Option<ShadowMutation>,
    pub unknown_identifier: Option<String>,
}

impl RewritePlan {
    pub fn read(sql: impl Into<String>) -> Self {
        Self::plain(sql, QueryKind::Read)
    }

    pub fn write(sql: impl Into<String>, mutation: ShadowMutation) -> Self {
        Self {
            sql: sql.into(),
            kind: QueryKind::WriteSimulated,
            mutation: Some(mutation),
            unknown_identifier: None,
        }
    }

    pub fn ddl(sql: impl Into<String>, mutation: ShadowMutation) -> Self {
        Self {
            sql: sql.into(),
            kind: QueryKind::DdlSimulated,
            mutation: Some(mutation),
            unknown_identifier: None,
        }
    }

    pub fn forbidden(sql: impl Into<String>) -> Self {
        Self::plain(sql, QueryKind::Forbidden)
    }

    pub fn unknown_schema(sql: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            kind: QueryKind::UnknownSchema,
            mutation: None,
            unknown_identifier: Some(identifier.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.kind != QueryKind::Forbidden
    }

    fn plain(sql: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            sql: sql.into(),
            kind,
            mutation: None,
            unknown_identifier: None,
        }
    }
}

/// One plan per statement of a batch, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiRewritePlan {
    pub plans: Vec<RewritePlan>,
}

impl MultiRewritePlan {
    pub fn all_allowed(&self) -> bool {
        self.plans.iter().all(RewritePlan::is_allowed)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RewritePlan> {
        self.plans.iter()
    }
}

impl IntoIterator for MultiRewritePlan {
    type Item = RewritePlan;
    type IntoIter = std::vec::IntoIter<RewritePlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.plans.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{MultiRewritePlan, QueryKind, RewritePlan};
    use crate::mutation::ShadowMutation;

    #[test]
    fn constructors_keep_mutation_and_identifier_exclusive() {
        let write = RewritePlan::write(
            "SELECT 1",
            ShadowMutation::Truncate {
                table: "users".to_string(),
            },
        );
        assert_eq!(write.kind, QueryKind::WriteSimulated);
        assert!(write.mutation.is_some());
        assert!(write.unknown_identifier.is_none());

        let unknown = RewritePlan::unknown_schema("SELECT * FROM ghost", "ghost");
        assert!(unknown.mutation.is_none());
        assert_eq!(unknown.unknown_identifier.as_deref(), Some("ghost"));
    }

    #[test]
    fn all_allowed_is_false_with_any_forbidden_plan() {
        let mut batch = MultiRewritePlan {
            plans: vec![RewritePlan::read("SELECT 1")],
        };
        assert!(batch.all_allowed());
        batch.plans.push(RewritePlan::forbidden("DROP DATABASE app"));
        assert!(!batch.all_allowed());
        assert!(MultiRewritePlan::default().all_allowed());
    }
}
