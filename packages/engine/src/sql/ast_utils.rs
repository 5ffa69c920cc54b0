use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_relations, ObjectName, ObjectNamePart, OrderByExpr, Query, Statement, TableFactor,
    TableWithJoins, Visit, Visitor,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::sql::clauses::{limit_clause, order_by_clause};
use crate::ShadowError;

/// One statement of a batch. MySQL's single-table `UPDATE ... ORDER BY`
/// has no slot for its ordering in the `Update` node, so it rides here.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedStatement {
    pub statement: Statement,
    pub update_order_by: Vec<OrderByExpr>,
}

impl fmt::Display for ParsedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.statement {
            Statement::Update(update) if !self.update_order_by.is_empty() => {
                let mut unlimited = update.clone();
                let limit = unlimited.limit.take();
                write!(
                    f,
                    "{} {}",
                    Statement::Update(unlimited),
                    order_by_clause(&self.update_order_by)
                )?;
                if limit.is_some() {
                    write!(f, " {}", limit_clause(limit.as_ref()))?;
                }
                Ok(())
            }
            statement => write!(f, "{statement}"),
        }
    }
}

pub(crate) fn parse_statements(sql: &str) -> Result<Vec<Statement>, ShadowError> {
    Ok(Parser::parse_sql(&MySqlDialect {}, sql)?)
}

/// Parses a batch statement by statement, accepting `ORDER BY` between an
/// UPDATE's WHERE and LIMIT.
pub(crate) fn parse_batch(sql: &str) -> Result<Vec<ParsedStatement>, ShadowError> {
    let dialect = MySqlDialect {};
    let mut parser = Parser::new(&dialect).try_with_sql(sql)?;
    let mut parsed = Vec::new();
    loop {
        while parser.consume_token(&Token::SemiColon) {}
        if parser.peek_token().token == Token::EOF {
            break;
        }
        let mut statement = parser.parse_statement()?;
        let mut update_order_by = Vec::new();
        if let Statement::Update(update) = &mut statement {
            if update.limit.is_none() && parser.parse_keywords(&[Keyword::ORDER, Keyword::BY]) {
                update_order_by = parser.parse_comma_separated(Parser::parse_order_by_expr)?;
                if parser.parse_keyword(Keyword::LIMIT) {
                    update.limit = Some(parser.parse_expr()?);
                }
            }
        }
        parsed.push(ParsedStatement {
            statement,
            update_order_by,
        });
        let next = parser.peek_token();
        if !matches!(next.token, Token::SemiColon | Token::EOF) {
            parser.expected::<()>("end of statement", next)?;
        }
    }
    Ok(parsed)
}

/// Unquoted table name, ignoring any schema qualifier.
pub(crate) fn object_name_to_table(name: &ObjectName) -> Option<String> {
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
}

pub(crate) fn quote_ident(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// A plain table reference in FROM / JOIN / USING position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// The name the rest of the statement uses to qualify columns.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn answers_to(&self, name: &str) -> bool {
        match &self.alias {
            Some(alias) => alias.eq_ignore_ascii_case(name),
            None => self.table.eq_ignore_ascii_case(name),
        }
    }
}

pub(crate) fn table_ref(relation: &TableFactor) -> Option<TableRef> {
    let TableFactor::Table { name, alias, .. } = relation else {
        return None;
    };
    Some(TableRef {
        table: object_name_to_table(name)?,
        alias: alias.as_ref().map(|alias| alias.name.value.clone()),
    })
}

/// Every plain table reference in the given FROM items, left to right,
/// descending into nested joins.
pub(crate) fn table_refs(tables: &[TableWithJoins]) -> Vec<TableRef> {
    let mut refs = Vec::new();
    for table in tables {
        collect_table_refs(&table.relation, &mut refs);
        for join in &table.joins {
            collect_table_refs(&join.relation, &mut refs);
        }
    }
    refs
}

fn collect_table_refs(relation: &TableFactor, refs: &mut Vec<TableRef>) {
    if let Some(table) = table_ref(relation) {
        refs.push(table);
        return;
    }
    if let TableFactor::NestedJoin {
        table_with_joins, ..
    } = relation
    {
        collect_table_refs(&table_with_joins.relation, refs);
        for join in &table_with_joins.joins {
            collect_table_refs(&join.relation, refs);
        }
    }
}

pub(crate) fn table_has_partitions(tables: &[TableWithJoins]) -> bool {
    tables.iter().any(|table| {
        std::iter::once(&table.relation)
            .chain(table.joins.iter().map(|join| &join.relation))
            .any(|relation| {
                matches!(relation, TableFactor::Table { partitions, .. } if !partitions.is_empty())
            })
    })
}

/// Relation names in source order, excluding names bound by a WITH clause.
pub(crate) fn referenced_tables<V: Visit>(node: &V) -> Vec<String> {
    let cte_names = cte_names(node);
    let mut tables: Vec<String> = Vec::new();
    let _ = visit_relations(node, |name| {
        if let Some(table) = object_name_to_table(name) {
            if !cte_names.contains(&table.to_ascii_lowercase())
                && !tables.iter().any(|known| known == &table)
            {
                tables.push(table);
            }
        }
        ControlFlow::<()>::Continue(())
    });
    tables
}

/// Lower-cased names of every CTE declared anywhere in the node.
pub(crate) fn cte_names<V: Visit>(node: &V) -> BTreeSet<String> {
    let mut visitor = CteNameVisitor {
        names: BTreeSet::new(),
    };
    let _ = node.visit(&mut visitor);
    visitor.names
}

struct CteNameVisitor {
    names: BTreeSet<String>,
}

impl Visitor for CteNameVisitor {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.names.insert(cte.alias.name.value.to_ascii_lowercase());
            }
        }
        ControlFlow::Continue(())
    }
}
