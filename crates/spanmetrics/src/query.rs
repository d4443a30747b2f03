//! Ad-hoc queries
//!
//! Compiles a whole UPQL query, selectors and filters alike, into a SELECT
//! fragment. Metrics only ever use one value and one filter; this is the same
//! pipeline exposed for inspection and fixture tests.

use serde::Serialize;
use upql::Ast;

use crate::cond::compile_where;
use crate::error::Result;
use crate::expr::compile_value;
use crate::resolver::ColumnResolver;
use crate::sql::quote_ident;
use crate::view::Column;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    pub columns: Vec<Column>,
    /// One entry per non-empty `where` part
    pub filters: Vec<String>,
}

impl CompiledQuery {
    /// `SELECT ...` and `WHERE ...` lines; several filters are ANDed
    pub fn to_sql(&self) -> String {
        let mut b = String::new();
        if !self.columns.is_empty() {
            let columns: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
            b.push_str("SELECT ");
            b.push_str(&columns.join(", "));
        }
        if !self.filters.is_empty() {
            if !b.is_empty() {
                b.push('\n');
            }
            b.push_str("WHERE ");
            if self.filters.len() == 1 {
                b.push_str(&self.filters[0]);
            } else {
                let filters: Vec<String> =
                    self.filters.iter().map(|f| format!("({})", f)).collect();
                b.push_str(&filters.join(" AND "));
            }
        }
        b
    }
}

pub fn compile_query(query: &str, resolver: &dyn ColumnResolver) -> Result<CompiledQuery> {
    let mut compiled = CompiledQuery::default();

    for part in upql::parse(query)? {
        match part.ast {
            Ast::Selector(sel) => {
                let expr = compile_value(&sel.expr, resolver)?;
                compiled.columns.push(Column {
                    expr,
                    alias: sel.alias.as_deref().map(quote_ident),
                });
            }
            Ast::Where(w) => {
                let filter = compile_where(&w.conds, resolver)?;
                if !filter.is_empty() {
                    compiled.filters.push(filter);
                }
            }
        }
    }

    Ok(compiled)
}

/// Shorthand for [`compile_query`] followed by [`CompiledQuery::to_sql`]
pub fn query_to_sql(query: &str, resolver: &dyn ColumnResolver) -> Result<String> {
    Ok(compile_query(query, resolver)?.to_sql())
}
