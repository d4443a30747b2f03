//! Filter compilation
//!
//! A `where` clause is a flat list of conditions. Each condition carries the
//! logical operator that joins it to the conditions before it, so the SQL is
//! produced by a left fold without re-associating anything.

use upql::ast::{CondOp, CondValue, Condition};
use upql::Ast;

use crate::error::{CompileError, Result};
use crate::resolver::ColumnResolver;
use crate::sql::{append_string, escape_like};
use crate::SPAN_METRIC_MINUTES;

/// Compile the `where` field of a metric. The leading `where` keyword is optional.
/// A blank filter or a bare `where` compiles to an empty string.
pub fn compile_metric_where(filter: &str, resolver: &dyn ColumnResolver) -> Result<String> {
    let filter = filter.trim();
    if filter.is_empty() || filter.eq_ignore_ascii_case("where") {
        return Ok(String::new());
    }
    let query = if has_where_prefix(filter) {
        filter.to_string()
    } else {
        format!("where {}", filter)
    };

    let mut parts = upql::parse(&query)?;
    if parts.len() != 1 {
        return Err(CompileError::MalformedFilter(filter.to_string()));
    }
    match parts.remove(0).ast {
        Ast::Where(w) => compile_where(&w.conds, resolver),
        Ast::Selector(_) => Err(CompileError::MalformedFilter(filter.to_string())),
    }
}

fn has_where_prefix(s: &str) -> bool {
    s.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("where"))
        && s[5..].starts_with(char::is_whitespace)
}

/// Fold conditions into one SQL boolean expression.
/// Returns an empty string when every condition compiles to nothing.
pub fn compile_where(conds: &[Condition], resolver: &dyn ColumnResolver) -> Result<String> {
    let mut b = String::new();

    for cond in conds {
        if resolver.is_aggregate_column(&cond.left) {
            return Err(CompileError::AggregateInFilter(cond.left.to_string()));
        }

        let Some(fragment) = compile_cond(cond, resolver)? else {
            continue;
        };
        if fragment.is_empty() {
            continue;
        }

        if !b.is_empty() {
            b.push(' ');
            b.push_str(&cond.sep.op.to_string());
            b.push(' ');
        }
        if cond.sep.negate {
            b.push_str("NOT ");
        }
        b.push_str(&fragment);
    }

    Ok(b)
}

/// Render a single condition, or `None` when it is trivially true
fn compile_cond(cond: &Condition, resolver: &dyn ColumnResolver) -> Result<Option<String>> {
    let op = match cond.op {
        CondOp::Exists => return Ok(resolver.attribute_exists(&cond.left.attr)),
        CondOp::NotExists => {
            let sql = match resolver.attribute_exists(&cond.left.attr) {
                Some(exists) => format!("NOT ({})", exists),
                None => "0".to_string(),
            };
            return Ok(Some(sql));
        }
        op => op,
    };

    let column = resolver
        .resolve_column(&cond.left, SPAN_METRIC_MINUTES)
        .map_err(|source| CompileError::UnresolvedAttribute {
            name: cond.left.to_string(),
            source,
        })?;
    let value = cond
        .right
        .as_ref()
        .ok_or_else(|| CompileError::MissingConditionValue(cond.to_string()))?;

    let mut b = String::new();
    match op {
        CondOp::In | CondOp::NotIn => {
            b.push_str(&column);
            b.push(' ');
            b.push_str(sql_op(op));
            b.push(' ');
            match value {
                CondValue::List(_) => append_value(&mut b, value),
                scalar => {
                    b.push('(');
                    append_value(&mut b, scalar);
                    b.push(')');
                }
            }
        }
        CondOp::Contains | CondOp::NotContains => {
            let join = if op == CondOp::Contains { " OR " } else { " AND " };
            match value {
                CondValue::List(values) => {
                    b.push('(');
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            b.push_str(join);
                        }
                        append_contains(&mut b, &column, sql_op(op), v);
                    }
                    b.push(')');
                }
                scalar => append_contains(&mut b, &column, sql_op(op), scalar),
            }
        }
        _ => {
            b.push_str(&column);
            b.push(' ');
            b.push_str(sql_op(op));
            b.push(' ');
            append_value(&mut b, value);
        }
    }

    Ok(Some(b))
}

fn sql_op(op: CondOp) -> &'static str {
    match op {
        CondOp::Eq => "=",
        CondOp::NotEq => "!=",
        CondOp::Lt => "<",
        CondOp::Lte => "<=",
        CondOp::Gt => ">",
        CondOp::Gte => ">=",
        CondOp::Like => "LIKE",
        CondOp::NotLike => "NOT LIKE",
        CondOp::ILike | CondOp::Contains => "ILIKE",
        CondOp::NotILike | CondOp::NotContains => "NOT ILIKE",
        CondOp::In => "IN",
        CondOp::NotIn => "NOT IN",
        CondOp::Exists => "EXISTS",
        CondOp::NotExists => "NOT EXISTS",
    }
}

fn append_contains(b: &mut String, column: &str, op: &str, value: &CondValue) {
    b.push_str(column);
    b.push(' ');
    b.push_str(op);
    b.push(' ');
    append_string(b, &format!("%{}%", escape_like(&value_text(value))));
}

/// Unquoted text of a scalar value
fn value_text(value: &CondValue) -> String {
    match value {
        CondValue::Str(s) | CondValue::Number(s) => s.clone(),
        other => other.to_string(),
    }
}

fn append_value(b: &mut String, value: &CondValue) {
    match value {
        CondValue::Number(n) => b.push_str(n),
        CondValue::Duration(d) => b.push_str(&d.to_nanos().to_string()),
        CondValue::Str(s) => append_string(b, s),
        CondValue::List(values) => {
            b.push('(');
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    b.push_str(", ");
                }
                append_value(b, v);
            }
            b.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{IdentityResolver, SpansIndexResolver};
    use upql::ast::{LogicalOp, Separator};
    use upql::Name;

    fn compile(filter: &str) -> Result<String> {
        compile_metric_where(filter, &IdentityResolver)
    }

    #[test]
    fn test_fold_with_negation() {
        assert_eq!(compile("x = 1 or not y = 2").unwrap(), "x = 1 OR NOT y = 2");
        assert_eq!(
            compile("where x = 1 or not y = 2").unwrap(),
            "x = 1 OR NOT y = 2"
        );
        assert_eq!(
            compile("WHERE not a = 'b' and c > 3").unwrap(),
            "NOT a = 'b' AND c > 3"
        );
    }

    #[test]
    fn test_fold_from_ast() {
        let conds = vec![
            Condition {
                left: Name::attr("x"),
                op: CondOp::Eq,
                right: Some(CondValue::Number("1".to_string())),
                sep: Separator::default(),
            },
            Condition {
                left: Name::attr("y"),
                op: CondOp::Eq,
                right: Some(CondValue::Number("2".to_string())),
                sep: Separator {
                    op: LogicalOp::Or,
                    negate: true,
                },
            },
        ];
        assert_eq!(
            compile_where(&conds, &IdentityResolver).unwrap(),
            "x = 1 OR NOT y = 2"
        );
    }

    #[test]
    fn test_empty_filter() {
        for filter in ["", "  ", "where", " WHERE "] {
            assert_eq!(compile(filter).unwrap(), "", "filter: {:?}", filter);
        }
    }

    #[test]
    fn test_duration_is_rounded_to_nanos() {
        assert_eq!(compile("a > 1.001ms").unwrap(), "a > 1001000");
        assert_eq!(compile("a > 1.003ms").unwrap(), "a > 1003000");
        assert_eq!(compile("a < 0.3us").unwrap(), "a < 300");
    }

    #[test]
    fn test_where_prefix_is_a_whole_word() {
        assert_eq!(compile("whereabouts = 1").unwrap(), "whereabouts = 1");
    }

    #[test]
    fn test_operators() {
        let cases = [
            ("a != 'x'", "a != 'x'"),
            ("a <> 'x'", "a != 'x'"),
            ("a <= 5", "a <= 5"),
            ("a like 'GET %'", "a LIKE 'GET %'"),
            ("a not ilike '%x'", "a NOT ILIKE '%x'"),
            ("a in (1, 'b')", "a IN (1, 'b')"),
            ("a not in (x)", "a NOT IN ('x')"),
            ("a contains '50%'", r"a ILIKE '%50\\%%'"),
            ("a not contains foo", "a NOT ILIKE '%foo%'"),
            ("a exists", "a IS NOT NULL"),
            ("a not exists", "NOT (a IS NOT NULL)"),
            ("a > 1.5ms", "a > 1500000"),
            ("a = \"it's\"", r"a = 'it\'s'"),
        ];
        for (filter, sql) in cases {
            assert_eq!(compile(filter).unwrap(), sql, "filter: {}", filter);
        }
    }

    #[test]
    fn test_contains_list() {
        let cond = Condition {
            left: Name::attr("a"),
            op: CondOp::NotContains,
            right: Some(CondValue::List(vec![
                CondValue::Str("x".to_string()),
                CondValue::Number("1".to_string()),
            ])),
            sep: Separator::default(),
        };
        assert_eq!(
            compile_where(&[cond], &IdentityResolver).unwrap(),
            "(a NOT ILIKE '%x%' AND a NOT ILIKE '%1%')"
        );
    }

    #[test]
    fn test_aggregate_rejected_at_any_position() {
        for filter in [
            "p50(span.duration) > 1",
            "a = 1 and sum(b) > 1",
            "a = 1 or b = 2 or not max(c) = 3",
        ] {
            assert!(
                matches!(compile(filter), Err(CompileError::AggregateInFilter(_))),
                "filter: {}",
                filter
            );
        }
    }

    #[test]
    fn test_synthetic_aggregate_rejected() {
        let err = compile_metric_where("span.count > 10", &SpansIndexResolver).unwrap_err();
        assert_eq!(err, CompileError::AggregateInFilter("span.count".to_string()));
    }

    #[test]
    fn test_exists_on_dedicated_column() {
        let r = SpansIndexResolver;
        assert_eq!(compile_metric_where("span.kind exists", &r).unwrap(), "");
        assert_eq!(
            compile_metric_where("span.kind exists and span.system = 'http'", &r).unwrap(),
            "s.system = 'http'"
        );
        assert_eq!(
            compile_metric_where("span.kind not exists", &r).unwrap(),
            "0"
        );
        assert_eq!(
            compile_metric_where("db.system exists", &r).unwrap(),
            "has(s.attr_keys, 'db.system')"
        );
    }

    #[test]
    fn test_spans_index_columns() {
        let sql = compile_metric_where(
            "span.system = 'db:postgresql' and db.statement contains 'select'",
            &SpansIndexResolver,
        )
        .unwrap();
        assert_eq!(
            sql,
            "s.system = 'db:postgresql' AND s.attr_values[indexOf(s.attr_keys, 'db.statement')] ILIKE '%select%'"
        );
    }

    #[test]
    fn test_missing_value() {
        let cond = Condition {
            left: Name::attr("x"),
            op: CondOp::Eq,
            right: None,
            sep: Separator::default(),
        };
        assert_eq!(
            compile_where(&[cond], &IdentityResolver),
            Err(CompileError::MissingConditionValue("x =".to_string()))
        );
    }

    #[test]
    fn test_malformed_filter() {
        assert_eq!(
            compile("a = 1 | where b = 2"),
            Err(CompileError::MalformedFilter("a = 1 | where b = 2".to_string()))
        );
        assert!(matches!(compile("a ="), Err(CompileError::Parse(_))));
        assert!(matches!(compile("a = 'x"), Err(CompileError::Lex(_))));
    }
}
