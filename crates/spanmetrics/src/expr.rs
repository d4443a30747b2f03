/// Expression compiler
///
/// Renders a UPQL value expression as SQL by structural recursion. Names go
/// through the column resolver; numbers, parentheses and operators are kept
/// exactly as the user wrote them.
use upql::{Ast, Expr};

use crate::error::{CompileError, Result};
use crate::resolver::ColumnResolver;
use crate::SPAN_METRIC_MINUTES;

/// Parse and compile a metric value. The value must be exactly one selector
/// without an alias; the view names its value columns itself.
pub fn compile_metric_value(value: &str, resolver: &dyn ColumnResolver) -> Result<String> {
    let mut parts = upql::parse(value)?;
    if parts.len() != 1 {
        return Err(CompileError::MalformedMetricValue {
            value: value.to_string(),
            parts: parts.len(),
        });
    }

    let part = parts.remove(0);
    match part.ast {
        Ast::Selector(sel) => match sel.alias {
            Some(alias) => Err(CompileError::UnsupportedExpression(format!(
                "alias {:?} on metric value {:?}",
                alias, part.query
            ))),
            None => compile_value(&sel.expr, resolver),
        },
        Ast::Where(_) => Err(CompileError::UnsupportedExpression(format!(
            "Where (metric value {:?} is a filter)",
            part.query
        ))),
    }
}

pub fn compile_value(expr: &Expr, resolver: &dyn ColumnResolver) -> Result<String> {
    let mut b = String::new();
    append_expr(&mut b, expr, resolver)?;
    Ok(b)
}

fn append_expr(b: &mut String, expr: &Expr, resolver: &dyn ColumnResolver) -> Result<()> {
    match expr {
        Expr::Name(name) => {
            let column = resolver
                .resolve_column(name, SPAN_METRIC_MINUTES)
                .map_err(|source| CompileError::UnresolvedAttribute {
                    name: name.to_string(),
                    source,
                })?;
            b.push_str(&column);
        }
        Expr::Number(n) => b.push_str(&n.text),
        Expr::Paren(paren) => {
            b.push('(');
            append_expr(b, &paren.expr, resolver)?;
            b.push(')');
        }
        Expr::Binary(bin) => {
            append_expr(b, &bin.lhs, resolver)?;
            b.push(' ');
            b.push_str(&bin.op);
            b.push(' ');
            append_expr(b, &bin.rhs, resolver)?;
        }
        Expr::Str(_) => {
            return Err(CompileError::UnsupportedExpression(expr.kind().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::{IdentityResolver, SpansIndexResolver};
    use upql::Name;

    #[test]
    fn test_number_is_verbatim() {
        for text in ["3.14", "1000", "-0.50"] {
            let sql = compile_value(&Expr::number(text), &IdentityResolver).unwrap();
            assert_eq!(sql, text);
        }
    }

    #[test]
    fn test_parens_are_preserved() {
        let expr = Expr::paren(Expr::binary(Expr::name("a"), "+", Expr::name("b")));
        assert_eq!(compile_value(&expr, &IdentityResolver).unwrap(), "(a + b)");

        let nested = Expr::paren(Expr::paren(Expr::name("a")));
        assert_eq!(compile_value(&nested, &IdentityResolver).unwrap(), "((a))");
    }

    #[test]
    fn test_operator_passthrough() {
        let expr = Expr::binary(Expr::name("a"), "%", Expr::number("7"));
        assert_eq!(compile_value(&expr, &IdentityResolver).unwrap(), "a % 7");
    }

    #[test]
    fn test_idempotent() {
        let expr = Expr::binary(
            Expr::Name(Name::func("p99", "span.duration")),
            "/",
            Expr::paren(Expr::binary(Expr::number("1"), "+", Expr::name("span.count"))),
        );
        let first = compile_value(&expr, &SpansIndexResolver).unwrap();
        let second = compile_value(&expr, &SpansIndexResolver).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "quantileTDigest(0.99)(s.duration) / (1 + count())");
    }

    #[test]
    fn test_string_literal_is_unsupported() {
        let expr = upql::Expr::Str(upql::ast::StringLit {
            text: "x".to_string(),
        });
        assert_eq!(
            compile_value(&expr, &IdentityResolver),
            Err(CompileError::UnsupportedExpression("StringLit".to_string()))
        );
    }

    #[test]
    fn test_unresolved_attribute() {
        let err = compile_metric_value("median(span.duration)", &SpansIndexResolver).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnresolvedAttribute {
                name: "median(span.duration)".to_string(),
                source: ResolveError::UnknownFunction("median".to_string()),
            }
        );
    }

    #[test]
    fn test_metric_value_alias_is_rejected() {
        let err = compile_metric_value("span.duration as d", &SpansIndexResolver).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedExpression(
                "alias \"d\" on metric value \"span.duration as d\"".to_string()
            )
        );
    }

    #[test]
    fn test_metric_value() {
        let sql = compile_metric_value("span.duration / 1000", &SpansIndexResolver).unwrap();
        assert_eq!(sql, "s.duration / 1000");
    }

    #[test]
    fn test_malformed_metric_value() {
        for (value, parts) in [("", 0), ("a, b", 2), ("a | b", 2)] {
            assert_eq!(
                compile_metric_value(value, &IdentityResolver),
                Err(CompileError::MalformedMetricValue {
                    value: value.to_string(),
                    parts,
                })
            );
        }
    }

    #[test]
    fn test_filter_as_value() {
        let err = compile_metric_value("where a = 1", &IdentityResolver).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_lex_error_surfaces() {
        let err = compile_metric_value("'abc", &IdentityResolver).unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }
}
