/// Abstract Syntax Tree (AST) definitions for UPQL
///
/// A UPQL query is a `|`-separated list of parts. Each part is either a
/// selector (`p50(span.duration) as p50`) or a filter
/// (`where span.status_code = 'error' or not span.kind = 'server'`).
use std::fmt;

use serde::Serialize;

/// One parsed part of a query together with its source text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPart {
    pub query: String,
    pub ast: Ast,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Ast {
    Selector(Selector),
    Where(Where),
}

/// A top-level value expression with an optional alias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selector {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// Value expressions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Name(Name),
    Number(Number),
    /// Quoted string literal
    Str(StringLit),
    Paren(ParenExpr),
    Binary(BinaryExpr),
}

impl Expr {
    pub fn name(attr: &str) -> Self {
        Expr::Name(Name::attr(attr))
    }

    pub fn number(text: &str) -> Self {
        Expr::Number(Number {
            text: text.to_string(),
        })
    }

    pub fn paren(expr: Expr) -> Self {
        Expr::Paren(ParenExpr {
            expr: Box::new(expr),
        })
    }

    pub fn binary(lhs: Expr, op: &str, rhs: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            lhs: Box::new(lhs),
            op: op.to_string(),
            rhs: Box::new(rhs),
        })
    }

    /// Variant name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Name(_) => "Name",
            Expr::Number(_) => "Number",
            Expr::Str(_) => "StringLit",
            Expr::Paren(_) => "ParenExpr",
            Expr::Binary(_) => "BinaryExpr",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name(name) => write!(f, "{}", name),
            Expr::Number(n) => write!(f, "{}", n.text),
            Expr::Str(s) => write!(f, "'{}'", s.text.replace('\'', "\\'")),
            Expr::Paren(p) => write!(f, "({})", p.expr),
            Expr::Binary(b) => write!(f, "{} {} {}", b.lhs, b.op, b.rhs),
        }
    }
}

/// Attribute reference, optionally wrapped in a function: `span.duration`, `p50(span.duration)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Name {
    pub func: Option<String>,
    pub attr: String,
}

impl Name {
    pub fn attr(attr: &str) -> Self {
        Self {
            func: None,
            attr: attr.to_string(),
        }
    }

    pub fn func(func: &str, attr: &str) -> Self {
        Self {
            func: Some(func.to_string()),
            attr: attr.to_string(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.func {
            Some(func) => write!(f, "{}({})", func, self.attr),
            None => write!(f, "{}", self.attr),
        }
    }
}

/// Numeric literal kept exactly as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Number {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringLit {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParenExpr {
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryExpr {
    pub lhs: Box<Expr>,
    pub op: String,
    pub rhs: Box<Expr>,
}

/// Filter: conditions folded left by their separators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Where {
    pub conds: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub left: Name,
    pub op: CondOp,
    pub right: Option<CondValue>,
    /// How this condition attaches to the conditions before it
    pub sep: Separator,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sep.negate {
            write!(f, "not ")?;
        }
        write!(f, "{} {}", self.left, self.op)?;
        if let Some(right) = &self.right {
            write!(f, " {}", right)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Separator {
    pub op: LogicalOp,
    pub negate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
        }
    }
}

/// Condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CondOp {
    Eq,          // =
    NotEq,       // != or <>
    Lt,          // <
    Lte,         // <=
    Gt,          // >
    Gte,         // >=
    Like,        // like
    NotLike,     // not like
    ILike,       // ilike
    NotILike,    // not ilike
    In,          // in (...)
    NotIn,       // not in (...)
    Contains,    // contains
    NotContains, // not contains
    Exists,      // exists
    NotExists,   // not exists
}

impl CondOp {
    pub fn needs_value(&self) -> bool {
        !matches!(self, CondOp::Exists | CondOp::NotExists)
    }
}

impl fmt::Display for CondOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CondOp::Eq => "=",
            CondOp::NotEq => "!=",
            CondOp::Lt => "<",
            CondOp::Lte => "<=",
            CondOp::Gt => ">",
            CondOp::Gte => ">=",
            CondOp::Like => "like",
            CondOp::NotLike => "not like",
            CondOp::ILike => "ilike",
            CondOp::NotILike => "not ilike",
            CondOp::In => "in",
            CondOp::NotIn => "not in",
            CondOp::Contains => "contains",
            CondOp::NotContains => "not contains",
            CondOp::Exists => "exists",
            CondOp::NotExists => "not exists",
        };
        write!(f, "{}", s)
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CondValue {
    /// Numeric text kept verbatim
    Number(String),
    Duration(Duration),
    /// Quoted value or bare word
    Str(String),
    List(Vec<CondValue>),
}

impl fmt::Display for CondValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CondValue::Number(n) => write!(f, "{}", n),
            CondValue::Duration(d) => write!(f, "{}", d),
            CondValue::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            CondValue::List(values) => {
                write!(f, "(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Duration value with unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Duration {
    pub value: f64,
    pub unit: DurationUnit,
}

impl Duration {
    /// Convert duration to nanoseconds, rounded to the nearest one
    pub fn to_nanos(&self) -> i64 {
        let nanos = match self.unit {
            DurationUnit::Nanoseconds => self.value,
            DurationUnit::Microseconds => self.value * 1_000.0,
            DurationUnit::Milliseconds => self.value * 1_000_000.0,
            DurationUnit::Seconds => self.value * 1_000_000_000.0,
            DurationUnit::Minutes => self.value * 60_000_000_000.0,
            DurationUnit::Hours => self.value * 3_600_000_000_000.0,
        };
        nanos.round() as i64
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Duration units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DurationUnit {
    Nanoseconds,  // ns
    Microseconds, // us
    Milliseconds, // ms
    Seconds,      // s
    Minutes,      // m
    Hours,        // h
}

impl DurationUnit {
    pub fn parse(s: &str) -> Option<Self> {
        let unit = match s {
            "ns" => DurationUnit::Nanoseconds,
            "us" => DurationUnit::Microseconds,
            "ms" => DurationUnit::Milliseconds,
            "s" => DurationUnit::Seconds,
            "m" => DurationUnit::Minutes,
            "h" => DurationUnit::Hours,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationUnit::Nanoseconds => write!(f, "ns"),
            DurationUnit::Microseconds => write!(f, "us"),
            DurationUnit::Milliseconds => write!(f, "ms"),
            DurationUnit::Seconds => write!(f, "s"),
            DurationUnit::Minutes => write!(f, "m"),
            DurationUnit::Hours => write!(f, "h"),
        }
    }
}
