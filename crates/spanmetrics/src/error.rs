//! Error types for span metric compilation

use thiserror::Error;
use upql::{LexError, ParseError};

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that can occur while compiling a metric definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Malformed quoted literal
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),

    /// Malformed expression or condition
    #[error("parse error: {0}")]
    Parse(ParseError),

    /// Metric value parsed to zero or several expressions
    #[error("can't parse metric value {value:?}: expected one expression, got {parts}")]
    MalformedMetricValue { value: String, parts: usize },

    /// Metric filter did not parse to a single `where` clause
    #[error("can't parse metric where {0:?}")]
    MalformedFilter(String),

    /// AST shape the compiler does not render
    #[error("unsupported span metric expr: {0}")]
    UnsupportedExpression(String),

    /// Column resolver rejected a name
    #[error("can't resolve {name}: {source}")]
    UnresolvedAttribute {
        name: String,
        #[source]
        source: ResolveError,
    },

    /// Filters run before aggregation and can't reference aggregates
    #[error("can't filter by agg column {0:?}")]
    AggregateInFilter(String),

    #[error("unsupported instrument: {0:?}")]
    UnsupportedInstrument(String),

    /// Missing required field
    #[error("invalid metric config: {0}")]
    InvalidMetricConfig(String),

    /// Operator requires a right-hand value but the condition has none
    #[error("condition {0:?} requires a value")]
    MissingConditionValue(String),
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Lex(err) => CompileError::Lex(err),
            err => CompileError::Parse(err),
        }
    }
}

/// Errors reported by a [`ColumnResolver`](crate::resolver::ColumnResolver)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("empty attribute name")]
    EmptyAttribute,

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    /// Function applied to a column that is already an aggregate
    #[error("function {func:?} can't be applied to aggregate {attr:?}")]
    NestedAggregate { func: String, attr: String },
}
