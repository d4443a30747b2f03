/// UPQL query language support
///
/// This crate provides the front end for UPQL, the query language used to
/// define metrics over spans.
///
/// # Architecture
///
/// 1. **Lexer** (`lexer.rs`) - Tokenizes UPQL query strings
/// 2. **Token stream** (`stream.rs`) - Caches tokens behind a rewindable cursor
/// 3. **Parser** (`parser.rs`) - Builds an Abstract Syntax Tree (AST) from tokens
/// 4. **AST** (`ast.rs`) - Defines the UPQL AST structures
///
/// # Usage
///
/// ```rust,ignore
/// let parts = upql::parse("p50(span.duration) | where span.system = 'http'")?;
/// assert_eq!(parts.len(), 2);
/// ```
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod stream;

pub use ast::{Ast, Condition, Expr, Name, QueryPart, Selector, Where};
pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse, split_query, ParseError};
pub use stream::TokenStream;
