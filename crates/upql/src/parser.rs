/// Parser for UPQL
///
/// Splits a query into `|`-separated parts and builds an AST for each part
/// with a recursive-descent parser over a rewindable [`TokenStream`].
use thiserror::Error;

use super::ast::*;
use super::lexer::{tokenize, LexError, Token, TokenKind};
use super::stream::TokenStream;

/// Parser errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),

    #[error("unexpected token {token} at offset {}, expected {expected}", token.start)]
    UnexpectedToken {
        token: Token,
        expected: &'static str,
    },

    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("expression nested deeper than {max} levels at offset {offset}")]
    TooDeep { max: usize, offset: usize },
}

impl ParseError {
    fn unexpected(token: Token, expected: &'static str) -> Self {
        if token.is_eof() {
            ParseError::UnexpectedEof { expected }
        } else {
            ParseError::UnexpectedToken { token, expected }
        }
    }
}

/// Maximum number of nested parentheses in an expression
pub const MAX_NESTING: usize = 128;

/// Parser for a single query part
pub struct Parser<'a> {
    stream: TokenStream<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            stream: tokenize(input, true),
            depth: 0,
        }
    }

    /// Parse the part as a filter or as a comma-separated selector list
    pub fn parse(&mut self) -> Result<Vec<QueryPart>, ParseError> {
        if self.peek()?.is_keyword("where") {
            self.advance()?;
            let conds = self.parse_conds()?;
            self.expect_eof()?;
            return Ok(vec![QueryPart {
                query: self.stream.source().trim().to_string(),
                ast: Ast::Where(Where { conds }),
            }]);
        }

        self.parse_selectors()
    }

    fn parse_selectors(&mut self) -> Result<Vec<QueryPart>, ParseError> {
        let src = self.stream.source();
        let mut parts = Vec::new();
        let mut segment_start = 0;

        loop {
            let selector = self.parse_selector()?;

            let token = self.next()?;
            let segment_end = if token.is_eof() {
                src.len()
            } else if token.is_byte(',') {
                token.start
            } else {
                return Err(ParseError::unexpected(token, "',' or end of query"));
            };

            parts.push(QueryPart {
                query: src[segment_start..segment_end].trim().to_string(),
                ast: Ast::Selector(selector),
            });

            if token.is_eof() {
                return Ok(parts);
            }
            segment_start = token.start + 1;
        }
    }

    fn parse_selector(&mut self) -> Result<Selector, ParseError> {
        let expr = self.parse_expr()?;

        let alias = if self.peek()?.is_keyword("as") {
            self.advance()?;
            Some(self.expect_ident("alias after 'as'")?)
        } else {
            None
        };

        Ok(Selector { expr, alias })
    }

    /// Parse an expression (additive operators, lowest precedence)
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;

        while let Some(op) = self.binary_op(&["+", "-"])? {
            let rhs = self.parse_term()?;
            lhs = Expr::binary(lhs, &op, rhs);
        }

        Ok(lhs)
    }

    /// Parse multiplicative operators
    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_factor()?;

        while let Some(op) = self.binary_op(&["*", "/", "%"])? {
            let rhs = self.parse_factor()?;
            lhs = Expr::binary(lhs, &op, rhs);
        }

        Ok(lhs)
    }

    fn binary_op(&mut self, ops: &[&str]) -> Result<Option<String>, ParseError> {
        let token = self.peek()?;
        if token.kind != TokenKind::Byte || !ops.contains(&token.text.as_str()) {
            return Ok(None);
        }
        let op = token.text.clone();
        self.advance()?;
        Ok(Some(op))
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let token = self.next()?;

        match token.kind {
            TokenKind::Number => Ok(Expr::Number(Number { text: token.text })),
            TokenKind::Value => Ok(Expr::Str(StringLit { text: token.text })),
            TokenKind::Ident => Ok(Expr::Name(self.parse_name(token)?)),
            TokenKind::Byte if token.is_byte('(') => {
                if self.depth >= MAX_NESTING {
                    return Err(ParseError::TooDeep {
                        max: MAX_NESTING,
                        offset: token.start,
                    });
                }
                self.depth += 1;
                let expr = self.parse_expr();
                self.depth -= 1;
                let expr = expr?;
                self.expect_byte(')', "')'")?;
                Ok(Expr::paren(expr))
            }
            TokenKind::Byte if token.is_byte('-') => {
                let text = self.negative_number(&token)?;
                Ok(Expr::Number(Number { text }))
            }
            _ => Err(ParseError::unexpected(token, "expression")),
        }
    }

    /// `-` immediately followed by a number
    fn negative_number(&mut self, minus: &Token) -> Result<String, ParseError> {
        let number = self.next()?;
        if number.kind == TokenKind::Number && number.start == minus.end() {
            Ok(format!("-{}", number.text))
        } else {
            Err(ParseError::unexpected(number, "number after '-'"))
        }
    }

    /// Parse `attr` or `func(attr)` after the leading identifier was consumed
    fn parse_name(&mut self, ident: Token) -> Result<Name, ParseError> {
        let call = self.attempt(|p| {
            if !p.next()?.is_byte('(') {
                return Ok(None);
            }
            let arg = p.next()?;
            if arg.kind != TokenKind::Ident || !p.next()?.is_byte(')') {
                return Ok(None);
            }
            Ok(Some(arg.text))
        })?;

        Ok(match call {
            Some(attr) => Name {
                func: Some(ident.text),
                attr,
            },
            None => Name {
                func: None,
                attr: ident.text,
            },
        })
    }

    /// Parse conditions after the `where` keyword
    fn parse_conds(&mut self) -> Result<Vec<Condition>, ParseError> {
        let mut conds = Vec::new();
        let mut sep = Separator::default();

        loop {
            if self.peek()?.is_keyword("not") {
                self.advance()?;
                sep.negate = true;
            }
            conds.push(self.parse_cond(sep)?);

            let token = self.peek()?;
            let op = if token.is_keyword("and") {
                LogicalOp::And
            } else if token.is_keyword("or") {
                LogicalOp::Or
            } else {
                return Ok(conds);
            };
            self.advance()?;

            sep = Separator { op, negate: false };
        }
    }

    fn parse_cond(&mut self, sep: Separator) -> Result<Condition, ParseError> {
        let token = self.next()?;
        if token.kind != TokenKind::Ident {
            return Err(ParseError::unexpected(token, "attribute name"));
        }
        let left = self.parse_name(token)?;

        let op = self.parse_cond_op()?;

        let right = if !op.needs_value() {
            None
        } else if matches!(op, CondOp::In | CondOp::NotIn) {
            Some(self.parse_value_list()?)
        } else {
            Some(self.parse_value()?)
        };

        Ok(Condition {
            left,
            op,
            right,
            sep,
        })
    }

    fn parse_cond_op(&mut self) -> Result<CondOp, ParseError> {
        let token = self.next()?;

        match token.kind {
            TokenKind::Byte => {
                let op = match token.text.as_str() {
                    "=" => {
                        // `==` is accepted as `=`
                        self.adjacent_byte(&token, '=')?;
                        Some(CondOp::Eq)
                    }
                    "!" => self.adjacent_byte(&token, '=')?.then_some(CondOp::NotEq),
                    "<" if self.adjacent_byte(&token, '=')? => Some(CondOp::Lte),
                    "<" if self.adjacent_byte(&token, '>')? => Some(CondOp::NotEq),
                    "<" => Some(CondOp::Lt),
                    ">" if self.adjacent_byte(&token, '=')? => Some(CondOp::Gte),
                    ">" => Some(CondOp::Gt),
                    _ => None,
                };
                op.ok_or_else(|| ParseError::unexpected(token, "comparison operator"))
            }
            TokenKind::Ident => {
                if let Some(op) = keyword_op(&token.text) {
                    return Ok(op);
                }
                if token.is_keyword("not") {
                    let next = self.next()?;
                    if next.kind == TokenKind::Ident {
                        if let Some(op) = keyword_op(&next.text).and_then(negate_op) {
                            return Ok(op);
                        }
                    }
                    return Err(ParseError::unexpected(
                        next,
                        "'like', 'ilike', 'in', 'contains' or 'exists' after 'not'",
                    ));
                }
                Err(ParseError::unexpected(token, "comparison operator"))
            }
            _ => Err(ParseError::unexpected(token, "comparison operator")),
        }
    }

    fn parse_value_list(&mut self) -> Result<CondValue, ParseError> {
        self.expect_byte('(', "'(' to start a value list")?;

        let mut values = Vec::new();
        loop {
            values.push(self.parse_value()?);

            let token = self.next()?;
            if token.is_byte(')') {
                return Ok(CondValue::List(values));
            }
            if !token.is_byte(',') {
                return Err(ParseError::unexpected(token, "',' or ')' in value list"));
            }
        }
    }

    fn parse_value(&mut self) -> Result<CondValue, ParseError> {
        let token = self.next()?;

        match token.kind {
            TokenKind::Value | TokenKind::Ident => Ok(CondValue::Str(token.text)),
            TokenKind::Number => {
                let duration = self.attempt(|p| p.duration_unit(&token))?;
                Ok(match duration {
                    Some(duration) => CondValue::Duration(duration),
                    None => CondValue::Number(token.text),
                })
            }
            TokenKind::Byte if token.is_byte('-') => {
                Ok(CondValue::Number(self.negative_number(&token)?))
            }
            _ => Err(ParseError::unexpected(token, "value")),
        }
    }

    /// Unit written directly after a number, e.g. `100ms`
    fn duration_unit(&mut self, number: &Token) -> Result<Option<Duration>, ParseError> {
        let unit = self.next()?;
        if unit.kind != TokenKind::Ident || unit.start != number.end() {
            return Ok(None);
        }
        let Some(unit) = DurationUnit::parse(&unit.text) else {
            return Ok(None);
        };
        let Ok(value) = number.text.parse::<f64>() else {
            return Ok(None);
        };
        Ok(Some(Duration { value, unit }))
    }

    // Helper methods

    /// Run `f` and rewind the cursor if it yields no match
    fn attempt<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Option<T>, ParseError>,
    ) -> Result<Option<T>, ParseError> {
        let pos = self.stream.pos();
        let result = f(self)?;
        if result.is_none() {
            self.stream.reset_pos(pos);
        }
        Ok(result)
    }

    /// Consume `c` if it directly follows `prev` with no space in between
    fn adjacent_byte(&mut self, prev: &Token, c: char) -> Result<bool, ParseError> {
        let token = self.peek()?;
        if token.is_byte(c) && token.start == prev.end() {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        Ok(self.stream.peek()?)
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        Ok(self.stream.next_token()?)
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.stream.next_token()?;
        Ok(())
    }

    fn expect_byte(&mut self, c: char, expected: &'static str) -> Result<(), ParseError> {
        let token = self.next()?;
        if token.is_byte(c) {
            Ok(())
        } else {
            Err(ParseError::unexpected(token, expected))
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        let token = self.next()?;
        if token.kind == TokenKind::Ident {
            Ok(token.text)
        } else {
            Err(ParseError::unexpected(token, expected))
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        let token = self.peek()?;
        if token.is_eof() {
            Ok(())
        } else {
            Err(ParseError::unexpected(token.clone(), "end of query"))
        }
    }
}

fn keyword_op(s: &str) -> Option<CondOp> {
    let op = match s.to_ascii_lowercase().as_str() {
        "like" => CondOp::Like,
        "ilike" => CondOp::ILike,
        "in" => CondOp::In,
        "contains" => CondOp::Contains,
        "exists" => CondOp::Exists,
        _ => return None,
    };
    Some(op)
}

fn negate_op(op: CondOp) -> Option<CondOp> {
    let op = match op {
        CondOp::Like => CondOp::NotLike,
        CondOp::ILike => CondOp::NotILike,
        CondOp::In => CondOp::NotIn,
        CondOp::Contains => CondOp::NotContains,
        CondOp::Exists => CondOp::NotExists,
        _ => return None,
    };
    Some(op)
}

/// Split a query on top-level `|` bytes. Quoted values are never split.
pub fn split_query(query: &str) -> Result<Vec<&str>, LexError> {
    let mut stream = tokenize(query, false);
    let mut parts = Vec::new();
    let mut start = 0;

    loop {
        let token = stream.next_token()?;
        if token.is_eof() {
            break;
        }
        if token.is_byte('|') {
            parts.push(&query[start..token.start]);
            start = token.start + 1;
        }
    }
    parts.push(&query[start..]);

    Ok(parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect())
}

/// Parse a UPQL query string into its parts
pub fn parse(query: &str) -> Result<Vec<QueryPart>, ParseError> {
    let mut parts = Vec::new();
    for part in split_query(query)? {
        parts.extend(Parser::new(part).parse()?);
    }
    Ok(parts)
}
