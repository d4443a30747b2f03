/// Lexer for UPQL
///
/// Converts UPQL query strings into typed tokens. The lexer scans bytes left to
/// right and produces one token per call; [`TokenStream`] caches the tokens so
/// the parser can peek and rewind without scanning twice.
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::stream::TokenStream;

/// Token kinds in UPQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Eof,
    /// Single character: punctuation, operators and (optionally) whitespace
    Byte,
    Ident,
    /// Quoted value with the quotes stripped and escapes resolved
    Value,
    Number,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Byte => write!(f, "BYTE"),
            TokenKind::Ident => write!(f, "IDENT"),
            TokenKind::Value => write!(f, "VALUE"),
            TokenKind::Number => write!(f, "NUMBER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset in the source. For values this is the opening quote.
    pub start: usize,
}

impl Token {
    pub fn eof(start: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            start,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is_byte(&self, c: char) -> bool {
        self.kind == TokenKind::Byte && self.text.chars().eq(std::iter::once(c))
    }

    /// Case-insensitive keyword match against an identifier token
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Offset right after the token's raw text. Not meaningful for values.
    pub(crate) fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}({})", self.kind, self.text)
        }
    }
}

/// Lexer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated quoted literal starting at offset {offset}")]
    UnterminatedLiteral { offset: usize },
}

/// Byte scanner for UPQL
pub struct Lexer<'a> {
    src: &'a str,
    offset: usize,
    ignore_spaces: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            ignore_spaces: false,
        }
    }

    /// Skip whitespace instead of returning it as `Byte` tokens
    pub fn ignore_spaces(mut self) -> Self {
        self.ignore_spaces = true;
        self
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    /// Scan the next token. Returns EOF for every call once the input is consumed.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let bytes = self.src.as_bytes();

        loop {
            let Some(&c) = bytes.get(self.offset) else {
                return Ok(Token::eof(self.src.len()));
            };
            let start = self.offset;

            match c {
                b'\'' | b'"' => return self.quoted_value(c),
                b'(' | b')' | b',' => {
                    self.offset += 1;
                    return Ok(self.token(TokenKind::Byte, start));
                }
                b'_' | b'$' => return Ok(self.ident(start)),
                _ => {}
            }

            if self.ignore_spaces && c.is_ascii_whitespace() {
                self.offset += 1;
                continue;
            }

            if c.is_ascii_digit() {
                return Ok(self.number(start));
            }
            if c.is_ascii_alphabetic() {
                return Ok(self.ident(start));
            }

            return Ok(self.char_token(start));
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.src[start..self.offset].to_string(),
            start,
        }
    }

    /// Any other character, including multi-byte UTF-8 sequences
    fn char_token(&mut self, start: usize) -> Token {
        let len = self.src[start..].chars().next().map_or(1, char::len_utf8);
        self.offset = start + len;
        self.token(TokenKind::Byte, start)
    }

    fn quoted_value(&mut self, quote: u8) -> Result<Token, LexError> {
        let start = self.offset;
        let body = &self.src[start + 1..];

        let mut value = String::new();
        let mut chars = body.char_indices();
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' {
                match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                }
                continue;
            }
            if ch == quote as char {
                self.offset = start + 1 + i + 1;
                return Ok(Token {
                    kind: TokenKind::Value,
                    text: value,
                    start,
                });
            }
            value.push(ch);
        }

        Err(LexError::UnterminatedLiteral { offset: start })
    }

    fn number(&mut self, start: usize) -> Token {
        let bytes = self.src.as_bytes();

        self.offset = start;
        self.skip_digits();

        if bytes.get(self.offset) == Some(&b'.')
            && bytes.get(self.offset + 1).is_some_and(u8::is_ascii_digit)
        {
            self.offset += 1;
            self.skip_digits();
        }

        self.token(TokenKind::Number, start)
    }

    fn skip_digits(&mut self) {
        let bytes = self.src.as_bytes();
        while bytes.get(self.offset).is_some_and(u8::is_ascii_digit) {
            self.offset += 1;
        }
    }

    fn ident(&mut self, start: usize) -> Token {
        let bytes = self.src.as_bytes();

        self.offset = start + 1;
        while bytes.get(self.offset).copied().is_some_and(is_ident_char) {
            self.offset += 1;
        }

        self.token(TokenKind::Ident, start)
    }
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

/// Tokenize `source` into a lazily scanned, rewindable token stream
pub fn tokenize(source: &str, ignore_spaces: bool) -> TokenStream<'_> {
    let mut lexer = Lexer::new(source);
    if ignore_spaces {
        lexer = lexer.ignore_spaces();
    }
    TokenStream::new(lexer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lex(input: &str, ignore_spaces: bool) -> Vec<Token> {
        tokenize(input, ignore_spaces).read_all().unwrap()
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_dotted_identifier() {
        let tokens = lex("http.status_code", true);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].text, "http.status_code");
        assert!(tokens[1].is_eof());
    }

    #[test]
    fn test_identifiers_with_leading_underscore_and_dollar() {
        let tokens = lex("_count $var", true);
        assert_eq!(tokens[0].text, "_count");
        assert_eq!(tokens[1].text, "$var");
        assert_eq!(tokens[1].start, 7);
    }

    #[test]
    fn test_quoted_values() {
        for input in ["'abc'", "\"abc\""] {
            let tokens = lex(input, false);
            assert_eq!(kinds(&tokens), vec![TokenKind::Value, TokenKind::Eof]);
            assert_eq!(tokens[0].text, "abc");
        }
    }

    #[test]
    fn test_escaped_quote() {
        let tokens = lex(r#"'it\'s' "say \"hi\"""#, true);
        assert_eq!(tokens[0].text, "it's");
        assert_eq!(tokens[1].text, "say \"hi\"");
    }

    #[test]
    fn test_unterminated_literal() {
        let err = tokenize("x = 'abc", true).read_all().unwrap_err();
        assert_eq!(err, LexError::UnterminatedLiteral { offset: 4 });

        let err = tokenize("'abc\\'", true).read_all().unwrap_err();
        assert_eq!(err, LexError::UnterminatedLiteral { offset: 0 });
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("42 3.14 1.", true);
        assert_eq!(tokens[0].text, "42");
        assert_eq!(tokens[1].text, "3.14");
        assert_eq!(tokens[1].start, 3);
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].text, "1");
        assert!(tokens[3].is_byte('.'));
    }

    #[test]
    fn test_number_followed_by_unit() {
        let tokens = lex("100ms", true);
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Number, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(tokens[1].text, "ms");
        assert_eq!(tokens[1].start, 3);
    }

    #[test]
    fn test_whitespace_handling() {
        let tokens = lex("a = 1", false);
        assert_eq!(tokens.len(), 6);
        assert!(tokens[1].is_byte(' '));

        let tokens = lex("a = 1", true);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Ident,
                TokenKind::Byte,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        let tokens = lex("p50(span.duration), x", true);
        assert!(tokens[1].is_byte('('));
        assert!(tokens[3].is_byte(')'));
        assert!(tokens[4].is_byte(','));
    }

    #[test]
    fn test_multibyte_character() {
        let tokens = lex("a ≥ 1", true);
        assert_eq!(tokens[1].kind, TokenKind::Byte);
        assert_eq!(tokens[1].text, "≥");
        assert_eq!(tokens[2].start, 6);
    }

    #[test]
    fn test_eof_is_repeated() {
        let mut lexer = Lexer::new("");
        assert!(lexer.next_token().unwrap().is_eof());
        assert!(lexer.next_token().unwrap().is_eof());
    }

    #[test]
    fn test_token_display() {
        let tokens = lex("foo", true);
        assert_eq!(tokens[0].to_string(), "IDENT(foo)");
        assert_eq!(tokens[1].to_string(), "EOF");
    }

    proptest! {
        #[test]
        fn prop_identifier_is_one_token(ident in "[A-Za-z][A-Za-z0-9_.]{0,40}") {
            let tokens = lex(&ident, true);
            prop_assert_eq!(tokens.len(), 2);
            prop_assert_eq!(tokens[0].kind, TokenKind::Ident);
            prop_assert_eq!(&tokens[0].text, &ident);
            prop_assert!(tokens[1].is_eof());
        }

        #[test]
        fn prop_quoted_value_is_unquoted(body in "[^'\"\\\\]{0,40}") {
            for quote in ['\'', '"'] {
                let tokens = lex(&format!("{quote}{body}{quote}"), true);
                prop_assert_eq!(tokens.len(), 2);
                prop_assert_eq!(tokens[0].kind, TokenKind::Value);
                prop_assert_eq!(&tokens[0].text, &body);
                prop_assert_eq!(tokens[0].start, 0);
            }
        }
    }
}
