use crate::lexer::{LexError, Lexer, Token};

/// Rewindable cursor over lexed tokens.
///
/// Tokens are scanned on demand and appended to a cache; `pos` indexes into
/// that cache and never exceeds its length. Rewinding only moves `pos`, so a
/// parser can try an alternative and come back without scanning again.
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            tokens: Vec::with_capacity(32),
            pos: 0,
        }
    }

    pub fn source(&self) -> &'a str {
        self.lexer.source()
    }

    /// Return the token at the cursor without consuming it
    pub fn peek(&mut self) -> Result<&Token, LexError> {
        if self.pos == self.tokens.len() {
            let token = self.lexer.next_token()?;
            self.tokens.push(token);
        }
        Ok(&self.tokens[self.pos])
    }

    /// Consume the token at the cursor. The cursor does not move past EOF.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let token = self.peek()?.clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        Ok(token)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to a previously observed position
    pub fn reset_pos(&mut self, pos: usize) {
        debug_assert!(pos <= self.tokens.len(), "rewind past scanned tokens");
        self.pos = pos.min(self.tokens.len());
    }

    /// Consume the remaining tokens, including the trailing EOF
    pub fn read_all(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let eof = token.is_eof();
            tokens.push(token);
            if eof {
                return Ok(tokens);
            }
        }
    }
}
