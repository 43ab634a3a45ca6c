//! Lexer for the WAT subset.
//!
//! Tokenises source text lazily via the `Iterator` trait. The accepted
//! lexical grammar: parentheses, keywords, `$` identifiers, double-quoted
//! strings, signed decimal integers, line comments (`;;`) and nestable block
//! comments (`(; ;)`).
//!
//! # Example
//!
//! ```
//! use wasmexec::wat::{Lexer, TokenKind};
//!
//! let tokens: Vec<_> = Lexer::new("(i32.const -7)").collect::<Result<_, _>>().unwrap();
//! assert!(matches!(tokens[1].kind, TokenKind::Keyword(ref k) if k == "i32.const"));
//! assert!(matches!(tokens[2].kind, TokenKind::Integer(-7)));
//! ```

use super::cursor::{Cursor, Mark};
use super::error::LexError;
use super::token::{Token, TokenKind};

/// The characters allowed in keywords and identifiers.
///
/// This is wider than the identifier grammar on purpose: instruction names
/// need `.`, and identifier validity is checked during lowering where a
/// proper error can be reported.
fn is_idchar(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '/' | ':' | '<' | '=' | '>' | '?' | '@'
                | '\\' | '^' | '_' | '`' | '|' | '~'
        )
}

/// Lexer over WAT source text.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    fn error(&self, message: impl Into<String>, start: Mark) -> LexError {
        LexError::new(message, start.span_to(self.cursor.mark()))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.skip_trivia() {
            return Some(Err(e));
        }
        if self.cursor.is_eof() {
            return None;
        }

        let start = self.cursor.mark();
        let kind = match self.lex_token(start) {
            Ok(kind) => kind,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(Token::new(kind, start.span_to(self.cursor.mark()))))
    }
}

impl<'a> Lexer<'a> {
    fn lex_token(&mut self, start: Mark) -> Result<TokenKind, LexError> {
        match self.cursor.peek().expect("not at eof") {
            '(' => {
                self.cursor.bump();
                Ok(TokenKind::LeftParen)
            }
            ')' => {
                self.cursor.bump();
                Ok(TokenKind::RightParen)
            }
            '"' => {
                let kind = self.lex_string(start)?;
                self.expect_boundary(start)?;
                Ok(kind)
            }
            '$' => {
                self.cursor.bump();
                let name = self.cursor.eat_while(is_idchar);
                if name.is_empty() {
                    return Err(self.error("expected identifier after '$'", start));
                }
                self.expect_boundary(start)?;
                Ok(TokenKind::Id(format!("${name}")))
            }
            c if c.is_ascii_digit() => {
                let kind = self.lex_integer(start)?;
                self.expect_boundary(start)?;
                Ok(kind)
            }
            '+' | '-' if matches!(self.cursor.peek_second(), Some(d) if d.is_ascii_digit()) => {
                let kind = self.lex_integer(start)?;
                self.expect_boundary(start)?;
                Ok(kind)
            }
            c if is_idchar(c) => {
                let word = self.cursor.eat_while(is_idchar);
                Ok(TokenKind::Keyword(word.to_string()))
            }
            c => {
                self.cursor.bump();
                Err(self.error(format!("unexpected character: {c:?}"), start))
            }
        }
    }

    /// Tokens other than parentheses must be separated by whitespace,
    /// parentheses, a comment, or end of input (`1x` and `"a""b"` are
    /// malformed).
    fn expect_boundary(&self, start: Mark) -> Result<(), LexError> {
        match self.cursor.peek() {
            None => Ok(()),
            Some(c) if c.is_ascii_whitespace() => Ok(()),
            Some('(' | ')' | ';') => Ok(()),
            Some(_) => Err(self.error("missing separator between tokens", start)),
        }
    }

    fn lex_integer(&mut self, start: Mark) -> Result<TokenKind, LexError> {
        let negative = match self.cursor.peek() {
            Some('-') => {
                self.cursor.bump();
                true
            }
            Some('+') => {
                self.cursor.bump();
                false
            }
            _ => false,
        };

        let digits = self.cursor.eat_while(|c| c.is_ascii_digit());

        let mut value: i64 = 0;
        for digit in digits.bytes() {
            let digit = i64::from(digit - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
                .ok_or_else(|| self.error("integer literal out of range", start))?;
        }

        Ok(TokenKind::Integer(value))
    }

    fn lex_string(&mut self, start: Mark) -> Result<TokenKind, LexError> {
        // Opening quote.
        self.cursor.bump();

        let mut text = String::new();
        loop {
            match self.cursor.bump() {
                None => return Err(self.error("unterminated string literal", start)),
                Some('"') => break,
                Some('\\') => {
                    let escape_start = self.cursor.mark();
                    match self.cursor.bump() {
                        Some('\\') => text.push('\\'),
                        Some('n') => text.push('\n'),
                        Some('r') => text.push('\r'),
                        Some('t') => text.push('\t'),
                        Some('v') => text.push('\u{0B}'),
                        Some('b') => text.push('\u{08}'),
                        Some('f') => text.push('\u{0C}'),
                        Some('"') => text.push('"'),
                        Some(c) => {
                            return Err(self.error(format!("invalid escape sequence: \\{c}"), escape_start));
                        }
                        None => return Err(self.error("unterminated string literal", start)),
                    }
                }
                Some(c) => text.push(c),
            }
        }

        Ok(TokenKind::String(text))
    }

    /// Skips whitespace and comments; errors on an unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            self.cursor.eat_while(|c| c.is_ascii_whitespace());

            match (self.cursor.peek(), self.cursor.peek_second()) {
                (Some(';'), Some(';')) => {
                    self.cursor.eat_while(|c| c != '\n');
                }
                (Some('('), Some(';')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.cursor.mark();
        self.cursor.bump();
        self.cursor.bump();

        let mut depth = 1u32;
        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (None, _) => return Err(self.error("unterminated block comment", start)),
                (Some('('), Some(';')) => {
                    self.cursor.bump();
                    self.cursor.bump();
                    depth += 1;
                }
                (Some(';'), Some(')')) => {
                    self.cursor.bump();
                    self.cursor.bump();
                    depth -= 1;
                }
                _ => {
                    self.cursor.bump();
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
