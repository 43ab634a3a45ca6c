//! S-expression reader: token stream -> expression tree.
//!
//! The text format is an s-expression language, and parsing happens in two
//! phases: the lexer produces tokens, this module matches parentheses into a
//! tree, and the lowering walks the tree to build the module. Working on a
//! tree removes lookahead concerns: every construct can see all of its
//! children at once.
//!
//! # Example
//!
//! ```
//! use wasmexec::wat::sexpr::read;
//!
//! let sexpr = read("(module (func $f))").unwrap();
//! let list = sexpr.as_list().unwrap();
//! assert_eq!(list.head_keyword(), Some("module"));
//! assert_eq!(list.len(), 2);
//! ```

use super::error::LexError;
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};
use std::fmt;
use std::iter::Peekable;

// ============================================================================
// Error Type
// ============================================================================

/// An error encountered while reading s-expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    pub message: String,
    pub span: Span,
}

impl ReadError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl std::error::Error for ReadError {}

impl From<LexError> for ReadError {
    fn from(e: LexError) -> Self {
        Self {
            message: e.message,
            span: e.span,
        }
    }
}

// ============================================================================
// Expression Tree
// ============================================================================

/// An s-expression: a single token or a parenthesised list of expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    /// A keyword, identifier, string, or integer.
    Atom(Token),

    /// A parenthesised list; the span covers both parentheses.
    List { span: Span, items: Vec<SExpr> },
}

impl SExpr {
    pub fn span(&self) -> Span {
        match self {
            SExpr::Atom(token) => token.span,
            SExpr::List { span, .. } => *span,
        }
    }

    pub fn as_atom(&self) -> Option<&Token> {
        match self {
            SExpr::Atom(token) => Some(token),
            SExpr::List { .. } => None,
        }
    }

    pub fn as_list(&self) -> Option<SExprList<'_>> {
        match self {
            SExpr::Atom(_) => None,
            SExpr::List { span, items } => Some(SExprList { span: *span, items }),
        }
    }

    /// The keyword text if this is a keyword atom.
    pub fn as_keyword(&self) -> Option<&str> {
        match self.as_atom()?.kind {
            TokenKind::Keyword(ref kw) => Some(kw),
            _ => None,
        }
    }

    /// The identifier text (with sigil) if this is an id atom.
    pub fn as_id(&self) -> Option<&str> {
        match self.as_atom()?.kind {
            TokenKind::Id(ref id) => Some(id),
            _ => None,
        }
    }

    /// The value if this is an integer atom.
    pub fn as_integer(&self) -> Option<i64> {
        match self.as_atom()?.kind {
            TokenKind::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// The resolved text if this is a string atom.
    pub fn as_string(&self) -> Option<&str> {
        match self.as_atom()?.kind {
            TokenKind::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is a list whose head is the given keyword.
    pub fn is_list_headed_by(&self, keyword: &str) -> bool {
        self.as_list()
            .map(|list| list.head_keyword() == Some(keyword))
            .unwrap_or(false)
    }

    /// A short description of the expression's shape, for error messages.
    pub fn describe(&self) -> String {
        match self {
            SExpr::Atom(token) => token.kind.to_string(),
            SExpr::List { .. } => "list".to_string(),
        }
    }
}

// ============================================================================
// List View
// ============================================================================

/// A borrowed view of a list with positional accessors.
///
/// Most constructs have the shape `(keyword arg…)`; this view gives the
/// lowering direct access to the head keyword and the argument tail.
#[derive(Debug, Clone, Copy)]
pub struct SExprList<'a> {
    pub span: Span,
    pub items: &'a [SExpr],
}

impl<'a> SExprList<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a SExpr> {
        self.items.get(index)
    }

    /// The items after the head.
    pub fn tail(&self) -> &'a [SExpr] {
        if self.items.is_empty() {
            &[]
        } else {
            &self.items[1..]
        }
    }

    /// The head keyword, if the first item is a keyword atom.
    pub fn head_keyword(&self) -> Option<&'a str> {
        self.items.first().and_then(|s| s.as_keyword())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reads the single top-level s-expression from `source`.
///
/// # Errors
///
/// Fails on lexical errors, unbalanced parentheses, an empty input, or
/// trailing tokens after the expression.
pub fn read(source: &str) -> Result<SExpr, ReadError> {
    let mut tokens = Lexer::new(source).peekable();
    let sexpr = read_sexpr(&mut tokens)?;

    match tokens.next() {
        Some(Ok(token)) => Err(ReadError::new("unexpected token after expression", token.span)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(sexpr),
    }
}

fn read_sexpr<I>(tokens: &mut Peekable<I>) -> Result<SExpr, ReadError>
where
    I: Iterator<Item = Result<Token, LexError>>,
{
    let token = next_token(tokens)?;

    match token.kind {
        TokenKind::LeftParen => {
            let open = token.span;
            let mut items = Vec::new();

            loop {
                match peek_token(tokens)? {
                    None => return Err(ReadError::new("unclosed parenthesis", open)),
                    Some(Token {
                        kind: TokenKind::RightParen,
                        ..
                    }) => {
                        let close = next_token(tokens)?;
                        let span = Span::new(open.start, close.span.end, open.line, open.column);
                        return Ok(SExpr::List { span, items });
                    }
                    Some(_) => items.push(read_sexpr(tokens)?),
                }
            }
        }
        TokenKind::RightParen => Err(ReadError::new("unexpected ')'", token.span)),
        _ => Ok(SExpr::Atom(token)),
    }
}

fn next_token<I>(tokens: &mut Peekable<I>) -> Result<Token, ReadError>
where
    I: Iterator<Item = Result<Token, LexError>>,
{
    match tokens.next() {
        Some(Ok(token)) => Ok(token),
        Some(Err(e)) => Err(e.into()),
        None => Err(ReadError::new("unexpected end of input", Span::new(0, 0, 1, 1))),
    }
}

fn peek_token<I>(tokens: &mut Peekable<I>) -> Result<Option<&Token>, ReadError>
where
    I: Iterator<Item = Result<Token, LexError>>,
{
    match tokens.peek() {
        Some(Ok(token)) => Ok(Some(token)),
        Some(Err(e)) => Err(ReadError::new(e.message.clone(), e.span)),
        None => Ok(None),
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(token) => write!(f, "{}", token.kind),
            SExpr::List { items, .. } => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_atoms() {
        assert_eq!(read("module").unwrap().as_keyword(), Some("module"));
        assert_eq!(read("$main").unwrap().as_id(), Some("$main"));
        assert_eq!(read("42").unwrap().as_integer(), Some(42));
        assert_eq!(read("\"hi\"").unwrap().as_string(), Some("hi"));
    }

    #[test]
    fn read_empty_list() {
        let sexpr = read("()").unwrap();
        assert!(sexpr.as_list().unwrap().is_empty());
    }

    #[test]
    fn read_nested_lists() {
        let sexpr = read("(module (func) (export \"m\" (func 0)))").unwrap();
        let module = sexpr.as_list().unwrap();
        assert_eq!(module.head_keyword(), Some("module"));
        assert_eq!(module.len(), 3);

        assert!(module.get(1).unwrap().is_list_headed_by("func"));
        assert!(module.get(2).unwrap().is_list_headed_by("export"));
    }

    #[test]
    fn tail_skips_the_head() {
        let sexpr = read("(func $f (param i32) (result i32))").unwrap();
        let list = sexpr.as_list().unwrap();
        assert_eq!(list.tail().len(), 3);
        assert_eq!(list.tail()[0].as_id(), Some("$f"));
    }

    #[test]
    fn list_spans_cover_parens() {
        let sexpr = read("(a (b c))").unwrap();
        let outer = sexpr.as_list().unwrap();
        assert_eq!((outer.span.start, outer.span.end), (0, 9));

        let inner = outer.get(1).unwrap().as_list().unwrap();
        assert_eq!((inner.span.start, inner.span.end), (3, 8));
    }

    #[test]
    fn error_unclosed_paren() {
        let err = read("(module (func)").unwrap_err();
        assert!(err.message.contains("unclosed"));
    }

    #[test]
    fn error_stray_close() {
        let err = read(")").unwrap_err();
        assert!(err.message.contains("unexpected ')'"));
    }

    #[test]
    fn error_trailing_tokens() {
        let err = read("(module) extra").unwrap_err();
        assert!(err.message.contains("after expression"));
    }

    #[test]
    fn error_empty_input() {
        let err = read("").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn lex_errors_propagate() {
        assert!(read("\"unterminated").is_err());
    }

    #[test]
    fn display_reconstructs_structure() {
        let text = "(module (func $f (result i32) i32.const 42))";
        assert_eq!(read(text).unwrap().to_string(), text);
    }
}
