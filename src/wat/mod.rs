//! WebAssembly Text Format support for the accepted subset.
//!
//! Parsing is staged: the [`Lexer`] tokenises source text, [`sexpr::read`]
//! matches parentheses into a tree, and [`lower::lower`] walks the tree to
//! build the module IR. [`parse`] runs all three.
//!
//! # Example
//!
//! ```
//! use wasmexec::wat;
//!
//! let module = wat::parse(r#"
//!     (module
//!         (func $answer (result i32) i32.const 42)
//!         (export "answer" (func $answer)))
//! "#).unwrap();
//!
//! assert_eq!(module.functions.len(), 1);
//! assert_eq!(module.exports[0].name, "answer");
//! ```

mod cursor;
mod error;
mod lexer;
pub mod lower;
pub mod sexpr;
mod token;

pub use error::LexError;
pub use lexer::Lexer;
pub use lower::{parse, ParseError};
pub use sexpr::{ReadError, SExpr, SExprList};
pub use token::{Span, Token, TokenKind};
