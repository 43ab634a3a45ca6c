//! Core types shared by the module IR: value types, identifiers, and the
//! ordinal-or-name index used to refer to functions, parameters, and locals.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// ============================================================================
// Value Types
// ============================================================================

/// The numeric value types of the instruction set.
///
/// All four types can be declared in signatures; only `I32` values are
/// produced by the implemented instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// Resolves a type keyword (`i32`, `i64`, `f32`, `f64`).
    ///
    /// Returns `None` for anything else; the caller decides whether an
    /// unresolved type is an error.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "i32" => Some(ValueType::I32),
            "i64" => Some(ValueType::I64),
            "f32" => Some(ValueType::F32),
            "f64" => Some(ValueType::F64),
            _ => None,
        }
    }

    /// The WAT keyword for this type.
    pub fn keyword(self) -> &'static str {
        match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ============================================================================
// Identifiers
// ============================================================================

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[0-9A-Za-z!#$%&'*+\-,/:<=>?@\\^_`|~]+$").expect("id regex"));

/// A symbolic identifier, stored in its source form including the `$` sigil.
///
/// Identifiers name modules, functions, parameters, locals, and block labels.
/// An `Id` is always valid by construction; optional-id positions in the IR
/// use `Option<Id>` rather than an empty sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id(String);

impl Id {
    /// Creates an identifier from its source text (including the `$`).
    ///
    /// Returns `None` when the text does not match the identifier grammar.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if Id::is_valid(&text) {
            Some(Id(text))
        } else {
            None
        }
    }

    /// Whether `text` is a well-formed identifier.
    ///
    /// The empty string is not valid, and neither is a bare `$`.
    pub fn is_valid(text: &str) -> bool {
        ID_PATTERN.is_match(text)
    }

    /// The identifier text, including the leading `$`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Indices
// ============================================================================

/// A reference to an item by ordinal position or by declared identifier.
///
/// Exactly one of the two is carried. Lookup tables are keyed through
/// [`Index::key`], so a table populated under both ordinal and name keys is
/// hit by either form of reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    /// A zero-based position in the declaration order.
    Ordinal(u32),
    /// A declared identifier.
    Name(Id),
}

impl Index {
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Index::Ordinal(_))
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Index::Name(_))
    }

    /// The stable string form used as a map key: decimal digits for an
    /// ordinal, the raw identifier text for a name.
    pub fn key(&self) -> String {
        match self {
            Index::Ordinal(n) => n.to_string(),
            Index::Name(id) => id.as_str().to_string(),
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Ordinal(n) => write!(f, "{}", n),
            Index::Name(id) => write!(f, "{}", id),
        }
    }
}

impl From<u32> for Index {
    fn from(ordinal: u32) -> Self {
        Index::Ordinal(ordinal)
    }
}

impl From<Id> for Index {
    fn from(id: Id) -> Self {
        Index::Name(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
