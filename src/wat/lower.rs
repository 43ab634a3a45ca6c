//! Lowering: s-expression tree -> module IR.
//!
//! Each function here corresponds to one production of the accepted grammar:
//!
//! ```text
//! module  := (module [id] field*)           field := func | export
//! func    := (func [id] param* result* local* instr*)
//! param   := (param [id] type)              local := (local [id] type)
//! result  := (result type)
//! export  := (export "name" (kind index))   kind  := func|table|memory|global
//! instr   := name immediate* | (block [label] param* result* instr*)
//! ```
//!
//! Function signatures are strictly ordered; a `param`, `result`, or `local`
//! list showing up after instruction parsing has begun is rejected. Plain
//! instructions are classified by trying each family in a fixed order
//! (numeric, parametric, variable, control); the matching family consumes
//! exactly the immediates it needs from the flat stream.
//!
//! `(block …)` is the only parenthesised instruction form. Its body is not
//! inlined: the block record lands in the enclosing function's block table
//! and the stream keeps a `block <label>` entry that the interpreter resolves
//! at run time.

use super::sexpr::{self, ReadError, SExpr, SExprList};
use super::token::Span;
use crate::module::{
    Block, ControlInstruction, Export, ExportTarget, Function, Id, Index, Instruction, Module, NumericInstruction,
    Param, ParametricInstruction, ValueType, VariableInstruction,
};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

// ============================================================================
// Error Type
// ============================================================================

/// An error encountered while lowering WAT text to the module IR.
///
/// The variants are the programmatic error kinds; the embedded message and
/// span carry the human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The source failed to lex or the parentheses did not balance.
    Syntax(ReadError),

    /// The tree shape does not match the grammar.
    InvalidModuleFormat { message: String, span: Span },

    /// A module field other than `func` or `export`.
    UnsupportedField { field: String, span: Span },

    /// An instruction name outside the implemented set.
    UnsupportedInstruction { name: String, span: Span },
}

impl ParseError {
    fn format(message: impl Into<String>, span: Span) -> Self {
        ParseError::InvalidModuleFormat {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax(e) => write!(f, "syntax error: {}", e),
            ParseError::InvalidModuleFormat { message, span } => {
                write!(f, "invalid module format: {} at {}", message, span)
            }
            ParseError::UnsupportedField { field, span } => {
                write!(f, "unsupported module field '{}' at {}", field, span)
            }
            ParseError::UnsupportedInstruction { name, span } => {
                write!(f, "unsupported instruction '{}' at {}", name, span)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ReadError> for ParseError {
    fn from(e: ReadError) -> Self {
        ParseError::Syntax(e)
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parses WAT source text into a [`Module`].
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let sexpr = sexpr::read(source)?;
    lower(&sexpr)
}

/// Lowers an already-read s-expression tree into a [`Module`].
pub fn lower(sexpr: &SExpr) -> Result<Module, ParseError> {
    let module = lower_module(sexpr)?;
    debug!(
        id = module.id.as_ref().map(|id| id.as_str()).unwrap_or("<none>"),
        functions = module.functions.len(),
        exports = module.exports.len(),
        "module lowered"
    );
    Ok(module)
}

// ============================================================================
// Module
// ============================================================================

/// `(module [id] field*)`
fn lower_module(sexpr: &SExpr) -> Result<Module, ParseError> {
    let list = sexpr
        .as_list()
        .filter(|l| l.head_keyword() == Some("module"))
        .ok_or_else(|| ParseError::format("expected (module ...)", sexpr.span()))?;

    let mut module = Module::default();
    let mut fields = list.tail();

    // Optional leading id.
    if let Some(first) = fields.first() {
        if first.as_id().is_some() {
            module.id = Some(expect_id(first)?);
            fields = &fields[1..];
        }
    }

    for field in fields {
        let field_list = field
            .as_list()
            .ok_or_else(|| ParseError::format(format!("expected module field, found {}", field.describe()), field.span()))?;

        match field_list.head_keyword() {
            Some("func") => module.functions.push(lower_function(field_list)?),
            Some("export") => module.exports.push(lower_export(field_list)?),
            Some(other) => {
                return Err(ParseError::UnsupportedField {
                    field: other.to_string(),
                    span: field.span(),
                });
            }
            None => return Err(ParseError::format("module field has no keyword head", field.span())),
        }
    }

    Ok(module)
}

// ============================================================================
// Functions
// ============================================================================

/// `(func [id] param* result* local* instr*)`
fn lower_function(list: SExprList<'_>) -> Result<Function, ParseError> {
    let mut items = list.tail();

    let mut function = Function::default();
    if let Some(first) = items.first() {
        if first.as_id().is_some() {
            function.id = Some(expect_id(first)?);
            items = &items[1..];
        }
    }

    // Signature, strictly ordered: param* result* local*.
    let mut cursor = 0;
    while items.get(cursor).is_some_and(|s| s.is_list_headed_by("param")) {
        function.parameters.push(lower_param(items[cursor].as_list().expect("param list"))?);
        cursor += 1;
    }
    while items.get(cursor).is_some_and(|s| s.is_list_headed_by("result")) {
        function.results.push(lower_result(items[cursor].as_list().expect("result list"))?);
        cursor += 1;
    }
    while items.get(cursor).is_some_and(|s| s.is_list_headed_by("local")) {
        function.locals.push(lower_param(items[cursor].as_list().expect("local list"))?);
        cursor += 1;
    }

    check_unique_names(&function.parameters, &function.locals, list.span)?;

    let mut blocks = Vec::new();
    let mut labels = HashSet::new();
    function.instructions = lower_instructions(&items[cursor..], &mut blocks, &mut labels)?;
    function.blocks = blocks;

    Ok(function)
}

/// Parameter and local names share one namespace within a function.
fn check_unique_names(parameters: &[Param], locals: &[Param], span: Span) -> Result<(), ParseError> {
    let mut seen = HashSet::new();
    for param in parameters.iter().chain(locals) {
        if let Some(id) = &param.id {
            if !seen.insert(id.as_str()) {
                return Err(ParseError::format(format!("duplicate local name {}", id), span));
            }
        }
    }
    Ok(())
}

/// `(param [id] type)` and `(local [id] type)` share one shape.
fn lower_param(list: SExprList<'_>) -> Result<Param, ParseError> {
    let mut items = list.tail();

    let mut id = None;
    if items.len() > 1 {
        id = Some(expect_id(&items[0])?);
        items = &items[1..];
    }

    match items {
        [ty] => Ok(Param {
            id,
            ty: expect_type(ty)?,
        }),
        [] => Err(ParseError::format("missing type", list.span)),
        _ => Err(ParseError::format("expected a single type", list.span)),
    }
}

/// `(result type)`
fn lower_result(list: SExprList<'_>) -> Result<ValueType, ParseError> {
    match list.tail() {
        [ty] => expect_type(ty),
        _ => Err(ParseError::format("expected (result type)", list.span)),
    }
}

// ============================================================================
// Exports
// ============================================================================

/// `(export "name" (kind index))`
fn lower_export(list: SExprList<'_>) -> Result<Export, ParseError> {
    let [name, descriptor] = list.tail() else {
        return Err(ParseError::format("expected (export \"name\" (kind index))", list.span));
    };

    let name = name
        .as_string()
        .ok_or_else(|| ParseError::format(format!("export name must be a string, found {}", name.describe()), name.span()))?;

    let descriptor = descriptor
        .as_list()
        .ok_or_else(|| ParseError::format("export descriptor must be a list", descriptor.span()))?;

    let [kind, index] = descriptor.items else {
        return Err(ParseError::format("expected (kind index)", descriptor.span));
    };

    let target = kind
        .as_keyword()
        .and_then(ExportTarget::from_keyword)
        .ok_or_else(|| ParseError::format(format!("unknown export kind {}", kind.describe()), kind.span()))?;

    Ok(Export {
        name: name.to_string(),
        target,
        index: expect_index(index)?,
    })
}

// ============================================================================
// Instructions
// ============================================================================

/// Lowers a flat instruction stream.
///
/// `blocks` and `labels` are function-scoped: nested `(block …)` forms at any
/// depth land in the same table, and label uniqueness is enforced across the
/// whole function.
fn lower_instructions(
    items: &[SExpr],
    blocks: &mut Vec<Block>,
    labels: &mut HashSet<String>,
) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();
    let mut pos = 0;

    while pos < items.len() {
        let item = &items[pos];
        pos += 1;

        if let Some(list) = item.as_list() {
            match list.head_keyword() {
                Some("block") => {
                    let label = lower_block(list, blocks, labels)?;
                    instructions.push(Instruction::Control(ControlInstruction::Block(label)));
                }
                Some("param" | "result" | "local") => {
                    return Err(ParseError::format("signature out of order", item.span()));
                }
                _ => return Err(ParseError::format(format!("expected instruction, found {}", item), item.span())),
            }
            continue;
        }

        let Some(name) = item.as_keyword() else {
            return Err(ParseError::format(
                format!("expected instruction, found {}", item.describe()),
                item.span(),
            ));
        };

        // Families are tried in a fixed order; the first match consumes its
        // immediates from the stream and advances the cursor past them.
        let instruction = if NumericInstruction::recognises(name) {
            Instruction::Numeric(lower_numeric(name, items, &mut pos, item.span())?)
        } else if ParametricInstruction::recognises(name) {
            Instruction::Parametric(ParametricInstruction::Drop)
        } else if VariableInstruction::recognises(name) {
            Instruction::Variable(lower_variable(name, items, &mut pos, item.span())?)
        } else if ControlInstruction::recognises(name) {
            Instruction::Control(lower_control(name, items, &mut pos, item.span())?)
        } else {
            return Err(ParseError::UnsupportedInstruction {
                name: name.to_string(),
                span: item.span(),
            });
        };

        instructions.push(instruction);
    }

    Ok(instructions)
}

fn lower_numeric(
    name: &str,
    items: &[SExpr],
    pos: &mut usize,
    span: Span,
) -> Result<NumericInstruction, ParseError> {
    Ok(match name {
        "i32.const" => {
            let immediate = items
                .get(*pos)
                .and_then(|s| s.as_integer())
                .ok_or_else(|| ParseError::format("i32.const requires an integer immediate", span))?;
            *pos += 1;
            // 64 bits on the wire, narrowed to 32 on use.
            NumericInstruction::I32Const(immediate as i32)
        }
        "i32.add" => NumericInstruction::I32Add,
        "i32.sub" => NumericInstruction::I32Sub,
        "i32.mul" => NumericInstruction::I32Mul,
        "i32.div_s" => NumericInstruction::I32DivS,
        "i32.eqz" => NumericInstruction::I32Eqz,
        "i32.eq" => NumericInstruction::I32Eq,
        "i32.ne" => NumericInstruction::I32Ne,
        "i32.lt_s" => NumericInstruction::I32LtS,
        "i32.gt_s" => NumericInstruction::I32GtS,
        "i32.le_s" => NumericInstruction::I32LeS,
        "i32.ge_s" => NumericInstruction::I32GeS,
        _ => unreachable!("recognised numeric instruction"),
    })
}

fn lower_variable(
    name: &str,
    items: &[SExpr],
    pos: &mut usize,
    span: Span,
) -> Result<VariableInstruction, ParseError> {
    let index = items
        .get(*pos)
        .ok_or_else(|| ParseError::format(format!("{name} requires an index"), span))
        .and_then(expect_index)?;
    *pos += 1;

    Ok(match name {
        "local.get" => VariableInstruction::LocalGet(index),
        "local.set" => VariableInstruction::LocalSet(index),
        "local.tee" => VariableInstruction::LocalTee(index),
        _ => unreachable!("recognised variable instruction"),
    })
}

fn lower_control(
    name: &str,
    items: &[SExpr],
    pos: &mut usize,
    span: Span,
) -> Result<ControlInstruction, ParseError> {
    Ok(match name {
        "return" => ControlInstruction::Return,
        "call" => {
            let index = items
                .get(*pos)
                .ok_or_else(|| ParseError::format("call requires an index", span))
                .and_then(expect_index)?;
            *pos += 1;
            ControlInstruction::Call(index)
        }
        _ => unreachable!("recognised control instruction"),
    })
}

/// `(block [label] param* result* instr*)`
///
/// Appends the block to the function's table and returns its label for the
/// `block` record left in the instruction stream.
fn lower_block(
    list: SExprList<'_>,
    blocks: &mut Vec<Block>,
    labels: &mut HashSet<String>,
) -> Result<Option<Id>, ParseError> {
    let mut items = list.tail();

    let mut label = None;
    if let Some(first) = items.first() {
        if first.as_id().is_some() {
            let id = expect_id(first)?;
            if !labels.insert(id.as_str().to_string()) {
                return Err(ParseError::format(format!("duplicate block label {}", id), first.span()));
            }
            label = Some(id);
            items = &items[1..];
        }
    }

    let mut cursor = 0;
    let mut parameters = Vec::new();
    let mut results = Vec::new();
    while items.get(cursor).is_some_and(|s| s.is_list_headed_by("param")) {
        parameters.push(lower_param(items[cursor].as_list().expect("param list"))?);
        cursor += 1;
    }
    while items.get(cursor).is_some_and(|s| s.is_list_headed_by("result")) {
        results.push(lower_result(items[cursor].as_list().expect("result list"))?);
        cursor += 1;
    }

    let instructions = lower_instructions(&items[cursor..], blocks, labels)?;

    blocks.push(Block {
        label: label.clone(),
        parameters,
        results,
        instructions,
    });

    Ok(label)
}

// ============================================================================
// Leaf Helpers
// ============================================================================

/// An identifier atom, validated against the identifier grammar.
fn expect_id(sexpr: &SExpr) -> Result<Id, ParseError> {
    let text = sexpr
        .as_id()
        .ok_or_else(|| ParseError::format(format!("expected identifier, found {}", sexpr.describe()), sexpr.span()))?;
    Id::new(text).ok_or_else(|| ParseError::format(format!("invalid identifier {text}"), sexpr.span()))
}

/// A type keyword atom.
fn expect_type(sexpr: &SExpr) -> Result<ValueType, ParseError> {
    sexpr
        .as_keyword()
        .and_then(ValueType::from_keyword)
        .ok_or_else(|| ParseError::format(format!("expected value type, found {}", sexpr.describe()), sexpr.span()))
}

/// An index: a non-negative integer ordinal or an identifier.
fn expect_index(sexpr: &SExpr) -> Result<Index, ParseError> {
    if let Some(n) = sexpr.as_integer() {
        let ordinal =
            u32::try_from(n).map_err(|_| ParseError::format(format!("index out of range: {n}"), sexpr.span()))?;
        return Ok(Index::Ordinal(ordinal));
    }
    if sexpr.as_id().is_some() {
        return Ok(Index::Name(expect_id(sexpr)?));
    }
    Err(ParseError::format(format!("expected index, found {}", sexpr.describe()), sexpr.span()))
}

// ============================================================================
// Tests
// ============================================================================
