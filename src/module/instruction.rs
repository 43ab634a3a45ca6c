//! Instruction records of the module IR.
//!
//! Instructions are grouped into the four families the text grammar
//! distinguishes: numeric (the i32 set), parametric, variable access, and
//! control. The lowerer classifies a name by trying the families in that
//! order; keeping the split in the IR keeps that correspondence visible.

use super::types::{Id, Index};

/// A single instruction in a function or block body.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Numeric(NumericInstruction),
    Parametric(ParametricInstruction),
    Variable(VariableInstruction),
    Control(ControlInstruction),
}

/// The i32 numeric instructions.
///
/// `I32Const` is the only one carrying an immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericInstruction {
    I32Const(i32),
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32GtS,
    I32LeS,
    I32GeS,
}

impl NumericInstruction {
    /// Whether `name` belongs to the numeric family.
    pub fn recognises(name: &str) -> bool {
        matches!(
            name,
            "i32.const"
                | "i32.add"
                | "i32.sub"
                | "i32.mul"
                | "i32.div_s"
                | "i32.eqz"
                | "i32.eq"
                | "i32.ne"
                | "i32.lt_s"
                | "i32.gt_s"
                | "i32.le_s"
                | "i32.ge_s"
        )
    }
}

/// Parametric instructions operate on the stack without further operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParametricInstruction {
    Drop,
}

impl ParametricInstruction {
    pub fn recognises(name: &str) -> bool {
        name == "drop"
    }
}

/// Local variable access. Each carries the ordinal-or-name index of the
/// parameter or local it targets.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableInstruction {
    LocalGet(Index),
    LocalSet(Index),
    LocalTee(Index),
}

impl VariableInstruction {
    pub fn recognises(name: &str) -> bool {
        matches!(name, "local.get" | "local.set" | "local.tee")
    }
}

/// Control instructions.
///
/// `Block` names an entry in the enclosing function's block table; a block
/// lowered without a label carries `None` and can never be entered.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInstruction {
    Return,
    Call(Index),
    Block(Option<Id>),
}

impl ControlInstruction {
    pub fn recognises(name: &str) -> bool {
        matches!(name, "return" | "call")
    }
}
