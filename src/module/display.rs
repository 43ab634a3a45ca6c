//! Human-readable rendering of the module IR.
//!
//! Instructions render in their canonical text form; a module renders as an
//! indented listing of functions, signatures, bodies, and exports, which the
//! CLI exposes behind `--dump`.

use super::instruction::{
    ControlInstruction, Instruction, NumericInstruction, ParametricInstruction, VariableInstruction,
};
use super::{Block, Export, Function, Module, Param};
use std::fmt;

impl fmt::Display for NumericInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericInstruction::I32Const(n) => write!(f, "i32.const {n}"),
            NumericInstruction::I32Add => f.write_str("i32.add"),
            NumericInstruction::I32Sub => f.write_str("i32.sub"),
            NumericInstruction::I32Mul => f.write_str("i32.mul"),
            NumericInstruction::I32DivS => f.write_str("i32.div_s"),
            NumericInstruction::I32Eqz => f.write_str("i32.eqz"),
            NumericInstruction::I32Eq => f.write_str("i32.eq"),
            NumericInstruction::I32Ne => f.write_str("i32.ne"),
            NumericInstruction::I32LtS => f.write_str("i32.lt_s"),
            NumericInstruction::I32GtS => f.write_str("i32.gt_s"),
            NumericInstruction::I32LeS => f.write_str("i32.le_s"),
            NumericInstruction::I32GeS => f.write_str("i32.ge_s"),
        }
    }
}

impl fmt::Display for ParametricInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParametricInstruction::Drop => f.write_str("drop"),
        }
    }
}

impl fmt::Display for VariableInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableInstruction::LocalGet(index) => write!(f, "local.get {index}"),
            VariableInstruction::LocalSet(index) => write!(f, "local.set {index}"),
            VariableInstruction::LocalTee(index) => write!(f, "local.tee {index}"),
        }
    }
}

impl fmt::Display for ControlInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlInstruction::Return => f.write_str("return"),
            ControlInstruction::Call(index) => write!(f, "call {index}"),
            ControlInstruction::Block(Some(label)) => write!(f, "block {label}"),
            ControlInstruction::Block(None) => f.write_str("block"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Numeric(i) => i.fmt(f),
            Instruction::Parametric(i) => i.fmt(f),
            Instruction::Variable(i) => i.fmt(f),
            Instruction::Control(i) => i.fmt(f),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => writeln!(f, "Module[{id}]:")?,
            None => writeln!(f, "Module:")?,
        }

        writeln!(f, "  Functions:")?;
        for (ordinal, function) in self.functions.iter().enumerate() {
            write_function(f, function, ordinal)?;
        }

        writeln!(f, "  Exports:")?;
        for export in &self.exports {
            write_export(f, export)?;
        }
        Ok(())
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, function: &Function, ordinal: usize) -> fmt::Result {
    match &function.id {
        Some(id) => writeln!(f, "    Func[{id}]:")?,
        None => writeln!(f, "    Func[{ordinal}]:")?,
    }

    writeln!(f, "      Parameters:")?;
    for (i, param) in function.parameters.iter().enumerate() {
        write_param(f, "Param", param, i)?;
    }

    writeln!(f, "      Results:")?;
    for result in &function.results {
        writeln!(f, "        Result: {result}")?;
    }

    writeln!(f, "      Locals:")?;
    for (i, local) in function.locals.iter().enumerate() {
        write_param(f, "Local", local, function.parameters.len() + i)?;
    }

    writeln!(f, "      Instructions:")?;
    for instruction in &function.instructions {
        writeln!(f, "        {instruction}")?;
    }

    for block in &function.blocks {
        write_block(f, block)?;
    }
    Ok(())
}

fn write_param(f: &mut fmt::Formatter<'_>, kind: &str, param: &Param, ordinal: usize) -> fmt::Result {
    match &param.id {
        Some(id) => writeln!(f, "        {kind}[{id}]: {}", param.ty),
        None => writeln!(f, "        {kind}[{ordinal}]: {}", param.ty),
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
    match &block.label {
        Some(label) => writeln!(f, "      Block[{label}]:")?,
        None => writeln!(f, "      Block:")?,
    }
    for instruction in &block.instructions {
        writeln!(f, "        {instruction}")?;
    }
    Ok(())
}

fn write_export(f: &mut fmt::Formatter<'_>, export: &Export) -> fmt::Result {
    writeln!(
        f,
        "    {:?}: {} {}",
        export.name,
        export.target.keyword(),
        export.index
    )
}

#[cfg(test)]
mod tests {
    use super::super::{Id, Index};
    use super::*;

    #[test]
    fn instructions_render_canonically() {
        let cases: Vec<(Instruction, &str)> = vec![
            (Instruction::Numeric(NumericInstruction::I32Const(-5)), "i32.const -5"),
            (Instruction::Numeric(NumericInstruction::I32DivS), "i32.div_s"),
            (Instruction::Parametric(ParametricInstruction::Drop), "drop"),
            (
                Instruction::Variable(VariableInstruction::LocalGet(Index::Ordinal(3))),
                "local.get 3",
            ),
            (
                Instruction::Variable(VariableInstruction::LocalTee(Index::Name(Id::new("$x").unwrap()))),
                "local.tee $x",
            ),
            (Instruction::Control(ControlInstruction::Return), "return"),
            (
                Instruction::Control(ControlInstruction::Call(Index::Name(Id::new("$f").unwrap()))),
                "call $f",
            ),
            (
                Instruction::Control(ControlInstruction::Block(Id::new("$b"))),
                "block $b",
            ),
            (Instruction::Control(ControlInstruction::Block(None)), "block"),
        ];

        for (instruction, expected) in cases {
            assert_eq!(instruction.to_string(), expected);
        }
    }

    #[test]
    fn module_listing_shape() {
        let module = crate::wat::parse(
            r#"(module $m
                (func $main (param $a i32) (result i32) (local i32)
                    local.get $a
                    (block $b (result i32) i32.const 1))
                (export "main" (func $main)))"#,
        )
        .unwrap();

        let listing = module.to_string();
        assert!(listing.starts_with("Module[$m]:\n"), "{listing}");
        assert!(listing.contains("Func[$main]:"), "{listing}");
        assert!(listing.contains("Param[$a]: i32"), "{listing}");
        assert!(listing.contains("Result: i32"), "{listing}");
        assert!(listing.contains("Local[1]: i32"), "{listing}");
        assert!(listing.contains("block $b"), "{listing}");
        assert!(listing.contains("Block[$b]:"), "{listing}");
        assert!(listing.contains("i32.const 1"), "{listing}");
        assert!(listing.contains("\"main\": func $main"), "{listing}");
    }
}
