//! The virtual machine: export lookup, the dispatch loop, and frame
//! lifecycle.
//!
//! Execution is a fetch-decode-dispatch loop over the current frame's
//! instruction sequence. Reaching the end of a sequence is the same path as
//! an explicit `return`: the frame is finalised, its declared results are
//! re-pushed for the enclosing frame, and the frame below becomes current.
//! When the outermost frame finalises, the loop exits and the results are
//! marshalled back to the caller in declared order.

use super::context::FrameStack;
use super::stack::{Element, Stack};
use super::{CancelToken, RuntimeError, Value};
use crate::module::{
    ControlInstruction, Export, ExportTarget, Function, Id, Index, Instruction, Module, NumericInstruction, Param,
    ParametricInstruction, ValueType, VariableInstruction,
};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Tunables for a VM instance.
#[derive(Debug, Clone, Copy)]
pub struct VmOptions {
    /// Hard ceiling on the operand stack, in elements.
    pub stack_capacity: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self { stack_capacity: 1024 }
    }
}

/// A virtual machine bound to one module.
///
/// The module is read-only after lowering, so separate VMs over the same
/// module may run on separate threads; a single VM is strictly
/// single-threaded.
pub struct Vm<'m> {
    /// Functions keyed by ordinal and, when named, by identifier — the same
    /// key space [`Index::key`] produces, so either form of reference hits.
    funcs: HashMap<String, &'m Function>,
    exports: HashMap<&'m str, &'m Export>,
    stack: Stack,
    frames: FrameStack<'m>,
}

impl<'m> Vm<'m> {
    /// Creates a VM over `module` with default options.
    pub fn new(module: &'m Module) -> Self {
        Self::with_options(module, VmOptions::default())
    }

    /// Creates a VM over `module` with explicit options.
    pub fn with_options(module: &'m Module, options: VmOptions) -> Self {
        let mut funcs = HashMap::new();
        for (ordinal, func) in module.functions.iter().enumerate() {
            funcs.insert(ordinal.to_string(), func);
            if let Some(id) = &func.id {
                funcs.insert(id.as_str().to_string(), func);
            }
        }

        let mut exports = HashMap::new();
        for export in &module.exports {
            exports.insert(export.name.as_str(), export);
        }

        Vm {
            funcs,
            exports,
            stack: Stack::new(options.stack_capacity),
            frames: FrameStack::new(),
        }
    }

    /// Executes the exported function `name` and returns its results in
    /// declared order.
    ///
    /// `cancel`, when given, is polled once per instruction; a cancelled
    /// token aborts the call with [`RuntimeError::Cancelled`].
    pub fn exec_func(&mut self, name: &str, cancel: Option<&CancelToken>) -> Result<Vec<Value>, RuntimeError> {
        let export = self
            .exports
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::ExportNotFound(name.to_string()))?;

        if export.target != ExportTarget::Func {
            return Err(RuntimeError::ExportTargetNotFunction(name.to_string()));
        }

        let func = self.resolve_function(&export.index)?;
        debug!(export = name, function = %function_name(func), "executing export");

        self.stack.clear();
        self.frames.clear();

        self.push_function_frame(func)?;
        self.run(cancel)?;

        // The outermost finalisation left the declared results on the stack;
        // marshal them out in declared order.
        let mut results = Vec::with_capacity(func.results.len());
        for ty in func.results.iter().rev() {
            results.push(self.stack.pop_typed(*ty)?);
        }
        results.reverse();

        debug!(export = name, results = results.len(), "execution complete");
        Ok(results)
    }

    fn resolve_function(&self, index: &Index) -> Result<&'m Function, RuntimeError> {
        let key = index.key();
        self.funcs
            .get(&key)
            .copied()
            .ok_or(RuntimeError::FunctionNotFound(key))
    }

    // ------------------------------------------------------------------------
    // Dispatch loop
    // ------------------------------------------------------------------------

    fn run(&mut self, cancel: Option<&CancelToken>) -> Result<(), RuntimeError> {
        while !self.frames.is_empty() {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(RuntimeError::Cancelled);
            }

            match self.frames.fetch()? {
                Some(instruction) => self.execute(instruction)?,
                // End of the sequence is an implicit return.
                None => self.finalise_frame()?,
            }
        }
        Ok(())
    }

    fn execute(&mut self, instruction: &'m Instruction) -> Result<(), RuntimeError> {
        trace!(?instruction, stack = self.stack.len(), "execute");

        match instruction {
            Instruction::Numeric(numeric) => self.execute_numeric(*numeric),
            Instruction::Parametric(ParametricInstruction::Drop) => {
                self.stack.pop_value()?;
                Ok(())
            }
            Instruction::Variable(variable) => self.execute_variable(variable),
            Instruction::Control(control) => self.execute_control(control),
        }
    }

    fn execute_numeric(&mut self, instruction: NumericInstruction) -> Result<(), RuntimeError> {
        use NumericInstruction::*;

        let result = match instruction {
            I32Const(immediate) => immediate,
            I32Eqz => {
                let operand = self.stack.pop_i32()?;
                i32::from(operand == 0)
            }
            binary => {
                // Binary operands: the top of stack is the right-hand side.
                let rhs = self.stack.pop_i32()?;
                let lhs = self.stack.pop_i32()?;
                match binary {
                    I32Add => lhs.wrapping_add(rhs),
                    I32Sub => lhs.wrapping_sub(rhs),
                    I32Mul => lhs.wrapping_mul(rhs),
                    I32DivS => {
                        if rhs == 0 {
                            return Err(RuntimeError::IntegerDivideByZero);
                        }
                        if lhs == i32::MIN && rhs == -1 {
                            return Err(RuntimeError::IntegerOverflow);
                        }
                        lhs / rhs
                    }
                    I32Eq => i32::from(lhs == rhs),
                    I32Ne => i32::from(lhs != rhs),
                    I32LtS => i32::from(lhs < rhs),
                    I32GtS => i32::from(lhs > rhs),
                    I32LeS => i32::from(lhs <= rhs),
                    I32GeS => i32::from(lhs >= rhs),
                    I32Const(_) | I32Eqz => unreachable!("handled above"),
                }
            }
        };

        self.stack.push_value(Value::I32(result))
    }

    fn execute_variable(&mut self, instruction: &VariableInstruction) -> Result<(), RuntimeError> {
        match instruction {
            VariableInstruction::LocalGet(index) => {
                let value = self.frames.get_local(index)?;
                self.stack.push_value(value)
            }
            VariableInstruction::LocalSet(index) => {
                let value = self.stack.pop_value()?;
                self.frames.set_local(index, value)
            }
            VariableInstruction::LocalTee(index) => {
                // The value stays on top; only the local is updated.
                let value = self.stack.pop_value()?;
                self.stack.push_value(value)?;
                self.frames.set_local(index, value)
            }
        }
    }

    fn execute_control(&mut self, instruction: &'m ControlInstruction) -> Result<(), RuntimeError> {
        match instruction {
            ControlInstruction::Return => self.finalise_frame(),
            ControlInstruction::Call(index) => {
                let func = self.resolve_function(index)?;
                self.push_function_frame(func)
            }
            ControlInstruction::Block(label) => self.enter_block(label.as_ref()),
        }
    }

    // ------------------------------------------------------------------------
    // Frame lifecycle
    // ------------------------------------------------------------------------

    /// Call entry: marshal arguments, then activate the new frame.
    ///
    /// Parameter values are popped in reverse declaration order (the top of
    /// stack is the last parameter) and stored under their ordinals; declared
    /// locals follow, initialised to their type's default.
    fn push_function_frame(&mut self, func: &'m Function) -> Result<(), RuntimeError> {
        let mut locals = Vec::with_capacity(func.parameters.len() + func.locals.len());
        for param in func.parameters.iter().rev() {
            match param.ty {
                ValueType::I32 => locals.push(self.stack.pop_typed(ValueType::I32)?),
                other => return Err(RuntimeError::UnsupportedType(other.keyword().to_string())),
            }
        }
        locals.reverse();

        for local in &func.locals {
            locals.push(Value::default_for(local.ty));
        }

        trace!(function = %function_name(func), locals = locals.len(), "call");

        let id = self.frames.push_function(func, locals);
        self.stack.push(Element::Activation(id))
    }

    /// Block entry: the block's declared parameters are popped, the
    /// activation element goes down, and the parameters are re-pushed in
    /// original order so the block body sees them on top.
    fn enter_block(&mut self, label: Option<&Id>) -> Result<(), RuntimeError> {
        let label = label.ok_or_else(|| RuntimeError::BlockNotFound("<unlabelled>".to_string()))?;
        let block = self.frames.get_block(label.as_str())?;

        let id = self.frames.push_block(block);
        let parameters: &'m [Param] = self.frames.current().expect("frame just pushed").parameters();

        let mut popped = Vec::with_capacity(parameters.len());
        for param in parameters.iter().rev() {
            popped.push(self.stack.pop_typed(param.ty)?);
        }

        self.stack.push(Element::Activation(id))?;
        for value in popped.iter().rev() {
            self.stack.push_value(*value)?;
        }
        Ok(())
    }

    /// Shared by `return` and running off the end of a sequence.
    ///
    /// Pops the declared results (deepest popped is the first declared),
    /// verifies the activation element is this frame's own, then re-pushes
    /// the results in declared order for the enclosing frame.
    fn finalise_frame(&mut self) -> Result<(), RuntimeError> {
        let frame = self
            .frames
            .current()
            .ok_or_else(|| RuntimeError::StackInconsistent("finalise without a live frame".into()))?;
        let frame_id = frame.id();
        let results = frame.results();

        let mut values = Vec::with_capacity(results.len());
        for ty in results.iter().rev() {
            values.push(self.stack.pop_typed(*ty)?);
        }

        match self.stack.pop()? {
            Element::Activation(id) if id == frame_id => {}
            other => {
                return Err(RuntimeError::StackInconsistent(format!(
                    "expected this frame's activation element, found {other:?}"
                )));
            }
        }

        for value in values.iter().rev() {
            self.stack.push_value(*value)?;
        }

        self.frames.pop();
        Ok(())
    }

    /// Operand stack depth; exposed for host-side integrity checks.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }
}

fn function_name(func: &Function) -> &str {
    func.id.as_ref().map(Id::as_str).unwrap_or("<anonymous>")
}

// ============================================================================
// Tests
// ============================================================================
