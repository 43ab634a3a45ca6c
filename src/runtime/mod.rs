//! Execution engine: values, the operand stack, frames, and the VM.
//!
//! A [`Vm`] binds to one lowered [`Module`](crate::module::Module) and
//! executes exported functions on a bounded operand stack. All errors abort
//! the running call and surface here as [`RuntimeError`].

pub mod cancel;
pub mod context;
pub mod stack;
pub mod value;
pub mod vm;

pub use cancel::CancelToken;
pub use context::{Frame, FrameId, FrameStack};
pub use stack::{Element, Stack};
pub use value::Value;
pub use vm::{Vm, VmOptions};

/// An error raised during execution or VM setup.
///
/// There is no recovery inside the dispatch loop: every variant aborts the
/// call and propagates to the host surface.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("export is not found: {0}")]
    ExportNotFound(String),
    #[error("export target is not a function: {0}")]
    ExportTargetNotFunction(String),
    #[error("function is not found: {0}")]
    FunctionNotFound(String),
    #[error("block is not found: {0}")]
    BlockNotFound(String),
    #[error("stack is inconsistent: {0}")]
    StackInconsistent(String),
    #[error("local variables are inconsistent: {0}")]
    LocalVariableInconsistent(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("execution cancelled")]
    Cancelled,
}
