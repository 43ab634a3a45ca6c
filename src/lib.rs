//! An interpreter for a subset of the WebAssembly text format.
//!
//! wasmexec parses a module written as s-expressions, lowers it to a typed
//! in-memory representation, and interprets exported functions on an operand
//! stack. The implemented surface is the i32 instruction set plus locals,
//! calls, `return`, and labelled blocks; the other numeric types can be
//! declared but not computed with.
//!
//! # Modules
//!
//! - [`wat`] -- Text format front end: lexer, s-expression reader, lowering.
//! - [`module`] -- The typed module representation the lowering produces.
//! - [`runtime`] -- The operand-stack virtual machine.
//!
//! # Example
//!
//! Parse a module, bind a VM to it, and call an exported function:
//!
//! ```
//! use wasmexec::runtime::{Value, Vm};
//! use wasmexec::wat;
//!
//! let module = wat::parse(r#"
//!     (module
//!         (func $add (param $a i32) (param $b i32) (result i32)
//!             local.get $a
//!             local.get $b
//!             i32.add)
//!         (func $main (result i32)
//!             i32.const 40
//!             i32.const 2
//!             call $add)
//!         (export "main" (func $main)))
//! "#).unwrap();
//!
//! let mut vm = Vm::new(&module);
//! let results = vm.exec_func("main", None).unwrap();
//! assert_eq!(results, vec![Value::I32(42)]);
//! ```

pub mod module;
pub mod runtime;
pub mod wat;
