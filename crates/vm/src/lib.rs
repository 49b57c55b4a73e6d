//! lazyflow virtual machine — executes linked lazyflow programs.
//!
//! The VM is a stack machine with:
//! - An operand stack for intermediate values
//! - An aside stack for reaching under operands (`moveaside`/`moveback`)
//! - A frame stack; each frame has its own arguments and local slots
//! - Memoizing thunks, forced only by `evaluate` and `deepevaluate`
//!
//! Primitive operations never force their operands: a thunk where a number
//! is expected is a [`RuntimeError::TypeMismatch`].
//!
//! # Usage
//!
//! ```
//! use lazyflow_common::{Chunk, Instruction, Literal, Opcode, Program, Value};
//! use lazyflow_vm::run;
//!
//! let mut program = Program::new();
//! program.add_chunk("entry", Chunk::new(0, vec![
//!     Instruction::Lit(Literal::Number(2.0)),
//!     Instruction::Lit(Literal::Number(3.0)),
//!     Instruction::Op(Opcode::NAdd),
//!     Instruction::Op(Opcode::Return),
//! ])).unwrap();
//!
//! assert_eq!(run(&program).unwrap(), Value::Number(5.0));
//! ```

pub mod error;
pub mod execute;
pub mod machine;

pub use error::{Location, RuntimeError};
pub use machine::{Stats, Vm, VmOptions, MAX_FRAME_DEPTH, MAX_LOCALS, MAX_STACK_DEPTH};

use lazyflow_common::{Program, Value};

/// Link and execute a program with default options, returning its result.
///
/// # Errors
///
/// Returns [`RuntimeError::Link`] if the program does not link, or the
/// error that aborted execution.
pub fn run(program: &Program) -> Result<Value, RuntimeError> {
    let image = program.link()?;
    let mut vm = Vm::new(&image, VmOptions::default());
    vm.interpret()?;
    vm.pop_result()
}
