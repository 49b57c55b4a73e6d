//! lazyflow common types.
//!
//! This crate provides the vocabulary shared by the compiler, optimizer
//! and VM:
//!
//! - [`Opcode`] — the operation set, with co-located mnemonics
//! - [`Instruction`] / [`Literal`] — operations and pushed literals
//! - [`Chunk`] / [`Program`] — labelled, fixed-arity instruction streams
//! - [`Image`] — a linked program with chunks addressed by [`ChunkId`]
//! - [`Value`] / [`Thunk`] — runtime values, including memoizing thunks
//! - [`ChunkBuilder`] — shorthand for emitting instruction streams
//! - [`ProgramError`] — duplicate, dangling and entry errors

pub mod builder;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod value;

// Re-export commonly used types at the crate root.
pub use builder::{ChunkBuilder, JumpLabel};
pub use error::ProgramError;
pub use instruction::{Instruction, Literal};
pub use opcode::Opcode;
pub use program::{Chunk, ChunkId, Code, Image, LinkedChunk, Program, ENTRY_LABEL};
pub use value::{Thunk, Value};
