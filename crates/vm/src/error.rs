//! Runtime errors for the lazyflow VM.
//!
//! Every error raised while executing carries the chunk label and
//! instruction index (`at`) where it happened.

use lazyflow_common::ProgramError;
use std::fmt;
use thiserror::Error;

/// Where an error was raised: a chunk and an instruction index in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Label of the running chunk.
    pub chunk: String,
    /// Index of the failing instruction.
    pub index: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' at instruction {}", self.chunk, self.index)
    }
}

/// Errors that abort an interpretation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// The program could not be linked.
    #[error(transparent)]
    Link(#[from] ProgramError),

    /// `interpret` was called on a VM that already ran.
    #[error("program was already interpreted")]
    AlreadyInterpreted,

    /// No value was left on the stack to hand back.
    #[error("no result on the stack")]
    NoResult,

    /// Pop from an empty operand stack (or below the current frame).
    #[error("stack underflow in {at}")]
    StackUnderflow { at: Location },

    /// `moveback` with nothing moved aside.
    #[error("aside stack underflow in {at}")]
    AsideUnderflow { at: Location },

    /// Operand or aside stack exceeded its limit.
    #[error("stack overflow in {at}")]
    StackOverflow { at: Location },

    /// Too many nested frames.
    #[error("call depth limit exceeded in {at}")]
    FrameOverflow { at: Location },

    /// An operand had the wrong shape. Thunks are never forced implicitly,
    /// so an unevaluated operand lands here too.
    #[error("{op} expected {expected}, found {found} in {at}")]
    TypeMismatch {
        at: Location,
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A number used as an index, count or jump target is not a
    /// non-negative integer.
    #[error("invalid index {value} in {at}")]
    InvalidIndex { at: Location, value: f64 },

    /// `getarg` past the frame's arguments.
    #[error("argument {index} missing in {at}")]
    MissingArgument { at: Location, index: usize },

    /// `getlocal` on a slot that was never set.
    #[error("local {index} unset in {at}")]
    MissingLocal { at: Location, index: usize },

    /// `aget` past the end of an array.
    #[error("index {index} out of bounds (length {length}) in {at}")]
    IndexOutOfBounds {
        at: Location,
        index: usize,
        length: usize,
    },

    /// `oget` with a key the object lacks.
    #[error("missing key '{key}' in {at}")]
    MissingKey { at: Location, key: String },

    /// `ndiv` or `nmod` with a zero divisor.
    #[error("division by zero in {at}")]
    DivisionByZero { at: Location },

    /// A thunk was forced while it was already being forced.
    #[error("thunk forced while being forced in {at}")]
    CyclicThunk { at: Location },

    /// A value that is not a chunk reference was called.
    #[error("cannot call a {found} in {at}")]
    NotCallable { at: Location, found: &'static str },

    /// Execution ran past the last instruction of a chunk.
    #[error("ran past the end of {at}")]
    EndOfChunk { at: Location },
}
