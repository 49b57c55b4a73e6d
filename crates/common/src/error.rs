//! Errors raised while assembling or linking a program.

use thiserror::Error;

/// Errors from building or linking a [`Program`](crate::Program).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// A chunk with this label was already added.
    #[error("duplicate chunk label '{0}'")]
    DuplicateChunk(String),

    /// A label literal names no chunk in the program.
    #[error("chunk '{from}' references unknown chunk '{label}'")]
    DanglingReference { from: String, label: String },

    /// The program has no entry chunk.
    #[error("program has no '{0}' chunk")]
    MissingEntry(&'static str),

    /// The entry chunk takes arguments.
    #[error("entry chunk must be 0-ary, found {0}-ary")]
    EntryArity(usize),
}
