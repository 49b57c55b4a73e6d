//! Error types for the lazyflow assembler.

use lazyflow_common::ProgramError;
use thiserror::Error;

/// Errors produced while assembling text into a program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsmError {
    /// An unrecognized opcode mnemonic was encountered.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// A numeric literal could not be parsed.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// A string literal has no closing quote.
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    /// A backslash escape that is not one of `\n \t \r \" \\`.
    #[error("line {line}: invalid escape '\\{escape}'")]
    InvalidEscape { line: usize, escape: char },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    /// A chunk header is not of the form `.label  (N-ary)`.
    #[error("line {line}: malformed chunk header '{text}'")]
    BadHeader { line: usize, text: String },

    /// An instruction appeared before any chunk header.
    #[error("line {line}: instruction outside of a chunk")]
    OutsideChunk { line: usize },

    /// An explicit instruction index disagrees with the instruction's position.
    #[error("line {line}: index {found} does not match position {expected}")]
    IndexMismatch {
        line: usize,
        expected: usize,
        found: f64,
    },

    /// Array and object literals are only rendered as placeholders.
    #[error("line {line}: placeholder '{token}' cannot be assembled")]
    Placeholder { line: usize, token: String },

    /// The assembled chunks do not form a valid program.
    #[error("line {line}: {source}")]
    Program { line: usize, source: ProgramError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unknown_opcode() {
        let e = AsmError::UnknownOpcode {
            line: 3,
            token: "nfoo".to_string(),
        };
        assert_eq!(e.to_string(), "line 3: unknown opcode 'nfoo'");
    }

    #[test]
    fn error_display_invalid_escape() {
        let e = AsmError::InvalidEscape {
            line: 2,
            escape: 'q',
        };
        assert_eq!(e.to_string(), "line 2: invalid escape '\\q'");
    }

    #[test]
    fn error_display_index_mismatch() {
        let e = AsmError::IndexMismatch {
            line: 4,
            expected: 1,
            found: 3.0,
        };
        assert_eq!(e.to_string(), "line 4: index 3 does not match position 1");
    }

    #[test]
    fn error_display_program() {
        let e = AsmError::Program {
            line: 9,
            source: ProgramError::DuplicateChunk("entry".into()),
        };
        assert_eq!(e.to_string(), "line 9: duplicate chunk label 'entry'");
    }

    #[test]
    fn error_clone_and_eq() {
        let e1 = AsmError::OutsideChunk { line: 1 };
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
