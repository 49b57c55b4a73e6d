//! Optimization errors.
//!
//! A program that fails here was built wrong; the compiler never emits one.

use thiserror::Error;

/// Errors found while optimizing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    /// A label literal names no chunk.
    #[error("chunk '{from}' references unknown chunk '{label}'")]
    DanglingReference { from: String, label: String },

    /// The program has no entry chunk to start from.
    #[error("program has no '{0}' chunk")]
    MissingEntry(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            OptimizeError::DanglingReference {
                from: "document::main".into(),
                label: "const::9".into()
            }
            .to_string(),
            "chunk 'document::main' references unknown chunk 'const::9'"
        );
        assert_eq!(
            OptimizeError::MissingEntry("entry").to_string(),
            "program has no 'entry' chunk"
        );
    }
}
