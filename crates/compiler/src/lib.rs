//! lazyflow compiler: lowers dataflow documents to chunked bytecode.
//!
//! A document is a set of flows. Each flow becomes one chunk; each used
//! node in it becomes a deferred call whose thunk is kept in a local slot,
//! so a node runs only if something forces its value, and at most once.
//!
//! Routines come from [`RoutineSource`]s: the [`StandardLibrary`], the
//! document's own flows ([`DocumentRoutines`]) and the compiler's
//! [`CompilerHelpers`]. The output still contains every chunk those
//! sources provide; the optimizer drops the ones nothing reaches.
//!
//! # Usage
//!
//! ```
//! use lazyflow_compiler::{compile, CompileOptions, DocumentContext};
//!
//! let document = DocumentContext::from_json(r#"{
//!   "mainFlow": "main",
//!   "flows": [{
//!     "id": "main",
//!     "nodes": [{
//!       "id": "sum",
//!       "routine": "standard::add",
//!       "rows": [
//!         { "id": "a", "binding": { "kind": "initializer", "value": 2 } },
//!         { "id": "b", "binding": { "kind": "initializer", "value": 3 } }
//!       ]
//!     }],
//!     "sortedUsedNodes": ["sum"]
//!   }]
//! }"#).unwrap();
//!
//! let program = compile(&document, &CompileOptions::default()).unwrap();
//! assert!(program.contains("document::main"));
//! assert!(program.contains("entry"));
//! ```

pub mod constants;
pub mod document;
pub mod error;
pub mod flows;
pub mod helpers;
pub mod lower;
pub mod source;
pub mod standard;
pub mod validate;

pub use document::{Connection, DocumentContext, Element, Flow, InputRow, Node, RowBinding};
pub use error::{CompileError, ValidationError};
pub use flows::{flow_label, DocumentRoutines};
pub use helpers::CompilerHelpers;
pub use lower::Compiler;
pub use source::{RoutineSource, SourceChain};
pub use standard::StandardLibrary;
pub use validate::validate;

use lazyflow_common::Program;
use serde::Deserialize;

/// Compiler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Skip the structural pre-check. Malformed documents then fail with
    /// the first lowering error instead of a full report.
    pub skip_validation: bool,
}

/// Compile `document` with the built-in routine sources.
///
/// # Errors
///
/// Returns [`CompileError::Invalid`] with every structural problem found,
/// or the first lowering error.
pub fn compile(document: &DocumentContext, options: &CompileOptions) -> Result<Program, CompileError> {
    Compiler::new(document, options.clone()).compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_and_deserialize() {
        assert!(!CompileOptions::default().skip_validation);
        let options: CompileOptions = serde_json::from_str(r#"{"skipValidation": true}"#).unwrap();
        assert!(options.skip_validation);
        let options: CompileOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
    }
}
