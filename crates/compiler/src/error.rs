//! Compile errors.
//!
//! Every error is fatal: compilation stops and no partial program is
//! returned.

use lazyflow_common::ProgramError;
use thiserror::Error;

/// Errors that abort lowering a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The structural pre-check found problems.
    #[error("document is structurally invalid: {}", list(.0))]
    Invalid(Vec<ValidationError>),

    /// `mainFlow` names no flow.
    #[error("main flow '{0}' not found")]
    MissingMainFlow(String),

    /// The main flow is called without arguments, so it cannot take any.
    #[error("main flow '{flow}' takes {count} input(s); it must take none")]
    MainFlowHasInputs { flow: String, count: usize },

    /// A flow uses no nodes, so it has no value to return.
    #[error("flow '{0}' has no used nodes")]
    EmptyFlow(String),

    /// A used node id names no node of the flow.
    #[error("flow '{flow}' uses unknown node '{node}'")]
    MissingNode { flow: String, node: String },

    /// No routine source recognizes the path.
    #[error("node '{node}': unknown routine '{routine}'")]
    UnknownRoutine { node: String, routine: String },

    /// The number of rows differs from the routine's arity.
    #[error("node '{node}': routine '{routine}' takes {expected} argument(s), found {found} row(s)")]
    ArityMismatch {
        node: String,
        routine: String,
        expected: usize,
        found: usize,
    },

    /// A connection names a node that has not been computed yet.
    #[error("node '{node}' row '{row}': source '{source_node}' is not computed before it in flow '{flow}'")]
    UnresolvedSource {
        flow: String,
        node: String,
        row: String,
        source_node: String,
    },

    /// A list row skips an index.
    #[error("node '{node}' row '{row}': list element {missing} is not connected")]
    ListGap {
        node: String,
        row: String,
        missing: usize,
    },

    /// A list row connects the same index more than once.
    #[error("node '{node}' row '{row}': list element {index} is connected more than once")]
    RepeatedListIndex {
        node: String,
        row: String,
        index: usize,
    },

    /// A tuple row's connections do not cover `0..length` exactly.
    #[error("node '{node}' row '{row}': tuple of length {length} has {connected} connected element(s)")]
    TupleShape {
        node: String,
        row: String,
        length: usize,
        connected: usize,
    },

    /// A node reads the inputs of a flow other than its own.
    #[error("node '{node}' in flow '{flow}': '{routine}' is only available inside its own flow")]
    ForeignInput {
        flow: String,
        node: String,
        routine: String,
    },

    /// A row of the used graph has nothing bound to it.
    #[error("node '{node}' row '{row}' is unbound")]
    UnboundRow { node: String, row: String },

    /// An initializer has no literal form (JSON `null`).
    #[error("node '{node}' row '{row}': constant {value} cannot be represented")]
    UnsupportedConstant {
        node: String,
        row: String,
        value: String,
    },

    /// Chunks could not be combined into a program.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

fn list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A structural problem found by the pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("main flow '{0}' not found")]
    MissingMainFlow(String),

    #[error("flow '{0}' is defined more than once")]
    DuplicateFlow(String),

    #[error("flow '{flow}': node '{node}' is defined more than once")]
    DuplicateNode { flow: String, node: String },

    #[error("flow '{flow}': used node '{node}' is not defined")]
    UnknownUsedNode { flow: String, node: String },

    #[error("flow '{flow}': node '{node}' is listed as used more than once")]
    RepeatedUsedNode { flow: String, node: String },

    #[error("flow '{flow}': node '{node}' row '{row}' connects to unknown node '{source_node}'")]
    UnknownSource {
        flow: String,
        node: String,
        row: String,
        source_node: String,
    },

    #[error("flow '{flow}': node '{node}' row '{row}' depends on '{source_node}', which is not used before it")]
    SourceOutOfOrder {
        flow: String,
        node: String,
        row: String,
        source_node: String,
    },

    #[error("flow '{flow}': node '{node}' row '{row}' repeats element index {index}")]
    RepeatedElement {
        flow: String,
        node: String,
        row: String,
        index: usize,
    },
}
