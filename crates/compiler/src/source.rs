//! Routine sources: providers of callable chunks.
//!
//! The compiler asks each source in turn whether it knows a routine path;
//! the first that does emits the call. Sources also contribute the chunks
//! their calls refer to.

use lazyflow_common::{Chunk, ChunkBuilder};

/// A provider of routines the compiler can call.
pub trait RoutineSource {
    /// Chunks this source contributes to every program, keyed by label.
    fn chunks_provided(&self) -> Vec<(String, Chunk)>;

    /// Number of rows a node calling `path` must have, if the path is known.
    fn routine_arity(&self, path: &str) -> Option<usize>;

    /// Emit a deferred call to `path`, whose arguments are already on the
    /// stack with argument 0 on top. Returns false if the path is unknown,
    /// in which case nothing is emitted.
    fn try_emit_call(&self, stream: &mut ChunkBuilder, path: &str) -> bool;
}

/// An ordered list of sources; earlier sources win.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn RoutineSource>>,
}

impl SourceChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with the lowest precedence so far.
    pub fn push(&mut self, source: Box<dyn RoutineSource>) {
        self.sources.push(source);
    }

    /// Arity reported by the first source that knows `path`.
    pub fn routine_arity(&self, path: &str) -> Option<usize> {
        self.sources
            .iter()
            .find_map(|source| source.routine_arity(path))
    }

    /// Emit a call through the first source that knows `path`.
    pub fn try_emit_call(&self, stream: &mut ChunkBuilder, path: &str) -> bool {
        self.sources
            .iter()
            .any(|source| source.try_emit_call(stream, path))
    }

    /// Every chunk of every source, in source order.
    pub fn chunks_provided(&self) -> Vec<(String, Chunk)> {
        self.sources
            .iter()
            .flat_map(|source| source.chunks_provided())
            .collect()
    }
}
