//! Chunks the compiler itself calls.

use crate::source::RoutineSource;
use lazyflow_common::{Chunk, ChunkBuilder, Opcode};

/// Path of the field accessor for compound producers.
pub const ACCESS: &str = "helper::access";

/// Compiler-internal helper routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerHelpers;

impl RoutineSource for CompilerHelpers {
    fn chunks_provided(&self) -> Vec<(String, Chunk)> {
        // access(object, key): force the object, then the field.
        let mut b = ChunkBuilder::new();
        b.get_arg(0).op(Opcode::Evaluate);
        b.get_arg(1).op(Opcode::OGet).op(Opcode::Evaluate).op(Opcode::Return);
        vec![(ACCESS.to_string(), b.finish(2))]
    }

    fn routine_arity(&self, path: &str) -> Option<usize> {
        (path == ACCESS).then_some(2)
    }

    fn try_emit_call(&self, stream: &mut ChunkBuilder, path: &str) -> bool {
        if path != ACCESS {
            return false;
        }
        stream.thunk(ACCESS);
        true
    }
}
