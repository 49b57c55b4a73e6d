//! lazyflow optimizer: shrinks a compiled program before it is linked.
//!
//! The compiler includes every chunk its routine sources provide. The
//! optimizer keeps only what `entry` can reach, then drops rotation pairs
//! that cancel out.
//!
//! # Usage
//!
//! ```
//! use lazyflow_common::{Chunk, Instruction, Literal, Opcode, Program};
//! use lazyflow_optimizer::{optimize, OptimizeOptions};
//!
//! let mut program = Program::new();
//! program.add_chunk("entry", Chunk::new(0, vec![
//!     Instruction::Lit(Literal::Number(1.0)),
//!     Instruction::Op(Opcode::Return),
//! ])).unwrap();
//! program.add_chunk("unused", Chunk::new(0, vec![])).unwrap();
//!
//! let program = optimize(program, &OptimizeOptions::default()).unwrap();
//! assert_eq!(program.len(), 1);
//! ```
//!
//! # Passes
//!
//! 1. **Reachability**: remove chunks `entry` never refers to
//! 2. **Peephole**: remove `moveaside`/`moveback` pairs (optional)

pub mod error;
pub mod peephole;
pub mod reachability;

pub use error::OptimizeError;

use lazyflow_common::Program;
use serde::Deserialize;
use tracing::debug;

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeOptions {
    /// Run the rotation peephole after dead-chunk removal.
    pub peephole: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self { peephole: true }
    }
}

/// Optimize a program.
///
/// The result behaves like the input when run: same value, same errors,
/// except that errors from instructions that were removed can no longer
/// occur. Optimizing twice gives the same program as optimizing once.
pub fn optimize(mut program: Program, options: &OptimizeOptions) -> Result<Program, OptimizeError> {
    let before = program.len();
    let dead = reachability::remove_dead_chunks(&mut program)?;

    let mut collapsed = 0;
    if options.peephole {
        for (_, chunk) in program.chunks_mut() {
            collapsed += peephole::collapse_rotations(chunk);
        }
    }

    debug!(before, dead, collapsed, "optimized program");
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyflow_common::{Chunk, Instruction, Opcode, ENTRY_LABEL};

    fn rotating_entry() -> Program {
        let mut program = Program::new();
        program
            .add_chunk(
                ENTRY_LABEL,
                Chunk::new(
                    0,
                    vec![
                        Instruction::Lit(true.into()),
                        Instruction::Op(Opcode::MoveAside),
                        Instruction::Op(Opcode::MoveBack),
                        Instruction::Op(Opcode::Return),
                    ],
                ),
            )
            .unwrap();
        program
    }

    #[test]
    fn peephole_is_on_by_default() {
        let program = optimize(rotating_entry(), &OptimizeOptions::default()).unwrap();
        assert_eq!(program.chunk(ENTRY_LABEL).unwrap().instructions.len(), 2);
    }

    #[test]
    fn peephole_can_be_disabled() {
        let options = OptimizeOptions { peephole: false };
        let program = optimize(rotating_entry(), &options).unwrap();
        assert_eq!(program.chunk(ENTRY_LABEL).unwrap().instructions.len(), 4);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: OptimizeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, OptimizeOptions::default());
        let options: OptimizeOptions = serde_json::from_str(r#"{"peephole": false}"#).unwrap();
        assert!(!options.peephole);
    }

    #[test]
    fn missing_entry() {
        assert_eq!(
            optimize(Program::new(), &OptimizeOptions::default()).unwrap_err(),
            OptimizeError::MissingEntry(ENTRY_LABEL)
        );
    }
}
