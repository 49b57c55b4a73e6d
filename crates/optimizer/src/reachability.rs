//! Dead-chunk elimination.
//!
//! Walks the chunk graph breadth-first from `entry`. An edge is any label
//! literal, or any string literal that happens to name a chunk, at any
//! depth inside aggregate literals. Chunks never discovered are removed.

use crate::error::OptimizeError;
use lazyflow_common::{Instruction, Program, ENTRY_LABEL};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Labels of every chunk reachable from `entry`.
pub fn reachable_labels(program: &Program) -> Result<HashSet<String>, OptimizeError> {
    if !program.contains(ENTRY_LABEL) {
        return Err(OptimizeError::MissingEntry(ENTRY_LABEL));
    }

    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(ENTRY_LABEL.to_string());
    queue.push_back(ENTRY_LABEL.to_string());

    while let Some(label) = queue.pop_front() {
        let Some(chunk) = program.chunk(&label) else {
            continue;
        };
        let mut dangling = None;
        for lit in chunk.instructions.iter().filter_map(Instruction::literal) {
            lit.for_each_name(&mut |name, is_label| {
                if !program.contains(name) {
                    if is_label && dangling.is_none() {
                        dangling = Some(name.to_string());
                    }
                    return;
                }
                if seen.insert(name.to_string()) {
                    queue.push_back(name.to_string());
                }
            });
        }
        if let Some(target) = dangling {
            return Err(OptimizeError::DanglingReference {
                from: label,
                label: target,
            });
        }
    }

    Ok(seen)
}

/// Remove every chunk not reachable from `entry`. Returns how many were
/// removed.
pub fn remove_dead_chunks(program: &mut Program) -> Result<usize, OptimizeError> {
    let live = reachable_labels(program)?;
    let before = program.len();
    program.retain(|label, _| {
        let keep = live.contains(label);
        if !keep {
            debug!(chunk = label, "removed unreachable chunk");
        }
        keep
    });
    Ok(before - program.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyflow_common::{Chunk, Literal, Opcode};

    fn returning(lit: Literal) -> Chunk {
        Chunk::new(0, vec![Instruction::Lit(lit), Instruction::Op(Opcode::Return)])
    }

    #[test]
    fn entry_is_required() {
        let program = Program::new();
        assert_eq!(
            reachable_labels(&program).unwrap_err(),
            OptimizeError::MissingEntry(ENTRY_LABEL)
        );
    }

    #[test]
    fn follows_labels_and_chunk_names_in_strings() {
        let mut program = Program::new();
        program
            .add_chunk(ENTRY_LABEL, returning(Literal::Label("a".into())))
            .unwrap();
        program
            .add_chunk("a", returning(Literal::Array(vec![Literal::String("b".into())])))
            .unwrap();
        program.add_chunk("b", returning(Literal::Number(1.0))).unwrap();
        program.add_chunk("c", returning(Literal::Number(2.0))).unwrap();

        let live = reachable_labels(&program).unwrap();
        assert_eq!(live.len(), 3);
        assert!(!live.contains("c"));

        assert_eq!(remove_dead_chunks(&mut program).unwrap(), 1);
        assert_eq!(program.labels().collect::<Vec<_>>(), vec![ENTRY_LABEL, "a", "b"]);
    }

    #[test]
    fn plain_strings_are_not_references() {
        let mut program = Program::new();
        program
            .add_chunk(ENTRY_LABEL, returning(Literal::String("no such chunk".into())))
            .unwrap();
        assert_eq!(reachable_labels(&program).unwrap().len(), 1);
    }

    #[test]
    fn dangling_label() {
        let mut program = Program::new();
        program
            .add_chunk(ENTRY_LABEL, returning(Literal::Label("gone".into())))
            .unwrap();
        assert_eq!(
            reachable_labels(&program).unwrap_err(),
            OptimizeError::DanglingReference {
                from: ENTRY_LABEL.into(),
                label: "gone".into()
            }
        );
    }

    #[test]
    fn dangling_label_in_dead_chunk_is_ignored() {
        let mut program = Program::new();
        program.add_chunk(ENTRY_LABEL, returning(Literal::Number(0.0))).unwrap();
        program
            .add_chunk("dead", returning(Literal::Label("gone".into())))
            .unwrap();
        assert_eq!(remove_dead_chunks(&mut program).unwrap(), 1);
    }

    #[test]
    fn cycles_terminate() {
        let mut program = Program::new();
        program
            .add_chunk(ENTRY_LABEL, returning(Literal::Label("a".into())))
            .unwrap();
        program
            .add_chunk("a", returning(Literal::Label("a".into())))
            .unwrap();
        assert_eq!(reachable_labels(&program).unwrap().len(), 2);
    }
}
