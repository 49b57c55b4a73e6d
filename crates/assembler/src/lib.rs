//! lazyflow assembler: chunk listings ↔ programs.
//!
//! The text format is the one the disassembler emits, so a listing printed
//! by `lazyflow compile` can be edited and run again with `lazyflow exec`.
//!
//! # Usage
//!
//! ```
//! use lazyflow_assembler::{assemble, disassemble};
//!
//! let text = ".entry  (0-ary)\n  0 2\n  1 3\n  2 nadd\n  3 return\n";
//! let program = assemble(text).unwrap();
//! assert_eq!(program.chunk("entry").unwrap().instructions.len(), 4);
//! assert_eq!(disassemble(&program), text);
//! ```
//!
//! # Roundtrip Guarantee
//!
//! `assemble(disassemble(program)) == program` holds for every program
//! without array or object literals. Indices are optional on input; when
//! present they must match the instruction's position.

pub mod error;

mod disassembler;
mod lexer;
mod parser;

pub use error::AsmError;

use lazyflow_common::{Chunk, Program};
use lexer::tokenize_line;
use parser::{parse_header, parse_line, Header};

/// Assemble a chunk listing into a program.
///
/// Returns the first error encountered. Fix one error at a time.
pub fn assemble(text: &str) -> Result<Program, AsmError> {
    let mut program = Program::new();
    let mut current: Option<(Header, usize, Chunk)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;

        if line.trim_start().starts_with('.') {
            let header = parse_header(line, line_num)?;
            if let Some(done) = current.take() {
                finish_chunk(&mut program, done)?;
            }
            let chunk = Chunk::new(header.arity, Vec::new());
            current = Some((header, line_num, chunk));
            continue;
        }

        let tokens = tokenize_line(line, line_num)?;
        if tokens.is_empty() {
            continue;
        }
        let Some((_, _, chunk)) = current.as_mut() else {
            return Err(AsmError::OutsideChunk { line: line_num });
        };
        if let Some(instr) = parse_line(&tokens, line_num, chunk.instructions.len())? {
            chunk.instructions.push(instr);
        }
    }

    if let Some(done) = current {
        finish_chunk(&mut program, done)?;
    }
    Ok(program)
}

fn finish_chunk(
    program: &mut Program,
    (header, line, chunk): (Header, usize, Chunk),
) -> Result<(), AsmError> {
    program
        .add_chunk(header.label, chunk)
        .map(|_| ())
        .map_err(|source| AsmError::Program { line, source })
}

/// Disassemble a program into a chunk listing.
pub fn disassemble(program: &Program) -> String {
    disassembler::disassemble(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyflow_common::opcode::ALL_OPCODES;
    use lazyflow_common::{Instruction, Literal, Opcode, ProgramError};

    #[test]
    fn assemble_minimal() {
        let program = assemble(".entry  (0-ary)\n  0 true\n  1 return\n").unwrap();
        let entry = program.chunk("entry").unwrap();
        assert_eq!(entry.arity, 0);
        assert_eq!(
            entry.instructions,
            vec![
                Instruction::Lit(Literal::Boolean(true)),
                Instruction::Op(Opcode::Return)
            ]
        );
    }

    #[test]
    fn assemble_with_comments_and_blanks() {
        let text = "\
; adds two numbers
.entry  (0-ary)
  2      ; lhs
  3

  nadd
  return
";
        let program = assemble(text).unwrap();
        assert_eq!(program.chunk("entry").unwrap().instructions.len(), 4);
    }

    #[test]
    fn chunk_order_is_kept() {
        let text = ".b  (1-ary)\n0 getarg\nreturn\n\n.a  (0-ary)\nreturn\n";
        let program = assemble(text).unwrap();
        assert_eq!(program.labels().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(program.chunk("b").unwrap().arity, 1);
    }

    #[test]
    fn error_instruction_before_header() {
        assert_eq!(
            assemble("return\n").unwrap_err(),
            AsmError::OutsideChunk { line: 1 }
        );
    }

    #[test]
    fn error_duplicate_chunk_points_at_header() {
        let err = assemble(".a  (0-ary)\nreturn\n.a  (0-ary)\nreturn\n").unwrap_err();
        assert_eq!(
            err,
            AsmError::Program {
                line: 3,
                source: ProgramError::DuplicateChunk("a".into())
            }
        );
    }

    #[test]
    fn error_reports_correct_line() {
        let err = assemble(".entry  (0-ary)\nreturn\nnfoo\n").unwrap_err();
        assert!(matches!(err, AsmError::UnknownOpcode { line: 3, .. }));
    }

    #[test]
    fn every_mnemonic_roundtrips() {
        let mut text = String::from(".entry  (0-ary)\n");
        for (i, op) in ALL_OPCODES.iter().enumerate() {
            text.push_str(&format!("{i:>3} {}\n", op.mnemonic()));
        }
        let program = assemble(&text).unwrap();
        assert_eq!(disassemble(&program), text);
    }
}
