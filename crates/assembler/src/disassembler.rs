//! Disassembler: program → chunk listing.
//!
//! Each chunk is a header `.{label}  ({arity}-ary)` followed by one line
//! per instruction: a right-justified index, then the mnemonic or literal.
//! Chunks are separated by a blank line.

use lazyflow_common::{Instruction, Literal, Program};
use std::fmt::Write;

/// Disassemble a program into assembly text.
///
/// Chunks appear in program order. Array and object literals are shown as
/// `[...]` and `{...}`, so only programs without them reassemble.
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    for (i, (label, chunk)) in program.chunks().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, ".{label}  ({}-ary)", chunk.arity);
        let width = index_width(chunk.instructions.len());
        for (index, instr) in chunk.instructions.iter().enumerate() {
            let _ = writeln!(out, "{index:>width$} {}", render(instr));
        }
    }
    out
}

fn index_width(len: usize) -> usize {
    len.saturating_sub(1).to_string().len().max(3)
}

fn render(instr: &Instruction) -> String {
    match instr {
        Instruction::Op(op) => op.mnemonic().to_string(),
        Instruction::Lit(Literal::Number(n)) => n.to_string(),
        Instruction::Lit(Literal::String(s)) => quote(s),
        Instruction::Lit(Literal::Boolean(b)) => b.to_string(),
        Instruction::Lit(Literal::Label(l)) => format!("@{l}"),
        Instruction::Lit(Literal::Array(_)) => "[...]".to_string(),
        Instruction::Lit(Literal::Object(_)) => "{...}".to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
