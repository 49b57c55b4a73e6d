//! Parser: tokens → instructions and chunk headers.

use crate::error::AsmError;
use crate::lexer::Token;
use lazyflow_common::{Instruction, Literal, Opcode};

/// A parsed chunk header.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Header {
    pub label: String,
    pub arity: usize,
}

/// Parse a header line of the form `.label  (N-ary)`.
///
/// `line` must already start with `.` once leading whitespace is trimmed.
pub(crate) fn parse_header(line: &str, line_num: usize) -> Result<Header, AsmError> {
    let bad = || AsmError::BadHeader {
        line: line_num,
        text: line.trim().to_string(),
    };
    let text = line.split(';').next().unwrap_or_default().trim();
    let rest = text.strip_prefix('.').ok_or_else(bad)?;

    let mut parts = rest.split_whitespace();
    let label = parts.next().ok_or_else(bad)?;
    let arity = parts
        .next()
        .and_then(|p| p.strip_prefix('('))
        .and_then(|p| p.strip_suffix("-ary)"))
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }

    Ok(Header {
        label: label.to_string(),
        arity,
    })
}

/// Parse one instruction line.
///
/// Accepts either `<index> <item>` as produced by the disassembler, or a
/// bare `<item>`. `position` is the index the instruction will occupy.
/// Returns `None` for blank lines.
pub(crate) fn parse_line(
    tokens: &[Token],
    line_num: usize,
    position: usize,
) -> Result<Option<Instruction>, AsmError> {
    let item = match tokens {
        [] => return Ok(None),
        [item] => item,
        [Token::Number(index), item] => {
            if *index != position as f64 {
                return Err(AsmError::IndexMismatch {
                    line: line_num,
                    expected: position,
                    found: *index,
                });
            }
            item
        }
        [_, extra, ..] => {
            return Err(AsmError::UnexpectedToken {
                line: line_num,
                token: token_text(extra),
            })
        }
    };
    parse_item(item, line_num).map(Some)
}

fn parse_item(token: &Token, line_num: usize) -> Result<Instruction, AsmError> {
    Ok(match token {
        Token::Word(w) if w == "true" => Instruction::Lit(Literal::Boolean(true)),
        Token::Word(w) if w == "false" => Instruction::Lit(Literal::Boolean(false)),
        Token::Word(w) => {
            let op = Opcode::from_mnemonic(w).ok_or_else(|| AsmError::UnknownOpcode {
                line: line_num,
                token: w.clone(),
            })?;
            Instruction::Op(op)
        }
        Token::Number(n) => Instruction::Lit(Literal::Number(*n)),
        Token::Str(s) => Instruction::Lit(Literal::String(s.clone())),
        Token::Label(l) => Instruction::Lit(Literal::Label(l.clone())),
        Token::Placeholder(p) => {
            return Err(AsmError::Placeholder {
                line: line_num,
                token: p.clone(),
            })
        }
    })
}

fn token_text(token: &Token) -> String {
    match token {
        Token::Word(w) => w.clone(),
        Token::Number(n) => n.to_string(),
        Token::Str(s) => format!("\"{s}\""),
        Token::Label(l) => format!("@{l}"),
        Token::Placeholder(p) => p.clone(),
    }
}
