//! Instructions and literal payloads.
//!
//! An instruction is either an operation or a literal that is pushed as-is.
//! Chunk labels are their own literal kind so that reachability and linking
//! never have to guess which strings are references.

use crate::opcode::Opcode;
use indexmap::IndexMap;

/// A literal payload carried by an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// A boolean.
    Boolean(bool),
    /// A reference to the chunk with this label.
    Label(String),
    /// An array of literals.
    Array(Vec<Literal>),
    /// An ordered object of literals.
    Object(IndexMap<String, Literal>),
}

impl Literal {
    /// Call `f` for every label and string found in this literal, recursing
    /// into arrays and objects.
    pub fn for_each_name<'a>(&'a self, f: &mut impl FnMut(&'a str, bool)) {
        match self {
            Literal::Label(name) => f(name, true),
            Literal::String(s) => f(s, false),
            Literal::Array(items) => {
                for item in items {
                    item.for_each_name(f);
                }
            }
            Literal::Object(fields) => {
                for item in fields.values() {
                    item.for_each_name(f);
                }
            }
            Literal::Number(_) | Literal::Boolean(_) => {}
        }
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<usize> for Literal {
    fn from(n: usize) -> Self {
        Literal::Number(n as f64)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

/// A single instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Execute an operation.
    Op(Opcode),
    /// Push a literal.
    Lit(Literal),
}

impl Instruction {
    /// The opcode, if this is an operation.
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Op(op) => Some(*op),
            Instruction::Lit(_) => None,
        }
    }

    /// The literal, if this is a literal.
    pub fn literal(&self) -> Option<&Literal> {
        match self {
            Instruction::Op(_) => None,
            Instruction::Lit(lit) => Some(lit),
        }
    }
}

impl From<Opcode> for Instruction {
    fn from(op: Opcode) -> Self {
        Instruction::Op(op)
    }
}

impl From<Literal> for Instruction {
    fn from(lit: Literal) -> Self {
        Instruction::Lit(lit)
    }
}
