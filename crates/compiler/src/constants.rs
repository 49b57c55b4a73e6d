//! Deduplicated constant chunks.
//!
//! Every distinct initializer value becomes one 0-ary chunk `const::<n>`
//! that returns the value. Equal values share a chunk across the whole
//! document, compared after conversion to literals, so `1` and `1.0` are
//! the same constant.

use indexmap::IndexMap;
use lazyflow_common::{Chunk, Instruction, Literal, Opcode};
use serde_json::Value as Json;

/// Interns initializer values into constant chunks.
#[derive(Debug, Default)]
pub struct ConstantPool {
    /// Literal rendered with `Debug` → chunk label.
    labels: IndexMap<String, String>,
    chunks: Vec<(String, Chunk)>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label of the chunk returning `value`, creating it on first use.
    /// Returns `None` if the value has no literal form.
    pub fn intern(&mut self, value: &Json) -> Option<String> {
        let literal = to_literal(value)?;
        // serde_json objects are sorted maps, so equal values print equally.
        let key = format!("{literal:?}");
        if let Some(label) = self.labels.get(&key) {
            return Some(label.clone());
        }

        let label = format!("const::{}", self.chunks.len());
        let chunk = Chunk::new(
            0,
            vec![Instruction::Lit(literal), Instruction::Op(Opcode::Return)],
        );
        self.labels.insert(key, label.clone());
        self.chunks.push((label.clone(), chunk));
        Some(label)
    }

    /// Number of distinct constants.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The constant chunks, in creation order.
    pub fn into_chunks(self) -> Vec<(String, Chunk)> {
        self.chunks
    }
}

fn to_literal(value: &Json) -> Option<Literal> {
    Some(match value {
        Json::Null => return None,
        Json::Bool(b) => Literal::Boolean(*b),
        Json::Number(n) => Literal::Number(n.as_f64()?),
        Json::String(s) => Literal::String(s.clone()),
        Json::Array(items) => {
            Literal::Array(items.iter().map(to_literal).collect::<Option<_>>()?)
        }
        Json::Object(fields) => Literal::Object(
            fields
                .iter()
                .map(|(k, v)| Some((k.clone(), to_literal(v)?)))
                .collect::<Option<_>>()?,
        ),
    })
}
