//! Program representation: labelled chunks and their linked form.
//!
//! A [`Program`] is what the compiler produces and the optimizer rewrites:
//! an arena of chunks addressed by label. [`Program::link`] resolves every
//! label literal to a [`ChunkId`] once, producing an [`Image`] the VM can run
//! without hashing strings.

use crate::error::ProgramError;
use crate::instruction::{Instruction, Literal};
use crate::opcode::Opcode;
use crate::value::Value;
use indexmap::IndexMap;

/// Label of the chunk where execution begins.
pub const ENTRY_LABEL: &str = "entry";

/// Index of a chunk inside an [`Image`] or [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    /// Wrap a raw chunk index.
    pub fn new(index: usize) -> Self {
        ChunkId(index as u32)
    }

    /// The raw chunk index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named, fixed-arity, callable sequence of instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Number of arguments a frame or thunk for this chunk consumes.
    pub arity: usize,
    /// The instruction stream.
    pub instructions: Vec<Instruction>,
}

impl Chunk {
    /// Create a chunk.
    pub fn new(arity: usize, instructions: Vec<Instruction>) -> Self {
        Self {
            arity,
            instructions,
        }
    }

    /// Labels this chunk refers to through label literals.
    pub fn referenced_labels(&self) -> impl Iterator<Item = &str> {
        let mut labels = Vec::new();
        for lit in self.instructions.iter().filter_map(Instruction::literal) {
            lit.for_each_name(&mut |name, is_label| {
                if is_label {
                    labels.push(name);
                }
            });
        }
        labels.into_iter()
    }
}

/// A lazyflow program: chunks keyed by unique label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    chunks: IndexMap<String, Chunk>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk. Labels are unique: adding one twice is an error.
    pub fn add_chunk(&mut self, label: impl Into<String>, chunk: Chunk) -> Result<ChunkId, ProgramError> {
        let label = label.into();
        if self.chunks.contains_key(&label) {
            return Err(ProgramError::DuplicateChunk(label));
        }
        let (index, _) = self.chunks.insert_full(label, chunk);
        Ok(ChunkId::new(index))
    }

    /// Look up a chunk by label.
    pub fn chunk(&self, label: &str) -> Option<&Chunk> {
        self.chunks.get(label)
    }

    /// True if a chunk with this label exists.
    pub fn contains(&self, label: &str) -> bool {
        self.chunks.contains_key(label)
    }

    /// Iterate over `(label, chunk)` pairs in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = (&str, &Chunk)> {
        self.chunks.iter().map(|(label, chunk)| (label.as_str(), chunk))
    }

    /// Iterate over chunk labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.chunks.keys().map(String::as_str)
    }

    /// Keep only the chunks for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Chunk) -> bool) {
        self.chunks.retain(|label, chunk| keep(label, chunk));
    }

    /// Rewrite every chunk in place.
    pub fn chunks_mut(&mut self) -> impl Iterator<Item = (&str, &mut Chunk)> {
        self.chunks
            .iter_mut()
            .map(|(label, chunk)| (label.as_str(), chunk))
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if the program has no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Resolve every label literal and build an executable [`Image`].
    pub fn link(&self) -> Result<Image, ProgramError> {
        let entry = self
            .chunks
            .get_index_of(ENTRY_LABEL)
            .ok_or(ProgramError::MissingEntry(ENTRY_LABEL))?;
        let entry_arity = self.chunks[entry].arity;
        if entry_arity != 0 {
            return Err(ProgramError::EntryArity(entry_arity));
        }

        let mut chunks = Vec::with_capacity(self.chunks.len());
        for (label, chunk) in &self.chunks {
            let code = chunk
                .instructions
                .iter()
                .map(|instr| match instr {
                    Instruction::Op(op) => Ok(Code::Op(*op)),
                    Instruction::Lit(lit) => self.link_literal(label, lit).map(Code::Push),
                })
                .collect::<Result<Vec<_>, _>>()?;
            chunks.push(LinkedChunk {
                label: label.clone(),
                arity: chunk.arity,
                code,
            });
        }

        Ok(Image {
            chunks,
            entry: ChunkId::new(entry),
        })
    }

    fn link_literal(&self, from: &str, lit: &Literal) -> Result<Value, ProgramError> {
        Ok(match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::string(s),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Label(label) => {
                let index =
                    self.chunks
                        .get_index_of(label)
                        .ok_or_else(|| ProgramError::DanglingReference {
                            from: from.to_string(),
                            label: label.clone(),
                        })?;
                Value::Chunk(ChunkId::new(index))
            }
            Literal::Array(items) => Value::array(
                items
                    .iter()
                    .map(|item| self.link_literal(from, item))
                    .collect::<Result<_, _>>()?,
            ),
            Literal::Object(fields) => Value::object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.link_literal(from, v)?)))
                    .collect::<Result<_, ProgramError>>()?,
            ),
        })
    }
}

/// A linked instruction.
#[derive(Debug, Clone)]
pub enum Code {
    /// Execute an operation.
    Op(Opcode),
    /// Push a prebuilt value.
    Push(Value),
}

/// A chunk with its labels resolved.
#[derive(Debug, Clone)]
pub struct LinkedChunk {
    /// The chunk's label, kept for diagnostics.
    pub label: String,
    /// Number of arguments.
    pub arity: usize,
    /// The linked instruction stream.
    pub code: Vec<Code>,
}

/// An executable program: chunks addressed by [`ChunkId`].
#[derive(Debug, Clone)]
pub struct Image {
    chunks: Vec<LinkedChunk>,
    entry: ChunkId,
}

impl Image {
    /// The entry chunk.
    pub fn entry(&self) -> ChunkId {
        self.entry
    }

    /// Look up a chunk by id.
    pub fn chunk(&self, id: ChunkId) -> Option<&LinkedChunk> {
        self.chunks.get(id.index())
    }

    /// Find a chunk id by label (linear scan, diagnostics only).
    pub fn find(&self, label: &str) -> Option<ChunkId> {
        self.chunks
            .iter()
            .position(|chunk| chunk.label == label)
            .map(ChunkId::new)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if the image has no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_calling(label: &str) -> Chunk {
        Chunk::new(
            0,
            vec![
                Instruction::Lit(Literal::Label(label.into())),
                Instruction::Op(Opcode::Call),
                Instruction::Op(Opcode::Return),
            ],
        )
    }

    #[test]
    fn empty_program() {
        let program = Program::new();
        assert!(program.is_empty());
        assert_eq!(program.len(), 0);
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut program = Program::new();
        program.add_chunk("a", Chunk::new(0, vec![])).unwrap();
        assert_eq!(
            program.add_chunk("a", Chunk::new(1, vec![])),
            Err(ProgramError::DuplicateChunk("a".into()))
        );
        assert_eq!(program.chunk("a").unwrap().arity, 0);
    }

    #[test]
    fn referenced_labels_skip_plain_strings() {
        let chunk = Chunk::new(
            0,
            vec![
                Instruction::Lit(Literal::Label("x".into())),
                Instruction::Lit(Literal::String("y".into())),
                Instruction::Op(Opcode::Pop),
            ],
        );
        assert_eq!(chunk.referenced_labels().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn link_resolves_labels_to_indices() {
        let mut program = Program::new();
        program
            .add_chunk("callee", Chunk::new(0, vec![Instruction::Op(Opcode::Return)]))
            .unwrap();
        program.add_chunk(ENTRY_LABEL, entry_calling("callee")).unwrap();

        let image = program.link().unwrap();
        assert_eq!(image.len(), 2);
        assert_eq!(image.entry(), ChunkId::new(1));
        let entry = image.chunk(image.entry()).unwrap();
        assert!(matches!(entry.code[0], Code::Push(Value::Chunk(id)) if id == ChunkId::new(0)));
        assert_eq!(image.find("callee"), Some(ChunkId::new(0)));
    }

    #[test]
    fn link_rejects_dangling_label() {
        let mut program = Program::new();
        program.add_chunk(ENTRY_LABEL, entry_calling("missing")).unwrap();
        assert_eq!(
            program.link().unwrap_err(),
            ProgramError::DanglingReference {
                from: ENTRY_LABEL.into(),
                label: "missing".into()
            }
        );
    }

    #[test]
    fn link_requires_entry() {
        let program = Program::new();
        assert_eq!(
            program.link().unwrap_err(),
            ProgramError::MissingEntry(ENTRY_LABEL)
        );

        let mut program = Program::new();
        program.add_chunk(ENTRY_LABEL, Chunk::new(1, vec![])).unwrap();
        assert_eq!(program.link().unwrap_err(), ProgramError::EntryArity(1));
    }

    #[test]
    fn link_builds_aggregate_literals() {
        let mut fields = IndexMap::new();
        fields.insert("xs".to_string(), Literal::Array(vec![Literal::Number(1.0)]));
        let mut program = Program::new();
        program
            .add_chunk(
                ENTRY_LABEL,
                Chunk::new(
                    0,
                    vec![
                        Instruction::Lit(Literal::Object(fields)),
                        Instruction::Op(Opcode::Return),
                    ],
                ),
            )
            .unwrap();

        let image = program.link().unwrap();
        let entry = image.chunk(image.entry()).unwrap();
        match &entry.code[0] {
            Code::Push(Value::Object(fields)) => {
                assert_eq!(fields["xs"], Value::array(vec![Value::Number(1.0)]));
            }
            other => panic!("expected object literal, got {other:?}"),
        }
    }
}
