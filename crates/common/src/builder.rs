//! Shorthand for emitting instruction streams.
//!
//! [`ChunkBuilder`] keeps the operand-then-operation convention in one
//! place: `get_arg(1)` emits `1 getarg`, `jump_if(&done)` emits
//! `<index> jc` with the index patched once `done` is bound.

use crate::instruction::{Instruction, Literal};
use crate::opcode::Opcode;
use crate::program::Chunk;

/// A forward-declarable jump target inside one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpLabel(usize);

/// Incrementally builds one chunk's instruction stream.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    instructions: Vec<Instruction>,
    targets: Vec<Option<usize>>,
    fixups: Vec<(usize, JumpLabel)>,
}

impl ChunkBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions emitted so far.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Emit an operation.
    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.instructions.push(Instruction::Op(op));
        self
    }

    /// Emit a literal.
    pub fn lit(&mut self, lit: impl Into<Literal>) -> &mut Self {
        self.instructions.push(Instruction::Lit(lit.into()));
        self
    }

    /// Emit a reference to the chunk labelled `label`.
    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.instructions.push(Instruction::Lit(Literal::Label(label.into())));
        self
    }

    /// `<index> getarg`
    pub fn get_arg(&mut self, index: usize) -> &mut Self {
        self.lit(index).op(Opcode::GetArg)
    }

    /// `<slot> getlocal`
    pub fn get_local(&mut self, slot: usize) -> &mut Self {
        self.lit(slot).op(Opcode::GetLocal)
    }

    /// `<slot> setlocal`, storing the value currently on top of the stack.
    pub fn set_local(&mut self, slot: usize) -> &mut Self {
        self.lit(slot).op(Opcode::SetLocal)
    }

    /// `@<label> call`
    pub fn call(&mut self, label: impl Into<String>) -> &mut Self {
        self.label(label).op(Opcode::Call)
    }

    /// `@<label> thunk`
    pub fn thunk(&mut self, label: impl Into<String>) -> &mut Self {
        self.label(label).op(Opcode::Thunk)
    }

    /// Force the top `n` stack slots in place, keeping their order.
    ///
    /// Emits `evaluate (moveaside evaluate)^(n-1) moveback^(n-1)`.
    pub fn force_top(&mut self, n: usize) -> &mut Self {
        self.force_selected(&vec![true; n])
    }

    /// Force the stack slots flagged in `mask`, where `mask[0]` is the top
    /// of the stack, leaving the unflagged slots untouched and in place.
    pub fn force_selected(&mut self, mask: &[bool]) -> &mut Self {
        self.rotate_forcing(mask, Opcode::Evaluate)
    }

    /// Like [`force_top`](Self::force_top) with `deepevaluate`, so nothing
    /// deferred is left inside the forced values either.
    pub fn deep_force_top(&mut self, n: usize) -> &mut Self {
        self.rotate_forcing(&vec![true; n], Opcode::DeepEvaluate)
    }

    fn rotate_forcing(&mut self, mask: &[bool], force_op: Opcode) -> &mut Self {
        let Some(last) = mask.len().checked_sub(1) else {
            return self;
        };
        for (depth, &force) in mask.iter().enumerate() {
            if force {
                self.op(force_op);
            }
            if depth < last {
                self.op(Opcode::MoveAside);
            }
        }
        for _ in 0..last {
            self.op(Opcode::MoveBack);
        }
        self
    }

    /// Declare a jump target to be bound later.
    pub fn new_label(&mut self) -> JumpLabel {
        self.targets.push(None);
        JumpLabel(self.targets.len() - 1)
    }

    /// Bind `label` to the next instruction emitted.
    pub fn bind(&mut self, label: JumpLabel) -> &mut Self {
        self.targets[label.0] = Some(self.instructions.len());
        self
    }

    /// `<target> j`
    pub fn jump(&mut self, label: JumpLabel) -> &mut Self {
        self.emit_target(label).op(Opcode::J)
    }

    /// `<target> jc`, consuming the boolean below.
    pub fn jump_if(&mut self, label: JumpLabel) -> &mut Self {
        self.emit_target(label).op(Opcode::Jc)
    }

    fn emit_target(&mut self, label: JumpLabel) -> &mut Self {
        self.fixups.push((self.instructions.len(), label));
        self.lit(Literal::Number(0.0))
    }

    /// Patch jump targets and produce the chunk.
    ///
    /// # Panics
    ///
    /// Panics if a jump refers to a label that was never bound.
    pub fn finish(mut self, arity: usize) -> Chunk {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.targets[label.0]
                .unwrap_or_else(|| panic!("jump label {} used but never bound", label.0));
            self.instructions[at] = Instruction::Lit(Literal::Number(target as f64));
        }
        Chunk::new(arity, self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Instruction::{Lit, Op};

    #[test]
    fn operand_then_operation() {
        let mut b = ChunkBuilder::new();
        b.get_arg(1).set_local(2).thunk("helper::access");
        let chunk = b.finish(2);
        assert_eq!(chunk.arity, 2);
        assert_eq!(
            chunk.instructions,
            vec![
                Lit(Literal::Number(1.0)),
                Op(Opcode::GetArg),
                Lit(Literal::Number(2.0)),
                Op(Opcode::SetLocal),
                Lit(Literal::Label("helper::access".into())),
                Op(Opcode::Thunk),
            ]
        );
    }

    #[test]
    fn force_top_uses_rotation() {
        let mut b = ChunkBuilder::new();
        b.force_top(3);
        assert_eq!(
            b.finish(0).instructions,
            vec![
                Op(Opcode::Evaluate),
                Op(Opcode::MoveAside),
                Op(Opcode::Evaluate),
                Op(Opcode::MoveAside),
                Op(Opcode::Evaluate),
                Op(Opcode::MoveBack),
                Op(Opcode::MoveBack),
            ]
        );
    }

    #[test]
    fn force_top_of_one_and_zero() {
        let mut b = ChunkBuilder::new();
        b.force_top(1).force_top(0);
        assert_eq!(b.finish(0).instructions, vec![Op(Opcode::Evaluate)]);
    }

    #[test]
    fn deep_force_top_rotates_the_same_way() {
        let mut b = ChunkBuilder::new();
        b.deep_force_top(2);
        assert_eq!(
            b.finish(0).instructions,
            vec![
                Op(Opcode::DeepEvaluate),
                Op(Opcode::MoveAside),
                Op(Opcode::DeepEvaluate),
                Op(Opcode::MoveBack),
            ]
        );
    }

    #[test]
    fn force_selected_skips_unflagged_slots() {
        let mut b = ChunkBuilder::new();
        b.force_selected(&[false, true]);
        assert_eq!(
            b.finish(0).instructions,
            vec![
                Op(Opcode::MoveAside),
                Op(Opcode::Evaluate),
                Op(Opcode::MoveBack),
            ]
        );
    }

    #[test]
    fn forward_and_backward_jumps_are_patched() {
        let mut b = ChunkBuilder::new();
        let top = b.new_label();
        let done = b.new_label();
        b.bind(top);
        b.lit(true).jump_if(done);
        b.jump(top);
        b.bind(done);
        b.op(Opcode::Return);

        let chunk = b.finish(0);
        assert_eq!(chunk.instructions[1], Lit(Literal::Number(5.0)));
        assert_eq!(chunk.instructions[3], Lit(Literal::Number(0.0)));
        assert_eq!(chunk.instructions[5], Op(Opcode::Return));
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn unbound_label_panics() {
        let mut b = ChunkBuilder::new();
        let nowhere = b.new_label();
        b.jump(nowhere);
        b.finish(0);
    }
}
