//! VM state management: operand and aside stacks, frames, counters.

use crate::error::{Location, RuntimeError};
use lazyflow_common::{ChunkId, Image, Thunk, Value};
use serde::{Deserialize, Serialize};

/// Maximum number of values on the operand stack (and on the aside stack).
pub const MAX_STACK_DEPTH: usize = 65_536;

/// Maximum number of nested frames.
pub const MAX_FRAME_DEPTH: usize = 10_000;

/// Local slots per frame; `setlocal` beyond this is an invalid index.
pub const MAX_LOCALS: usize = 65_536;

/// Diagnostics switches. None of them change what a program computes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmOptions {
    /// Count every executed instruction in [`Stats::executed_instructions`].
    pub count_executed_instructions: bool,
    /// Track the highest operand, aside and frame stack heights.
    pub record_maximum_stack_heights: bool,
    /// Emit a `trace` event per executed instruction.
    pub trace: bool,
}

/// Counters collected during interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Instructions executed, when counting is enabled.
    pub executed_instructions: u64,
    /// Number of thunk bodies that were run.
    pub thunks_forced: u64,
    /// Highest operand stack height, when recording is enabled.
    pub max_stack_height: usize,
    /// Highest aside stack height, when recording is enabled.
    pub max_aside_height: usize,
    /// Deepest frame stack, when recording is enabled.
    pub max_frame_depth: usize,
    /// Values a frame left on its stack below the value it returned.
    /// Non-zero means some call site pushed more arguments than the callee
    /// takes.
    pub stranded_values: u64,
}

/// An activation of a chunk.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    /// The running chunk.
    pub chunk: ChunkId,
    /// Index of the next instruction.
    pub ip: usize,
    /// Arguments from the caller or captured by the thunk.
    pub args: Vec<Value>,
    /// Local slots, grown on first write.
    pub locals: Vec<Option<Value>>,
    /// Operand stack height when the frame was entered.
    pub stack_base: usize,
    /// Thunks that receive this frame's return value.
    pub resolves: Vec<Thunk>,
}

/// The lazyflow virtual machine.
///
/// A VM runs one linked [`Image`] once. Thunks created during the run are
/// shared by every stack slot, local and array holding them, and each is
/// run at most once.
pub struct Vm<'a> {
    pub(crate) image: &'a Image,
    pub(crate) options: VmOptions,
    /// Operand stack.
    pub(crate) stack: Vec<Value>,
    /// Auxiliary stack used by `moveaside`/`moveback`.
    pub(crate) aside: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) stats: Stats,
    pub(crate) interpreted: bool,
}

impl<'a> Vm<'a> {
    /// Create a VM for a linked image.
    pub fn new(image: &'a Image, options: VmOptions) -> Self {
        Self {
            image,
            options,
            stack: Vec::new(),
            aside: Vec::new(),
            frames: Vec::new(),
            stats: Stats::default(),
            interpreted: false,
        }
    }

    /// Counters collected so far.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Where the current instruction lives, for error reports.
    pub(crate) fn at(&self) -> Location {
        let (chunk, ip) = match self.frames.last() {
            Some(frame) => (frame.chunk, frame.ip),
            None => (self.image.entry(), 1),
        };
        Location {
            chunk: self
                .image
                .chunk(chunk)
                .map(|c| c.label.clone())
                .unwrap_or_default(),
            index: ip.saturating_sub(1),
        }
    }

    fn stack_base(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.stack_base)
    }

    /// Number of values the current frame may pop.
    pub(crate) fn available(&self) -> usize {
        self.stack.len().saturating_sub(self.stack_base())
    }

    /// Push a value onto the operand stack, checking for overflow.
    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= MAX_STACK_DEPTH {
            return Err(RuntimeError::StackOverflow { at: self.at() });
        }
        self.stack.push(value);
        if self.options.record_maximum_stack_heights {
            self.stats.max_stack_height = self.stats.max_stack_height.max(self.stack.len());
        }
        Ok(())
    }

    /// Pop a value owned by the current frame.
    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.stack.len() <= self.stack_base() {
            return Err(RuntimeError::StackUnderflow { at: self.at() });
        }
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::StackUnderflow { at: self.at() })
    }

    /// Peek at the top value owned by the current frame.
    pub(crate) fn peek(&self) -> Result<&Value, RuntimeError> {
        if self.stack.len() <= self.stack_base() {
            return Err(RuntimeError::StackUnderflow { at: self.at() });
        }
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::StackUnderflow { at: self.at() })
    }

    /// Move the operand top onto the aside stack.
    pub(crate) fn move_aside(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        if self.aside.len() >= MAX_STACK_DEPTH {
            return Err(RuntimeError::StackOverflow { at: self.at() });
        }
        self.aside.push(value);
        if self.options.record_maximum_stack_heights {
            self.stats.max_aside_height = self.stats.max_aside_height.max(self.aside.len());
        }
        Ok(())
    }

    /// Move the aside top back onto the operand stack.
    pub(crate) fn move_back(&mut self) -> Result<(), RuntimeError> {
        let value = self
            .aside
            .pop()
            .ok_or_else(|| RuntimeError::AsideUnderflow { at: self.at() })?;
        self.push(value)
    }

    /// Enter `chunk` with `args`. The frame's return value goes to the
    /// caller's stack and, when `resolves` is not empty, into those thunks.
    pub(crate) fn push_frame(
        &mut self,
        chunk: ChunkId,
        args: Vec<Value>,
        resolves: Vec<Thunk>,
    ) -> Result<(), RuntimeError> {
        if self.frames.len() >= MAX_FRAME_DEPTH {
            return Err(RuntimeError::FrameOverflow { at: self.at() });
        }
        if !resolves.is_empty() {
            self.stats.thunks_forced += 1;
        }
        self.frames.push(Frame {
            chunk,
            ip: 0,
            args,
            locals: Vec::new(),
            stack_base: self.stack.len(),
            resolves,
        });
        if self.options.record_maximum_stack_heights {
            self.stats.max_frame_depth = self.stats.max_frame_depth.max(self.frames.len());
        }
        Ok(())
    }

    /// Start forcing an unresolved thunk by entering its chunk.
    ///
    /// `pending` are thunks already waiting on this one's value.
    pub(crate) fn begin_force(
        &mut self,
        thunk: Thunk,
        mut pending: Vec<Thunk>,
    ) -> Result<(), RuntimeError> {
        if thunk.is_forcing() {
            return Err(RuntimeError::CyclicThunk { at: self.at() });
        }
        let Some(target) = thunk.target() else {
            return Err(RuntimeError::CyclicThunk { at: self.at() });
        };
        let args = thunk.begin_force();
        pending.push(thunk);
        self.push_frame(target, args, pending)
    }

    /// Pop `count` values; the first popped becomes element 0.
    pub(crate) fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if count > self.available() {
            return Err(RuntimeError::StackUnderflow { at: self.at() });
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop()?);
        }
        Ok(values)
    }

    /// Interpret a number as a non-negative integer index.
    pub(crate) fn index(&self, value: &Value, op: &'static str) -> Result<usize, RuntimeError> {
        match value {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => Ok(*n as usize),
            Value::Number(n) => Err(RuntimeError::InvalidIndex {
                at: self.at(),
                value: *n,
            }),
            other => Err(self.mismatch(op, "number", other)),
        }
    }

    /// Build a type mismatch error for `op`.
    pub(crate) fn mismatch(
        &self,
        op: &'static str,
        expected: &'static str,
        found: &Value,
    ) -> RuntimeError {
        RuntimeError::TypeMismatch {
            at: self.at(),
            op,
            expected,
            found: found.type_name(),
        }
    }

    /// The current frame.
    pub(crate) fn frame(&self) -> Result<&Frame, RuntimeError> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::StackUnderflow { at: self.at() })
    }

    /// The current frame, mutably.
    pub(crate) fn frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        let at = self.at();
        self.frames
            .last_mut()
            .ok_or(RuntimeError::StackUnderflow { at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyflow_common::{Chunk, Instruction, Opcode, Program};

    fn image() -> Image {
        let mut program = Program::new();
        program
            .add_chunk("entry", Chunk::new(0, vec![Instruction::Op(Opcode::Return)]))
            .unwrap();
        program.link().unwrap()
    }

    #[test]
    fn pop_on_empty_stack_underflows() {
        let image = image();
        let mut vm = Vm::new(&image, VmOptions::default());
        assert!(matches!(vm.pop(), Err(RuntimeError::StackUnderflow { .. })));
    }

    #[test]
    fn frames_cannot_pop_below_their_base() {
        let image = image();
        let mut vm = Vm::new(&image, VmOptions::default());
        vm.push(Value::Number(1.0)).unwrap();
        vm.push_frame(image.entry(), vec![], vec![]).unwrap();
        assert!(matches!(vm.pop(), Err(RuntimeError::StackUnderflow { .. })));
        vm.frames.pop();
        assert_eq!(vm.pop().unwrap(), Value::Number(1.0));
    }

    #[test]
    fn rotation_round_trips() {
        let image = image();
        let mut vm = Vm::new(&image, VmOptions::default());
        vm.push(Value::Number(1.0)).unwrap();
        vm.push(Value::Number(2.0)).unwrap();
        vm.move_aside().unwrap();
        vm.move_aside().unwrap();
        assert!(vm.stack.is_empty());
        vm.move_back().unwrap();
        vm.move_back().unwrap();
        assert_eq!(vm.stack, vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(
            vm.move_back(),
            Err(RuntimeError::AsideUnderflow { .. })
        ));
    }

    #[test]
    fn forcing_a_thunk_being_forced_is_cyclic() {
        let image = image();
        let mut vm = Vm::new(&image, VmOptions::default());
        let thunk = Thunk::deferred(image.entry(), vec![]);
        vm.begin_force(thunk.clone(), vec![]).unwrap();
        assert_eq!(vm.stats().thunks_forced, 1);
        assert!(matches!(
            vm.begin_force(thunk, vec![]),
            Err(RuntimeError::CyclicThunk { .. })
        ));
    }

    #[test]
    fn pop_n_checks_the_count_before_popping() {
        let image = image();
        let mut vm = Vm::new(&image, VmOptions::default());
        vm.push(Value::Number(1.0)).unwrap();
        vm.push(Value::Number(2.0)).unwrap();
        assert!(matches!(
            vm.pop_n(usize::MAX),
            Err(RuntimeError::StackUnderflow { .. })
        ));
        assert_eq!(vm.stack.len(), 2);
        assert_eq!(
            vm.pop_n(2).unwrap(),
            vec![Value::Number(2.0), Value::Number(1.0)]
        );
    }

    #[test]
    fn index_rejects_fractions_and_negatives() {
        let image = image();
        let vm = Vm::new(&image, VmOptions::default());
        assert_eq!(vm.index(&Value::Number(3.0), "aget").unwrap(), 3);
        assert!(matches!(
            vm.index(&Value::Number(1.5), "aget"),
            Err(RuntimeError::InvalidIndex { .. })
        ));
        assert!(matches!(
            vm.index(&Value::Number(-1.0), "aget"),
            Err(RuntimeError::InvalidIndex { .. })
        ));
        assert!(matches!(
            vm.index(&Value::Boolean(true), "aget"),
            Err(RuntimeError::TypeMismatch { op: "aget", .. })
        ));
    }

    #[test]
    fn heights_are_recorded_when_enabled() {
        let image = image();
        let options = VmOptions {
            record_maximum_stack_heights: true,
            ..VmOptions::default()
        };
        let mut vm = Vm::new(&image, options);
        vm.push(Value::Number(1.0)).unwrap();
        vm.push(Value::Number(2.0)).unwrap();
        vm.pop().unwrap();
        assert_eq!(vm.stats().max_stack_height, 2);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: VmOptions = serde_json::from_str(r#"{"trace": true}"#).unwrap();
        assert!(options.trace);
        assert!(!options.count_executed_instructions);
    }
}
