//! Main execution loop and opcode dispatch for the lazyflow VM.
//!
//! The loop never recurses on the host stack for `call` or `evaluate`:
//! both push a [`Frame`](crate::machine::Frame) and `return` pops it. A
//! frame created to force a thunk carries the thunk, and the value it
//! returns is cached there before being handed to the caller. Deep forcing
//! (`deepevaluate` and [`Vm::pop_result`]) walks aggregates on the host
//! stack and runs each thunk it meets in a nested loop.

use crate::error::{Location, RuntimeError};
use crate::machine::{Vm, MAX_LOCALS};
use indexmap::IndexMap;
use lazyflow_common::{ChunkId, Code, Opcode, Thunk, Value};
use std::rc::Rc;
use tracing::{debug, trace};

impl<'a> Vm<'a> {
    /// Run the program from its entry chunk until the entry returns.
    ///
    /// A VM interprets once; call [`pop_result`](Self::pop_result) to take
    /// the value the entry chunk returned.
    pub fn interpret(&mut self) -> Result<(), RuntimeError> {
        if self.interpreted {
            return Err(RuntimeError::AlreadyInterpreted);
        }
        self.interpreted = true;

        self.push_frame(self.image.entry(), Vec::new(), Vec::new())?;
        self.run_frames(0)?;
        debug!(stats = ?self.stats, "interpretation finished");
        Ok(())
    }

    /// Pop the final value and force whatever is still deferred inside it.
    ///
    /// The entry chunk only evaluates its result to weak head normal form,
    /// so arrays and objects may still hold thunks; those are run here.
    pub fn pop_result(&mut self) -> Result<Value, RuntimeError> {
        let value = self.stack.pop().ok_or(RuntimeError::NoResult)?;
        self.force_deep(value)
    }

    fn force_deep(&mut self, value: Value) -> Result<Value, RuntimeError> {
        match value {
            Value::Thunk(thunk) => {
                let forced = match thunk.result().cloned() {
                    Some(result) => result,
                    None => {
                        let floor = self.frames.len();
                        self.begin_force(thunk, Vec::new())?;
                        self.run_frames(floor)?;
                        self.stack.pop().ok_or(RuntimeError::NoResult)?
                    }
                };
                self.force_deep(forced)
            }
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.force_deep(item.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(items))
            }
            Value::Object(fields) => {
                let fields = fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.force_deep(v.clone())?)))
                    .collect::<Result<IndexMap<_, _>, RuntimeError>>()?;
                Ok(Value::object(fields))
            }
            other => Ok(other),
        }
    }

    /// Execute until the frame stack is back down to `floor` frames.
    pub(crate) fn run_frames(&mut self, floor: usize) -> Result<(), RuntimeError> {
        let image = self.image;

        while self.frames.len() > floor {
            let Some(frame) = self.frames.last_mut() else {
                break;
            };
            let (id, ip) = (frame.chunk, frame.ip);
            frame.ip += 1;

            let chunk = image.chunk(id).ok_or_else(|| RuntimeError::EndOfChunk {
                at: Location {
                    chunk: format!("#{}", id.index()),
                    index: ip,
                },
            })?;
            let Some(code) = chunk.code.get(ip) else {
                return Err(RuntimeError::EndOfChunk {
                    at: Location {
                        chunk: chunk.label.clone(),
                        index: ip,
                    },
                });
            };

            if self.options.count_executed_instructions {
                self.stats.executed_instructions += 1;
            }
            if self.options.trace {
                let height = self.stack.len();
                match code {
                    Code::Op(op) => trace!(chunk = %chunk.label, ip, op = op.mnemonic(), height, "execute"),
                    Code::Push(value) => trace!(chunk = %chunk.label, ip, push = %value, height, "execute"),
                }
            }

            match code {
                Code::Push(value) => self.push(value.clone())?,
                Code::Op(op) => self.execute_op(*op)?,
            }
        }
        Ok(())
    }

    fn execute_op(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        match op {
            // Stack shuffling
            Opcode::Dup => {
                let top = self.peek()?.clone();
                self.push(top)
            }
            Opcode::Pop => self.pop().map(drop),
            Opcode::Swp => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(a)
            }
            Opcode::MoveAside => self.move_aside(),
            Opcode::MoveBack => self.move_back(),

            // Laziness
            Opcode::Thunk => self.exec_thunk(),
            Opcode::ThunkId => self.exec_thunk_id(),
            Opcode::Evaluate => self.exec_evaluate(),
            Opcode::DeepEvaluate => {
                let value = self.pop()?;
                let value = self.force_deep(value)?;
                self.push(value)
            }

            // Frames
            Opcode::GetLocal => self.exec_get_local(),
            Opcode::SetLocal => self.exec_set_local(),
            Opcode::GetArg => self.exec_get_arg(),
            Opcode::Call => self.exec_call(),
            Opcode::Return => self.exec_return(),
            Opcode::J => self.exec_jump(false),
            Opcode::Jc => self.exec_jump(true),

            // Numbers
            Opcode::NAdd => self.exec_arith(op, |a, b| a + b),
            Opcode::NSub => self.exec_arith(op, |a, b| a - b),
            Opcode::NMul => self.exec_arith(op, |a, b| a * b),
            Opcode::NDiv => self.exec_division(op, |a, b| a / b),
            Opcode::NMod => self.exec_division(op, |a, b| a % b),
            Opcode::NPow => self.exec_arith(op, f64::powf),
            Opcode::NNeg => {
                let n = self.pop_number(op)?;
                self.push(Value::Number(-n))
            }
            Opcode::NLt => self.exec_comparison(op, |a, b| a < b),
            Opcode::NGt => self.exec_comparison(op, |a, b| a > b),
            Opcode::NLte => self.exec_comparison(op, |a, b| a <= b),
            Opcode::NGte => self.exec_comparison(op, |a, b| a >= b),

            // Equality and logic
            Opcode::Eq => self.exec_equality(op, false),
            Opcode::Neq => self.exec_equality(op, true),
            Opcode::BAnd => self.exec_logic(op, |a, b| a && b),
            Opcode::BOr => self.exec_logic(op, |a, b| a || b),
            Opcode::BNot => {
                let b = self.pop_bool(op)?;
                self.push(Value::Boolean(!b))
            }

            // Strings
            Opcode::SConcat => {
                let rhs = self.pop_string(op)?;
                let lhs = self.pop_string(op)?;
                self.push(Value::string(format!("{lhs}{rhs}")))
            }
            Opcode::SLen => {
                let s = self.pop_string(op)?;
                self.push(Value::Number(s.chars().count() as f64))
            }
            Opcode::SSub => self.exec_substring(),
            Opcode::ToString => self.exec_to_string(),

            // Arrays
            Opcode::APack => {
                let count = self.pop_index(op)?;
                let items = self.pop_n(count)?;
                self.push(Value::array(items))
            }
            Opcode::ASpread => {
                let items = self.pop_array(op)?;
                for item in items.iter().rev() {
                    self.push(item.clone())?;
                }
                Ok(())
            }
            Opcode::ALen => {
                let items = self.pop_array(op)?;
                self.push(Value::Number(items.len() as f64))
            }
            Opcode::AGet => self.exec_array_get(),
            Opcode::AConcat => {
                let rhs = self.pop_array(op)?;
                let lhs = self.pop_array(op)?;
                let items = lhs.iter().chain(rhs.iter()).cloned().collect();
                self.push(Value::array(items))
            }

            // Objects
            Opcode::OPack => self.exec_object_pack(),
            Opcode::OGet => self.exec_object_get(),
            Opcode::OKeys => {
                let fields = self.pop_object(op)?;
                let keys = fields.keys().map(Value::string).collect();
                self.push(Value::array(keys))
            }
        }
    }

    // ---- Laziness ----

    fn exec_thunk(&mut self) -> Result<(), RuntimeError> {
        let (target, args) = self.pop_call(Opcode::Thunk)?;
        self.push(Value::Thunk(Thunk::deferred(target, args)))
    }

    fn exec_thunk_id(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        if value.is_thunk() {
            return self.push(value);
        }
        self.push(Value::Thunk(Thunk::resolved(value)))
    }

    fn exec_evaluate(&mut self) -> Result<(), RuntimeError> {
        match self.pop()? {
            Value::Thunk(thunk) => match thunk.result().cloned() {
                Some(result) => self.push(result),
                None => self.begin_force(thunk, Vec::new()),
            },
            value => self.push(value),
        }
    }

    // ---- Frames ----

    fn exec_get_local(&mut self) -> Result<(), RuntimeError> {
        let slot = self.pop_index(Opcode::GetLocal)?;
        let value = self.frame()?.locals.get(slot).cloned().flatten();
        match value {
            Some(value) => self.push(value),
            None => Err(RuntimeError::MissingLocal {
                at: self.at(),
                index: slot,
            }),
        }
    }

    fn exec_set_local(&mut self) -> Result<(), RuntimeError> {
        let slot = self.pop_index(Opcode::SetLocal)?;
        if slot >= MAX_LOCALS {
            return Err(RuntimeError::InvalidIndex {
                at: self.at(),
                value: slot as f64,
            });
        }
        let value = self.pop()?;
        let locals = &mut self.frame_mut()?.locals;
        if locals.len() <= slot {
            locals.resize(slot + 1, None);
        }
        locals[slot] = Some(value);
        Ok(())
    }

    fn exec_get_arg(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop_index(Opcode::GetArg)?;
        match self.frame()?.args.get(index).cloned() {
            Some(value) => self.push(value),
            None => Err(RuntimeError::MissingArgument {
                at: self.at(),
                index,
            }),
        }
    }

    fn exec_call(&mut self) -> Result<(), RuntimeError> {
        let (target, args) = self.pop_call(Opcode::Call)?;
        self.push_frame(target, args, Vec::new())
    }

    /// Pop a callee and as many arguments as it declares.
    fn pop_call(&mut self, op: Opcode) -> Result<(ChunkId, Vec<Value>), RuntimeError> {
        let target = match self.pop()? {
            Value::Chunk(id) => id,
            other => {
                return Err(RuntimeError::NotCallable {
                    at: self.at(),
                    found: other.type_name(),
                })
            }
        };
        let arity = self
            .image
            .chunk(target)
            .map(|chunk| chunk.arity)
            .ok_or_else(|| self.mismatch(op.mnemonic(), "chunk", &Value::Chunk(target)))?;
        let args = self.pop_n(arity)?;
        Ok((target, args))
    }

    fn exec_return(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        let stranded = self.available();
        if stranded > 0 {
            self.stats.stranded_values += stranded as u64;
            debug!(at = %self.at(), stranded, "frame returned over leftover values");
        }
        let at = self.at();
        let frame = self
            .frames
            .pop()
            .ok_or(RuntimeError::StackUnderflow { at })?;
        self.stack.truncate(frame.stack_base);

        if frame.resolves.is_empty() {
            return self.push(value);
        }

        // A thunk that returns another thunk is resolved by that one's value.
        let value = match value {
            Value::Thunk(next) => match next.result().cloned() {
                Some(result) => result,
                None => return self.begin_force(next, frame.resolves),
            },
            value => value,
        };
        for thunk in &frame.resolves {
            thunk.resolve(value.clone());
        }
        self.push(value)
    }

    fn exec_jump(&mut self, conditional: bool) -> Result<(), RuntimeError> {
        let op = if conditional { Opcode::Jc } else { Opcode::J };
        let target = self.pop_index(op)?;
        if conditional && !self.pop_bool(op)? {
            return Ok(());
        }
        self.frame_mut()?.ip = target;
        Ok(())
    }

    // ---- Primitives ----

    fn exec_arith(&mut self, op: Opcode, f: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let rhs = self.pop_number(op)?;
        let lhs = self.pop_number(op)?;
        self.push(Value::Number(f(lhs, rhs)))
    }

    fn exec_division(&mut self, op: Opcode, f: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let rhs = self.pop_number(op)?;
        let lhs = self.pop_number(op)?;
        if rhs == 0.0 {
            return Err(RuntimeError::DivisionByZero { at: self.at() });
        }
        self.push(Value::Number(f(lhs, rhs)))
    }

    fn exec_comparison(&mut self, op: Opcode, f: fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let rhs = self.pop_number(op)?;
        let lhs = self.pop_number(op)?;
        self.push(Value::Boolean(f(lhs, rhs)))
    }

    fn exec_logic(&mut self, op: Opcode, f: fn(bool, bool) -> bool) -> Result<(), RuntimeError> {
        let rhs = self.pop_bool(op)?;
        let lhs = self.pop_bool(op)?;
        self.push(Value::Boolean(f(lhs, rhs)))
    }

    fn exec_equality(&mut self, op: Opcode, negate: bool) -> Result<(), RuntimeError> {
        let rhs = self.pop_settled(op)?;
        let lhs = self.pop_settled(op)?;
        self.push(Value::Boolean((lhs == rhs) != negate))
    }

    /// `s start end → s[start..end]` over characters. Bounds are clamped to
    /// the string and swapped when `start > end`.
    fn exec_substring(&mut self) -> Result<(), RuntimeError> {
        let op = Opcode::SSub;
        let end = self.pop_number(op)?;
        let start = self.pop_number(op)?;
        let s = self.pop_string(op)?;

        let chars: Vec<char> = s.chars().collect();
        let clamp = |n: f64| {
            if n.is_nan() {
                0
            } else {
                n.clamp(0.0, chars.len() as f64) as usize
            }
        };
        let (mut from, mut to) = (clamp(start), clamp(end));
        if from > to {
            std::mem::swap(&mut from, &mut to);
        }
        let sub: String = chars[from..to].iter().collect();
        self.push(Value::string(sub))
    }

    fn exec_to_string(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop_settled(Opcode::ToString)?;
        let text = match value {
            Value::String(_) => value,
            other => Value::string(other.to_string()),
        };
        self.push(text)
    }

    fn exec_array_get(&mut self) -> Result<(), RuntimeError> {
        let op = Opcode::AGet;
        let index = self.pop_index(op)?;
        let items = self.pop_array(op)?;
        match items.get(index) {
            Some(item) => self.push(item.clone()),
            None => Err(RuntimeError::IndexOutOfBounds {
                at: self.at(),
                index,
                length: items.len(),
            }),
        }
    }

    fn exec_object_pack(&mut self) -> Result<(), RuntimeError> {
        let op = Opcode::OPack;
        let count = self.pop_index(op)?;
        if count.saturating_mul(2) > self.available() {
            return Err(RuntimeError::StackUnderflow { at: self.at() });
        }
        let mut fields = IndexMap::with_capacity(count);
        for _ in 0..count {
            let key = self.pop_string(op)?;
            let value = self.pop()?;
            fields.insert(key.to_string(), value);
        }
        self.push(Value::object(fields))
    }

    fn exec_object_get(&mut self) -> Result<(), RuntimeError> {
        let op = Opcode::OGet;
        let key = self.pop_string(op)?;
        let fields = self.pop_object(op)?;
        match fields.get(&*key) {
            Some(value) => self.push(value.clone()),
            None => Err(RuntimeError::MissingKey {
                at: self.at(),
                key: key.to_string(),
            }),
        }
    }

    // ---- Typed pops ----

    fn pop_number(&mut self, op: Opcode) -> Result<f64, RuntimeError> {
        match self.pop()? {
            Value::Number(n) => Ok(n),
            other => Err(self.mismatch(op.mnemonic(), "number", &other)),
        }
    }

    fn pop_index(&mut self, op: Opcode) -> Result<usize, RuntimeError> {
        let value = self.pop()?;
        self.index(&value, op.mnemonic())
    }

    fn pop_bool(&mut self, op: Opcode) -> Result<bool, RuntimeError> {
        match self.pop()? {
            Value::Boolean(b) => Ok(b),
            other => Err(self.mismatch(op.mnemonic(), "boolean", &other)),
        }
    }

    fn pop_string(&mut self, op: Opcode) -> Result<Rc<str>, RuntimeError> {
        match self.pop()? {
            Value::String(s) => Ok(s),
            other => Err(self.mismatch(op.mnemonic(), "string", &other)),
        }
    }

    fn pop_array(&mut self, op: Opcode) -> Result<Rc<Vec<Value>>, RuntimeError> {
        match self.pop()? {
            Value::Array(items) => Ok(items),
            other => Err(self.mismatch(op.mnemonic(), "array", &other)),
        }
    }

    fn pop_object(&mut self, op: Opcode) -> Result<Rc<IndexMap<String, Value>>, RuntimeError> {
        match self.pop()? {
            Value::Object(fields) => Ok(fields),
            other => Err(self.mismatch(op.mnemonic(), "object", &other)),
        }
    }

    /// Pop a value with nothing deferred left in it. Resolved thunks inside
    /// aggregates are allowed; an unresolved one is a type error.
    fn pop_settled(&mut self, op: Opcode) -> Result<Value, RuntimeError> {
        let value = self.pop()?;
        if value.is_thunk() {
            return Err(self.mismatch(op.mnemonic(), "evaluated value", &value));
        }
        if value.has_pending() {
            return Err(RuntimeError::TypeMismatch {
                at: self.at(),
                op: op.mnemonic(),
                expected: "fully evaluated value",
                found: "unevaluated element",
            });
        }
        Ok(value)
    }
}
