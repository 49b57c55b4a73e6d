//! Runtime value representation for the lazyflow VM.
//!
//! Values are what live on the operand stack, in locals and in captured
//! thunk arguments. Aggregates are reference counted, so copying a value
//! onto the stack never deep-clones it.

use crate::program::ChunkId;
use indexmap::IndexMap;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// A number.
    Number(f64),
    /// A string.
    String(Rc<str>),
    /// A boolean.
    Boolean(bool),
    /// An ordered string-keyed object.
    Object(Rc<IndexMap<String, Value>>),
    /// An array.
    Array(Rc<Vec<Value>>),
    /// A callable chunk.
    Chunk(ChunkId),
    /// A deferred computation.
    Thunk(Thunk),
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Build an array value.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    /// Build an object value.
    pub fn object(fields: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(fields))
    }

    /// Short name of this value's shape, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Chunk(_) => "chunk",
            Value::Thunk(_) => "thunk",
        }
    }

    /// Returns true if this value is a thunk (resolved or not).
    pub fn is_thunk(&self) -> bool {
        matches!(self, Value::Thunk(_))
    }

    /// True if an unresolved thunk is reachable from this value, through
    /// resolved thunks, array elements and object fields.
    pub fn has_pending(&self) -> bool {
        match self {
            Value::Thunk(thunk) => thunk.result().map_or(true, Value::has_pending),
            Value::Array(items) => items.iter().any(Value::has_pending),
            Value::Object(fields) => fields.values().any(Value::has_pending),
            _ => false,
        }
    }

    /// Replace every resolved thunk, at any depth, by its cached result.
    ///
    /// Nothing is forced: unresolved thunks are kept as they are.
    pub fn settled(&self) -> Value {
        match self {
            Value::Thunk(thunk) => match thunk.result() {
                Some(value) => value.settled(),
                None => self.clone(),
            },
            Value::Array(items) => Value::array(items.iter().map(Value::settled).collect()),
            Value::Object(fields) => Value::object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.settled()))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }
}

// Thunks compare through their cached results when both are resolved and
// by identity otherwise. Numbers use IEEE equality, so NaN != NaN.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Chunk(a), Value::Chunk(b)) => a == b,
            (Value::Thunk(a), Value::Thunk(b)) => match (a.result(), b.result()) {
                (Some(x), Some(y)) => x == y,
                _ => a.ptr_eq(b),
            },
            (Value::Thunk(a), concrete) | (concrete, Value::Thunk(a)) => {
                a.result().is_some_and(|v| v == concrete)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Chunk(id) => write!(f, "<chunk #{}>", id.index()),
            Value::Thunk(thunk) => match thunk.result() {
                Some(value) => write!(f, "{value}"),
                None => f.write_str("<thunk>"),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

struct ThunkCell {
    target: Option<ChunkId>,
    args: RefCell<Vec<Value>>,
    result: OnceCell<Value>,
    forcing: Cell<bool>,
}

/// A shared, memoizing deferred computation.
///
/// Cloning a `Thunk` clones the handle: every holder observes the same
/// cached result once any of them forces it.
#[derive(Clone)]
pub struct Thunk(Rc<ThunkCell>);

impl Thunk {
    /// A thunk that will run `target` with `args` when forced.
    pub fn deferred(target: ChunkId, args: Vec<Value>) -> Self {
        Thunk(Rc::new(ThunkCell {
            target: Some(target),
            args: RefCell::new(args),
            result: OnceCell::new(),
            forcing: Cell::new(false),
        }))
    }

    /// An identity thunk: already resolved to `value`.
    pub fn resolved(value: Value) -> Self {
        Thunk(Rc::new(ThunkCell {
            target: None,
            args: RefCell::new(Vec::new()),
            result: OnceCell::from(value),
            forcing: Cell::new(false),
        }))
    }

    /// The chunk this thunk runs, or `None` for an identity thunk.
    pub fn target(&self) -> Option<ChunkId> {
        self.0.target
    }

    /// The cached result, if forced.
    pub fn result(&self) -> Option<&Value> {
        self.0.result.get()
    }

    /// True once the result is cached.
    pub fn is_resolved(&self) -> bool {
        self.0.result.get().is_some()
    }

    /// True while the thunk's chunk is running.
    pub fn is_forcing(&self) -> bool {
        self.0.forcing.get()
    }

    /// Mark the thunk as being forced and hand over its captured arguments.
    pub fn begin_force(&self) -> Vec<Value> {
        self.0.forcing.set(true);
        self.0.args.take()
    }

    /// Cache the result. Returns false if a result was already cached, in
    /// which case the existing result is kept.
    pub fn resolve(&self, value: Value) -> bool {
        self.0.forcing.set(false);
        self.0.result.set(value).is_ok()
    }

    /// True if both handles point at the same thunk.
    pub fn ptr_eq(&self, other: &Thunk) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Thunk");
        s.field("target", &self.0.target);
        match self.result() {
            Some(value) => s.field("result", value),
            None => s.field("args", &self.0.args.borrow().len()),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::string("a").type_name(), "string");
        assert_eq!(Value::Boolean(true).type_name(), "boolean");
        assert_eq!(Value::array(vec![]).type_name(), "array");
        assert_eq!(Value::object(IndexMap::new()).type_name(), "object");
        assert_eq!(Value::Chunk(ChunkId::new(0)).type_name(), "chunk");
        assert_eq!(
            Value::Thunk(Thunk::resolved(Value::Number(1.0))).type_name(),
            "thunk"
        );
    }

    #[test]
    fn resolve_is_write_once() {
        let thunk = Thunk::deferred(ChunkId::new(3), vec![Value::Number(1.0)]);
        assert!(!thunk.is_resolved());
        let args = thunk.begin_force();
        assert_eq!(args, vec![Value::Number(1.0)]);
        assert!(thunk.is_forcing());

        assert!(thunk.resolve(Value::Number(5.0)));
        assert!(!thunk.is_forcing());
        assert!(!thunk.resolve(Value::Number(6.0)));
        assert_eq!(thunk.result(), Some(&Value::Number(5.0)));
    }

    #[test]
    fn clones_share_the_cached_result() {
        let thunk = Thunk::deferred(ChunkId::new(0), vec![]);
        let alias = thunk.clone();
        thunk.resolve(Value::string("done"));
        assert_eq!(alias.result(), Some(&Value::string("done")));
        assert!(alias.ptr_eq(&thunk));
    }

    #[test]
    fn identity_thunk_is_resolved() {
        let thunk = Thunk::resolved(Value::Boolean(false));
        assert!(thunk.is_resolved());
        assert_eq!(thunk.target(), None);
    }

    #[test]
    fn unresolved_thunks_compare_by_identity() {
        let a = Thunk::deferred(ChunkId::new(0), vec![]);
        let b = Thunk::deferred(ChunkId::new(0), vec![]);
        assert_eq!(Value::Thunk(a.clone()), Value::Thunk(a.clone()));
        assert_ne!(Value::Thunk(a), Value::Thunk(b));
    }

    #[test]
    fn pending_thunks_are_found_at_any_depth() {
        let pending = Value::Thunk(Thunk::deferred(ChunkId::new(1), vec![]));
        let resolved = Value::Thunk(Thunk::resolved(Value::array(vec![Value::Number(1.0)])));
        assert!(!Value::Number(1.0).has_pending());
        assert!(!resolved.has_pending());
        assert!(pending.has_pending());

        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), Value::array(vec![pending.clone()]));
        assert!(Value::object(fields).has_pending());
        let wrapped = Value::Thunk(Thunk::resolved(Value::array(vec![pending])));
        assert!(wrapped.has_pending());
    }

    #[test]
    fn object_equality_ignores_key_order() {
        let mut x = IndexMap::new();
        x.insert("a".to_string(), Value::Number(1.0));
        x.insert("b".to_string(), Value::Number(2.0));
        let mut y = IndexMap::new();
        y.insert("b".to_string(), Value::Number(2.0));
        y.insert("a".to_string(), Value::Number(1.0));
        assert_eq!(Value::object(x), Value::object(y));
    }

    #[test]
    fn settled_unwraps_resolved_thunks() {
        let inner = Value::Thunk(Thunk::resolved(Value::Number(2.0)));
        let pending = Value::Thunk(Thunk::deferred(ChunkId::new(1), vec![]));
        let value = Value::array(vec![inner, pending.clone()]);

        match value.settled() {
            Value::Array(items) => {
                assert!(matches!(items[0], Value::Number(n) if n == 2.0));
                assert!(items[1].is_thunk());
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(
            Value::array(vec![Value::string("a"), Value::Boolean(true)]).to_string(),
            "[a, true]"
        );
        let pending = Value::Thunk(Thunk::deferred(ChunkId::new(0), vec![]));
        assert_eq!(pending.to_string(), "<thunk>");
    }
}
