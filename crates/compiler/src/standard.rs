//! The standard routine library.
//!
//! Routine `standard::<name>` lives in chunk `module::standard::<name>`.
//! Arguments arrive as thunks; each routine forces only what it needs.

use crate::source::RoutineSource;
use lazyflow_common::{Chunk, ChunkBuilder, Opcode};

const PREFIX: &str = "standard::";
const MODULE_PREFIX: &str = "module::standard::";

/// How a routine body is built.
#[derive(Debug, Clone, Copy)]
enum Body {
    /// Force every argument, apply one opcode, return.
    Primitive(Opcode),
    /// Like `Primitive`, forcing everything nested in the arguments too.
    Settled(Opcode),
    /// Like `Primitive`, then force the element the opcode fetched.
    Fetch(Opcode),
    Identity,
    And,
    Or,
    Choose,
    Join,
}

/// `(name, arity, body)` for every routine.
const ROUTINES: &[(&str, usize, Body)] = &[
    ("add", 2, Body::Primitive(Opcode::NAdd)),
    ("subtract", 2, Body::Primitive(Opcode::NSub)),
    ("multiply", 2, Body::Primitive(Opcode::NMul)),
    ("divide", 2, Body::Primitive(Opcode::NDiv)),
    ("modulo", 2, Body::Primitive(Opcode::NMod)),
    ("power", 2, Body::Primitive(Opcode::NPow)),
    ("negate", 1, Body::Primitive(Opcode::NNeg)),
    ("less_than", 2, Body::Primitive(Opcode::NLt)),
    ("greater_than", 2, Body::Primitive(Opcode::NGt)),
    ("less_or_equal", 2, Body::Primitive(Opcode::NLte)),
    ("greater_or_equal", 2, Body::Primitive(Opcode::NGte)),
    ("equal", 2, Body::Settled(Opcode::Eq)),
    ("not_equal", 2, Body::Settled(Opcode::Neq)),
    ("and", 2, Body::And),
    ("or", 2, Body::Or),
    ("not", 1, Body::Primitive(Opcode::BNot)),
    ("choose", 3, Body::Choose),
    ("concat", 2, Body::Primitive(Opcode::SConcat)),
    ("length", 1, Body::Primitive(Opcode::SLen)),
    ("substring", 3, Body::Primitive(Opcode::SSub)),
    ("to_string", 1, Body::Settled(Opcode::ToString)),
    ("join", 2, Body::Join),
    ("list_length", 1, Body::Primitive(Opcode::ALen)),
    ("list_get", 2, Body::Fetch(Opcode::AGet)),
    ("list_concat", 2, Body::Primitive(Opcode::AConcat)),
    ("map_get", 2, Body::Fetch(Opcode::OGet)),
    ("map_keys", 1, Body::Primitive(Opcode::OKeys)),
    ("identity", 1, Body::Identity),
];

/// Arithmetic, comparison, logic, string, list and map routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLibrary;

impl StandardLibrary {
    fn lookup(path: &str) -> Option<(&'static str, usize, Body)> {
        let name = path.strip_prefix(PREFIX)?;
        ROUTINES.iter().copied().find(|(n, _, _)| *n == name)
    }
}

impl RoutineSource for StandardLibrary {
    fn chunks_provided(&self) -> Vec<(String, Chunk)> {
        ROUTINES
            .iter()
            .map(|&(name, arity, body)| (format!("{MODULE_PREFIX}{name}"), build(arity, body)))
            .collect()
    }

    fn routine_arity(&self, path: &str) -> Option<usize> {
        Self::lookup(path).map(|(_, arity, _)| arity)
    }

    fn try_emit_call(&self, stream: &mut ChunkBuilder, path: &str) -> bool {
        match Self::lookup(path) {
            Some((name, _, _)) => {
                stream.thunk(format!("{MODULE_PREFIX}{name}"));
                true
            }
            None => false,
        }
    }
}

fn build(arity: usize, body: Body) -> Chunk {
    let mut b = ChunkBuilder::new();
    match body {
        Body::Primitive(op) => {
            push_args(&mut b, arity);
            b.op(op).op(Opcode::Return);
        }
        Body::Settled(op) => {
            for i in 0..arity {
                b.get_arg(i);
            }
            b.deep_force_top(arity).op(op).op(Opcode::Return);
        }
        Body::Fetch(op) => {
            push_args(&mut b, arity);
            b.op(op).op(Opcode::Evaluate).op(Opcode::Return);
        }
        Body::Identity => {
            b.get_arg(0).op(Opcode::Evaluate).op(Opcode::Return);
        }
        Body::And => short_circuit(&mut b, false),
        Body::Or => short_circuit(&mut b, true),
        Body::Choose => {
            let then = b.new_label();
            b.get_arg(0).op(Opcode::Evaluate).jump_if(then);
            b.get_arg(2).op(Opcode::Evaluate).op(Opcode::Return);
            b.bind(then);
            b.get_arg(1).op(Opcode::Evaluate).op(Opcode::Return);
        }
        Body::Join => join(&mut b),
    }
    b.finish(arity)
}

/// Push arguments `0..arity` (argument 0 deepest) and force them in place.
fn push_args(b: &mut ChunkBuilder, arity: usize) {
    for i in 0..arity {
        b.get_arg(i);
    }
    b.force_top(arity);
}

/// `and` returns false without forcing argument 1 when argument 0 is
/// false; `or` returns true when argument 0 is true.
fn short_circuit(b: &mut ChunkBuilder, decided_by: bool) {
    let decided = b.new_label();
    b.get_arg(0).op(Opcode::Evaluate);
    if !decided_by {
        b.op(Opcode::BNot);
    }
    b.jump_if(decided);
    b.get_arg(1).op(Opcode::Evaluate).op(Opcode::Return);
    b.bind(decided);
    b.lit(decided_by).op(Opcode::Return);
}

/// `join(list, separator)`: concatenate the string forms of the list's
/// elements with the separator between them.
fn join(b: &mut ChunkBuilder) {
    const LIST: usize = 0;
    const SEP: usize = 1;
    const INDEX: usize = 2;
    const ACC: usize = 3;
    const LEN: usize = 4;

    b.get_arg(0).op(Opcode::Evaluate).set_local(LIST);
    b.get_arg(1).op(Opcode::DeepEvaluate).op(Opcode::ToString).set_local(SEP);
    b.lit(0usize).set_local(INDEX);
    b.lit("").set_local(ACC);
    b.get_local(LIST).op(Opcode::ALen).set_local(LEN);

    let top = b.new_label();
    let no_separator = b.new_label();
    let done = b.new_label();

    b.bind(top);
    b.get_local(INDEX).get_local(LEN).op(Opcode::NLt).op(Opcode::BNot);
    b.jump_if(done);

    b.get_local(INDEX).lit(0usize).op(Opcode::Eq).jump_if(no_separator);
    b.get_local(ACC).get_local(SEP).op(Opcode::SConcat).set_local(ACC);
    b.bind(no_separator);

    b.get_local(ACC);
    b.get_local(LIST).get_local(INDEX).op(Opcode::AGet);
    b.op(Opcode::DeepEvaluate).op(Opcode::ToString);
    b.op(Opcode::SConcat).set_local(ACC);

    b.get_local(INDEX).lit(1usize).op(Opcode::NAdd).set_local(INDEX);
    b.jump(top);

    b.bind(done);
    b.get_local(ACC).op(Opcode::Return);
}
