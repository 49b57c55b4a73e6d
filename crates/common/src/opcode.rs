//! Opcode definitions for the lazyflow instruction set.
//!
//! Operands are never encoded in the opcode: they are pushed by literal
//! instructions beforehand. When an opcode pops several operands, the top
//! of the stack is popped first.

/// Identifies the operation to perform.
///
/// The mnemonic of every variant lives in [`Opcode::mnemonic`], next to the
/// enum, so names can never drift out of step with the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Stack shuffling
    /// Duplicate the top of the stack.
    Dup,
    /// Discard the top of the stack.
    Pop,
    /// Swap the two topmost values.
    Swp,
    /// Move the operand-stack top onto the aside stack.
    MoveAside,
    /// Move the aside-stack top back onto the operand stack.
    MoveBack,

    // Laziness
    /// Pop a chunk reference and its arguments, push an unevaluated thunk.
    Thunk,
    /// Wrap the top of the stack as an already-resolved thunk.
    ThunkId,
    /// Force the top of the stack to weak-head-normal form.
    Evaluate,
    /// Force the top of the stack and every array element and object field
    /// inside it, at any depth.
    DeepEvaluate,

    // Frames and control
    /// Pop a slot index, push that local.
    GetLocal,
    /// Pop a slot index, pop a value, store it in that local.
    SetLocal,
    /// Pop an argument index, push that argument.
    GetArg,
    /// Pop a chunk reference and its arguments, run the chunk.
    Call,
    /// Return the top of the stack to the caller.
    Return,
    /// Pop an instruction index, jump there.
    J,
    /// Pop an instruction index, pop a boolean, jump if true.
    Jc,

    // Numbers
    /// lhs + rhs
    NAdd,
    /// lhs - rhs
    NSub,
    /// lhs * rhs
    NMul,
    /// lhs / rhs. Division by zero is a runtime error.
    NDiv,
    /// lhs % rhs. Modulo by zero is a runtime error.
    NMod,
    /// lhs ^ rhs
    NPow,
    /// Negate a number.
    NNeg,
    /// lhs < rhs
    NLt,
    /// lhs > rhs
    NGt,
    /// lhs <= rhs
    NLte,
    /// lhs >= rhs
    NGte,

    // Equality and booleans
    /// Deep structural equality. Unforced thunks anywhere inside either
    /// operand are a type error.
    Eq,
    /// Deep structural inequality.
    Neq,
    /// Boolean and.
    BAnd,
    /// Boolean or.
    BOr,
    /// Boolean not.
    BNot,

    // Strings
    /// Concatenate two strings.
    SConcat,
    /// Length of a string in characters.
    SLen,
    /// Pop end, start and a string; push the character range.
    SSub,
    /// Render a fully evaluated value as a string.
    ToString,

    // Arrays
    /// Pop a count and that many values, push an array.
    APack,
    /// Pop an array, push its elements so element 0 ends on top.
    ASpread,
    /// Pop an array, push its length.
    ALen,
    /// Pop an index and an array, push the element.
    AGet,
    /// Concatenate two arrays.
    AConcat,

    // Objects
    /// Pop a count and that many key/value pairs, push an object.
    OPack,
    /// Pop a key and an object, push the field.
    OGet,
    /// Pop an object, push an array of its keys.
    OKeys,
}

/// All opcodes, in definition order. Useful for exhaustive testing.
pub const ALL_OPCODES: [Opcode; 44] = [
    Opcode::Dup,
    Opcode::Pop,
    Opcode::Swp,
    Opcode::MoveAside,
    Opcode::MoveBack,
    Opcode::Thunk,
    Opcode::ThunkId,
    Opcode::Evaluate,
    Opcode::DeepEvaluate,
    Opcode::GetLocal,
    Opcode::SetLocal,
    Opcode::GetArg,
    Opcode::Call,
    Opcode::Return,
    Opcode::J,
    Opcode::Jc,
    Opcode::NAdd,
    Opcode::NSub,
    Opcode::NMul,
    Opcode::NDiv,
    Opcode::NMod,
    Opcode::NPow,
    Opcode::NNeg,
    Opcode::NLt,
    Opcode::NGt,
    Opcode::NLte,
    Opcode::NGte,
    Opcode::Eq,
    Opcode::Neq,
    Opcode::BAnd,
    Opcode::BOr,
    Opcode::BNot,
    Opcode::SConcat,
    Opcode::SLen,
    Opcode::SSub,
    Opcode::ToString,
    Opcode::APack,
    Opcode::ASpread,
    Opcode::ALen,
    Opcode::AGet,
    Opcode::AConcat,
    Opcode::OPack,
    Opcode::OGet,
    Opcode::OKeys,
];

impl Opcode {
    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Dup => "dup",
            Opcode::Pop => "pop",
            Opcode::Swp => "swp",
            Opcode::MoveAside => "moveaside",
            Opcode::MoveBack => "moveback",
            Opcode::Thunk => "thunk",
            Opcode::ThunkId => "thunk_id",
            Opcode::Evaluate => "evaluate",
            Opcode::DeepEvaluate => "deepevaluate",
            Opcode::GetLocal => "getlocal",
            Opcode::SetLocal => "setlocal",
            Opcode::GetArg => "getarg",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::J => "j",
            Opcode::Jc => "jc",
            Opcode::NAdd => "nadd",
            Opcode::NSub => "nsub",
            Opcode::NMul => "nmul",
            Opcode::NDiv => "ndiv",
            Opcode::NMod => "nmod",
            Opcode::NPow => "npow",
            Opcode::NNeg => "nneg",
            Opcode::NLt => "nlt",
            Opcode::NGt => "ngt",
            Opcode::NLte => "nlte",
            Opcode::NGte => "ngte",
            Opcode::Eq => "eq",
            Opcode::Neq => "neq",
            Opcode::BAnd => "band",
            Opcode::BOr => "bor",
            Opcode::BNot => "bnot",
            Opcode::SConcat => "sconcat",
            Opcode::SLen => "slen",
            Opcode::SSub => "ssub",
            Opcode::ToString => "tostring",
            Opcode::APack => "apack",
            Opcode::ASpread => "aspread",
            Opcode::ALen => "alen",
            Opcode::AGet => "aget",
            Opcode::AConcat => "aconcat",
            Opcode::OPack => "opack",
            Opcode::OGet => "oget",
            Opcode::OKeys => "okeys",
        }
    }

    /// Look up an opcode by its mnemonic.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        ALL_OPCODES.iter().copied().find(|op| op.mnemonic() == name)
    }

    /// True for `j` and `jc`, whose operand is an instruction index.
    pub fn is_jump(&self) -> bool {
        matches!(self, Opcode::J | Opcode::Jc)
    }
}
