//! Rotation cleanup.
//!
//! `moveaside` immediately followed by `moveback` leaves both stacks as
//! they were, so the pair is dropped. Removing instructions shifts every
//! later index, so absolute jump targets are rewritten to match.
//!
//! A chunk is only touched when every jump's target is the number literal
//! right before it. A pair is kept if either of its instructions is a
//! jump target.

use lazyflow_common::{Chunk, Instruction, Literal, Opcode};

/// Where each jump's target literal sits and where it points.
struct Jump {
    literal: usize,
    target: usize,
}

fn jumps(instructions: &[Instruction]) -> Option<Vec<Jump>> {
    let mut found = Vec::new();
    for (at, instr) in instructions.iter().enumerate() {
        if !instr.opcode().is_some_and(|op| op.is_jump()) {
            continue;
        }
        let literal = at.checked_sub(1)?;
        match instructions[literal] {
            Instruction::Lit(Literal::Number(n))
                if n >= 0.0 && n.fract() == 0.0 && n <= instructions.len() as f64 =>
            {
                found.push(Jump {
                    literal,
                    target: n as usize,
                });
            }
            _ => return None,
        }
    }
    Some(found)
}

/// Drop `moveaside`/`moveback` pairs until none is left. Returns how many
/// instructions were removed.
pub fn collapse_rotations(chunk: &mut Chunk) -> usize {
    let mut removed = 0;
    loop {
        let Some(jumps) = jumps(&chunk.instructions) else {
            return removed;
        };
        let n = collapse_once(&mut chunk.instructions, &jumps);
        if n == 0 {
            return removed;
        }
        removed += n;
    }
}

fn collapse_once(instructions: &mut Vec<Instruction>, jumps: &[Jump]) -> usize {
    let is_target = |at: usize| jumps.iter().any(|jump| jump.target == at);

    let mut keep = vec![true; instructions.len()];
    let mut at = 0;
    while at + 1 < instructions.len() {
        let pair = instructions[at].opcode() == Some(Opcode::MoveAside)
            && instructions[at + 1].opcode() == Some(Opcode::MoveBack);
        if pair && !is_target(at) && !is_target(at + 1) {
            keep[at] = false;
            keep[at + 1] = false;
            at += 2;
        } else {
            at += 1;
        }
    }

    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return 0;
    }

    // new_index[i] = kept instructions before i; one extra entry for the end.
    let mut new_index = Vec::with_capacity(instructions.len() + 1);
    let mut kept = 0;
    for &k in &keep {
        new_index.push(kept);
        if k {
            kept += 1;
        }
    }
    new_index.push(kept);

    for jump in jumps {
        instructions[jump.literal] = Instruction::Lit(Literal::Number(new_index[jump.target] as f64));
    }

    let mut flags = keep.into_iter();
    instructions.retain(|_| flags.next().unwrap_or(true));
    removed
}
