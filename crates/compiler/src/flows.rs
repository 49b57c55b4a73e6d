//! Routines defined by the document itself.
//!
//! - `document::<flow>` calls another flow; its value is whatever that
//!   flow's last node produces.
//! - `document::<flow>::input` takes no rows and yields the object of the
//!   current call's inputs, keyed by input id. Only nodes of `<flow>`
//!   itself may use it; the compiler rejects it anywhere else.
//! - `document::<flow>::output` takes one row per output and yields the
//!   object of those values, forced, keyed by output id.

use crate::document::DocumentContext;
use crate::source::RoutineSource;
use lazyflow_common::{Chunk, ChunkBuilder, Opcode};

/// Label of the chunk that implements flow `id`.
pub fn flow_label(id: &str) -> String {
    format!("document::{id}")
}

/// The flow whose `::input` routine `path` names, if it names one.
pub fn input_owner<'p>(document: &DocumentContext, path: &'p str) -> Option<&'p str> {
    let rest = path.strip_prefix("document::")?;
    if document.flow(rest).is_some() {
        return None;
    }
    let owner = rest.strip_suffix("::input")?;
    document.flow(owner).map(|_| owner)
}

fn input_label(id: &str) -> String {
    format!("document::{id}::input")
}

fn output_label(id: &str) -> String {
    format!("document::{id}::output")
}

#[derive(Debug, Clone)]
struct Signature {
    id: String,
    inputs: usize,
    outputs: Vec<String>,
}

enum Routine<'a> {
    Call(&'a Signature),
    Input(&'a Signature),
    Output(&'a Signature),
}

/// Per-flow call, input and output routines of one document.
#[derive(Debug, Clone)]
pub struct DocumentRoutines {
    flows: Vec<Signature>,
}

impl DocumentRoutines {
    /// Collect the signatures of every flow in `document`.
    pub fn new(document: &DocumentContext) -> Self {
        let flows = document
            .flows
            .iter()
            .map(|flow| Signature {
                id: flow.id.clone(),
                inputs: flow.inputs.len(),
                outputs: flow.outputs.clone(),
            })
            .collect();
        Self { flows }
    }

    fn signature(&self, id: &str) -> Option<&Signature> {
        self.flows.iter().find(|flow| flow.id == id)
    }

    fn resolve(&self, path: &str) -> Option<Routine<'_>> {
        let rest = path.strip_prefix("document::")?;
        if let Some(flow) = self.signature(rest) {
            return Some(Routine::Call(flow));
        }
        if let Some(flow) = rest.strip_suffix("::input").and_then(|id| self.signature(id)) {
            return Some(Routine::Input(flow));
        }
        rest.strip_suffix("::output")
            .and_then(|id| self.signature(id))
            .map(Routine::Output)
    }
}

impl RoutineSource for DocumentRoutines {
    fn chunks_provided(&self) -> Vec<(String, Chunk)> {
        let mut chunks = Vec::with_capacity(self.flows.len() * 2);
        for flow in &self.flows {
            let mut b = ChunkBuilder::new();
            b.get_arg(0).op(Opcode::Evaluate).op(Opcode::Return);
            chunks.push((input_label(&flow.id), b.finish(1)));

            let mut b = ChunkBuilder::new();
            for (i, output) in flow.outputs.iter().enumerate().rev() {
                b.get_arg(i).op(Opcode::Evaluate).lit(output.as_str());
            }
            b.lit(flow.outputs.len()).op(Opcode::OPack).op(Opcode::Return);
            chunks.push((output_label(&flow.id), b.finish(flow.outputs.len())));
        }
        chunks
    }

    fn routine_arity(&self, path: &str) -> Option<usize> {
        Some(match self.resolve(path)? {
            Routine::Call(flow) => flow.inputs,
            Routine::Input(_) => 0,
            Routine::Output(flow) => flow.outputs.len(),
        })
    }

    fn try_emit_call(&self, stream: &mut ChunkBuilder, path: &str) -> bool {
        match self.resolve(path) {
            Some(Routine::Call(flow)) => {
                stream.thunk(flow_label(&flow.id));
            }
            // The input object sits in local 0 of the calling flow.
            Some(Routine::Input(flow)) => {
                stream.get_local(0).thunk(input_label(&flow.id));
            }
            Some(Routine::Output(flow)) => {
                stream.thunk(output_label(&flow.id));
            }
            None => return false,
        }
        true
    }
}
