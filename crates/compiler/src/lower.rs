//! Lowering flows to chunks.
//!
//! A flow becomes one chunk `document::<flow>` whose arity is the flow's
//! input count:
//!
//! 1. Prologue: each argument is wrapped with `thunk_id`, paired with its
//!    input id and packed into one object stored in local 0.
//! 2. Each used node, in order: its rows are pushed last row first, the
//!    routine is called as a thunk and the thunk is stored in the node's
//!    local slot (1, 2, ...).
//! 3. The last node's slot is forced and returned.

use crate::constants::ConstantPool;
use crate::document::{Connection, DocumentContext, Element, Flow, InputRow, Node, RowBinding};
use crate::error::CompileError;
use crate::flows::{flow_label, input_owner, DocumentRoutines};
use crate::helpers::{CompilerHelpers, ACCESS};
use crate::source::{RoutineSource, SourceChain};
use crate::standard::StandardLibrary;
use crate::validate::validate;
use crate::CompileOptions;
use lazyflow_common::{Chunk, ChunkBuilder, Opcode, Program, ENTRY_LABEL};
use std::collections::HashMap;
use tracing::debug;

/// Compiles one document. Consumed by [`compile`](Compiler::compile).
pub struct Compiler<'d> {
    document: &'d DocumentContext,
    options: CompileOptions,
    sources: SourceChain,
    constants: ConstantPool,
}

impl<'d> Compiler<'d> {
    /// A compiler with the standard library, the document's own routines
    /// and the compiler helpers, consulted in that order.
    pub fn new(document: &'d DocumentContext, options: CompileOptions) -> Self {
        let mut sources = SourceChain::new();
        sources.push(Box::new(StandardLibrary));
        sources.push(Box::new(DocumentRoutines::new(document)));
        sources.push(Box::new(CompilerHelpers));
        Self {
            document,
            options,
            sources,
            constants: ConstantPool::new(),
        }
    }

    /// Add a routine source after the built-in ones.
    pub fn with_source(mut self, source: Box<dyn RoutineSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Lower the document into a program.
    ///
    /// Every chunk a source provides is included, used or not; run the
    /// optimizer to drop the unreachable ones.
    pub fn compile(mut self) -> Result<Program, CompileError> {
        if !self.options.skip_validation {
            let errors = validate(self.document);
            if !errors.is_empty() {
                return Err(CompileError::Invalid(errors));
            }
        }

        let document = self.document;
        let main = document
            .flow(&document.main_flow)
            .ok_or_else(|| CompileError::MissingMainFlow(document.main_flow.clone()))?;
        if !main.inputs.is_empty() {
            return Err(CompileError::MainFlowHasInputs {
                flow: main.id.clone(),
                count: main.inputs.len(),
            });
        }

        let mut program = Program::new();
        for flow in &document.flows {
            let chunk = self.lower_flow(flow)?;
            program.add_chunk(flow_label(&flow.id), chunk)?;
        }

        let constants = std::mem::take(&mut self.constants);
        debug!(count = constants.len(), "interned constants");
        for (label, chunk) in constants.into_chunks() {
            program.add_chunk(label, chunk)?;
        }
        for (label, chunk) in self.sources.chunks_provided() {
            program.add_chunk(label, chunk)?;
        }

        let mut entry = ChunkBuilder::new();
        entry
            .call(flow_label(&main.id))
            .op(Opcode::Evaluate)
            .op(Opcode::Return);
        program.add_chunk(ENTRY_LABEL, entry.finish(0))?;

        debug!(chunks = program.len(), "compiled document");
        Ok(program)
    }

    fn lower_flow(&mut self, flow: &Flow) -> Result<Chunk, CompileError> {
        if flow.sorted_used_nodes.is_empty() {
            return Err(CompileError::EmptyFlow(flow.id.clone()));
        }

        let mut b = ChunkBuilder::new();
        for (i, input) in flow.inputs.iter().enumerate().rev() {
            b.get_arg(i).op(Opcode::ThunkId).lit(input.as_str());
        }
        b.lit(flow.inputs.len()).op(Opcode::OPack).set_local(0);

        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut last = 0;
        for id in &flow.sorted_used_nodes {
            let node = flow.node(id).ok_or_else(|| CompileError::MissingNode {
                flow: flow.id.clone(),
                node: id.clone(),
            })?;
            self.lower_node(&mut b, flow, node, &slots)?;
            last = slots.len() + 1;
            b.set_local(last);
            slots.insert(node.id.as_str(), last);
        }

        b.get_local(last).op(Opcode::Evaluate).op(Opcode::Return);
        debug!(flow = %flow.id, nodes = slots.len(), "lowered flow");
        Ok(b.finish(flow.inputs.len()))
    }

    /// Push the node's rows and leave the deferred routine call on the stack.
    fn lower_node(
        &mut self,
        b: &mut ChunkBuilder,
        flow: &Flow,
        node: &Node,
        slots: &HashMap<&str, usize>,
    ) -> Result<(), CompileError> {
        let unknown = || CompileError::UnknownRoutine {
            node: node.id.clone(),
            routine: node.routine.clone(),
        };
        if input_owner(self.document, &node.routine).is_some_and(|owner| owner != flow.id) {
            return Err(CompileError::ForeignInput {
                flow: flow.id.clone(),
                node: node.id.clone(),
                routine: node.routine.clone(),
            });
        }
        let arity = self.sources.routine_arity(&node.routine).ok_or_else(unknown)?;
        if arity != node.rows.len() {
            return Err(CompileError::ArityMismatch {
                node: node.id.clone(),
                routine: node.routine.clone(),
                expected: arity,
                found: node.rows.len(),
            });
        }

        let site = Site { flow, node, slots };
        for row in node.rows.iter().rev() {
            self.place_row(b, &site, row)?;
        }

        if !self.sources.try_emit_call(b, &node.routine) {
            return Err(unknown());
        }
        Ok(())
    }

    fn place_row(
        &mut self,
        b: &mut ChunkBuilder,
        site: &Site<'_, '_>,
        row: &InputRow,
    ) -> Result<(), CompileError> {
        match &row.binding {
            RowBinding::Simple { source } => self.place_connection(b, site, row, source),
            RowBinding::Initializer { value } => {
                let label =
                    self.constants
                        .intern(value)
                        .ok_or_else(|| CompileError::UnsupportedConstant {
                            node: site.node.id.clone(),
                            row: row.id.clone(),
                            value: value.to_string(),
                        })?;
                b.thunk(label);
                Ok(())
            }
            RowBinding::List { elements } => {
                let mut indices: Vec<usize> = elements.iter().map(|e| e.index).collect();
                indices.sort_unstable();
                if let Some(pair) = indices.windows(2).find(|pair| pair[0] == pair[1]) {
                    return Err(CompileError::RepeatedListIndex {
                        node: site.node.id.clone(),
                        row: row.id.clone(),
                        index: pair[0],
                    });
                }
                // Distinct and sorted: the first index out of place is a gap.
                let gap = indices.iter().enumerate().find(|(i, index)| i != *index);
                if let Some((missing, _)) = gap {
                    return Err(CompileError::ListGap {
                        node: site.node.id.clone(),
                        row: row.id.clone(),
                        missing,
                    });
                }
                self.place_elements(b, site, row, elements, indices.len())
            }
            RowBinding::Tuple { length, elements } => {
                let covered = (0..*length).all(|i| elements.iter().any(|e| e.index == i));
                if elements.len() != *length || !covered {
                    return Err(CompileError::TupleShape {
                        node: site.node.id.clone(),
                        row: row.id.clone(),
                        length: *length,
                        connected: elements.len(),
                    });
                }
                self.place_elements(b, site, row, elements, *length)
            }
            RowBinding::Map { entries } => {
                for (key, source) in entries.iter().rev() {
                    self.place_connection(b, site, row, source)?;
                    b.lit(key.as_str());
                }
                b.lit(entries.len()).op(Opcode::OPack).op(Opcode::ThunkId);
                Ok(())
            }
            RowBinding::Unbound => Err(CompileError::UnboundRow {
                node: site.node.id.clone(),
                row: row.id.clone(),
            }),
        }
    }

    /// Push elements highest index first, so `apack` puts index 0 first.
    fn place_elements(
        &mut self,
        b: &mut ChunkBuilder,
        site: &Site<'_, '_>,
        row: &InputRow,
        elements: &[Element],
        length: usize,
    ) -> Result<(), CompileError> {
        let mut ordered: Vec<&Element> = elements.iter().collect();
        ordered.sort_by(|a, b| b.index.cmp(&a.index));
        for element in ordered {
            self.place_connection(b, site, row, &element.source)?;
        }
        b.lit(length).op(Opcode::APack).op(Opcode::ThunkId);
        Ok(())
    }

    fn place_connection(
        &mut self,
        b: &mut ChunkBuilder,
        site: &Site<'_, '_>,
        row: &InputRow,
        source: &Connection,
    ) -> Result<(), CompileError> {
        let slot = site.slots.get(source.node.as_str()).copied().ok_or_else(|| {
            CompileError::UnresolvedSource {
                flow: site.flow.id.clone(),
                node: site.node.id.clone(),
                row: row.id.clone(),
                source_node: source.node.clone(),
            }
        })?;

        match &source.output {
            None => {
                b.get_local(slot);
            }
            Some(field) => {
                b.lit(field.as_str()).get_local(slot);
                if !self.sources.try_emit_call(b, ACCESS) {
                    return Err(CompileError::UnknownRoutine {
                        node: site.node.id.clone(),
                        routine: ACCESS.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The node being lowered and the slots computed so far.
struct Site<'a, 's> {
    flow: &'a Flow,
    node: &'a Node,
    slots: &'a HashMap<&'s str, usize>,
}
