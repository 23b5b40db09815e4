//! Lowers a finished graph onto registered backends.
//!
//! Operations are assigned to backends by a [`BackendSelection`], grouped into op sequences
//! of consecutive same-backend operations, and driven through the backend lifecycle:
//! register → prepare → generate → allocate → constants → post-function-prepare.

use crate::backend::registry::BackendRegistry;
use crate::backend::selection::BackendSelection;
use crate::backend::spec::{BackendContext, BackendError, BackendResult, TensorBuilder};
use crate::backend::tensor::Tensor;
use crate::exec::{Function, FunctionSequence};
use crate::ir::{Graph, Layout, OpSequence, OperandIndex, OperationIndex};
use crate::util::timer::Timer;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Wall time of one op sequence during [`CompiledGraph::run_profiled`].
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTiming {
    pub backend_id: String,
    pub operations: usize,
    pub elapsed: Duration,
}

struct CompiledSequence {
    op_sequence: OpSequence,
    functions: FunctionSequence,
    timer: Box<dyn Timer>,
}

/// Executable form of a graph.
pub struct CompiledGraph {
    graph: Arc<Graph>,
    tensors: Vec<Arc<Tensor>>,
    sequences: Vec<CompiledSequence>,
    tensor_builders: Vec<Arc<dyn TensorBuilder>>,
}

pub fn compile(
    graph: Arc<Graph>,
    registry: &BackendRegistry,
    selection: &BackendSelection,
) -> BackendResult<CompiledGraph> {
    if !graph.is_finished() {
        return Err(BackendError::invariant(
            "graph must be finished before compilation",
        ));
    }

    if let Some(missing) = selection
        .backends()
        .find(|backend_id| !registry.has_backend(backend_id))
    {
        return Err(BackendError::unsupported(
            format!("backend '{missing}'"),
            "not registered",
        ));
    }

    let mut contexts: Vec<BackendContext> = Vec::new();
    let mut context_by_id: HashMap<String, usize> = HashMap::new();
    let mut op_sequences: Vec<(usize, OpSequence)> = Vec::new();

    for (position, operation) in graph.operations().iter().enumerate() {
        let index = OperationIndex(position as u32);
        let backend_id = selection.backend_for(operation.kind());
        let context_index = match context_by_id.get(backend_id) {
            Some(&existing) => existing,
            None => {
                let context = create_context(registry, backend_id, &graph)?;
                contexts.push(context);
                context_by_id.insert(backend_id.to_string(), contexts.len() - 1);
                contexts.len() - 1
            }
        };

        let layout = contexts[context_index]
            .config
            .support_layout(operation, Layout::Nhwc);
        match op_sequences.last_mut() {
            Some((owner, sequence)) if *owner == context_index && sequence.layout() == layout => {
                sequence.append(index)
            }
            _ => {
                let mut sequence = OpSequence::new(backend_id, layout);
                sequence.append(index);
                op_sequences.push((context_index, sequence));
            }
        }
    }

    let tensors = graph
        .operands()
        .iter()
        .enumerate()
        .map(|(position, operand)| {
            Tensor::new(
                OperandIndex(position as u32),
                operand.info().clone(),
                Layout::Nhwc,
                operand.is_constant(),
            )
            .map(Arc::new)
        })
        .collect::<BackendResult<Vec<_>>>()?;

    register_tensors(&graph, &contexts, &op_sequences, &tensors)?;

    for context in &contexts {
        context.tensor_builder.prepare()?;
    }

    let mut sequences = Vec::with_capacity(op_sequences.len());
    for (context_index, op_sequence) in op_sequences {
        let context = &mut contexts[context_index];
        context.kernel_gen.visit_op_sequence(&op_sequence)?;
        let functions = context
            .kernel_gen
            .release_function_sequence()
            .unwrap_or_default();
        debug!(
            backend = op_sequence.backend_id(),
            operations = op_sequence.len(),
            functions = functions.len(),
            "op sequence lowered"
        );
        sequences.push(CompiledSequence {
            timer: context.config.timer(),
            op_sequence,
            functions,
        });
    }

    for context in &mut contexts {
        context.tensor_builder.allocate()?;
        context.constant_initializer.run()?;
        context.tensor_builder.post_function_prepare()?;
    }

    bind_remaining(&graph, &tensors)?;

    info!(
        operations = graph.operations().len(),
        sequences = sequences.len(),
        backends = contexts.len(),
        "graph compiled"
    );

    Ok(CompiledGraph {
        graph,
        tensors,
        sequences,
        tensor_builders: contexts
            .into_iter()
            .map(|context| context.tensor_builder)
            .collect(),
    })
}

fn create_context(
    registry: &BackendRegistry,
    backend_id: &str,
    graph: &Arc<Graph>,
) -> BackendResult<BackendContext> {
    let backend = registry.create(backend_id).ok_or_else(|| {
        BackendError::unsupported(format!("backend '{backend_id}'"), "not registered")
    })?;
    if !backend.config().initialize() {
        return Err(BackendError::unsupported(
            format!("backend '{backend_id}'"),
            "initialization failed",
        ));
    }
    let context = backend.new_context(graph.clone())?;
    info!(backend = backend_id, "backend context created");
    Ok(context)
}

/// Registers every operand with each backend that touches it and reports first and last uses
/// in execution order.
fn register_tensors(
    graph: &Graph,
    contexts: &[BackendContext],
    op_sequences: &[(usize, OpSequence)],
    tensors: &[Arc<Tensor>],
) -> BackendResult<()> {
    let mut uses: BTreeMap<(usize, OperandIndex), (usize, usize)> = BTreeMap::new();
    for (context_index, sequence) in op_sequences {
        for &index in sequence.operations() {
            let operation = graph
                .operation(index)
                .ok_or_else(|| BackendError::invariant(format!("unknown operation {index}")))?;
            for operand in operation.operands() {
                let position = index.as_usize();
                uses.entry((*context_index, operand))
                    .and_modify(|span| span.1 = position)
                    .or_insert((position, position));
            }
        }
    }

    for &(context_index, operand) in uses.keys() {
        contexts[context_index]
            .tensor_builder
            .register_tensor_info(tensors[operand.as_usize()].clone())?;
    }

    let mut by_first: Vec<_> = uses.iter().collect();
    by_first.sort_by_key(|(_, span)| span.0);
    for ((context_index, operand), _) in by_first {
        contexts[*context_index]
            .tensor_builder
            .notify_first_use(*operand)?;
    }

    let mut by_last: Vec<_> = uses.iter().collect();
    by_last.sort_by_key(|(_, span)| span.1);
    for ((context_index, operand), _) in by_last {
        contexts[*context_index]
            .tensor_builder
            .notify_last_use(*operand)?;
    }
    Ok(())
}

/// Gives runtime storage to graph inputs/outputs no backend claimed and checks that every
/// operand an operation touches ended up with memory.
fn bind_remaining(graph: &Graph, tensors: &[Arc<Tensor>]) -> BackendResult<()> {
    for index in graph.inputs().iter().chain(graph.outputs()) {
        let tensor = &tensors[index.as_usize()];
        if tensor.buffer().is_none() {
            tensor.allocate()?;
        }
    }
    for operation in graph.operations() {
        for operand in operation.operands() {
            tensors[operand.as_usize()].bound_buffer()?;
        }
    }
    Ok(())
}

impl CompiledGraph {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn op_sequences(&self) -> impl Iterator<Item = &OpSequence> {
        self.sequences.iter().map(|sequence| &sequence.op_sequence)
    }

    pub fn tensor(&self, index: OperandIndex) -> Option<&Arc<Tensor>> {
        self.tensors.get(index.as_usize())
    }

    pub fn tensor_builders(&self) -> &[Arc<dyn TensorBuilder>] {
        &self.tensor_builders
    }

    pub fn input_count(&self) -> usize {
        self.graph.inputs().len()
    }

    pub fn output_count(&self) -> usize {
        self.graph.outputs().len()
    }

    pub fn input(&self, position: usize) -> BackendResult<&Arc<Tensor>> {
        let index = self.graph.inputs().get(position).ok_or_else(|| {
            BackendError::invariant(format!("graph has no input #{position}"))
        })?;
        Ok(&self.tensors[index.as_usize()])
    }

    pub fn output_tensor(&self, position: usize) -> BackendResult<&Arc<Tensor>> {
        let index = self.graph.outputs().get(position).ok_or_else(|| {
            BackendError::invariant(format!("graph has no output #{position}"))
        })?;
        Ok(&self.tensors[index.as_usize()])
    }

    pub fn set_input(&self, position: usize, values: &[f32]) -> BackendResult<()> {
        self.input(position)?.write_f32(values)
    }

    pub fn set_input_bytes(&self, position: usize, data: &[u8]) -> BackendResult<()> {
        self.input(position)?.write_bytes(data)
    }

    pub fn output(&self, position: usize) -> BackendResult<Vec<f32>> {
        self.output_tensor(position)?.read_f32()
    }

    /// Runs every op sequence in order.
    pub fn run(&mut self) -> BackendResult<()> {
        for sequence in &mut self.sequences {
            sequence.functions.run()?;
        }
        Ok(())
    }

    /// Runs synchronously, timing each op sequence with its backend's timer.
    pub fn run_profiled(&mut self) -> BackendResult<Vec<SequenceTiming>> {
        let mut timings = Vec::with_capacity(self.sequences.len());
        for sequence in &mut self.sequences {
            sequence.timer.start();
            sequence.functions.run_sync()?;
            sequence.timer.end();
            timings.push(SequenceTiming {
                backend_id: sequence.op_sequence.backend_id().to_string(),
                operations: sequence.op_sequence.len(),
                elapsed: sequence.timer.elapsed(),
            });
        }
        Ok(timings)
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("operands", &self.tensors.len())
            .field(
                "sequences",
                &self.op_sequences().collect::<Vec<_>>(),
            )
            .finish()
    }
}
