//! Drives `compile` with a recording backend to pin down the lifecycle it imposes.

use nnrt::backend::constant::GraphConstantInitializer;
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::selection::BackendSelection;
use nnrt::backend::spec::{
    Backend, BackendContext, BackendResult, Config, ConstantInitializer, KernelGenerator,
    TensorBuilder,
};
use nnrt::backend::tensor_table::{BuilderStage, TensorTable};
use nnrt::exec::{Function, FunctionSequence};
use nnrt::ir::{
    Activation, AddParams, Graph, Layout, OpKind, OpParams, OperandIndex, OperandInfo, Operation,
    OperationIndex,
};
use nnrt::util::timer::{CpuTimer, Timer};
use nnrt::{compile, BufferOwnership, Tensor};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

struct RecordingConfig {
    id: &'static str,
}

impl Config for RecordingConfig {
    fn id(&self) -> &str {
        self.id
    }

    fn support_layout(&self, _operation: &Operation, _frontend_layout: Layout) -> Layout {
        Layout::Nhwc
    }

    fn supports_permutation(&self) -> bool {
        false
    }

    fn supports_dynamic_tensor(&self) -> bool {
        false
    }

    fn supports_fp16(&self) -> bool {
        false
    }

    fn timer(&self) -> Box<dyn Timer> {
        Box::new(CpuTimer::new())
    }
}

struct RecordingTensorBuilder {
    table: Mutex<TensorTable>,
    log: Log,
}

impl RecordingTensorBuilder {
    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

impl TensorBuilder for RecordingTensorBuilder {
    fn register_tensor_info(&self, tensor: Arc<Tensor>) -> BackendResult<()> {
        self.record(format!("register {}", tensor.index().value()));
        self.table.lock().unwrap().register(tensor)
    }

    fn notify_first_use(&self, index: OperandIndex) -> BackendResult<()> {
        self.record(format!("first {}", index.value()));
        self.table.lock().unwrap().notify_first_use(index)
    }

    fn notify_last_use(&self, index: OperandIndex) -> BackendResult<()> {
        self.record(format!("last {}", index.value()));
        self.table.lock().unwrap().notify_last_use(index)
    }

    fn is_registered(&self, index: OperandIndex) -> bool {
        self.table.lock().unwrap().is_registered(index)
    }

    fn at(&self, index: OperandIndex) -> BackendResult<Arc<Tensor>> {
        self.table.lock().unwrap().get(index)
    }

    fn prepare(&self) -> BackendResult<()> {
        self.record("prepare".into());
        self.table.lock().unwrap().advance(BuilderStage::Prepared)
    }

    fn allocate(&self) -> BackendResult<()> {
        self.record("allocate".into());
        let mut table = self.table.lock().unwrap();
        table.advance(BuilderStage::Allocated)?;
        for tensor in table.tensors() {
            if tensor.buffer().is_none() {
                tensor.allocate()?;
            }
        }
        Ok(())
    }

    fn post_function_prepare(&self) -> BackendResult<()> {
        self.record("post_function_prepare".into());
        self.table.lock().unwrap().advance(BuilderStage::Finalized)
    }
}

/// Elementwise Relu or Add over f32 tensors.
struct RecordingFunction {
    kind: OpKind,
    inputs: Vec<Arc<Tensor>>,
    output: Arc<Tensor>,
    log: Log,
    label: String,
}

impl Function for RecordingFunction {
    fn run(&mut self) -> BackendResult<()> {
        self.log.lock().unwrap().push(format!("run {}", self.label));
        let first = self.inputs[0].read_f32()?;
        let values: Vec<f32> = match self.kind {
            OpKind::Add => {
                let second = self.inputs[1].read_f32()?;
                first.iter().zip(&second).map(|(a, b)| a + b).collect()
            }
            _ => first.iter().map(|v| v.max(0.0)).collect(),
        };
        self.output.write_f32(&values)
    }
}

struct RecordingKernelGenerator {
    id: &'static str,
    graph: Arc<Graph>,
    tensor_builder: Arc<RecordingTensorBuilder>,
    sequence: Option<FunctionSequence>,
    log: Log,
}

impl KernelGenerator for RecordingKernelGenerator {
    fn generate(&mut self, index: OperationIndex) -> BackendResult<Box<dyn Function>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("generate {}", index.as_usize()));
        let operation = &self.graph.operations()[index.as_usize()];
        let inputs = operation
            .inputs()
            .iter()
            .map(|&operand| self.tensor_builder.at(operand))
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Box::new(RecordingFunction {
            kind: operation.kind(),
            inputs,
            output: self.tensor_builder.at(operation.outputs()[0])?,
            log: self.log.clone(),
            label: format!("{}:{}", self.id, index.as_usize()),
        }))
    }

    fn sequence_slot(&mut self) -> &mut Option<FunctionSequence> {
        &mut self.sequence
    }
}

struct RecordingConstants {
    inner: GraphConstantInitializer,
    log: Log,
}

impl ConstantInitializer for RecordingConstants {
    fn run(&mut self) -> BackendResult<()> {
        self.log.lock().unwrap().push("constants".into());
        self.inner.run()
    }
}

struct RecordingBackend {
    id: &'static str,
    log: Log,
}

impl Backend for RecordingBackend {
    fn config(&self) -> Arc<dyn Config> {
        Arc::new(RecordingConfig { id: self.id })
    }

    fn new_context(&self, graph: Arc<Graph>) -> BackendResult<BackendContext> {
        let tensor_builder = Arc::new(RecordingTensorBuilder {
            table: Mutex::new(TensorTable::new("recorder")),
            log: self.log.clone(),
        });
        Ok(BackendContext {
            config: self.config(),
            tensor_builder: tensor_builder.clone(),
            kernel_gen: Box::new(RecordingKernelGenerator {
                id: self.id,
                graph: graph.clone(),
                tensor_builder: tensor_builder.clone(),
                sequence: None,
                log: self.log.clone(),
            }),
            constant_initializer: Box::new(RecordingConstants {
                inner: GraphConstantInitializer::new(graph, tensor_builder),
                log: self.log.clone(),
            }),
        })
    }
}

fn registry_with(ids: &[&'static str], log: &Log) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    for &id in ids {
        let log = log.clone();
        registry.register(id, move || {
            Arc::new(RecordingBackend {
                id,
                log: log.clone(),
            }) as Arc<dyn Backend>
        });
    }
    registry
}

/// x(0) + c(1) -> a(2), relu(a) -> y(3)
fn add_relu_graph() -> Graph {
    let mut graph = Graph::new();
    let x = graph.add_operand(OperandInfo::float32([4])).unwrap();
    let c = graph.add_operand(OperandInfo::float32([4])).unwrap();
    let a = graph.add_operand(OperandInfo::float32([4])).unwrap();
    let y = graph.add_operand(OperandInfo::float32([4])).unwrap();
    graph.set_operand_f32(c, &[1.0; 4]).unwrap();
    graph
        .add_operation(Operation::new(
            OpParams::Add(AddParams {
                activation: Activation::None,
            }),
            vec![x, c],
            vec![a],
        ))
        .unwrap();
    graph
        .add_operation(Operation::new(OpParams::Relu, vec![a], vec![y]))
        .unwrap();
    graph.add_input(x).unwrap();
    graph.add_output(y).unwrap();
    graph
}

fn finished_graph() -> Arc<Graph> {
    let mut graph = add_relu_graph();
    graph.finish().unwrap();
    Arc::new(graph)
}

fn events(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn compile_rejects_unfinished_graph() {
    let log = Log::default();
    let registry = registry_with(&["recorder"], &log);
    let err = compile(
        Arc::new(add_relu_graph()),
        &registry,
        &BackendSelection::new("recorder"),
    )
    .unwrap_err();
    assert!(err.is_invariant(), "{err}");
    assert!(events(&log).is_empty());
}

#[test]
fn compile_rejects_unknown_backend() {
    let log = Log::default();
    let registry = registry_with(&["recorder"], &log);
    let selection = BackendSelection::new("recorder").with_override(OpKind::Relu, "missing");
    let err = compile(finished_graph(), &registry, &selection).unwrap_err();
    assert!(err.is_unsupported(), "{err}");
    assert!(err.to_string().contains("missing"), "{err}");
}

#[test]
fn compile_rejects_unregistered_listed_backend() {
    let log = Log::default();
    let registry = registry_with(&["recorder"], &log);
    let selection = BackendSelection::parse("recorder;ghost", "").unwrap();
    let err = compile(finished_graph(), &registry, &selection).unwrap_err();
    assert!(err.is_unsupported(), "{err}");
    assert!(err.to_string().contains("ghost"), "{err}");
    assert!(events(&log).is_empty());
}

#[test]
fn lifecycle_runs_in_order() {
    let log = Log::default();
    let registry = registry_with(&["recorder"], &log);
    let compiled = compile(finished_graph(), &registry, &BackendSelection::new("recorder")).unwrap();

    let expected = [
        "register 0",
        "register 1",
        "register 2",
        "register 3",
        "first 0",
        "first 1",
        "first 2",
        "first 3",
        "last 0",
        "last 1",
        "last 2",
        "last 3",
        "prepare",
        "generate 0",
        "generate 1",
        "allocate",
        "constants",
        "post_function_prepare",
    ];
    assert_eq!(events(&log), expected);
    assert_eq!(compiled.op_sequences().count(), 1);
}

#[test]
fn run_executes_functions_in_order() {
    let log = Log::default();
    let registry = registry_with(&["recorder"], &log);
    let mut compiled =
        compile(finished_graph(), &registry, &BackendSelection::new("recorder")).unwrap();
    log.lock().unwrap().clear();

    compiled.set_input(0, &[-1.0, 2.0, -3.0, 4.0]).unwrap();
    compiled.run().unwrap();
    assert_eq!(compiled.output(0).unwrap(), vec![0.0, 3.0, 0.0, 5.0]);
    assert_eq!(events(&log), ["run recorder:0", "run recorder:1"]);

    let constant = compiled.tensor(OperandIndex(1)).unwrap();
    assert_eq!(constant.read_f32().unwrap(), vec![1.0; 4]);
    assert_eq!(constant.ownership(), Some(BufferOwnership::External));
}

#[test]
fn mixed_selection_splits_sequences() {
    let log = Log::default();
    let registry = registry_with(&["left", "right"], &log);
    let selection = BackendSelection::new("left").with_override(OpKind::Relu, "right");
    let mut compiled = compile(finished_graph(), &registry, &selection).unwrap();

    let backends: Vec<&str> = compiled.op_sequences().map(|s| s.backend_id()).collect();
    assert_eq!(backends, ["left", "right"]);
    // "right" only touches the intermediate and the output
    let registered: Vec<String> = events(&log)
        .into_iter()
        .filter(|event| event.starts_with("register"))
        .collect();
    assert_eq!(
        registered,
        ["register 0", "register 1", "register 2", "register 2", "register 3"]
    );

    compiled.set_input(0, &[1.0, -5.0, 0.5, -1.0]).unwrap();
    let timings = compiled.run_profiled().unwrap();
    assert_eq!(timings.len(), 2);
    assert_eq!(timings[1].backend_id, "right");
    assert_eq!(compiled.output(0).unwrap(), vec![2.0, 0.0, 1.5, 0.0]);
}
