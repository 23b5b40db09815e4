use crate::synthesizer::{synthesize, SynthesizedModel};
use crate::traits::OperationTraits;
use nnrt::backend::spec::{BackendError, BackendResult};
use nnrt::backend::tensor::{copy_buffer, BufferOwnership, SharedBuffer, Tensor};
use nnrt::exec::Function;
use nnrt::ir::OperandIndex;
use nnrt_tflite_engine::{
    BuiltinOpResolver, EngineError, FlatBufferModel, Interpreter, InterpreterBuilder, TensorSlot,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Maps an engine failure onto the backend error taxonomy.
pub(crate) fn engine_error(op: &str, err: EngineError) -> BackendError {
    match err {
        EngineError::Allocation { .. } => BackendError::resource_exhausted(format!("{op}: {err}")),
        EngineError::UnsupportedOperator { .. } | EngineError::Unsupported { .. } => {
            BackendError::unsupported(op, err.to_string())
        }
        other => BackendError::execution(format!("{op}: {other}")),
    }
}

struct CopyLink {
    operand: OperandIndex,
    source: SharedBuffer,
    target: SharedBuffer,
}

/// One operation running inside its own interpreter.
///
/// Runtime tensors without storage adopt the interpreter's buffers; tensors that already own
/// memory are kept in sync by copying before (inputs) or after (outputs) each invocation.
pub struct Kernel {
    op: &'static str,
    synthesized: SynthesizedModel,
    model: FlatBufferModel,
    interpreter: Interpreter,
    outputs: Vec<OperandIndex>,
    copy_in: Vec<CopyLink>,
    copy_out: Vec<CopyLink>,
}

impl Kernel {
    /// Synthesizes the model, builds its interpreter and allocates the interpreter's tensors.
    pub fn new(traits: &OperationTraits) -> BackendResult<Self> {
        let op = traits.provider().kind().name();
        let synthesized = synthesize(traits)?;
        let model = FlatBufferModel::from_bytes(synthesized.bytes().to_vec())
            .map_err(|err| engine_error(op, err))?;
        let resolver = BuiltinOpResolver::new();
        let mut interpreter = InterpreterBuilder::new(&model, &resolver)
            .build()
            .map_err(|err| engine_error(op, err))?;
        interpreter
            .allocate_tensors()
            .map_err(|err| engine_error(op, err))?;
        debug!(
            op,
            tensors = interpreter.tensors_size(),
            nodes = interpreter.nodes_size(),
            "interpreter ready"
        );
        Ok(Self {
            op,
            synthesized,
            model,
            interpreter,
            outputs: traits.outputs().iter().map(|o| o.operand()).collect(),
            copy_in: Vec::new(),
            copy_out: Vec::new(),
        })
    }

    /// Connects a runtime tensor with the interpreter tensor standing for the same operand.
    ///
    /// An unbound runtime tensor adopts the interpreter's buffer. A bound one gets a copy link
    /// unless it already is the same buffer; constants need none since the interpreter seeded
    /// them from the model.
    pub fn share_buffer_between(&mut self, tensor: &Tensor) -> BackendResult<()> {
        let operand = tensor.index();
        let slot = self.tensor_slot(operand).ok_or_else(|| {
            BackendError::invariant(format!("{}: operand {operand} is not part of the kernel", self.op))
        })?;
        if slot.byte_len() != tensor.total_size() {
            return Err(BackendError::invariant(format!(
                "{}: operand {operand} holds {} bytes, interpreter tensor {} holds {}",
                self.op,
                tensor.total_size(),
                slot.name(),
                slot.byte_len()
            )));
        }
        let constant = slot.is_constant();
        let embedded = slot.buffer().cloned().ok_or_else(|| {
            BackendError::invariant(format!("{}: interpreter tensors are not allocated", self.op))
        })?;

        match tensor.buffer() {
            None => {
                tensor.bind(embedded, BufferOwnership::Embedded)?;
                trace!(op = self.op, %operand, "interpreter buffer exported");
            }
            Some(external) if Arc::ptr_eq(external, &embedded) || constant => {}
            Some(external) if self.outputs.contains(&operand) => {
                self.copy_out.push(CopyLink {
                    operand,
                    source: embedded,
                    target: external.clone(),
                });
            }
            Some(external) => {
                self.copy_in.push(CopyLink {
                    operand,
                    source: external.clone(),
                    target: embedded,
                });
            }
        }
        Ok(())
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    pub fn model(&self) -> &FlatBufferModel {
        &self.model
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn tensor_slot(&self, operand: OperandIndex) -> Option<&TensorSlot> {
        self.synthesized
            .tensor_index(operand)
            .and_then(|index| self.interpreter.tensor(index))
    }

    pub fn embedded_buffer(&self, operand: OperandIndex) -> Option<&SharedBuffer> {
        self.tensor_slot(operand).and_then(TensorSlot::buffer)
    }

    /// Runtime buffer copied into the interpreter before each run, if the operand has one.
    pub fn copy_in_source(&self, operand: OperandIndex) -> Option<&SharedBuffer> {
        self.copy_in
            .iter()
            .find(|link| link.operand == operand)
            .map(|link| &link.source)
    }

    /// Runtime buffer the interpreter output is copied to after each run.
    pub fn copy_out_target(&self, operand: OperandIndex) -> Option<&SharedBuffer> {
        self.copy_out
            .iter()
            .find(|link| link.operand == operand)
            .map(|link| &link.target)
    }
}

impl Function for Kernel {
    fn run(&mut self) -> BackendResult<()> {
        for link in &self.copy_in {
            copy_buffer(&link.target, &link.source)?;
        }
        self.interpreter
            .invoke()
            .map_err(|err| engine_error(self.op, err))?;
        for link in &self.copy_out {
            copy_buffer(&link.target, &link.source)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("op", &self.op)
            .field("tensors", &self.synthesized.tensor_count())
            .field("copy_in", &self.copy_in.len())
            .field("copy_out", &self.copy_out.len())
            .finish()
    }
}
