use crate::kernel::Kernel;
use crate::tensor_builder::TfliteTensorBuilder;
use crate::traits::OperationTraits;
use nnrt::backend::spec::{BackendError, BackendResult, KernelGenerator, TensorBuilder};
use nnrt::exec::{Function, FunctionSequence};
use nnrt::ir::{Graph, OperationIndex};
use std::sync::Arc;
use tracing::debug;

/// Lowers each operation to a [`Kernel`] and wires its tensors to the runtime's.
pub struct TfliteKernelGenerator {
    graph: Arc<Graph>,
    tensor_builder: Arc<TfliteTensorBuilder>,
    sequence: Option<FunctionSequence>,
}

impl TfliteKernelGenerator {
    pub fn new(graph: Arc<Graph>, tensor_builder: Arc<TfliteTensorBuilder>) -> Self {
        Self {
            graph,
            tensor_builder,
            sequence: None,
        }
    }

    /// Builds the kernel for one operation without wrapping it as a [`Function`].
    pub fn generate_kernel(&self, index: OperationIndex) -> BackendResult<Kernel> {
        let operation = self
            .graph
            .operation(index)
            .ok_or_else(|| BackendError::invariant(format!("unknown operation {index}")))?;
        if let Some(missing) = operation
            .operands()
            .find(|&operand| !self.tensor_builder.is_registered(operand))
        {
            return Err(BackendError::invariant(format!(
                "{} {index}: operand {missing} is not registered with the tflite backend",
                operation.kind()
            )));
        }

        let traits = OperationTraits::new(operation, &self.graph, self.tensor_builder.as_ref())?;
        let mut kernel = Kernel::new(&traits)?;
        let mut shared = Vec::new();
        for operand in operation.operands() {
            if shared.contains(&operand) {
                continue;
            }
            kernel.share_buffer_between(&*self.tensor_builder.at(operand)?)?;
            shared.push(operand);
        }
        debug!(op = kernel.op(), operation = %index, "kernel generated");
        Ok(kernel)
    }
}

impl KernelGenerator for TfliteKernelGenerator {
    fn generate(&mut self, index: OperationIndex) -> BackendResult<Box<dyn Function>> {
        Ok(Box::new(self.generate_kernel(index)?))
    }

    fn sequence_slot(&mut self) -> &mut Option<FunctionSequence> {
        &mut self.sequence
    }
}
