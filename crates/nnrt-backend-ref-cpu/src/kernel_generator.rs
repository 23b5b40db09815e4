use crate::kernels::{execute_operation, output_dims, TensorView};
use nnrt::backend::spec::{BackendError, BackendResult, KernelGenerator, TensorBuilder};
use nnrt::backend::tensor::Tensor;
use nnrt::exec::{Function, FunctionSequence};
use nnrt::ir::{DataType, Graph, OpParams, OperationIndex};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// One operation evaluated straight from the runtime tensors.
pub struct CpuKernel {
    params: OpParams,
    inputs: Vec<Arc<Tensor>>,
    output: Arc<Tensor>,
}

impl CpuKernel {
    pub fn params(&self) -> &OpParams {
        &self.params
    }
}

impl Function for CpuKernel {
    fn run(&mut self) -> BackendResult<()> {
        let values = self
            .inputs
            .iter()
            .map(|tensor| tensor.read_f32())
            .collect::<BackendResult<Vec<_>>>()?;
        let views: Vec<TensorView<'_>> = self
            .inputs
            .iter()
            .zip(&values)
            .map(|(tensor, data)| TensorView {
                dims: tensor.dims(),
                data,
            })
            .collect();
        let result = execute_operation(&self.params, &views, self.output.dims())?;
        trace!(op = self.params.kind().name(), output = %self.output.index(), "cpu kernel ran");
        self.output.write_f32(&result)
    }
}

impl fmt::Debug for CpuKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuKernel")
            .field("op", &self.params.kind())
            .field(
                "inputs",
                &self.inputs.iter().map(|t| t.index()).collect::<Vec<_>>(),
            )
            .field("output", &self.output.index())
            .finish()
    }
}

pub struct CpuKernelGenerator {
    graph: Arc<Graph>,
    tensor_builder: Arc<dyn TensorBuilder>,
    sequence: Option<FunctionSequence>,
}

impl CpuKernelGenerator {
    pub fn new(graph: Arc<Graph>, tensor_builder: Arc<dyn TensorBuilder>) -> Self {
        Self {
            graph,
            tensor_builder,
            sequence: None,
        }
    }
}

impl KernelGenerator for CpuKernelGenerator {
    fn generate(&mut self, index: OperationIndex) -> BackendResult<Box<dyn Function>> {
        let operation = self
            .graph
            .operation(index)
            .ok_or_else(|| BackendError::invariant(format!("unknown operation {index}")))?;
        let op = operation.kind().name();

        let tensors = operation
            .operands()
            .map(|operand| self.tensor_builder.at(operand))
            .collect::<BackendResult<Vec<_>>>()?;
        if let Some(tensor) = tensors.iter().find(|t| t.dtype() != DataType::Float32) {
            return Err(BackendError::unsupported(
                op,
                format!("operand {} has dtype {}", tensor.index(), tensor.dtype().as_str()),
            ));
        }

        let inputs = operation
            .inputs()
            .iter()
            .map(|&operand| self.tensor_builder.at(operand))
            .collect::<BackendResult<Vec<_>>>()?;
        let output = match operation.outputs() {
            [single] => self.tensor_builder.at(*single)?,
            outputs => {
                return Err(BackendError::unsupported(
                    op,
                    format!("expected 1 output, got {}", outputs.len()),
                ))
            }
        };

        let input_dims: Vec<&[usize]> = inputs.iter().map(|tensor| tensor.dims()).collect();
        let expected = output_dims(operation.params(), &input_dims)?;
        if expected != output.dims() {
            return Err(BackendError::execution(format!(
                "{op} {index}: output {} is declared as {:?}, computed {:?}",
                output.index(),
                output.dims(),
                expected
            )));
        }

        debug!(op, operation = %index, "cpu kernel generated");
        Ok(Box::new(CpuKernel {
            params: operation.params().clone(),
            inputs,
            output,
        }))
    }

    fn sequence_slot(&mut self) -> &mut Option<FunctionSequence> {
        &mut self.sequence
    }
}
