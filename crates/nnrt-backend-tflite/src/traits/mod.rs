//! Snapshot of one operation in the terms the model synthesizer needs.

mod provider;

pub use provider::TraitsProvider;

use nnrt::backend::spec::{BackendError, BackendResult, TensorBuilder};
use nnrt::backend::tensor::Tensor;
use nnrt::ir::{DataType, Graph, OperandIndex, Operation};
use std::sync::Arc;

/// Shape and, for constants, payload of one operand.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandTraits {
    operand: OperandIndex,
    dims: Vec<i32>,
    data: Option<Arc<[u8]>>,
}

impl OperandTraits {
    pub fn new(tensor: &Tensor) -> BackendResult<Self> {
        if tensor.dtype() != DataType::Float32 {
            return Err(BackendError::unsupported(
                format!("operand {}", tensor.index()),
                format!(
                    "the embedded interpreter only runs f32 data, got {}",
                    tensor.dtype().as_str()
                ),
            ));
        }
        let dims = tensor
            .dims()
            .iter()
            .map(|&dim| {
                i32::try_from(dim).map_err(|_| {
                    BackendError::unsupported(
                        format!("operand {}", tensor.index()),
                        format!("dimension {dim} does not fit the model format"),
                    )
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Self {
            operand: tensor.index(),
            dims,
            data: None,
        })
    }

    /// Constant operand whose payload must fill the tensor exactly.
    pub fn constant(tensor: &Tensor, data: Arc<[u8]>) -> BackendResult<Self> {
        if data.len() != tensor.total_size() {
            return Err(BackendError::invariant(format!(
                "constant {} carries {} bytes, tensor needs {}",
                tensor.index(),
                data.len(),
                tensor.total_size()
            )));
        }
        let mut traits = Self::new(tensor)?;
        traits.data = Some(data);
        Ok(traits)
    }

    pub fn operand(&self) -> OperandIndex {
        self.operand
    }

    pub fn dims(&self) -> &[i32] {
        &self.dims
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn is_constant(&self) -> bool {
        self.data.is_some()
    }
}

/// Inputs (in operation order), outputs and the operator strategy of one operation.
#[derive(Debug, Clone)]
pub struct OperationTraits {
    inputs: Vec<OperandTraits>,
    outputs: Vec<OperandTraits>,
    provider: TraitsProvider,
}

impl OperationTraits {
    /// Fails with `Unsupported` for parameters the model format cannot express, before any
    /// bytes are produced.
    pub fn new(
        operation: &Operation,
        graph: &Graph,
        tensor_builder: &dyn TensorBuilder,
    ) -> BackendResult<Self> {
        let provider = TraitsProvider::from_params(operation.params())?;
        let (expected_inputs, expected_outputs) = provider.arity();
        if operation.inputs().len() != expected_inputs
            || operation.outputs().len() != expected_outputs
        {
            return Err(BackendError::unsupported(
                provider.kind().name(),
                format!(
                    "expected {expected_inputs} inputs and {expected_outputs} outputs, got {} and {}",
                    operation.inputs().len(),
                    operation.outputs().len()
                ),
            ));
        }

        let mut inputs = Vec::with_capacity(operation.inputs().len());
        for &index in operation.inputs() {
            let tensor = tensor_builder.at(index)?;
            let operand = graph
                .operand(index)
                .ok_or_else(|| BackendError::invariant(format!("unknown operand {index}")))?;
            let traits = match operand.data() {
                Some(data) => OperandTraits::constant(&tensor, data.clone())?,
                None => OperandTraits::new(&tensor)?,
            };
            inputs.push(traits);
        }
        let outputs = operation
            .outputs()
            .iter()
            .map(|&index| OperandTraits::new(&*tensor_builder.at(index)?))
            .collect::<BackendResult<Vec<_>>>()?;

        Ok(Self {
            inputs,
            outputs,
            provider,
        })
    }

    /// All inputs in operation order.
    pub fn inputs(&self) -> &[OperandTraits] {
        &self.inputs
    }

    pub fn non_constant_inputs(&self) -> impl Iterator<Item = &OperandTraits> {
        self.inputs.iter().filter(|input| !input.is_constant())
    }

    pub fn constant_inputs(&self) -> impl Iterator<Item = &OperandTraits> {
        self.inputs.iter().filter(|input| input.is_constant())
    }

    pub fn outputs(&self) -> &[OperandTraits] {
        &self.outputs
    }

    pub fn provider(&self) -> &TraitsProvider {
        &self.provider
    }
}
