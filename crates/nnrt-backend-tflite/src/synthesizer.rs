//! Builds a single-operator TFLite model for one operation.
//!
//! Layout of the synthesized model:
//! * buffer 0 is the empty sentinel; each constant input gets its own buffer after it,
//! * tensors are the non-constant inputs, then the constants, then the outputs, each named
//!   `tensor_<n>` after its position,
//! * the subgraph inputs are the non-constant inputs and its outputs are the outputs,
//! * the one operator references opcode 0 and lists its inputs in operation order.

use crate::traits::{OperandTraits, OperationTraits};
use flatbuffers::{FlatBufferBuilder, WIPOffset};
use nnrt::backend::spec::{BackendError, BackendResult};
use nnrt::ir::OperandIndex;
use nnrt_tflite_engine::schema::{
    create_buffer, create_model, create_operator, create_operator_code, create_subgraph,
    create_tensor, finish_model_buffer, Buffer, ModelArgs, OperatorArgs, SubGraphArgs, Tensor,
    TensorArgs, TensorType,
};
use std::collections::HashMap;
use tracing::debug;

pub const MODEL_DESCRIPTION: &str = "nnrt single operation model";
pub const SUBGRAPH_NAME: &str = "main";

/// Serialized model plus the operand → model tensor mapping used to build it.
#[derive(Debug, Clone)]
pub struct SynthesizedModel {
    bytes: Vec<u8>,
    tensor_indices: HashMap<OperandIndex, i32>,
    tensor_count: usize,
}

impl SynthesizedModel {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Model tensor that stands for `operand`.
    pub fn tensor_index(&self, operand: OperandIndex) -> Option<usize> {
        self.tensor_indices
            .get(&operand)
            .map(|&index| index as usize)
    }

    pub fn tensor_count(&self) -> usize {
        self.tensor_count
    }
}

pub fn synthesize(traits: &OperationTraits) -> BackendResult<SynthesizedModel> {
    let provider = traits.provider();
    let mut fbb = FlatBufferBuilder::new();

    // Operands repeated within one operation map to a single tensor.
    let mut ordered: Vec<&OperandTraits> = Vec::new();
    let mut tensor_indices: HashMap<OperandIndex, i32> = HashMap::new();
    let groups = traits
        .non_constant_inputs()
        .chain(traits.constant_inputs())
        .chain(traits.outputs());
    for operand in groups {
        if tensor_indices.contains_key(&operand.operand()) {
            continue;
        }
        let position = i32::try_from(ordered.len())
            .map_err(|_| BackendError::invariant("operation has too many operands"))?;
        tensor_indices.insert(operand.operand(), position);
        ordered.push(operand);
    }
    let index_of = |operand: &OperandTraits| -> BackendResult<i32> {
        tensor_indices.get(&operand.operand()).copied().ok_or_else(|| {
            BackendError::invariant(format!("operand {} has no model tensor", operand.operand()))
        })
    };

    let mut buffers: Vec<WIPOffset<Buffer>> = vec![create_buffer(&mut fbb, None)];
    let mut tensors: Vec<WIPOffset<Tensor>> = Vec::with_capacity(ordered.len());
    for (position, operand) in ordered.iter().enumerate() {
        let buffer = match operand.data() {
            Some(data) => {
                let data = fbb.create_vector(data);
                buffers.push(create_buffer(&mut fbb, Some(data)));
                (buffers.len() - 1) as u32
            }
            None => 0,
        };
        let shape = fbb.create_vector(operand.dims());
        let name = fbb.create_string(&format!("tensor_{position}"));
        tensors.push(create_tensor(
            &mut fbb,
            &TensorArgs {
                shape: Some(shape),
                type_: TensorType::Float32,
                buffer,
                name: Some(name),
            },
        ));
    }

    let mut subgraph_inputs = Vec::new();
    for operand in traits.non_constant_inputs() {
        let index = index_of(operand)?;
        if !subgraph_inputs.contains(&index) {
            subgraph_inputs.push(index);
        }
    }
    let operator_inputs = traits
        .inputs()
        .iter()
        .map(|operand| index_of(operand))
        .collect::<BackendResult<Vec<_>>>()?;
    let outputs = traits
        .outputs()
        .iter()
        .map(|operand| index_of(operand))
        .collect::<BackendResult<Vec<_>>>()?;

    let options = provider.build_options(&mut fbb);
    let operator_inputs = fbb.create_vector(&operator_inputs);
    let operator_outputs = fbb.create_vector(&outputs);
    let operator = create_operator(
        &mut fbb,
        &OperatorArgs {
            opcode_index: 0,
            inputs: Some(operator_inputs),
            outputs: Some(operator_outputs),
            builtin_options_type: provider.options_type(),
            builtin_options: options,
        },
    );

    let tensor_vector = fbb.create_vector(&tensors);
    let subgraph_inputs = fbb.create_vector(&subgraph_inputs);
    let subgraph_outputs = fbb.create_vector(&outputs);
    let operators = fbb.create_vector(&[operator]);
    let name = fbb.create_string(SUBGRAPH_NAME);
    let subgraph = create_subgraph(
        &mut fbb,
        &SubGraphArgs {
            tensors: Some(tensor_vector),
            inputs: Some(subgraph_inputs),
            outputs: Some(subgraph_outputs),
            operators: Some(operators),
            name: Some(name),
        },
    );

    let operator_code = create_operator_code(&mut fbb, provider.builtin_code(), 1);
    let operator_codes = fbb.create_vector(&[operator_code]);
    let subgraphs = fbb.create_vector(&[subgraph]);
    let description = fbb.create_string(MODEL_DESCRIPTION);
    let buffers = fbb.create_vector(&buffers);
    let model = create_model(
        &mut fbb,
        &ModelArgs {
            operator_codes: Some(operator_codes),
            subgraphs: Some(subgraphs),
            description: Some(description),
            buffers: Some(buffers),
        },
    );
    finish_model_buffer(&mut fbb, model);

    let bytes = fbb.finished_data().to_vec();
    debug!(
        op = provider.kind().name(),
        tensors = ordered.len(),
        bytes = bytes.len(),
        "model synthesized"
    );
    Ok(SynthesizedModel {
        bytes,
        tensor_count: ordered.len(),
        tensor_indices,
    })
}
