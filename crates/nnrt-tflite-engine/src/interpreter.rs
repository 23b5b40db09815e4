use crate::error::{EngineError, EngineResult};
use crate::model::FlatBufferModel;
use crate::ops::{BuiltinKernel, TensorView};
use crate::resolver::BuiltinOpResolver;
use crate::schema::{BuiltinOperator, TensorType};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// Storage of one interpreter tensor.
///
/// The same type is used by the runtime for its own tensors, so a buffer can be handed across
/// without conversion. Identity is `Arc::ptr_eq`.
pub type TensorBuffer = Arc<RwLock<Box<[u8]>>>;

/// A tensor of the interpreter's subgraph.
#[derive(Debug)]
pub struct TensorSlot {
    name: String,
    dims: Vec<usize>,
    tensor_type: TensorType,
    byte_len: usize,
    constant: Option<Arc<[u8]>>,
    buffer: Option<TensorBuffer>,
}

impl TensorSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn tensor_type(&self) -> TensorType {
        self.tensor_type
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Whether the model provided initial contents for this tensor.
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    /// Storage, present once tensors are allocated.
    pub fn buffer(&self) -> Option<&TensorBuffer> {
        self.buffer.as_ref()
    }

    pub(crate) fn read_values(&self, index: usize) -> EngineResult<Vec<f32>> {
        let buffer = self.buffer.as_ref().ok_or(EngineError::NotAllocated)?;
        let bytes = buffer.read().map_err(|_| EngineError::Poisoned(index))?;
        Ok(decode_f32(&bytes))
    }
}

#[derive(Debug)]
struct Node {
    kernel: BuiltinKernel,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

/// Executes the first subgraph of a model.
#[derive(Debug)]
pub struct Interpreter {
    tensors: Vec<TensorSlot>,
    nodes: Vec<Node>,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    allocated: bool,
}

/// Resolves a model's operators and lays out its tensors.
pub struct InterpreterBuilder<'m> {
    model: &'m FlatBufferModel,
    resolver: &'m BuiltinOpResolver,
}

impl<'m> InterpreterBuilder<'m> {
    pub fn new(model: &'m FlatBufferModel, resolver: &'m BuiltinOpResolver) -> Self {
        Self { model, resolver }
    }

    pub fn build(self) -> EngineResult<Interpreter> {
        let model = self.model.model()?;
        let subgraph = model
            .subgraphs()
            .and_then(|subgraphs| subgraphs.iter().next())
            .ok_or_else(|| EngineError::malformed("model has no subgraph"))?;
        let buffers = model.buffers();
        let buffer_count = buffers.map(|b| b.len()).unwrap_or(0);

        let mut tensors = Vec::new();
        for (position, tensor) in subgraph.tensors().into_iter().flatten().enumerate() {
            let raw_type = tensor.type_();
            let tensor_type = TensorType::from_i8(raw_type).ok_or_else(|| {
                EngineError::malformed(format!("tensor {position}: unknown type {raw_type}"))
            })?;
            if tensor_type != TensorType::Float32 {
                return Err(EngineError::unsupported(
                    format!("tensor {position} of type {tensor_type:?}"),
                    "only FLOAT32 tensors are executed",
                ));
            }
            let dims = tensor
                .shape()
                .map(|shape| {
                    shape
                        .iter()
                        .map(|dim| {
                            usize::try_from(dim).map_err(|_| {
                                EngineError::malformed(format!(
                                    "tensor {position}: negative dimension {dim}"
                                ))
                            })
                        })
                        .collect::<EngineResult<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();
            let byte_len = dims
                .iter()
                .try_fold(tensor_type.size_in_bytes(), |acc, &dim| acc.checked_mul(dim))
                .ok_or_else(|| {
                    EngineError::malformed(format!("tensor {position}: size overflows"))
                })?;

            let buffer_index = tensor.buffer() as usize;
            let data = match buffers {
                Some(buffers) if buffer_index < buffer_count => buffers.get(buffer_index).bytes(),
                _ if buffer_index == 0 => &[],
                _ => {
                    return Err(EngineError::malformed(format!(
                        "tensor {position} references missing buffer {buffer_index}"
                    )))
                }
            };
            let constant = if data.is_empty() {
                None
            } else if data.len() != byte_len {
                return Err(EngineError::malformed(format!(
                    "tensor {position}: buffer {buffer_index} holds {} bytes, expected {byte_len}",
                    data.len()
                )));
            } else {
                Some(Arc::<[u8]>::from(data))
            };

            tensors.push(TensorSlot {
                name: tensor.name().unwrap_or_default().to_string(),
                dims,
                tensor_type,
                byte_len,
                constant,
                buffer: None,
            });
        }

        let tensor_index = |value: i32, what: &str| -> EngineResult<usize> {
            usize::try_from(value)
                .ok()
                .filter(|&index| index < tensors.len())
                .ok_or_else(|| EngineError::malformed(format!("{what} tensor index {value}")))
        };

        let operator_codes = model.operator_codes();
        let mut nodes = Vec::new();
        for (position, operator) in subgraph.operators().into_iter().flatten().enumerate() {
            let opcode_index = operator.opcode_index() as usize;
            let opcode = operator_codes
                .filter(|codes| opcode_index < codes.len())
                .map(|codes| codes.get(opcode_index))
                .ok_or_else(|| {
                    EngineError::malformed(format!(
                        "operator {position} references missing opcode {opcode_index}"
                    ))
                })?;
            if opcode.custom_code().is_some() {
                return Err(EngineError::unsupported(
                    format!("operator {position}"),
                    "custom operators are not available",
                ));
            }
            let code = opcode.effective_builtin_code();
            let op = BuiltinOperator::from_i32(code).ok_or(EngineError::UnsupportedOperator {
                operator: position,
                code,
            })?;
            let kernel = self.resolver.resolve(op, &operator)?;

            let inputs = operator
                .inputs()
                .into_iter()
                .flatten()
                .map(|value| tensor_index(value, "operator input"))
                .collect::<EngineResult<Vec<_>>>()?;
            let outputs = operator
                .outputs()
                .into_iter()
                .flatten()
                .map(|value| tensor_index(value, "operator output"))
                .collect::<EngineResult<Vec<_>>>()?;
            if outputs.len() != 1 {
                return Err(EngineError::prepare(
                    kernel.name(),
                    format!("expected 1 output, got {}", outputs.len()),
                ));
            }
            if inputs.contains(&outputs[0]) {
                return Err(EngineError::prepare(
                    kernel.name(),
                    "output tensor is also an input",
                ));
            }
            nodes.push(Node {
                kernel,
                inputs,
                outputs,
            });
        }

        let inputs = subgraph
            .inputs()
            .into_iter()
            .flatten()
            .map(|value| tensor_index(value, "subgraph input"))
            .collect::<EngineResult<Vec<_>>>()?;
        let outputs = subgraph
            .outputs()
            .into_iter()
            .flatten()
            .map(|value| tensor_index(value, "subgraph output"))
            .collect::<EngineResult<Vec<_>>>()?;

        debug!(
            tensors = tensors.len(),
            nodes = nodes.len(),
            subgraph = subgraph.name().unwrap_or(""),
            "interpreter built"
        );
        Ok(Interpreter {
            tensors,
            nodes,
            inputs,
            outputs,
            allocated: false,
        })
    }
}

impl Interpreter {
    /// Checks node shapes and allocates storage for every tensor, seeding constants.
    ///
    /// Calling it again after a successful allocation is a no-op.
    pub fn allocate_tensors(&mut self) -> EngineResult<()> {
        if self.allocated {
            return Ok(());
        }
        for node in &self.nodes {
            let input_dims: Vec<&[usize]> = node
                .inputs
                .iter()
                .map(|&index| self.tensors[index].dims.as_slice())
                .collect();
            let expected = node.kernel.output_dims(&input_dims)?;
            let declared = &self.tensors[node.outputs[0]].dims;
            if &expected != declared {
                return Err(EngineError::prepare(
                    node.kernel.name(),
                    format!("output shape {declared:?} does not match computed {expected:?}"),
                ));
            }
        }

        let mut total = 0usize;
        for (index, slot) in self.tensors.iter_mut().enumerate() {
            let mut bytes: Vec<u8> = Vec::new();
            bytes
                .try_reserve_exact(slot.byte_len)
                .map_err(|_| EngineError::Allocation {
                    tensor: index,
                    bytes: slot.byte_len,
                })?;
            match &slot.constant {
                Some(data) => bytes.extend_from_slice(data),
                None => bytes.resize(slot.byte_len, 0),
            }
            total += slot.byte_len;
            slot.buffer = Some(Arc::new(RwLock::new(bytes.into_boxed_slice())));
        }
        self.allocated = true;
        debug!(tensors = self.tensors.len(), bytes = total, "tensors allocated");
        Ok(())
    }

    /// Runs every node in order.
    pub fn invoke(&mut self) -> EngineResult<()> {
        if !self.allocated {
            return Err(EngineError::NotAllocated);
        }
        for node in &self.nodes {
            let values = node
                .inputs
                .iter()
                .map(|&index| self.tensors[index].read_values(index))
                .collect::<EngineResult<Vec<_>>>()?;
            let views: Vec<TensorView<'_>> = node
                .inputs
                .iter()
                .zip(&values)
                .map(|(&index, data)| TensorView {
                    dims: &self.tensors[index].dims,
                    data,
                })
                .collect();

            let output_index = node.outputs[0];
            let output = &self.tensors[output_index];
            let result = node.kernel.eval(&views, &output.dims)?;
            let buffer = output.buffer.as_ref().ok_or(EngineError::NotAllocated)?;
            let mut bytes = buffer
                .write()
                .map_err(|_| EngineError::Poisoned(output_index))?;
            encode_f32(&result, &mut bytes);
            trace!(op = node.kernel.name(), output = output_index, "node evaluated");
        }
        Ok(())
    }

    pub fn tensor(&self, index: usize) -> Option<&TensorSlot> {
        self.tensors.get(index)
    }

    pub fn tensors_size(&self) -> usize {
        self.tensors.len()
    }

    pub fn nodes_size(&self) -> usize {
        self.nodes.len()
    }

    pub fn inputs(&self) -> &[usize] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }
}

fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn encode_f32(values: &[f32], bytes: &mut [u8]) {
    for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}
