use super::spec::{BackendError, BackendResult, ConstantInitializer, TensorBuilder};
use crate::ir::{Graph, OperandIndex};
use std::sync::Arc;
use tracing::debug;

/// Copies constant operand payloads into the tensors a backend registered.
///
/// Tensors that already own memory (allocated, or exported by an embedded engine) receive
/// the bytes in place; unbound ones get runtime-owned storage first.
pub struct GraphConstantInitializer {
    graph: Arc<Graph>,
    tensor_builder: Arc<dyn TensorBuilder>,
    done: bool,
}

impl GraphConstantInitializer {
    pub fn new(graph: Arc<Graph>, tensor_builder: Arc<dyn TensorBuilder>) -> Self {
        Self {
            graph,
            tensor_builder,
            done: false,
        }
    }
}

impl ConstantInitializer for GraphConstantInitializer {
    fn run(&mut self) -> BackendResult<()> {
        if self.done {
            return Err(BackendError::invariant(
                "constant initializer already ran",
            ));
        }
        for (position, operand) in self.graph.operands().iter().enumerate() {
            let index = OperandIndex(position as u32);
            let Some(data) = operand.data() else {
                continue;
            };
            if !self.tensor_builder.is_registered(index) {
                continue;
            }
            let tensor = self.tensor_builder.at(index)?;
            if tensor.buffer().is_none() {
                tensor.allocate()?;
            }
            tensor.write_bytes(data)?;
            debug!(operand = %index, bytes = data.len(), ownership = ?tensor.ownership(), "constant initialized");
        }
        self.done = true;
        Ok(())
    }
}
