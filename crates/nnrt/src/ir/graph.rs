use super::operand::{Operand, OperandIndex, OperandInfo};
use super::operation::{Operation, OperationIndex};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph is finished and can no longer be modified")]
    Finished,
    #[error("graph is not finished")]
    NotFinished,
    #[error("unknown operand {0}")]
    UnknownOperand(OperandIndex),
    #[error("operand {index} expects {expected} bytes, got {actual}")]
    ValueSizeMismatch {
        index: OperandIndex,
        expected: usize,
        actual: usize,
    },
    #[error("operand {0} is produced more than once")]
    MultipleProducers(OperandIndex),
    #[error("operand {operand} is read by operation {operation} before it is defined")]
    UndefinedInput {
        operand: OperandIndex,
        operation: OperationIndex,
    },
    #[error("graph input {0} must not be constant")]
    ConstantInput(OperandIndex),
    #[error("graph output {0} is never defined")]
    UndefinedOutput(OperandIndex),
}

/// Operand/operation graph.
///
/// Built incrementally, then sealed with [`Graph::finish`], which checks that operations are
/// stored in a valid execution order. Backends only ever see finished graphs.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    operands: Vec<Operand>,
    operations: Vec<Operation>,
    inputs: Vec<OperandIndex>,
    outputs: Vec<OperandIndex>,
    finished: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operand(&mut self, info: OperandInfo) -> Result<OperandIndex, GraphError> {
        self.ensure_building()?;
        let index = OperandIndex(self.operands.len() as u32);
        self.operands.push(Operand::new(info));
        Ok(index)
    }

    /// Marks `index` constant with the given raw bytes.
    pub fn set_operand_value(
        &mut self,
        index: OperandIndex,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<(), GraphError> {
        self.ensure_building()?;
        let data = data.into();
        let operand = self
            .operands
            .get_mut(index.as_usize())
            .ok_or(GraphError::UnknownOperand(index))?;
        let expected = operand.info().byte_len().unwrap_or(usize::MAX);
        if expected != data.len() {
            return Err(GraphError::ValueSizeMismatch {
                index,
                expected,
                actual: data.len(),
            });
        }
        operand.set_data(data);
        Ok(())
    }

    /// Little-endian convenience over [`Graph::set_operand_value`].
    pub fn set_operand_f32(
        &mut self,
        index: OperandIndex,
        values: &[f32],
    ) -> Result<(), GraphError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.set_operand_value(index, bytes)
    }

    pub fn add_operation(&mut self, operation: Operation) -> Result<OperationIndex, GraphError> {
        self.ensure_building()?;
        if let Some(unknown) = operation
            .operands()
            .find(|index| index.as_usize() >= self.operands.len())
        {
            return Err(GraphError::UnknownOperand(unknown));
        }
        let index = OperationIndex(self.operations.len() as u32);
        self.operations.push(operation);
        Ok(index)
    }

    pub fn add_input(&mut self, index: OperandIndex) -> Result<(), GraphError> {
        self.ensure_building()?;
        self.check_operand(index)?;
        self.inputs.push(index);
        Ok(())
    }

    pub fn add_output(&mut self, index: OperandIndex) -> Result<(), GraphError> {
        self.ensure_building()?;
        self.check_operand(index)?;
        self.outputs.push(index);
        Ok(())
    }

    /// Seals the graph after validating definitions and execution order.
    pub fn finish(&mut self) -> Result<(), GraphError> {
        self.ensure_building()?;

        let mut defined: HashSet<OperandIndex> = HashSet::new();
        for &input in &self.inputs {
            if self.operands[input.as_usize()].is_constant() {
                return Err(GraphError::ConstantInput(input));
            }
            defined.insert(input);
        }
        for (position, operand) in self.operands.iter().enumerate() {
            if operand.is_constant() {
                defined.insert(OperandIndex(position as u32));
            }
        }

        for (position, operation) in self.operations.iter().enumerate() {
            for &input in operation.inputs() {
                if !defined.contains(&input) {
                    return Err(GraphError::UndefinedInput {
                        operand: input,
                        operation: OperationIndex(position as u32),
                    });
                }
            }
            for &output in operation.outputs() {
                if !defined.insert(output) {
                    return Err(GraphError::MultipleProducers(output));
                }
            }
        }

        if let Some(&missing) = self.outputs.iter().find(|index| !defined.contains(index)) {
            return Err(GraphError::UndefinedOutput(missing));
        }

        self.finished = true;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn operand(&self, index: OperandIndex) -> Option<&Operand> {
        self.operands.get(index.as_usize())
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn operation(&self, index: OperationIndex) -> Option<&Operation> {
        self.operations.get(index.as_usize())
    }

    /// Operations in execution order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn inputs(&self) -> &[OperandIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandIndex] {
        &self.outputs
    }

    fn ensure_building(&self) -> Result<(), GraphError> {
        if self.finished {
            Err(GraphError::Finished)
        } else {
            Ok(())
        }
    }

    fn check_operand(&self, index: OperandIndex) -> Result<(), GraphError> {
        if index.as_usize() < self.operands.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownOperand(index))
        }
    }
}
