//! Bookkeeping shared by tensor builder implementations.

use super::spec::{BackendError, BackendResult};
use super::tensor::Tensor;
use crate::ir::OperandIndex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stage of a tensor builder's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuilderStage {
    Registering,
    Prepared,
    Allocated,
    Finalized,
}

impl BuilderStage {
    fn next(self) -> Option<BuilderStage> {
        match self {
            BuilderStage::Registering => Some(BuilderStage::Prepared),
            BuilderStage::Prepared => Some(BuilderStage::Allocated),
            BuilderStage::Allocated => Some(BuilderStage::Finalized),
            BuilderStage::Finalized => None,
        }
    }
}

/// Registered tensors plus the lifecycle state machine.
#[derive(Debug)]
pub struct TensorTable {
    backend_id: &'static str,
    tensors: BTreeMap<OperandIndex, Arc<Tensor>>,
    stage: BuilderStage,
    first_uses: Vec<OperandIndex>,
    last_uses: Vec<OperandIndex>,
}

impl TensorTable {
    pub fn new(backend_id: &'static str) -> Self {
        Self {
            backend_id,
            tensors: BTreeMap::new(),
            stage: BuilderStage::Registering,
            first_uses: Vec::new(),
            last_uses: Vec::new(),
        }
    }

    pub fn stage(&self) -> BuilderStage {
        self.stage
    }

    /// Registering the same tensor twice is a no-op; a different tensor for an already
    /// registered index is rejected.
    pub fn register(&mut self, tensor: Arc<Tensor>) -> BackendResult<()> {
        if self.stage != BuilderStage::Registering {
            return Err(BackendError::invariant(format!(
                "{}: tensor {} registered after prepare",
                self.backend_id,
                tensor.index()
            )));
        }
        match self.tensors.get(&tensor.index()) {
            Some(existing) if Arc::ptr_eq(existing, &tensor) => Ok(()),
            Some(_) => Err(BackendError::invariant(format!(
                "{}: tensor {} registered twice with different storage",
                self.backend_id,
                tensor.index()
            ))),
            None => {
                self.tensors.insert(tensor.index(), tensor);
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, index: OperandIndex) -> bool {
        self.tensors.contains_key(&index)
    }

    pub fn get(&self, index: OperandIndex) -> BackendResult<Arc<Tensor>> {
        self.tensors.get(&index).cloned().ok_or_else(|| {
            BackendError::invariant(format!(
                "{}: operand {index} is not registered",
                self.backend_id
            ))
        })
    }

    /// Tensors in operand order.
    pub fn tensors(&self) -> impl Iterator<Item = &Arc<Tensor>> {
        self.tensors.values()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn notify_first_use(&mut self, index: OperandIndex) -> BackendResult<()> {
        self.get(index)?;
        self.first_uses.push(index);
        Ok(())
    }

    pub fn notify_last_use(&mut self, index: OperandIndex) -> BackendResult<()> {
        self.get(index)?;
        self.last_uses.push(index);
        Ok(())
    }

    pub fn first_uses(&self) -> &[OperandIndex] {
        &self.first_uses
    }

    pub fn last_uses(&self) -> &[OperandIndex] {
        &self.last_uses
    }

    /// Moves to `target`, which must be the immediate successor of the current stage.
    pub fn advance(&mut self, target: BuilderStage) -> BackendResult<()> {
        if self.stage.next() != Some(target) {
            return Err(BackendError::invariant(format!(
                "{}: cannot move tensor builder from {:?} to {:?}",
                self.backend_id, self.stage, target
            )));
        }
        self.stage = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Layout, OperandInfo};

    fn tensor(index: u32) -> Arc<Tensor> {
        Arc::new(
            Tensor::new(
                OperandIndex(index),
                OperandInfo::float32([4]),
                Layout::Nhwc,
                false,
            )
            .unwrap(),
        )
    }

    #[test]
    fn lifecycle_runs_in_order_exactly_once() {
        let mut table = TensorTable::new("test");
        table.register(tensor(0)).unwrap();
        assert!(table.advance(BuilderStage::Allocated).is_err());
        table.advance(BuilderStage::Prepared).unwrap();
        assert!(table.advance(BuilderStage::Prepared).is_err());
        assert!(table.register(tensor(1)).unwrap_err().is_invariant());
        table.advance(BuilderStage::Allocated).unwrap();
        table.advance(BuilderStage::Finalized).unwrap();
        assert!(table.advance(BuilderStage::Finalized).is_err());
    }

    #[test]
    fn register_is_idempotent_per_tensor() {
        let mut table = TensorTable::new("test");
        let t = tensor(3);
        table.register(t.clone()).unwrap();
        table.register(t).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.register(tensor(3)).is_err());
        assert!(table.get(OperandIndex(4)).unwrap_err().is_invariant());
    }
}
