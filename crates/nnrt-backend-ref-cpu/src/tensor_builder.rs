use nnrt::backend::spec::{BackendError, BackendResult, TensorBuilder};
use nnrt::backend::tensor::Tensor;
use nnrt::backend::tensor_table::{BuilderStage, TensorTable};
use nnrt::ir::OperandIndex;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::BACKEND_ID;

/// Gives every registered tensor that is still unbound at allocation time its own
/// runtime-owned storage.
#[derive(Debug)]
pub struct CpuTensorBuilder {
    table: Mutex<TensorTable>,
}

impl CpuTensorBuilder {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(TensorTable::new(BACKEND_ID)),
        }
    }

    fn table(&self) -> BackendResult<MutexGuard<'_, TensorTable>> {
        self.table
            .lock()
            .map_err(|_| BackendError::invariant("cpu tensor table lock poisoned"))
    }
}

impl Default for CpuTensorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorBuilder for CpuTensorBuilder {
    fn register_tensor_info(&self, tensor: Arc<Tensor>) -> BackendResult<()> {
        self.table()?.register(tensor)
    }

    fn notify_first_use(&self, index: OperandIndex) -> BackendResult<()> {
        self.table()?.notify_first_use(index)
    }

    fn notify_last_use(&self, index: OperandIndex) -> BackendResult<()> {
        self.table()?.notify_last_use(index)
    }

    fn is_registered(&self, index: OperandIndex) -> bool {
        self.table
            .lock()
            .map(|table| table.is_registered(index))
            .unwrap_or(false)
    }

    fn at(&self, index: OperandIndex) -> BackendResult<Arc<Tensor>> {
        self.table()?.get(index)
    }

    fn prepare(&self) -> BackendResult<()> {
        self.table()?.advance(BuilderStage::Prepared)
    }

    fn allocate(&self) -> BackendResult<()> {
        let mut table = self.table()?;
        table.advance(BuilderStage::Allocated)?;
        let mut allocated = 0usize;
        let mut bytes = 0usize;
        for tensor in table.tensors() {
            if tensor.buffer().is_none() {
                tensor.allocate()?;
                allocated += 1;
                bytes += tensor.total_size();
            }
        }
        debug!(
            backend = BACKEND_ID,
            tensors = table.len(),
            allocated,
            bytes,
            "cpu tensors allocated"
        );
        Ok(())
    }

    fn post_function_prepare(&self) -> BackendResult<()> {
        self.table()?.advance(BuilderStage::Finalized)
    }
}
