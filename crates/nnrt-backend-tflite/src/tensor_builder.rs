use nnrt::backend::spec::{BackendError, BackendResult, TensorBuilder};
use nnrt::backend::tensor::{BufferOwnership, Tensor};
use nnrt::backend::tensor_table::{BuilderStage, TensorTable};
use nnrt::ir::OperandIndex;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::BACKEND_ID;

/// Tracks the tensors this backend touches.
///
/// Storage is decided by the kernels while they are generated: each operand either adopts
/// the interpreter's buffer or gets a copy link, so allocation has nothing left to do.
#[derive(Debug)]
pub struct TfliteTensorBuilder {
    table: Mutex<TensorTable>,
}

impl TfliteTensorBuilder {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(TensorTable::new(BACKEND_ID)),
        }
    }

    fn table(&self) -> BackendResult<MutexGuard<'_, TensorTable>> {
        self.table
            .lock()
            .map_err(|_| BackendError::invariant("tflite tensor table lock poisoned"))
    }
}

impl Default for TfliteTensorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorBuilder for TfliteTensorBuilder {
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
        let embedded = table
            .tensors()
            .filter(|tensor| tensor.ownership() == Some(BufferOwnership::Embedded))
            .count();
        debug!(
            backend = BACKEND_ID,
            tensors = table.len(),
            embedded,
            "tensor storage settled by kernels"
        );
        Ok(())
    }

    fn post_function_prepare(&self) -> BackendResult<()> {
        self.table()?.advance(BuilderStage::Finalized)
    }
}
