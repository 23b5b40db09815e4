//! Straightforward CPU implementations of every nnrt operator.
//!
//! The backend reads and writes runtime tensors directly and serves as the numerical
//! reference other backends are compared against.

pub mod config;
pub mod kernel_generator;
pub mod kernels;
pub mod tensor_builder;

pub use config::CpuConfig;
pub use kernel_generator::{CpuKernel, CpuKernelGenerator};
pub use tensor_builder::CpuTensorBuilder;

use nnrt::backend::constant::GraphConstantInitializer;
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::spec::{Backend, BackendContext, BackendResult, Config, TensorBuilder};
use nnrt::ir::Graph;
use std::sync::Arc;

pub const BACKEND_ID: &str = "cpu";

#[derive(Debug, Default)]
pub struct CpuBackend {
    config: Arc<CpuConfig>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for CpuBackend {
    fn config(&self) -> Arc<dyn Config> {
        self.config.clone()
    }

    fn new_context(&self, graph: Arc<Graph>) -> BackendResult<BackendContext> {
        let tensor_builder = Arc::new(CpuTensorBuilder::new());
        let shared: Arc<dyn TensorBuilder> = tensor_builder;
        Ok(BackendContext {
            config: self.config.clone(),
            kernel_gen: Box::new(CpuKernelGenerator::new(graph.clone(), shared.clone())),
            constant_initializer: Box::new(GraphConstantInitializer::new(graph, shared.clone())),
            tensor_builder: shared,
        })
    }
}

/// Register the CPU backend under [`BACKEND_ID`].
pub fn register(registry: &mut BackendRegistry) {
    registry.register(BACKEND_ID, || -> Arc<dyn Backend> { Arc::new(CpuBackend::new()) });
}
