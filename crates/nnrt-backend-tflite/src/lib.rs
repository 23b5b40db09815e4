//! nnrt backend that runs every operation through an embedded TFLite interpreter.
//!
//! Each operation is turned into a one-operator model ([`synthesizer`]), loaded into its own
//! [`nnrt_tflite_engine::Interpreter`] and wrapped as a [`kernel::Kernel`]. Tensors that no
//! other backend has claimed adopt the interpreter's buffers, so data flows between
//! consecutive kernels and the caller without copies.

pub mod config;
pub mod kernel;
pub mod kernel_generator;
pub mod synthesizer;
pub mod tensor_builder;
pub mod traits;

pub use config::TfliteConfig;
pub use kernel::Kernel;
pub use kernel_generator::TfliteKernelGenerator;
pub use tensor_builder::TfliteTensorBuilder;

use nnrt::backend::constant::GraphConstantInitializer;
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::spec::{Backend, BackendContext, BackendResult, Config, TensorBuilder};
use nnrt::ir::Graph;
use std::sync::Arc;

/// Name the backend is registered under.
pub const BACKEND_ID: &str = "tflite";

#[derive(Debug, Default)]
pub struct TfliteBackend {
    config: Arc<TfliteConfig>,
}

impl TfliteBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for TfliteBackend {
    fn config(&self) -> Arc<dyn Config> {
        self.config.clone()
    }

    fn new_context(&self, graph: Arc<Graph>) -> BackendResult<BackendContext> {
        let tensor_builder = Arc::new(TfliteTensorBuilder::new());
        let kernel_gen = TfliteKernelGenerator::new(graph.clone(), tensor_builder.clone());
        let shared: Arc<dyn TensorBuilder> = tensor_builder;
        Ok(BackendContext {
            config: self.config.clone(),
            constant_initializer: Box::new(GraphConstantInitializer::new(graph, shared.clone())),
            tensor_builder: shared,
            kernel_gen: Box::new(kernel_gen),
        })
    }
}

/// Registers the backend under [`BACKEND_ID`].
pub fn register(registry: &mut BackendRegistry) {
    registry.register(BACKEND_ID, || -> Arc<dyn Backend> { Arc::new(TfliteBackend::new()) });
}
