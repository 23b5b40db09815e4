use crate::exec::{Function, FunctionSequence};
use crate::ir::{Graph, Layout, OpSequence, OperandIndex, Operation, OperationIndex};
use crate::util::timer::Timer;
use std::fmt;
use std::sync::Arc;

use super::tensor::Tensor;

/// Backend error surfaced to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Operator, parameter or dtype combination the backend cannot express.
    Unsupported { what: String, reason: String },
    /// Allocation or size computation failure.
    ResourceExhausted { message: String },
    /// Contract misuse: unregistered tensors, lifecycle order, double export.
    Invariant { message: String },
    /// Failure while building or invoking backend machinery.
    Execution { message: String },
}

impl BackendError {
    pub fn unsupported(what: impl Into<String>, reason: impl Into<String>) -> Self {
        BackendError::Unsupported {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        BackendError::ResourceExhausted {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        BackendError::Invariant {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, BackendError::Unsupported { .. })
    }

    pub fn is_invariant(&self) -> bool {
        matches!(self, BackendError::Invariant { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unsupported { what, reason } => {
                write!(f, "{what} is not supported: {reason}")
            }
            BackendError::ResourceExhausted { message } => {
                write!(f, "resource exhausted: {message}")
            }
            BackendError::Invariant { message } => {
                write!(f, "backend invariant violated: {message}")
            }
            BackendError::Execution { message } => {
                write!(f, "backend execution failure: {message}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Static capabilities of a backend.
pub trait Config: Send + Sync {
    /// Identifier used by [`BackendSelection`](super::selection::BackendSelection).
    fn id(&self) -> &str;

    /// One-time backend initialization; `false` disables the backend.
    fn initialize(&self) -> bool {
        true
    }

    /// Layout the backend wants for `operation` given the frontend layout.
    fn support_layout(&self, operation: &Operation, frontend_layout: Layout) -> Layout;

    fn supports_permutation(&self) -> bool;

    fn supports_dynamic_tensor(&self) -> bool;

    fn supports_fp16(&self) -> bool;

    /// Fresh timer used to profile this backend's op sequences.
    fn timer(&self) -> Box<dyn Timer>;
}

/// Per-backend tensor registry.
///
/// Lifecycle: `register_tensor_info` (any number) → `prepare` → `allocate` →
/// `post_function_prepare`, each stage exactly once and in order. Kernel generation happens
/// between `prepare` and `allocate`.
pub trait TensorBuilder: Send + Sync {
    /// Registers a tensor. Shape, dtype, layout and the constant flag travel with it.
    fn register_tensor_info(&self, tensor: Arc<Tensor>) -> BackendResult<()>;

    fn notify_first_use(&self, index: OperandIndex) -> BackendResult<()>;

    fn notify_last_use(&self, index: OperandIndex) -> BackendResult<()>;

    fn is_registered(&self, index: OperandIndex) -> bool;

    /// Registered tensor for `index`; an unregistered index is an invariant violation.
    fn at(&self, index: OperandIndex) -> BackendResult<Arc<Tensor>>;

    fn prepare(&self) -> BackendResult<()>;

    fn allocate(&self) -> BackendResult<()>;

    fn post_function_prepare(&self) -> BackendResult<()>;

    fn supports_dynamic_tensor(&self) -> bool {
        false
    }
}

/// Turns graph operations into executable functions.
pub trait KernelGenerator: Send {
    /// Builds the function for a single operation.
    fn generate(&mut self, index: OperationIndex) -> BackendResult<Box<dyn Function>>;

    /// Storage for the sequence assembled by [`KernelGenerator::visit_op_sequence`].
    fn sequence_slot(&mut self) -> &mut Option<FunctionSequence>;

    /// Appends one function per operation of `sequence`, in declaration order.
    fn visit_op_sequence(&mut self, sequence: &OpSequence) -> BackendResult<()> {
        self.sequence_slot()
            .get_or_insert_with(FunctionSequence::new);
        for &index in sequence.operations() {
            let function = self.generate(index)?;
            self.sequence_slot()
                .get_or_insert_with(FunctionSequence::new)
                .append(function);
        }
        Ok(())
    }

    /// Hands the assembled sequence to the caller.
    fn release_function_sequence(&mut self) -> Option<FunctionSequence> {
        self.sequence_slot().take()
    }
}

/// Populates constant payloads into backend tensors before the first run.
pub trait ConstantInitializer: Send {
    /// Runs once; a second call is an invariant violation.
    fn run(&mut self) -> BackendResult<()>;
}

/// Backend plugin entry point.
pub trait Backend: Send + Sync {
    fn config(&self) -> Arc<dyn Config>;

    /// Creates the per-graph machinery for this backend.
    fn new_context(&self, graph: Arc<Graph>) -> BackendResult<BackendContext>;
}

/// Per-graph objects created by [`Backend::new_context`].
pub struct BackendContext {
    pub config: Arc<dyn Config>,
    pub tensor_builder: Arc<dyn TensorBuilder>,
    pub kernel_gen: Box<dyn KernelGenerator>,
    pub constant_initializer: Box<dyn ConstantInitializer>,
}

impl BackendContext {
    pub fn backend_id(&self) -> &str {
        self.config.id()
    }
}

impl fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendContext")
            .field("backend_id", &self.backend_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_kind() {
        let err = BackendError::unsupported("Conv2D", "activation Tanh");
        assert_eq!(err.to_string(), "Conv2D is not supported: activation Tanh");
        assert!(err.is_unsupported());
        assert!(BackendError::invariant("x").is_invariant());
        assert_eq!(
            BackendError::resource_exhausted("arena").to_string(),
            "resource exhausted: arena"
        );
    }
}
