//! Core of the nnrt inference runtime.
//!
//! The crate holds the read-only operation graph ([`ir`]), the contract every compute backend
//! implements ([`backend`]), the executable function abstraction ([`exec`]) and the
//! orchestrator that lowers a graph onto a set of backends ([`compiler`]).

pub mod backend;
pub mod compiler;
pub mod exec;
pub mod ir;
pub mod util;

pub use backend::spec::{Backend, BackendContext, BackendError, BackendResult};
pub use backend::tensor::{BufferOwnership, SharedBuffer, Tensor};
pub use compiler::{compile, CompiledGraph};
pub use exec::{Function, FunctionSequence};
pub use ir::{Graph, OpKind, OpParams, Operand, OperandIndex, Operation, OperationIndex};
