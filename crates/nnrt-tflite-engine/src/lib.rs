//! Embedded TFLite-compatible inference engine.
//!
//! The engine reads schema-v3 flatbuffer models ([`FlatBufferModel`]), resolves their builtin
//! operators ([`BuiltinOpResolver`]) and executes them on float32 NHWC data through an
//! [`Interpreter`]. Every tensor owns a [`TensorBuffer`] that callers may share, which is how
//! the runtime exchanges data with an interpreter without copying.

mod error;
pub mod interpreter;
pub mod model;
pub mod ops;
pub mod resolver;
pub mod schema;

pub use error::{EngineError, EngineResult};
pub use interpreter::{Interpreter, InterpreterBuilder, TensorBuffer, TensorSlot};
pub use model::FlatBufferModel;
pub use resolver::BuiltinOpResolver;
