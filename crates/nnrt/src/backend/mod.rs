//! Contract between the orchestrator and compute backends.

pub mod constant;
pub mod registry;
pub mod selection;
pub mod spec;
pub mod tensor;
pub mod tensor_table;
