//! Subset of the TFLite flatbuffer schema (`schema.fbs`, version 3).
//!
//! Readers follow the layout `flatc` generates: a table wraps a [`flatbuffers::Table`] and each
//! field lives at vtable offset `4 + 2 * field_id`. Only the tables and fields the engine reads
//! or the runtime writes are declared; unknown fields are skipped by construction.

mod builder;
mod enums;
mod tables;

pub use builder::*;
pub use enums::{ActivationFunctionType, BuiltinOperator, BuiltinOptions, Padding, TensorType};
pub use tables::*;

/// Schema version written into and expected from every model.
pub const SCHEMA_VERSION: u32 = 3;

/// Flatbuffer file identifier of TFLite models.
pub const FILE_IDENTIFIER: &str = "TFL3";
