use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of an operand inside a [`Graph`](super::Graph).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OperandIndex(pub u32);

impl OperandIndex {
    pub fn value(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperandIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Element type of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Float32,
    Int32,
    UInt8,
    QuantUInt8Asymm,
    Bool8,
}

impl DataType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::Float32 | DataType::Int32 => 4,
            DataType::UInt8 | DataType::QuantUInt8Asymm | DataType::Bool8 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Float32 => "f32",
            DataType::Int32 => "i32",
            DataType::UInt8 => "u8",
            DataType::QuantUInt8Asymm => "qu8",
            DataType::Bool8 => "bool8",
        }
    }
}

/// Memory layout of a four dimensional feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    Unknown,
    Nhwc,
    Nchw,
}

/// Ordered operand dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Element count with overflow detection.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}

/// Static type information of an operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperandInfo {
    pub shape: Shape,
    pub dtype: DataType,
}

impl OperandInfo {
    pub fn new(shape: impl Into<Shape>, dtype: DataType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    pub fn float32(shape: impl Into<Shape>) -> Self {
        Self::new(shape, DataType::Float32)
    }

    /// Total storage size in bytes, `None` on overflow.
    pub fn byte_len(&self) -> Option<usize> {
        self.shape
            .checked_num_elements()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

/// A graph value: either produced at run time or a constant with owned bytes.
#[derive(Debug, Clone)]
pub struct Operand {
    info: OperandInfo,
    data: Option<Arc<[u8]>>,
}

impl Operand {
    pub fn new(info: OperandInfo) -> Self {
        Self { info, data: None }
    }

    pub fn info(&self) -> &OperandInfo {
        &self.info
    }

    pub fn shape(&self) -> &Shape {
        &self.info.shape
    }

    pub fn dtype(&self) -> DataType {
        self.info.dtype
    }

    pub fn is_constant(&self) -> bool {
        self.data.is_some()
    }

    /// Constant payload, present only for constant operands.
    pub fn data(&self) -> Option<&Arc<[u8]>> {
        self.data.as_ref()
    }

    pub(crate) fn set_data(&mut self, data: Arc<[u8]>) {
        self.data = Some(data);
    }
}
