//! Read-only operation graph consumed by the backends.

mod graph;
mod op_sequence;
mod operand;
mod operation;

pub use graph::{Graph, GraphError};
pub use op_sequence::OpSequence;
pub use operand::{DataType, Layout, Operand, OperandIndex, OperandInfo, Shape};
pub use operation::{
    Activation, AddParams, AvgPool2DParams, Conv2DParams, DepthwiseConv2DParams, Dilation,
    OpKind, OpParams, Operation, OperationIndex, Padding, SoftmaxParams, SqueezeParams, Stride,
};
