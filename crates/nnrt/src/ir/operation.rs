use super::operand::OperandIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of an operation inside [`Graph::operations`](super::Graph::operations).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OperationIndex(pub u32);

impl OperationIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Activation fused into the tail of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    None,
    Relu,
    Relu1,
    Relu6,
    Tanh,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Padding {
    Same,
    Valid,
    /// Caller-provided padding amounts in elements.
    Explicit {
        top: u32,
        bottom: u32,
        left: u32,
        right: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stride {
    pub vertical: u32,
    pub horizontal: u32,
}

impl Stride {
    pub fn new(vertical: u32, horizontal: u32) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    pub fn unit() -> Self {
        Self::new(1, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dilation {
    pub height_factor: u32,
    pub width_factor: u32,
}

impl Default for Dilation {
    fn default() -> Self {
        Self {
            height_factor: 1,
            width_factor: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddParams {
    pub activation: Activation,
}

/// Inputs are `[input, kernel (OHWI), bias]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conv2DParams {
    pub padding: Padding,
    pub stride: Stride,
    pub dilation: Dilation,
    pub activation: Activation,
}

/// Inputs are `[input, kernel (1HW(C*multiplier)), bias]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthwiseConv2DParams {
    pub padding: Padding,
    pub stride: Stride,
    pub dilation: Dilation,
    pub multiplier: u32,
    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvgPool2DParams {
    pub kernel_height: u32,
    pub kernel_width: u32,
    pub padding: Padding,
    pub stride: Stride,
    pub activation: Activation,
}

/// Axes to drop; an empty list drops every axis of extent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqueezeParams {
    pub dims: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxParams {
    pub beta: f32,
}

/// Operator kind, the tag of [`OpParams`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum OpKind {
    #[serde(rename = "ReLU")]
    Relu,
    #[serde(rename = "ReLU6")]
    Relu6,
    Add,
    Conv2D,
    DepthwiseConv2D,
    AvgPool2D,
    Squeeze,
    Softmax,
}

impl OpKind {
    pub const ALL: [OpKind; 8] = [
        OpKind::Relu,
        OpKind::Relu6,
        OpKind::Add,
        OpKind::Conv2D,
        OpKind::DepthwiseConv2D,
        OpKind::AvgPool2D,
        OpKind::Squeeze,
        OpKind::Softmax,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Relu => "ReLU",
            OpKind::Relu6 => "ReLU6",
            OpKind::Add => "Add",
            OpKind::Conv2D => "Conv2D",
            OpKind::DepthwiseConv2D => "DepthwiseConv2D",
            OpKind::AvgPool2D => "AvgPool2D",
            OpKind::Squeeze => "Squeeze",
            OpKind::Softmax => "Softmax",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown operation kind '{s}'"))
    }
}

/// Kind-specific parameter payload of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpParams {
    Relu,
    Relu6,
    Add(AddParams),
    Conv2D(Conv2DParams),
    DepthwiseConv2D(DepthwiseConv2DParams),
    AvgPool2D(AvgPool2DParams),
    Squeeze(SqueezeParams),
    Softmax(SoftmaxParams),
}

impl OpParams {
    pub fn kind(&self) -> OpKind {
        match self {
            OpParams::Relu => OpKind::Relu,
            OpParams::Relu6 => OpKind::Relu6,
            OpParams::Add(_) => OpKind::Add,
            OpParams::Conv2D(_) => OpKind::Conv2D,
            OpParams::DepthwiseConv2D(_) => OpKind::DepthwiseConv2D,
            OpParams::AvgPool2D(_) => OpKind::AvgPool2D,
            OpParams::Squeeze(_) => OpKind::Squeeze,
            OpParams::Softmax(_) => OpKind::Softmax,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    inputs: Vec<OperandIndex>,
    outputs: Vec<OperandIndex>,
    params: OpParams,
}

impl Operation {
    pub fn new(
        params: OpParams,
        inputs: impl Into<Vec<OperandIndex>>,
        outputs: impl Into<Vec<OperandIndex>>,
    ) -> Self {
        Self {
            inputs: inputs.into(),
            outputs: outputs.into(),
            params,
        }
    }

    pub fn kind(&self) -> OpKind {
        self.params.kind()
    }

    pub fn params(&self) -> &OpParams {
        &self.params
    }

    pub fn inputs(&self) -> &[OperandIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandIndex] {
        &self.outputs
    }

    /// Inputs followed by outputs.
    pub fn operands(&self) -> impl Iterator<Item = OperandIndex> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_kind_parses_case_insensitively() {
        assert_eq!("conv2d".parse::<OpKind>(), Ok(OpKind::Conv2D));
        assert_eq!("ReLU6".parse::<OpKind>(), Ok(OpKind::Relu6));
        assert!("Gather".parse::<OpKind>().is_err());
    }

    #[test]
    fn params_report_their_kind() {
        let params = OpParams::Softmax(SoftmaxParams { beta: 1.0 });
        assert_eq!(params.kind(), OpKind::Softmax);
        assert_eq!(params.kind().to_string(), "Softmax");
    }
}
