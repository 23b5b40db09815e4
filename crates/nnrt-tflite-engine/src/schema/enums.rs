#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum TensorType {
    Float32 = 0,
    Float16 = 1,
    Int32 = 2,
    UInt8 = 3,
    Int64 = 4,
}

impl TensorType {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(TensorType::Float32),
            1 => Some(TensorType::Float16),
            2 => Some(TensorType::Int32),
            3 => Some(TensorType::UInt8),
            4 => Some(TensorType::Int64),
            _ => None,
        }
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            TensorType::Float32 | TensorType::Int32 => 4,
            TensorType::Float16 => 2,
            TensorType::UInt8 => 1,
            TensorType::Int64 => 8,
        }
    }
}

/// Builtin operator codes understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BuiltinOperator {
    Add = 0,
    AveragePool2D = 1,
    Conv2D = 3,
    DepthwiseConv2D = 4,
    Relu = 19,
    ReluN1To1 = 20,
    Relu6 = 21,
    Softmax = 25,
    Squeeze = 43,
}

impl BuiltinOperator {
    pub const ALL: [BuiltinOperator; 9] = [
        BuiltinOperator::Add,
        BuiltinOperator::AveragePool2D,
        BuiltinOperator::Conv2D,
        BuiltinOperator::DepthwiseConv2D,
        BuiltinOperator::Relu,
        BuiltinOperator::ReluN1To1,
        BuiltinOperator::Relu6,
        BuiltinOperator::Softmax,
        BuiltinOperator::Squeeze,
    ];

    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| *op as i32 == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinOperator::Add => "ADD",
            BuiltinOperator::AveragePool2D => "AVERAGE_POOL_2D",
            BuiltinOperator::Conv2D => "CONV_2D",
            BuiltinOperator::DepthwiseConv2D => "DEPTHWISE_CONV_2D",
            BuiltinOperator::Relu => "RELU",
            BuiltinOperator::ReluN1To1 => "RELU_N1_TO_1",
            BuiltinOperator::Relu6 => "RELU6",
            BuiltinOperator::Softmax => "SOFTMAX",
            BuiltinOperator::Squeeze => "SQUEEZE",
        }
    }
}

/// Discriminants of the `BuiltinOptions` union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BuiltinOptions {
    None = 0,
    Conv2DOptions = 1,
    DepthwiseConv2DOptions = 2,
    Pool2DOptions = 5,
    SoftmaxOptions = 9,
    AddOptions = 11,
    SqueezeOptions = 30,
}

impl BuiltinOptions {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BuiltinOptions::None),
            1 => Some(BuiltinOptions::Conv2DOptions),
            2 => Some(BuiltinOptions::DepthwiseConv2DOptions),
            5 => Some(BuiltinOptions::Pool2DOptions),
            9 => Some(BuiltinOptions::SoftmaxOptions),
            11 => Some(BuiltinOptions::AddOptions),
            30 => Some(BuiltinOptions::SqueezeOptions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Padding {
    Same = 0,
    Valid = 1,
}

impl Padding {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Padding::Same),
            1 => Some(Padding::Valid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ActivationFunctionType {
    None = 0,
    Relu = 1,
    ReluN1To1 = 2,
    Relu6 = 3,
    Tanh = 4,
    SignBit = 5,
}

impl ActivationFunctionType {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(ActivationFunctionType::None),
            1 => Some(ActivationFunctionType::Relu),
            2 => Some(ActivationFunctionType::ReluN1To1),
            3 => Some(ActivationFunctionType::Relu6),
            4 => Some(ActivationFunctionType::Tanh),
            5 => Some(ActivationFunctionType::SignBit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_codes_match_schema() {
        assert_eq!(BuiltinOperator::from_i32(3), Some(BuiltinOperator::Conv2D));
        assert_eq!(BuiltinOperator::from_i32(43), Some(BuiltinOperator::Squeeze));
        assert_eq!(BuiltinOperator::from_i32(2), None);
        assert_eq!(BuiltinOptions::from_u8(30), Some(BuiltinOptions::SqueezeOptions));
        assert_eq!(Padding::from_i8(7), None);
    }
}
