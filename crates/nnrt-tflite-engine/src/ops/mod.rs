//! Float32 NHWC builtin kernels.
//!
//! Every kernel has a shape rule used while preparing the interpreter and an evaluation
//! routine that maps decoded input values to output values.

mod conv;
mod elementwise;
mod pool;
mod softmax;

use crate::error::{EngineError, EngineResult};
use crate::schema::{ActivationFunctionType, BuiltinOperator, Padding};

/// Activations the kernels can fuse into their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusedActivation {
    None,
    Relu,
    ReluN1To1,
    Relu6,
}

impl FusedActivation {
    pub fn from_schema(value: i8) -> EngineResult<Self> {
        match ActivationFunctionType::from_i8(value) {
            Some(ActivationFunctionType::None) => Ok(FusedActivation::None),
            Some(ActivationFunctionType::Relu) => Ok(FusedActivation::Relu),
            Some(ActivationFunctionType::ReluN1To1) => Ok(FusedActivation::ReluN1To1),
            Some(ActivationFunctionType::Relu6) => Ok(FusedActivation::Relu6),
            Some(other) => Err(EngineError::unsupported(
                format!("fused activation {other:?}"),
                "float kernels fuse only NONE, RELU, RELU_N1_TO_1 and RELU6",
            )),
            None => Err(EngineError::malformed(format!(
                "unknown fused activation {value}"
            ))),
        }
    }

    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            FusedActivation::None => x,
            FusedActivation::Relu => x.max(0.0),
            FusedActivation::ReluN1To1 => x.max(-1.0).min(1.0),
            FusedActivation::Relu6 => x.max(0.0).min(6.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvParams {
    pub padding: Padding,
    pub stride_w: usize,
    pub stride_h: usize,
    pub dilation_w: usize,
    pub dilation_h: usize,
    pub activation: FusedActivation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthwiseParams {
    pub padding: Padding,
    pub stride_w: usize,
    pub stride_h: usize,
    pub dilation_w: usize,
    pub dilation_h: usize,
    pub depth_multiplier: usize,
    pub activation: FusedActivation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolParams {
    pub padding: Padding,
    pub stride_w: usize,
    pub stride_h: usize,
    pub filter_width: usize,
    pub filter_height: usize,
    pub activation: FusedActivation,
}

/// A resolved operator ready for shape checking and evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinKernel {
    Add { activation: FusedActivation },
    AveragePool2D(PoolParams),
    Conv2D(ConvParams),
    DepthwiseConv2D(DepthwiseParams),
    Relu,
    ReluN1To1,
    Relu6,
    Softmax { beta: f32 },
    Squeeze { dims: Vec<i32> },
}

/// Decoded input of a kernel.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    pub dims: &'a [usize],
    pub data: &'a [f32],
}

impl BuiltinKernel {
    pub fn op(&self) -> BuiltinOperator {
        match self {
            BuiltinKernel::Add { .. } => BuiltinOperator::Add,
            BuiltinKernel::AveragePool2D(_) => BuiltinOperator::AveragePool2D,
            BuiltinKernel::Conv2D(_) => BuiltinOperator::Conv2D,
            BuiltinKernel::DepthwiseConv2D(_) => BuiltinOperator::DepthwiseConv2D,
            BuiltinKernel::Relu => BuiltinOperator::Relu,
            BuiltinKernel::ReluN1To1 => BuiltinOperator::ReluN1To1,
            BuiltinKernel::Relu6 => BuiltinOperator::Relu6,
            BuiltinKernel::Softmax { .. } => BuiltinOperator::Softmax,
            BuiltinKernel::Squeeze { .. } => BuiltinOperator::Squeeze,
        }
    }

    pub fn name(&self) -> &'static str {
        self.op().name()
    }

    pub fn input_count(&self) -> usize {
        match self {
            BuiltinKernel::Add { .. } => 2,
            BuiltinKernel::Conv2D(_) | BuiltinKernel::DepthwiseConv2D(_) => 3,
            _ => 1,
        }
    }

    /// Output shape implied by the input shapes.
    pub fn output_dims(&self, inputs: &[&[usize]]) -> EngineResult<Vec<usize>> {
        if inputs.len() != self.input_count() {
            return Err(EngineError::prepare(
                self.name(),
                format!("expected {} inputs, got {}", self.input_count(), inputs.len()),
            ));
        }
        match self {
            BuiltinKernel::Add { .. } => elementwise::broadcast_dims(inputs[0], inputs[1])
                .ok_or_else(|| {
                    EngineError::prepare(
                        self.name(),
                        format!("cannot broadcast {:?} with {:?}", inputs[0], inputs[1]),
                    )
                }),
            BuiltinKernel::AveragePool2D(params) => pool::output_dims(params, inputs[0]),
            BuiltinKernel::Conv2D(params) => {
                conv::conv2d_output_dims(params, inputs[0], inputs[1], inputs[2])
            }
            BuiltinKernel::DepthwiseConv2D(params) => {
                conv::depthwise_output_dims(params, inputs[0], inputs[1], inputs[2])
            }
            BuiltinKernel::Relu | BuiltinKernel::ReluN1To1 | BuiltinKernel::Relu6 => {
                Ok(inputs[0].to_vec())
            }
            BuiltinKernel::Softmax { .. } => {
                if inputs[0].is_empty() {
                    Err(EngineError::prepare(self.name(), "input must have rank >= 1"))
                } else {
                    Ok(inputs[0].to_vec())
                }
            }
            BuiltinKernel::Squeeze { dims } => squeezed_dims(inputs[0], dims),
        }
    }

    /// Evaluates the kernel; shapes were validated by [`BuiltinKernel::output_dims`].
    pub fn eval(&self, inputs: &[TensorView<'_>], output_dims: &[usize]) -> EngineResult<Vec<f32>> {
        match self {
            BuiltinKernel::Add { activation } => {
                Ok(elementwise::add(inputs[0], inputs[1], output_dims, *activation))
            }
            BuiltinKernel::AveragePool2D(params) => pool::average_pool(params, inputs[0], output_dims),
            BuiltinKernel::Conv2D(params) => {
                conv::conv2d(params, inputs[0], inputs[1], inputs[2], output_dims)
            }
            BuiltinKernel::DepthwiseConv2D(params) => {
                conv::depthwise_conv2d(params, inputs[0], inputs[1], inputs[2], output_dims)
            }
            BuiltinKernel::Relu => Ok(elementwise::unary(inputs[0], FusedActivation::Relu)),
            BuiltinKernel::ReluN1To1 => {
                Ok(elementwise::unary(inputs[0], FusedActivation::ReluN1To1))
            }
            BuiltinKernel::Relu6 => Ok(elementwise::unary(inputs[0], FusedActivation::Relu6)),
            BuiltinKernel::Softmax { beta } => Ok(softmax::softmax(inputs[0], *beta)),
            BuiltinKernel::Squeeze { .. } => Ok(inputs[0].data.to_vec()),
        }
    }
}

/// Output extent and leading padding along one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub out: usize,
    pub pad_before: usize,
}

pub(crate) fn compute_window(
    op: &'static str,
    padding: Padding,
    input: usize,
    filter: usize,
    stride: usize,
    dilation: usize,
) -> EngineResult<Window> {
    if stride == 0 || dilation == 0 || filter == 0 {
        return Err(EngineError::prepare(
            op,
            format!("stride {stride}, dilation {dilation} and filter {filter} must be positive"),
        ));
    }
    let effective = (filter - 1) * dilation + 1;
    match padding {
        Padding::Same => {
            let out = input.div_ceil(stride);
            let needed = (out.saturating_sub(1) * stride + effective).saturating_sub(input);
            Ok(Window {
                out,
                pad_before: needed / 2,
            })
        }
        Padding::Valid => {
            if input < effective {
                return Err(EngineError::prepare(
                    op,
                    format!("VALID window {effective} exceeds input extent {input}"),
                ));
            }
            Ok(Window {
                out: (input - effective) / stride + 1,
                pad_before: 0,
            })
        }
    }
}

pub(crate) fn nhwc(op: &'static str, dims: &[usize]) -> EngineResult<[usize; 4]> {
    <[usize; 4]>::try_from(dims)
        .map_err(|_| EngineError::prepare(op, format!("expected NHWC rank-4 tensor, got {dims:?}")))
}

fn squeezed_dims(input: &[usize], axes: &[i32]) -> EngineResult<Vec<usize>> {
    let rank = input.len() as i64;
    let mut drop = vec![false; input.len()];
    if axes.is_empty() {
        for (flag, &dim) in drop.iter_mut().zip(input) {
            *flag = dim == 1;
        }
    } else {
        for &axis in axes {
            let normalized = if axis < 0 { i64::from(axis) + rank } else { i64::from(axis) };
            if !(0..rank).contains(&normalized) {
                return Err(EngineError::prepare(
                    "SQUEEZE",
                    format!("axis {axis} out of range for rank {rank}"),
                ));
            }
            let axis_index = normalized as usize;
            if input[axis_index] != 1 {
                return Err(EngineError::prepare(
                    "SQUEEZE",
                    format!("axis {axis} has extent {}, expected 1", input[axis_index]),
                ));
            }
            drop[axis_index] = true;
        }
    }
    Ok(input
        .iter()
        .zip(&drop)
        .filter(|(_, &dropped)| !dropped)
        .map(|(&dim, _)| dim)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_padding_splits_excess_toward_the_end() {
        let window = compute_window("CONV_2D", Padding::Same, 224, 3, 2, 1).unwrap();
        assert_eq!(window, Window { out: 112, pad_before: 0 });
        let window = compute_window("CONV_2D", Padding::Same, 112, 3, 1, 1).unwrap();
        assert_eq!(window, Window { out: 112, pad_before: 1 });
    }

    #[test]
    fn valid_padding_rejects_oversized_windows() {
        let window = compute_window("AVERAGE_POOL_2D", Padding::Valid, 7, 7, 2, 1).unwrap();
        assert_eq!(window, Window { out: 1, pad_before: 0 });
        assert!(compute_window("AVERAGE_POOL_2D", Padding::Valid, 3, 5, 1, 1).is_err());
        assert!(compute_window("CONV_2D", Padding::Same, 3, 1, 0, 1).is_err());
    }

    #[test]
    fn squeeze_drops_requested_unit_axes() {
        assert_eq!(squeezed_dims(&[1, 1, 1, 1024], &[1, 2]).unwrap(), vec![1, 1024]);
        assert_eq!(squeezed_dims(&[1, 3, 1], &[]).unwrap(), vec![3]);
        assert_eq!(squeezed_dims(&[1, 3, 1], &[-1]).unwrap(), vec![1, 3]);
        assert!(squeezed_dims(&[1, 3, 1], &[1]).is_err());
        assert!(squeezed_dims(&[1, 3, 1], &[3]).is_err());
    }

    #[test]
    fn fused_activation_rejects_tanh() {
        assert!(matches!(
            FusedActivation::from_schema(ActivationFunctionType::Tanh as i8),
            Err(EngineError::Unsupported { .. })
        ));
        assert_eq!(FusedActivation::Relu6.apply(7.5), 6.0);
        assert_eq!(FusedActivation::ReluN1To1.apply(-3.0), -1.0);
    }
}
