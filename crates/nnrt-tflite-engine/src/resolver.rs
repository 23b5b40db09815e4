use crate::error::{EngineError, EngineResult};
use crate::ops::{BuiltinKernel, ConvParams, DepthwiseParams, FusedActivation, PoolParams};
use crate::schema::{BuiltinOperator, Operator, Padding};

/// Maps builtin operator codes to kernels, decoding their options tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinOpResolver;

impl BuiltinOpResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, code: i32) -> bool {
        BuiltinOperator::from_i32(code).is_some()
    }

    pub fn resolve(&self, op: BuiltinOperator, operator: &Operator<'_>) -> EngineResult<BuiltinKernel> {
        let name = op.name();
        let missing = || EngineError::malformed(format!("{name} operator without its options table"));
        match op {
            BuiltinOperator::Add => {
                let activation = match operator.builtin_options_as_add_options() {
                    Some(options) => FusedActivation::from_schema(options.fused_activation_function())?,
                    None => FusedActivation::None,
                };
                Ok(BuiltinKernel::Add { activation })
            }
            BuiltinOperator::AveragePool2D => {
                let options = operator.builtin_options_as_pool_2d_options().ok_or_else(missing)?;
                Ok(BuiltinKernel::AveragePool2D(PoolParams {
                    padding: padding(name, options.padding())?,
                    stride_w: positive(name, "stride_w", options.stride_w())?,
                    stride_h: positive(name, "stride_h", options.stride_h())?,
                    filter_width: positive(name, "filter_width", options.filter_width())?,
                    filter_height: positive(name, "filter_height", options.filter_height())?,
                    activation: FusedActivation::from_schema(options.fused_activation_function())?,
                }))
            }
            BuiltinOperator::Conv2D => {
                let options = operator.builtin_options_as_conv_2d_options().ok_or_else(missing)?;
                Ok(BuiltinKernel::Conv2D(ConvParams {
                    padding: padding(name, options.padding())?,
                    stride_w: positive(name, "stride_w", options.stride_w())?,
                    stride_h: positive(name, "stride_h", options.stride_h())?,
                    dilation_w: positive(name, "dilation_w_factor", options.dilation_w_factor())?,
                    dilation_h: positive(name, "dilation_h_factor", options.dilation_h_factor())?,
                    activation: FusedActivation::from_schema(options.fused_activation_function())?,
                }))
            }
            BuiltinOperator::DepthwiseConv2D => {
                let options = operator
                    .builtin_options_as_depthwise_conv_2d_options()
                    .ok_or_else(missing)?;
                Ok(BuiltinKernel::DepthwiseConv2D(DepthwiseParams {
                    padding: padding(name, options.padding())?,
                    stride_w: positive(name, "stride_w", options.stride_w())?,
                    stride_h: positive(name, "stride_h", options.stride_h())?,
                    dilation_w: positive(name, "dilation_w_factor", options.dilation_w_factor())?,
                    dilation_h: positive(name, "dilation_h_factor", options.dilation_h_factor())?,
                    depth_multiplier: positive(name, "depth_multiplier", options.depth_multiplier())?,
                    activation: FusedActivation::from_schema(options.fused_activation_function())?,
                }))
            }
            BuiltinOperator::Relu => Ok(BuiltinKernel::Relu),
            BuiltinOperator::ReluN1To1 => Ok(BuiltinKernel::ReluN1To1),
            BuiltinOperator::Relu6 => Ok(BuiltinKernel::Relu6),
            BuiltinOperator::Softmax => {
                let options = operator.builtin_options_as_softmax_options().ok_or_else(missing)?;
                Ok(BuiltinKernel::Softmax { beta: options.beta() })
            }
            BuiltinOperator::Squeeze => {
                let dims = operator
                    .builtin_options_as_squeeze_options()
                    .and_then(|options| options.squeeze_dims())
                    .map(|dims| dims.iter().collect())
                    .unwrap_or_default();
                Ok(BuiltinKernel::Squeeze { dims })
            }
        }
    }
}

fn padding(op: &'static str, value: i8) -> EngineResult<Padding> {
    Padding::from_i8(value)
        .ok_or_else(|| EngineError::malformed(format!("{op}: unknown padding {value}")))
}

fn positive(op: &'static str, field: &str, value: i32) -> EngineResult<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| EngineError::malformed(format!("{op}: {field} must be positive, got {value}")))
}
