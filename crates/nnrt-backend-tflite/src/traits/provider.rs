use flatbuffers::{FlatBufferBuilder, UnionWIPOffset, WIPOffset};
use nnrt::backend::spec::{BackendError, BackendResult};
use nnrt::ir::{Activation, OpKind, OpParams, Padding, Stride};
use nnrt_tflite_engine::schema::{
    self, create_add_options, create_conv_2d_options, create_depthwise_conv_2d_options,
    create_pool_2d_options, create_softmax_options, create_squeeze_options,
    ActivationFunctionType, BuiltinOperator, BuiltinOptions,
};

/// Operator-specific part of a synthesized model.
///
/// Built from the operation's parameters, it knows its builtin code, its options
/// discriminant and how to write its options table.
#[derive(Debug, Clone, PartialEq)]
pub enum TraitsProvider {
    Relu,
    Relu6,
    Add {
        activation: ActivationFunctionType,
    },
    Conv2D {
        padding: schema::Padding,
        stride_w: i32,
        stride_h: i32,
        dilation_w: i32,
        dilation_h: i32,
        activation: ActivationFunctionType,
    },
    DepthwiseConv2D {
        padding: schema::Padding,
        stride_w: i32,
        stride_h: i32,
        dilation_w: i32,
        dilation_h: i32,
        depth_multiplier: i32,
        activation: ActivationFunctionType,
    },
    AvgPool2D {
        padding: schema::Padding,
        stride_w: i32,
        stride_h: i32,
        filter_width: i32,
        filter_height: i32,
        activation: ActivationFunctionType,
    },
    Squeeze {
        dims: Vec<i32>,
    },
    Softmax {
        beta: f32,
    },
}

impl TraitsProvider {
    pub fn from_params(params: &OpParams) -> BackendResult<Self> {
        let kind = params.kind();
        Ok(match params {
            OpParams::Relu => TraitsProvider::Relu,
            OpParams::Relu6 => TraitsProvider::Relu6,
            OpParams::Add(add) => TraitsProvider::Add {
                activation: activation(kind, add.activation)?,
            },
            OpParams::Conv2D(conv) => {
                let (stride_h, stride_w) = stride(kind, conv.stride)?;
                TraitsProvider::Conv2D {
                    padding: padding(kind, conv.padding)?,
                    stride_w,
                    stride_h,
                    dilation_w: positive(kind, "dilation", conv.dilation.width_factor)?,
                    dilation_h: positive(kind, "dilation", conv.dilation.height_factor)?,
                    activation: activation(kind, conv.activation)?,
                }
            }
            OpParams::DepthwiseConv2D(conv) => {
                let (stride_h, stride_w) = stride(kind, conv.stride)?;
                TraitsProvider::DepthwiseConv2D {
                    padding: padding(kind, conv.padding)?,
                    stride_w,
                    stride_h,
                    dilation_w: positive(kind, "dilation", conv.dilation.width_factor)?,
                    dilation_h: positive(kind, "dilation", conv.dilation.height_factor)?,
                    depth_multiplier: positive(kind, "depth multiplier", conv.multiplier)?,
                    activation: activation(kind, conv.activation)?,
                }
            }
            OpParams::AvgPool2D(pool) => {
                let (stride_h, stride_w) = stride(kind, pool.stride)?;
                TraitsProvider::AvgPool2D {
                    padding: padding(kind, pool.padding)?,
                    stride_w,
                    stride_h,
                    filter_width: positive(kind, "kernel width", pool.kernel_width)?,
                    filter_height: positive(kind, "kernel height", pool.kernel_height)?,
                    activation: activation(kind, pool.activation)?,
                }
            }
            OpParams::Squeeze(squeeze) => TraitsProvider::Squeeze {
                dims: squeeze.dims.clone(),
            },
            OpParams::Softmax(softmax) => TraitsProvider::Softmax { beta: softmax.beta },
        })
    }

    pub fn kind(&self) -> OpKind {
        match self {
            TraitsProvider::Relu => OpKind::Relu,
            TraitsProvider::Relu6 => OpKind::Relu6,
            TraitsProvider::Add { .. } => OpKind::Add,
            TraitsProvider::Conv2D { .. } => OpKind::Conv2D,
            TraitsProvider::DepthwiseConv2D { .. } => OpKind::DepthwiseConv2D,
            TraitsProvider::AvgPool2D { .. } => OpKind::AvgPool2D,
            TraitsProvider::Squeeze { .. } => OpKind::Squeeze,
            TraitsProvider::Softmax { .. } => OpKind::Softmax,
        }
    }

    /// `(inputs, outputs)` the operator takes.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            TraitsProvider::Add { .. } => (2, 1),
            TraitsProvider::Conv2D { .. } | TraitsProvider::DepthwiseConv2D { .. } => (3, 1),
            _ => (1, 1),
        }
    }

    pub fn builtin_code(&self) -> BuiltinOperator {
        match self {
            TraitsProvider::Relu => BuiltinOperator::Relu,
            TraitsProvider::Relu6 => BuiltinOperator::Relu6,
            TraitsProvider::Add { .. } => BuiltinOperator::Add,
            TraitsProvider::Conv2D { .. } => BuiltinOperator::Conv2D,
            TraitsProvider::DepthwiseConv2D { .. } => BuiltinOperator::DepthwiseConv2D,
            TraitsProvider::AvgPool2D { .. } => BuiltinOperator::AveragePool2D,
            TraitsProvider::Squeeze { .. } => BuiltinOperator::Squeeze,
            TraitsProvider::Softmax { .. } => BuiltinOperator::Softmax,
        }
    }

    pub fn options_type(&self) -> BuiltinOptions {
        match self {
            TraitsProvider::Relu | TraitsProvider::Relu6 => BuiltinOptions::None,
            TraitsProvider::Add { .. } => BuiltinOptions::AddOptions,
            TraitsProvider::Conv2D { .. } => BuiltinOptions::Conv2DOptions,
            TraitsProvider::DepthwiseConv2D { .. } => BuiltinOptions::DepthwiseConv2DOptions,
            TraitsProvider::AvgPool2D { .. } => BuiltinOptions::Pool2DOptions,
            TraitsProvider::Squeeze { .. } => BuiltinOptions::SqueezeOptions,
            TraitsProvider::Softmax { .. } => BuiltinOptions::SoftmaxOptions,
        }
    }

    /// Writes the options table, `None` for operators without options.
    pub fn build_options<'a>(
        &self,
        fbb: &mut FlatBufferBuilder<'a>,
    ) -> Option<WIPOffset<UnionWIPOffset>> {
        match self {
            TraitsProvider::Relu | TraitsProvider::Relu6 => None,
            TraitsProvider::Add { activation } => {
                Some(create_add_options(fbb, *activation).as_union_value())
            }
            TraitsProvider::Conv2D {
                padding,
                stride_w,
                stride_h,
                dilation_w,
                dilation_h,
                activation,
            } => Some(
                create_conv_2d_options(
                    fbb,
                    *padding,
                    *stride_w,
                    *stride_h,
                    *activation,
                    *dilation_w,
                    *dilation_h,
                )
                .as_union_value(),
            ),
            TraitsProvider::DepthwiseConv2D {
                padding,
                stride_w,
                stride_h,
                dilation_w,
                dilation_h,
                depth_multiplier,
                activation,
            } => Some(
                create_depthwise_conv_2d_options(
                    fbb,
                    *padding,
                    *stride_w,
                    *stride_h,
                    *depth_multiplier,
                    *activation,
                    *dilation_w,
                    *dilation_h,
                )
                .as_union_value(),
            ),
            TraitsProvider::AvgPool2D {
                padding,
                stride_w,
                stride_h,
                filter_width,
                filter_height,
                activation,
            } => Some(
                create_pool_2d_options(
                    fbb,
                    *padding,
                    *stride_w,
                    *stride_h,
                    *filter_width,
                    *filter_height,
                    *activation,
                )
                .as_union_value(),
            ),
            TraitsProvider::Squeeze { dims } => {
                let dims = fbb.create_vector(dims);
                Some(create_squeeze_options(fbb, Some(dims)).as_union_value())
            }
            TraitsProvider::Softmax { beta } => {
                Some(create_softmax_options(fbb, *beta).as_union_value())
            }
        }
    }
}

fn activation(kind: OpKind, activation: Activation) -> BackendResult<ActivationFunctionType> {
    match activation {
        Activation::None => Ok(ActivationFunctionType::None),
        Activation::Relu => Ok(ActivationFunctionType::Relu),
        Activation::Relu1 => Ok(ActivationFunctionType::ReluN1To1),
        Activation::Relu6 => Ok(ActivationFunctionType::Relu6),
        Activation::Tanh | Activation::Sigmoid => Err(BackendError::unsupported(
            kind.name(),
            format!("fused activation {activation:?}"),
        )),
    }
}

fn padding(kind: OpKind, padding: Padding) -> BackendResult<schema::Padding> {
    match padding {
        Padding::Same => Ok(schema::Padding::Same),
        Padding::Valid => Ok(schema::Padding::Valid),
        Padding::Explicit { .. } => Err(BackendError::unsupported(
            kind.name(),
            format!("padding {padding:?}, only SAME and VALID can be expressed"),
        )),
    }
}

/// Returns `(vertical, horizontal)`.
fn stride(kind: OpKind, stride: Stride) -> BackendResult<(i32, i32)> {
    Ok((
        positive(kind, "vertical stride", stride.vertical)?,
        positive(kind, "horizontal stride", stride.horizontal)?,
    ))
}

fn positive(kind: OpKind, what: &str, value: u32) -> BackendResult<i32> {
    i32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| BackendError::unsupported(kind.name(), format!("{what} {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnrt::ir::{AddParams, Conv2DParams, Dilation};

    fn conv(padding: Padding, activation: Activation) -> OpParams {
        OpParams::Conv2D(Conv2DParams {
            padding,
            stride: Stride::new(2, 3),
            dilation: Dilation::default(),
            activation,
        })
    }

    #[test]
    fn conv_keeps_strides_on_their_axes() {
        let provider = TraitsProvider::from_params(&conv(Padding::Same, Activation::Relu6)).unwrap();
        assert_eq!(
            provider,
            TraitsProvider::Conv2D {
                padding: schema::Padding::Same,
                stride_w: 3,
                stride_h: 2,
                dilation_w: 1,
                dilation_h: 1,
                activation: ActivationFunctionType::Relu6,
            }
        );
        assert_eq!(provider.builtin_code(), BuiltinOperator::Conv2D);
        assert_eq!(provider.options_type(), BuiltinOptions::Conv2DOptions);
    }

    #[test]
    fn inexpressible_parameters_are_unsupported() {
        let explicit = Padding::Explicit {
            top: 1,
            bottom: 1,
            left: 0,
            right: 0,
        };
        assert!(TraitsProvider::from_params(&conv(explicit, Activation::None))
            .unwrap_err()
            .is_unsupported());
        assert!(TraitsProvider::from_params(&conv(Padding::Valid, Activation::Tanh))
            .unwrap_err()
            .is_unsupported());
        let add = OpParams::Add(AddParams {
            activation: Activation::Sigmoid,
        });
        assert!(TraitsProvider::from_params(&add).unwrap_err().is_unsupported());
    }

    #[test]
    fn activations_without_options_have_no_table() {
        let mut fbb = FlatBufferBuilder::new();
        assert!(TraitsProvider::Relu.build_options(&mut fbb).is_none());
        assert_eq!(TraitsProvider::Relu6.options_type(), BuiltinOptions::None);
        assert!(TraitsProvider::Softmax { beta: 1.0 }
            .build_options(&mut fbb)
            .is_some());
    }
}
