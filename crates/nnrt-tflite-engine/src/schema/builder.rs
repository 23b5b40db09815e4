//! Builder helpers mirroring the readers in `tables.rs`.

use super::enums::{ActivationFunctionType, BuiltinOperator, BuiltinOptions, Padding, TensorType};
use super::tables::{
    AddOptions, Buffer, Conv2DOptions, DepthwiseConv2DOptions, Model, Operator, OperatorCode,
    Pool2DOptions, SoftmaxOptions, SqueezeOptions, SubGraph, Tensor,
};
use super::{FILE_IDENTIFIER, SCHEMA_VERSION};
use flatbuffers::{FlatBufferBuilder, ForwardsUOffset, UnionWIPOffset, Vector, WIPOffset};

pub struct TensorArgs<'a> {
    pub shape: Option<WIPOffset<Vector<'a, i32>>>,
    pub type_: TensorType,
    pub buffer: u32,
    pub name: Option<WIPOffset<&'a str>>,
}

pub fn create_tensor<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    args: &TensorArgs<'a>,
) -> WIPOffset<Tensor<'a>> {
    let start = fbb.start_table();
    if let Some(name) = args.name {
        fbb.push_slot_always::<WIPOffset<_>>(Tensor::VT_NAME, name);
    }
    fbb.push_slot::<u32>(Tensor::VT_BUFFER, args.buffer, 0);
    if let Some(shape) = args.shape {
        fbb.push_slot_always::<WIPOffset<_>>(Tensor::VT_SHAPE, shape);
    }
    fbb.push_slot::<i8>(Tensor::VT_TYPE, args.type_ as i8, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub fn create_buffer<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    data: Option<WIPOffset<Vector<'a, u8>>>,
) -> WIPOffset<Buffer<'a>> {
    let start = fbb.start_table();
    if let Some(data) = data {
        fbb.push_slot_always::<WIPOffset<_>>(Buffer::VT_DATA, data);
    }
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub struct OperatorArgs<'a> {
    pub opcode_index: u32,
    pub inputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub outputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub builtin_options_type: BuiltinOptions,
    pub builtin_options: Option<WIPOffset<UnionWIPOffset>>,
}

pub fn create_operator<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    args: &OperatorArgs<'a>,
) -> WIPOffset<Operator<'a>> {
    let start = fbb.start_table();
    if let Some(options) = args.builtin_options {
        fbb.push_slot_always::<WIPOffset<_>>(Operator::VT_BUILTIN_OPTIONS, options);
    }
    if let Some(outputs) = args.outputs {
        fbb.push_slot_always::<WIPOffset<_>>(Operator::VT_OUTPUTS, outputs);
    }
    if let Some(inputs) = args.inputs {
        fbb.push_slot_always::<WIPOffset<_>>(Operator::VT_INPUTS, inputs);
    }
    fbb.push_slot::<u32>(Operator::VT_OPCODE_INDEX, args.opcode_index, 0);
    fbb.push_slot::<u8>(
        Operator::VT_BUILTIN_OPTIONS_TYPE,
        args.builtin_options_type as u8,
        0,
    );
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

/// Operator code for a builtin, filling both the legacy and the extended code field.
pub fn create_operator_code<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    builtin: BuiltinOperator,
    version: i32,
) -> WIPOffset<OperatorCode<'a>> {
    let code = builtin as i32;
    let deprecated = i8::try_from(code).unwrap_or(i8::MAX);
    let start = fbb.start_table();
    fbb.push_slot::<i32>(OperatorCode::VT_BUILTIN_CODE, code, 0);
    fbb.push_slot::<i32>(OperatorCode::VT_VERSION, version, 1);
    fbb.push_slot::<i8>(OperatorCode::VT_DEPRECATED_BUILTIN_CODE, deprecated, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub struct SubGraphArgs<'a> {
    pub tensors: Option<WIPOffset<Vector<'a, ForwardsUOffset<Tensor<'a>>>>>,
    pub inputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub outputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub operators: Option<WIPOffset<Vector<'a, ForwardsUOffset<Operator<'a>>>>>,
    pub name: Option<WIPOffset<&'a str>>,
}

pub fn create_subgraph<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    args: &SubGraphArgs<'a>,
) -> WIPOffset<SubGraph<'a>> {
    let start = fbb.start_table();
    if let Some(name) = args.name {
        fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_NAME, name);
    }
    if let Some(operators) = args.operators {
        fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_OPERATORS, operators);
    }
    if let Some(outputs) = args.outputs {
        fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_OUTPUTS, outputs);
    }
    if let Some(inputs) = args.inputs {
        fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_INPUTS, inputs);
    }
    if let Some(tensors) = args.tensors {
        fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_TENSORS, tensors);
    }
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub struct ModelArgs<'a> {
    pub operator_codes: Option<WIPOffset<Vector<'a, ForwardsUOffset<OperatorCode<'a>>>>>,
    pub subgraphs: Option<WIPOffset<Vector<'a, ForwardsUOffset<SubGraph<'a>>>>>,
    pub description: Option<WIPOffset<&'a str>>,
    pub buffers: Option<WIPOffset<Vector<'a, ForwardsUOffset<Buffer<'a>>>>>,
}

/// Root table stamped with [`SCHEMA_VERSION`].
pub fn create_model<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    args: &ModelArgs<'a>,
) -> WIPOffset<Model<'a>> {
    let start = fbb.start_table();
    if let Some(buffers) = args.buffers {
        fbb.push_slot_always::<WIPOffset<_>>(Model::VT_BUFFERS, buffers);
    }
    if let Some(description) = args.description {
        fbb.push_slot_always::<WIPOffset<_>>(Model::VT_DESCRIPTION, description);
    }
    if let Some(subgraphs) = args.subgraphs {
        fbb.push_slot_always::<WIPOffset<_>>(Model::VT_SUBGRAPHS, subgraphs);
    }
    if let Some(codes) = args.operator_codes {
        fbb.push_slot_always::<WIPOffset<_>>(Model::VT_OPERATOR_CODES, codes);
    }
    fbb.push_slot::<u32>(Model::VT_VERSION, SCHEMA_VERSION, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

/// Finishes the buffer with the TFLite file identifier.
pub fn finish_model_buffer<'a>(fbb: &mut FlatBufferBuilder<'a>, root: WIPOffset<Model<'a>>) {
    fbb.finish(root, Some(FILE_IDENTIFIER));
}

pub fn create_conv_2d_options<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    padding: Padding,
    stride_w: i32,
    stride_h: i32,
    activation: ActivationFunctionType,
    dilation_w: i32,
    dilation_h: i32,
) -> WIPOffset<Conv2DOptions<'a>> {
    let start = fbb.start_table();
    fbb.push_slot::<i32>(Conv2DOptions::VT_DILATION_H_FACTOR, dilation_h, 1);
    fbb.push_slot::<i32>(Conv2DOptions::VT_DILATION_W_FACTOR, dilation_w, 1);
    fbb.push_slot::<i32>(Conv2DOptions::VT_STRIDE_H, stride_h, 0);
    fbb.push_slot::<i32>(Conv2DOptions::VT_STRIDE_W, stride_w, 0);
    fbb.push_slot::<i8>(
        Conv2DOptions::VT_FUSED_ACTIVATION_FUNCTION,
        activation as i8,
        0,
    );
    fbb.push_slot::<i8>(Conv2DOptions::VT_PADDING, padding as i8, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

#[allow(clippy::too_many_arguments)]
pub fn create_depthwise_conv_2d_options<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    padding: Padding,
    stride_w: i32,
    stride_h: i32,
    depth_multiplier: i32,
    activation: ActivationFunctionType,
    dilation_w: i32,
    dilation_h: i32,
) -> WIPOffset<DepthwiseConv2DOptions<'a>> {
    let start = fbb.start_table();
    fbb.push_slot::<i32>(DepthwiseConv2DOptions::VT_DILATION_H_FACTOR, dilation_h, 1);
    fbb.push_slot::<i32>(DepthwiseConv2DOptions::VT_DILATION_W_FACTOR, dilation_w, 1);
    fbb.push_slot::<i32>(
        DepthwiseConv2DOptions::VT_DEPTH_MULTIPLIER,
        depth_multiplier,
        0,
    );
    fbb.push_slot::<i32>(DepthwiseConv2DOptions::VT_STRIDE_H, stride_h, 0);
    fbb.push_slot::<i32>(DepthwiseConv2DOptions::VT_STRIDE_W, stride_w, 0);
    fbb.push_slot::<i8>(
        DepthwiseConv2DOptions::VT_FUSED_ACTIVATION_FUNCTION,
        activation as i8,
        0,
    );
    fbb.push_slot::<i8>(DepthwiseConv2DOptions::VT_PADDING, padding as i8, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub fn create_pool_2d_options<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    padding: Padding,
    stride_w: i32,
    stride_h: i32,
    filter_width: i32,
    filter_height: i32,
    activation: ActivationFunctionType,
) -> WIPOffset<Pool2DOptions<'a>> {
    let start = fbb.start_table();
    fbb.push_slot::<i32>(Pool2DOptions::VT_FILTER_HEIGHT, filter_height, 0);
    fbb.push_slot::<i32>(Pool2DOptions::VT_FILTER_WIDTH, filter_width, 0);
    fbb.push_slot::<i32>(Pool2DOptions::VT_STRIDE_H, stride_h, 0);
    fbb.push_slot::<i32>(Pool2DOptions::VT_STRIDE_W, stride_w, 0);
    fbb.push_slot::<i8>(
        Pool2DOptions::VT_FUSED_ACTIVATION_FUNCTION,
        activation as i8,
        0,
    );
    fbb.push_slot::<i8>(Pool2DOptions::VT_PADDING, padding as i8, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub fn create_add_options<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    activation: ActivationFunctionType,
) -> WIPOffset<AddOptions<'a>> {
    let start = fbb.start_table();
    fbb.push_slot::<i8>(
        AddOptions::VT_FUSED_ACTIVATION_FUNCTION,
        activation as i8,
        0,
    );
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub fn create_softmax_options<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    beta: f32,
) -> WIPOffset<SoftmaxOptions<'a>> {
    let start = fbb.start_table();
    fbb.push_slot::<f32>(SoftmaxOptions::VT_BETA, beta, 0.0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub fn create_squeeze_options<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    squeeze_dims: Option<WIPOffset<Vector<'a, i32>>>,
) -> WIPOffset<SqueezeOptions<'a>> {
    let start = fbb.start_table();
    if let Some(dims) = squeeze_dims {
        fbb.push_slot_always::<WIPOffset<_>>(SqueezeOptions::VT_SQUEEZE_DIMS, dims);
    }
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}
