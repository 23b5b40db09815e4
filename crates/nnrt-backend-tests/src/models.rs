//! Small graphs exercising every operator, alone and chained.

use nnrt::ir::{
    Activation, AddParams, AvgPool2DParams, Conv2DParams, DepthwiseConv2DParams, Dilation, Graph,
    OpParams, OperandIndex, OperandInfo, Operation, Padding, SoftmaxParams, SqueezeParams, Stride,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// A finished graph plus values for each of its inputs.
#[derive(Debug, Clone)]
pub struct TestGraph {
    pub name: &'static str,
    pub graph: Arc<Graph>,
    pub inputs: Vec<Vec<f32>>,
}

pub struct GraphBuilder {
    graph: Graph,
    rng: StdRng,
    inputs: Vec<Vec<f32>>,
}

impl GraphBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            graph: Graph::new(),
            rng: StdRng::seed_from_u64(seed),
            inputs: Vec::new(),
        }
    }

    fn random(&mut self, len: usize, range: f32) -> Vec<f32> {
        (0..len).map(|_| self.rng.gen_range(-range..range)).collect()
    }

    pub fn tensor(&mut self, dims: &[usize]) -> OperandIndex {
        self.graph
            .add_operand(OperandInfo::float32(dims))
            .unwrap()
    }

    /// Graph input filled with values drawn from `[-range, range)`.
    pub fn input(&mut self, dims: &[usize], range: f32) -> OperandIndex {
        let index = self.tensor(dims);
        self.graph.add_input(index).unwrap();
        let values = self.random(dims.iter().product(), range);
        self.inputs.push(values);
        index
    }

    pub fn input_values(&mut self, dims: &[usize], values: Vec<f32>) -> OperandIndex {
        let index = self.tensor(dims);
        self.graph.add_input(index).unwrap();
        self.inputs.push(values);
        index
    }

    pub fn constant(&mut self, dims: &[usize], range: f32) -> OperandIndex {
        let values = self.random(dims.iter().product(), range);
        self.constant_values(dims, &values)
    }

    pub fn constant_values(&mut self, dims: &[usize], values: &[f32]) -> OperandIndex {
        let index = self.tensor(dims);
        self.graph.set_operand_f32(index, values).unwrap();
        index
    }

    pub fn op(&mut self, params: OpParams, inputs: &[OperandIndex], out_dims: &[usize]) -> OperandIndex {
        let output = self.tensor(out_dims);
        self.graph
            .add_operation(Operation::new(params, inputs.to_vec(), vec![output]))
            .unwrap();
        output
    }

    pub fn finish(mut self, name: &'static str, outputs: &[OperandIndex]) -> TestGraph {
        for &output in outputs {
            self.graph.add_output(output).unwrap();
        }
        self.graph.finish().unwrap();
        TestGraph {
            name,
            graph: Arc::new(self.graph),
            inputs: self.inputs,
        }
    }
}

pub fn conv(padding: Padding, stride: Stride, activation: Activation) -> OpParams {
    OpParams::Conv2D(Conv2DParams {
        padding,
        stride,
        dilation: Dilation::default(),
        activation,
    })
}

pub fn depthwise(padding: Padding, stride: Stride, multiplier: u32, activation: Activation) -> OpParams {
    OpParams::DepthwiseConv2D(DepthwiseConv2DParams {
        padding,
        stride,
        dilation: Dilation::default(),
        multiplier,
        activation,
    })
}

pub fn avg_pool(kernel: (u32, u32), padding: Padding, stride: Stride) -> OpParams {
    OpParams::AvgPool2D(AvgPool2DParams {
        kernel_height: kernel.0,
        kernel_width: kernel.1,
        padding,
        stride,
        activation: Activation::None,
    })
}

pub fn add(activation: Activation) -> OpParams {
    OpParams::Add(AddParams { activation })
}

pub fn relu() -> TestGraph {
    let mut b = GraphBuilder::new(1);
    let x = b.input(&[1, 4, 4, 3], 2.0);
    let y = b.op(OpParams::Relu, &[x], &[1, 4, 4, 3]);
    b.finish("relu", &[y])
}

pub fn relu6() -> TestGraph {
    let mut b = GraphBuilder::new(2);
    let x = b.input(&[1, 5, 3, 2], 9.0);
    let y = b.op(OpParams::Relu6, &[x], &[1, 5, 3, 2]);
    b.finish("relu6", &[y])
}

pub fn add_two_inputs() -> TestGraph {
    let mut b = GraphBuilder::new(3);
    let lhs = b.input(&[1, 2, 5, 3], 2.0);
    let rhs = b.input(&[1, 2, 5, 3], 2.0);
    let y = b.op(add(Activation::None), &[lhs, rhs], &[1, 2, 5, 3]);
    b.finish("add_two_inputs", &[y])
}

/// Constant on the left so operand order differs from tensor creation order.
pub fn add_constant_broadcast() -> TestGraph {
    let mut b = GraphBuilder::new(4);
    let bias = b.constant(&[4], 1.0);
    let x = b.input(&[1, 3, 3, 4], 2.0);
    let y = b.op(add(Activation::Relu), &[bias, x], &[1, 3, 3, 4]);
    b.finish("add_constant_broadcast", &[y])
}

/// Unequal strides catch swapped axes.
pub fn conv2d_same_strided() -> TestGraph {
    let mut b = GraphBuilder::new(5);
    let x = b.input(&[1, 9, 10, 3], 2.0);
    let filter = b.constant(&[5, 3, 3, 3], 0.5);
    let bias = b.constant(&[5], 0.5);
    let y = b.op(
        conv(Padding::Same, Stride::new(2, 1), Activation::Relu6),
        &[x, filter, bias],
        &[1, 5, 10, 5],
    );
    b.finish("conv2d_same_strided", &[y])
}

pub fn conv2d_valid_dilated() -> TestGraph {
    let mut b = GraphBuilder::new(6);
    let x = b.input(&[1, 8, 8, 2], 2.0);
    let filter = b.constant(&[4, 3, 3, 2], 0.5);
    let bias = b.constant(&[4], 0.5);
    let params = OpParams::Conv2D(Conv2DParams {
        padding: Padding::Valid,
        stride: Stride::unit(),
        dilation: Dilation {
            height_factor: 2,
            width_factor: 2,
        },
        activation: Activation::None,
    });
    let y = b.op(params, &[x, filter, bias], &[1, 4, 4, 4]);
    b.finish("conv2d_valid_dilated", &[y])
}

pub fn depthwise_conv2d() -> TestGraph {
    let mut b = GraphBuilder::new(7);
    let x = b.input(&[1, 7, 6, 3], 2.0);
    let filter = b.constant(&[1, 3, 3, 6], 0.5);
    let bias = b.constant(&[6], 0.5);
    let y = b.op(
        depthwise(Padding::Same, Stride::new(1, 2), 2, Activation::None),
        &[x, filter, bias],
        &[1, 7, 3, 6],
    );
    b.finish("depthwise_conv2d", &[y])
}

pub fn avg_pool2d() -> TestGraph {
    let mut b = GraphBuilder::new(8);
    let x = b.input(&[1, 6, 7, 2], 2.0);
    let y = b.op(
        avg_pool((3, 2), Padding::Same, Stride::new(2, 2)),
        &[x],
        &[1, 3, 4, 2],
    );
    b.finish("avg_pool2d", &[y])
}

pub fn squeeze() -> TestGraph {
    let mut b = GraphBuilder::new(9);
    let x = b.input(&[1, 4, 1, 3], 2.0);
    let y = b.op(
        OpParams::Squeeze(SqueezeParams { dims: vec![0, 2] }),
        &[x],
        &[4, 3],
    );
    b.finish("squeeze", &[y])
}

pub fn softmax() -> TestGraph {
    let mut b = GraphBuilder::new(10);
    let x = b.input(&[3, 7], 4.0);
    let y = b.op(OpParams::Softmax(SoftmaxParams { beta: 0.7 }), &[x], &[3, 7]);
    b.finish("softmax", &[y])
}

/// Every single-operator graph.
pub fn single_op_graphs() -> Vec<TestGraph> {
    vec![
        relu(),
        relu6(),
        add_two_inputs(),
        add_constant_broadcast(),
        conv2d_same_strided(),
        conv2d_valid_dilated(),
        depthwise_conv2d(),
        avg_pool2d(),
        squeeze(),
        softmax(),
    ]
}

/// Two diamonds in a row: a value fans out to two branches that an `Add` joins again.
pub fn two_rhombs() -> TestGraph {
    let mut b = GraphBuilder::new(11);
    let x = b.input(&[1, 8, 8, 4], 2.0);
    let a = b.op(OpParams::Relu, &[x], &[1, 8, 8, 4]);

    let w1 = b.constant(&[4, 1, 1, 4], 0.5);
    let b1 = b.constant(&[4], 0.5);
    let left = b.op(conv(Padding::Same, Stride::unit(), Activation::None), &[a, w1, b1], &[1, 8, 8, 4]);
    let dw = b.constant(&[1, 3, 3, 4], 0.5);
    let dwb = b.constant(&[4], 0.5);
    let right = b.op(
        depthwise(Padding::Same, Stride::unit(), 1, Activation::None),
        &[a, dw, dwb],
        &[1, 8, 8, 4],
    );
    let joined = b.op(add(Activation::None), &[left, right], &[1, 8, 8, 4]);
    let top = b.op(OpParams::Relu6, &[joined], &[1, 8, 8, 4]);

    let w2 = b.constant(&[4, 3, 3, 4], 0.3);
    let b2 = b.constant(&[4], 0.3);
    let left = b.op(conv(Padding::Same, Stride::unit(), Activation::Relu), &[top, w2, b2], &[1, 8, 8, 4]);
    let right = b.op(avg_pool((3, 3), Padding::Same, Stride::unit()), &[top], &[1, 8, 8, 4]);
    let y = b.op(add(Activation::Relu6), &[left, right], &[1, 8, 8, 4]);
    b.finish("two_rhombs", &[y])
}

/// Pointwise → depthwise → pointwise block followed by a classifier head.
pub fn conv_dw_conv() -> TestGraph {
    let mut b = GraphBuilder::new(12);
    let x = b.input(&[1, 12, 12, 8], 2.0);
    let w1 = b.constant(&[16, 1, 1, 8], 0.4);
    let b1 = b.constant(&[16], 0.2);
    let expanded = b.op(conv(Padding::Same, Stride::unit(), Activation::Relu6), &[x, w1, b1], &[1, 12, 12, 16]);
    let dw = b.constant(&[1, 3, 3, 16], 0.4);
    let dwb = b.constant(&[16], 0.2);
    let filtered = b.op(
        depthwise(Padding::Same, Stride::new(2, 2), 1, Activation::Relu6),
        &[expanded, dw, dwb],
        &[1, 6, 6, 16],
    );
    let w2 = b.constant(&[8, 1, 1, 16], 0.4);
    let b2 = b.constant(&[8], 0.2);
    let projected = b.op(conv(Padding::Same, Stride::unit(), Activation::None), &[filtered, w2, b2], &[1, 6, 6, 8]);
    let pooled = b.op(avg_pool((6, 6), Padding::Valid, Stride::unit()), &[projected], &[1, 1, 1, 8]);
    let flat = b.op(OpParams::Squeeze(SqueezeParams { dims: vec![1, 2] }), &[pooled], &[1, 8]);
    let y = b.op(OpParams::Softmax(SoftmaxParams { beta: 1.0 }), &[flat], &[1, 8]);
    b.finish("conv_dw_conv", &[y])
}

/// Pointwise convolution at a realistic feature-map size.
pub fn conv2d_56x56x128() -> TestGraph {
    let mut b = GraphBuilder::new(13);
    let x = b.input(&[1, 56, 56, 128], 1.0);
    let filter = b.constant(&[128, 1, 1, 128], 0.1);
    let bias = b.constant(&[128], 0.1);
    let y = b.op(
        conv(Padding::Same, Stride::unit(), Activation::Relu6),
        &[x, filter, bias],
        &[1, 56, 56, 128],
    );
    b.finish("conv2d_56x56x128", &[y])
}
