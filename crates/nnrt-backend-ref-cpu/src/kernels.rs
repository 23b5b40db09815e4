//! Reference f32 kernels on NHWC data.
//!
//! Convolutions accumulate over filter rows, filter columns, then channels and add the
//! bias last.

use nnrt::backend::spec::{BackendError, BackendResult};
use nnrt::ir::{
    Activation, AvgPool2DParams, Conv2DParams, DepthwiseConv2DParams, Dilation, OpKind,
    OpParams, Padding, Stride,
};

#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    pub dims: &'a [usize],
    pub data: &'a [f32],
}

pub fn apply_activation(activation: Activation, x: f32) -> f32 {
    match activation {
        Activation::None => x,
        Activation::Relu => x.max(0.0),
        Activation::Relu1 => x.max(-1.0).min(1.0),
        Activation::Relu6 => x.max(0.0).min(6.0),
        Activation::Tanh => x.tanh(),
        Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
    }
}

/// Placement of the sliding window along one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub out: usize,
    /// Input coordinate under the first tap of the first window, negative inside padding.
    pub origin: isize,
    pub stride: usize,
    pub dilation: usize,
}

impl Window {
    /// Input coordinate read by tap `k` of output position `o`, `None` when it lands in
    /// padding.
    pub fn tap(&self, o: usize, k: usize, extent: usize) -> Option<usize> {
        let coord = self.origin + (o * self.stride + k * self.dilation) as isize;
        usize::try_from(coord).ok().filter(|&coord| coord < extent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Cols,
}

pub fn axis_window(
    op: &'static str,
    padding: Padding,
    axis: Axis,
    input: usize,
    filter: usize,
    stride: usize,
    dilation: usize,
) -> BackendResult<Window> {
    if stride == 0 || dilation == 0 || filter == 0 {
        return Err(BackendError::unsupported(
            op,
            format!("stride {stride}, dilation {dilation} and filter {filter} must be positive"),
        ));
    }
    let span = (filter - 1) * dilation + 1;
    let (out, leading) = match padding {
        // the odd padding cell goes after the input
        Padding::Same => {
            let out = input.div_ceil(stride);
            let total = (out.saturating_sub(1) * stride + span).saturating_sub(input);
            (out, total / 2)
        }
        Padding::Valid => (fitting(op, input, span, stride)?, 0),
        Padding::Explicit {
            top,
            bottom,
            left,
            right,
        } => {
            let (leading, trailing) = match axis {
                Axis::Rows => (top as usize, bottom as usize),
                Axis::Cols => (left as usize, right as usize),
            };
            (fitting(op, input + leading + trailing, span, stride)?, leading)
        }
    };
    Ok(Window {
        out,
        origin: -(leading as isize),
        stride,
        dilation,
    })
}

/// Number of whole windows of `span` cells that fit into `extent`.
fn fitting(op: &'static str, extent: usize, span: usize, stride: usize) -> BackendResult<usize> {
    if extent < span {
        return Err(BackendError::execution(format!(
            "{op}: window {span} exceeds padded extent {extent}"
        )));
    }
    Ok((extent - span) / stride + 1)
}

fn nhwc(op: &'static str, dims: &[usize]) -> BackendResult<[usize; 4]> {
    <[usize; 4]>::try_from(dims)
        .map_err(|_| BackendError::execution(format!("{op}: expected a rank-4 tensor, got {dims:?}")))
}

fn expect_inputs<'v, 'a>(
    op: &'static str,
    inputs: &'v [TensorView<'a>],
    count: usize,
) -> BackendResult<&'v [TensorView<'a>]> {
    if inputs.len() != count {
        return Err(BackendError::execution(format!(
            "{op} expects {count} inputs, got {}",
            inputs.len()
        )));
    }
    Ok(inputs)
}

fn spatial(
    op: &'static str,
    padding: Padding,
    (h, w): (usize, usize),
    (kh, kw): (usize, usize),
    stride: Stride,
    dilation: Dilation,
) -> BackendResult<(Window, Window)> {
    let rows = axis_window(
        op,
        padding,
        Axis::Rows,
        h,
        kh,
        stride.vertical as usize,
        dilation.height_factor as usize,
    )?;
    let cols = axis_window(
        op,
        padding,
        Axis::Cols,
        w,
        kw,
        stride.horizontal as usize,
        dilation.width_factor as usize,
    )?;
    Ok((rows, cols))
}

/// Output shape of `params` applied to inputs of the given shapes.
pub fn output_dims(params: &OpParams, inputs: &[&[usize]]) -> BackendResult<Vec<usize>> {
    let op = params.kind().name();
    let arity = match params {
        OpParams::Add(_) => 2,
        OpParams::Conv2D(_) | OpParams::DepthwiseConv2D(_) => 3,
        _ => 1,
    };
    if inputs.len() != arity {
        return Err(BackendError::execution(format!(
            "{op} expects {arity} inputs, got {}",
            inputs.len()
        )));
    }
    match params {
        OpParams::Relu | OpParams::Relu6 | OpParams::Softmax(_) => Ok(inputs[0].to_vec()),
        OpParams::Add(_) => broadcast_dims(inputs[0], inputs[1]).ok_or_else(|| {
            BackendError::execution(format!(
                "{op}: shapes {:?} and {:?} do not broadcast",
                inputs[0], inputs[1]
            ))
        }),
        OpParams::Conv2D(conv) => {
            let [n, h, w, c] = nhwc(op, inputs[0])?;
            let [oc, kh, kw, fc] = nhwc(op, inputs[1])?;
            if fc != c || inputs[2] != [oc] {
                return Err(BackendError::execution(format!(
                    "{op}: filter {:?} and bias {:?} do not fit input depth {c}",
                    inputs[1], inputs[2]
                )));
            }
            let (rows, cols) = spatial(op, conv.padding, (h, w), (kh, kw), conv.stride, conv.dilation)?;
            Ok(vec![n, rows.out, cols.out, oc])
        }
        OpParams::DepthwiseConv2D(conv) => {
            let [n, h, w, c] = nhwc(op, inputs[0])?;
            let [one, kh, kw, oc] = nhwc(op, inputs[1])?;
            let multiplier = conv.multiplier as usize;
            if one != 1 || multiplier == 0 || oc != c * multiplier || inputs[2] != [oc] {
                return Err(BackendError::execution(format!(
                    "{op}: filter {:?} and bias {:?} do not fit input depth {c} x {multiplier}",
                    inputs[1], inputs[2]
                )));
            }
            let (rows, cols) = spatial(op, conv.padding, (h, w), (kh, kw), conv.stride, conv.dilation)?;
            Ok(vec![n, rows.out, cols.out, oc])
        }
        OpParams::AvgPool2D(pool) => {
            let [n, h, w, c] = nhwc(op, inputs[0])?;
            let (rows, cols) = spatial(
                op,
                pool.padding,
                (h, w),
                (pool.kernel_height as usize, pool.kernel_width as usize),
                pool.stride,
                Dilation::default(),
            )?;
            Ok(vec![n, rows.out, cols.out, c])
        }
        OpParams::Squeeze(squeeze) => squeezed_dims(op, inputs[0], &squeeze.dims),
    }
}

/// Evaluates one operation. `out_dims` must be what [`output_dims`] computes.
pub fn execute_operation(
    params: &OpParams,
    inputs: &[TensorView<'_>],
    out_dims: &[usize],
) -> BackendResult<Vec<f32>> {
    let op = params.kind().name();
    match params {
        OpParams::Relu => op_unary(expect_inputs(op, inputs, 1)?[0], Activation::Relu),
        OpParams::Relu6 => op_unary(expect_inputs(op, inputs, 1)?[0], Activation::Relu6),
        OpParams::Add(add) => {
            let inputs = expect_inputs(op, inputs, 2)?;
            Ok(op_add(inputs[0], inputs[1], out_dims, add.activation))
        }
        OpParams::Conv2D(conv) => {
            let inputs = expect_inputs(op, inputs, 3)?;
            op_conv2d(conv, inputs[0], inputs[1], inputs[2], out_dims)
        }
        OpParams::DepthwiseConv2D(conv) => {
            let inputs = expect_inputs(op, inputs, 3)?;
            op_depthwise_conv2d(conv, inputs[0], inputs[1], inputs[2], out_dims)
        }
        OpParams::AvgPool2D(pool) => op_avg_pool2d(pool, expect_inputs(op, inputs, 1)?[0], out_dims),
        OpParams::Squeeze(_) => Ok(expect_inputs(op, inputs, 1)?[0].data.to_vec()),
        OpParams::Softmax(softmax) => Ok(op_softmax(expect_inputs(op, inputs, 1)?[0], softmax.beta)),
    }
}

fn op_unary(input: TensorView<'_>, activation: Activation) -> BackendResult<Vec<f32>> {
    Ok(input
        .data
        .iter()
        .map(|&x| apply_activation(activation, x))
        .collect())
}

/// Numpy-style broadcast of two shapes, right-aligned.
pub fn broadcast_dims(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    (0..rank)
        .map(|axis| {
            let l = extent_at(lhs, rank, axis);
            let r = extent_at(rhs, rank, axis);
            match (l, r) {
                (l, r) if l == r => Some(l),
                (1, r) => Some(r),
                (l, 1) => Some(l),
                _ => None,
            }
        })
        .collect()
}

fn extent_at(dims: &[usize], rank: usize, axis: usize) -> usize {
    let offset = rank - dims.len();
    if axis < offset {
        1
    } else {
        dims[axis - offset]
    }
}

fn op_add(
    lhs: TensorView<'_>,
    rhs: TensorView<'_>,
    out_dims: &[usize],
    activation: Activation,
) -> Vec<f32> {
    let rank = out_dims.len();
    let total: usize = out_dims.iter().product();
    let mut out = Vec::with_capacity(total);
    for flat in 0..total {
        let mut rest = flat;
        let (mut li, mut ri) = (0usize, 0usize);
        let (mut l_stride, mut r_stride) = (1usize, 1usize);
        for axis in (0..rank).rev() {
            let coord = rest % out_dims[axis];
            rest /= out_dims[axis];
            let l_extent = extent_at(lhs.dims, rank, axis);
            let r_extent = extent_at(rhs.dims, rank, axis);
            if l_extent != 1 {
                li += coord * l_stride;
            }
            if r_extent != 1 {
                ri += coord * r_stride;
            }
            l_stride *= l_extent;
            r_stride *= r_extent;
        }
        out.push(apply_activation(activation, lhs.data[li] + rhs.data[ri]));
    }
    out
}

fn op_conv2d(
    params: &Conv2DParams,
    input: TensorView<'_>,
    filter: TensorView<'_>,
    bias: TensorView<'_>,
    out_dims: &[usize],
) -> BackendResult<Vec<f32>> {
    let op = OpKind::Conv2D.name();
    let [n, h, w, c] = nhwc(op, input.dims)?;
    let [oc, kh, kw, _] = nhwc(op, filter.dims)?;
    let [_, oh, ow, _] = nhwc(op, out_dims)?;
    let (rows, cols) = spatial(op, params.padding, (h, w), (kh, kw), params.stride, params.dilation)?;

    let mut out = vec![0.0f32; n * oh * ow * oc];
    for b in 0..n {
        for oy in 0..oh {
            for ox in 0..ow {
                for o in 0..oc {
                    let mut acc = 0.0f32;
                    for ky in 0..kh {
                        let Some(iy) = rows.tap(oy, ky, h) else {
                            continue;
                        };
                        for kx in 0..kw {
                            let Some(ix) = cols.tap(ox, kx, w) else {
                                continue;
                            };
                            for ic in 0..c {
                                acc += input.data[((b * h + iy) * w + ix) * c + ic]
                                    * filter.data[((o * kh + ky) * kw + kx) * c + ic];
                            }
                        }
                    }
                    out[((b * oh + oy) * ow + ox) * oc + o] =
                        apply_activation(params.activation, acc + bias.data[o]);
                }
            }
        }
    }
    Ok(out)
}

fn op_depthwise_conv2d(
    params: &DepthwiseConv2DParams,
    input: TensorView<'_>,
    filter: TensorView<'_>,
    bias: TensorView<'_>,
    out_dims: &[usize],
) -> BackendResult<Vec<f32>> {
    let op = OpKind::DepthwiseConv2D.name();
    let [n, h, w, c] = nhwc(op, input.dims)?;
    let [_, kh, kw, oc] = nhwc(op, filter.dims)?;
    let [_, oh, ow, _] = nhwc(op, out_dims)?;
    let multiplier = params.multiplier as usize;
    let (rows, cols) = spatial(op, params.padding, (h, w), (kh, kw), params.stride, params.dilation)?;

    let mut out = vec![0.0f32; n * oh * ow * oc];
    for b in 0..n {
        for oy in 0..oh {
            for ox in 0..ow {
                for ic in 0..c {
                    for m in 0..multiplier {
                        let o = ic * multiplier + m;
                        let mut acc = 0.0f32;
                        for ky in 0..kh {
                            let Some(iy) = rows.tap(oy, ky, h) else {
                                continue;
                            };
                            for kx in 0..kw {
                                let Some(ix) = cols.tap(ox, kx, w) else {
                                    continue;
                                };
                                acc += input.data[((b * h + iy) * w + ix) * c + ic]
                                    * filter.data[(ky * kw + kx) * oc + o];
                            }
                        }
                        out[((b * oh + oy) * ow + ox) * oc + o] =
                            apply_activation(params.activation, acc + bias.data[o]);
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Padded cells are left out of the average.
fn op_avg_pool2d(
    params: &AvgPool2DParams,
    input: TensorView<'_>,
    out_dims: &[usize],
) -> BackendResult<Vec<f32>> {
    let op = OpKind::AvgPool2D.name();
    let [n, h, w, c] = nhwc(op, input.dims)?;
    let [_, oh, ow, _] = nhwc(op, out_dims)?;
    let (kh, kw) = (params.kernel_height as usize, params.kernel_width as usize);
    let (rows, cols) = spatial(op, params.padding, (h, w), (kh, kw), params.stride, Dilation::default())?;

    let mut out = vec![0.0f32; n * oh * ow * c];
    for b in 0..n {
        for oy in 0..oh {
            for ox in 0..ow {
                for ch in 0..c {
                    let mut total = 0.0f32;
                    let mut count = 0usize;
                    for ky in 0..kh {
                        let Some(iy) = rows.tap(oy, ky, h) else {
                            continue;
                        };
                        for kx in 0..kw {
                            let Some(ix) = cols.tap(ox, kx, w) else {
                                continue;
                            };
                            total += input.data[((b * h + iy) * w + ix) * c + ch];
                            count += 1;
                        }
                    }
                    let average = if count == 0 { 0.0 } else { total / count as f32 };
                    out[((b * oh + oy) * ow + ox) * c + ch] =
                        apply_activation(params.activation, average);
                }
            }
        }
    }
    Ok(out)
}

fn op_softmax(input: TensorView<'_>, beta: f32) -> Vec<f32> {
    let depth = input.dims.last().copied().unwrap_or(1).max(1);
    let mut out = Vec::with_capacity(input.data.len());
    for row in input.data.chunks(depth) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = row.iter().map(|&x| ((x - max) * beta).exp()).collect();
        let sum: f32 = exps.iter().sum();
        out.extend(exps.iter().map(|&e| e / sum));
    }
    out
}

fn squeezed_dims(op: &'static str, input: &[usize], axes: &[i32]) -> BackendResult<Vec<usize>> {
    let rank = input.len() as i64;
    let mut keep = vec![true; input.len()];
    if axes.is_empty() {
        for (flag, &dim) in keep.iter_mut().zip(input) {
            *flag = dim != 1;
        }
    }
    for &axis in axes {
        let normalized = if axis < 0 { i64::from(axis) + rank } else { i64::from(axis) };
        if !(0..rank).contains(&normalized) || input[normalized as usize] != 1 {
            return Err(BackendError::execution(format!(
                "{op}: axis {axis} cannot be squeezed from {input:?}"
            )));
        }
        keep[normalized as usize] = false;
    }
    Ok(input
        .iter()
        .zip(&keep)
        .filter_map(|(&dim, &kept)| kept.then_some(dim))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnrt::ir::{SoftmaxParams, SqueezeParams};

    fn view<'a>(dims: &'a [usize], data: &'a [f32]) -> TensorView<'a> {
        TensorView { dims, data }
    }

    #[test]
    fn same_padding_puts_the_odd_cell_last() {
        let window = axis_window("Conv2D", Padding::Same, Axis::Rows, 224, 3, 2, 1).unwrap();
        assert_eq!((window.out, window.origin), (112, 0));
        let window = axis_window("Conv2D", Padding::Same, Axis::Cols, 5, 3, 1, 1).unwrap();
        assert_eq!((window.out, window.origin), (5, -1));
        let window = axis_window("Conv2D", Padding::Same, Axis::Cols, 6, 4, 1, 1).unwrap();
        assert_eq!((window.out, window.origin), (6, -1));
    }

    #[test]
    fn taps_outside_the_input_are_skipped() {
        let window = axis_window("Conv2D", Padding::Same, Axis::Rows, 5, 3, 2, 1).unwrap();
        assert_eq!(window.out, 3);
        assert_eq!(window.tap(0, 0, 5), None);
        assert_eq!(window.tap(0, 1, 5), Some(0));
        assert_eq!(window.tap(2, 2, 5), None);
        assert_eq!(window.tap(2, 1, 5), Some(4));
    }

    #[test]
    fn explicit_padding_uses_the_axis_amounts() {
        let padding = Padding::Explicit {
            top: 2,
            bottom: 0,
            left: 1,
            right: 1,
        };
        let rows = axis_window("Conv2D", padding, Axis::Rows, 4, 3, 1, 1).unwrap();
        let cols = axis_window("Conv2D", padding, Axis::Cols, 4, 3, 1, 1).unwrap();
        assert_eq!((rows.out, rows.origin), (4, -2));
        assert_eq!((cols.out, cols.origin), (4, -1));
    }

    #[test]
    fn valid_window_larger_than_input_fails() {
        let err = axis_window("AvgPool2D", Padding::Valid, Axis::Rows, 2, 3, 1, 1).unwrap_err();
        assert!(matches!(err, BackendError::Execution { .. }));
        assert!(err.to_string().contains("AvgPool2D"), "{err}");
    }

    #[test]
    fn conv_sums_over_window_and_channels() {
        let params = Conv2DParams {
            padding: Padding::Valid,
            stride: Stride::unit(),
            dilation: Dilation::default(),
            activation: Activation::None,
        };
        let input: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        let filter = [1.0f32; 8];
        let bias = [0.5f32];
        let dims = output_dims(&OpParams::Conv2D(params), &[&[1, 2, 2, 2], &[1, 2, 2, 2], &[1]]).unwrap();
        assert_eq!(dims, vec![1, 1, 1, 1]);
        let out = op_conv2d(
            &params,
            view(&[1, 2, 2, 2], &input),
            view(&[1, 2, 2, 2], &filter),
            view(&[1], &bias),
            &dims,
        )
        .unwrap();
        assert_eq!(out, vec![36.5]);
    }

    #[test]
    fn depthwise_keeps_channels_apart() {
        let params = DepthwiseConv2DParams {
            padding: Padding::Valid,
            stride: Stride::unit(),
            dilation: Dilation::default(),
            multiplier: 2,
            activation: Activation::Relu,
        };
        let input = [1.0f32, -1.0];
        let filter = [1.0f32, 2.0, 3.0, 4.0];
        let bias = [0.0f32; 4];
        let out = op_depthwise_conv2d(
            &params,
            view(&[1, 1, 1, 2], &input),
            view(&[1, 1, 1, 4], &filter),
            view(&[4], &bias),
            &[1, 1, 1, 4],
        )
        .unwrap();
        assert_eq!(out, vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn avg_pool_ignores_padded_cells() {
        let params = AvgPool2DParams {
            kernel_height: 2,
            kernel_width: 2,
            padding: Padding::Same,
            stride: Stride::unit(),
            activation: Activation::None,
        };
        let input = [1.0f32, 2.0, 3.0, 4.0];
        let dims = output_dims(&OpParams::AvgPool2D(params), &[&[1, 2, 2, 1]]).unwrap();
        let out = op_avg_pool2d(&params, view(&[1, 2, 2, 1], &input), &dims).unwrap();
        assert_eq!(out, vec![2.5, 3.0, 3.5, 4.0]);
    }

    #[test]
    fn add_broadcasts_trailing_axis() {
        let lhs = [1.0f32, 2.0, 3.0, 4.0];
        let rhs = [10.0f32, 20.0];
        let dims = broadcast_dims(&[2, 2], &[2]).unwrap();
        let out = op_add(view(&[2, 2], &lhs), view(&[2], &rhs), &dims, Activation::None);
        assert_eq!(out, vec![11.0, 22.0, 13.0, 24.0]);
        assert_eq!(broadcast_dims(&[2, 3], &[2]), None);
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let data = [1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0];
        let out = execute_operation(
            &OpParams::Softmax(SoftmaxParams { beta: 1.0 }),
            &[view(&[2, 3], &data)],
            &[2, 3],
        )
        .unwrap();
        for row in out.chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        assert!((out[3] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn squeeze_drops_unit_axes() {
        let params = OpParams::Squeeze(SqueezeParams { dims: vec![] });
        assert_eq!(output_dims(&params, &[&[1, 3, 1, 2]]).unwrap(), vec![3, 2]);
        let params = OpParams::Squeeze(SqueezeParams { dims: vec![-2] });
        assert_eq!(output_dims(&params, &[&[1, 3, 1, 2]]).unwrap(), vec![1, 3, 2]);
        let params = OpParams::Squeeze(SqueezeParams { dims: vec![1] });
        assert!(output_dims(&params, &[&[1, 3, 1, 2]]).is_err());
    }

    #[test]
    fn fused_activations_clamp() {
        assert_eq!(apply_activation(Activation::Relu6, 7.5), 6.0);
        assert_eq!(apply_activation(Activation::Relu1, -3.0), -1.0);
        assert_eq!(apply_activation(Activation::Relu, -0.5), 0.0);
        assert!((apply_activation(Activation::Sigmoid, 0.0) - 0.5).abs() < 1e-7);
    }
}
