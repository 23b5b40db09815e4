use super::{compute_window, nhwc, ConvParams, DepthwiseParams, TensorView};
use crate::error::{EngineError, EngineResult};

const CONV: &str = "CONV_2D";
const DEPTHWISE: &str = "DEPTHWISE_CONV_2D";

/// Input `[n, h, w, c]`, filter `[oc, kh, kw, c]`, bias `[oc]`.
pub(super) fn conv2d_output_dims(
    params: &ConvParams,
    input: &[usize],
    filter: &[usize],
    bias: &[usize],
) -> EngineResult<Vec<usize>> {
    let [n, h, w, c] = nhwc(CONV, input)?;
    let [oc, kh, kw, fc] = nhwc(CONV, filter)?;
    if fc != c {
        return Err(EngineError::prepare(
            CONV,
            format!("filter depth {fc} does not match input depth {c}"),
        ));
    }
    if bias != [oc] {
        return Err(EngineError::prepare(
            CONV,
            format!("bias shape {bias:?} does not match {oc} output channels"),
        ));
    }
    let rows = compute_window(CONV, params.padding, h, kh, params.stride_h, params.dilation_h)?;
    let cols = compute_window(CONV, params.padding, w, kw, params.stride_w, params.dilation_w)?;
    Ok(vec![n, rows.out, cols.out, oc])
}

pub(super) fn conv2d(
    params: &ConvParams,
    input: TensorView<'_>,
    filter: TensorView<'_>,
    bias: TensorView<'_>,
    output_dims: &[usize],
) -> EngineResult<Vec<f32>> {
    let [n, h, w, c] = nhwc(CONV, input.dims)?;
    let [oc, kh, kw, _] = nhwc(CONV, filter.dims)?;
    let [_, oh, ow, _] = nhwc(CONV, output_dims)?;
    let pad_top = compute_window(CONV, params.padding, h, kh, params.stride_h, params.dilation_h)?
        .pad_before;
    let pad_left = compute_window(CONV, params.padding, w, kw, params.stride_w, params.dilation_w)?
        .pad_before;

    let mut out = vec![0.0f32; n * oh * ow * oc];
    for b in 0..n {
        for oy in 0..oh {
            for ox in 0..ow {
                let out_base = ((b * oh + oy) * ow + ox) * oc;
                for o in 0..oc {
                    let mut acc = 0.0f32;
                    for ky in 0..kh {
                        let Some(iy) = (oy * params.stride_h + ky * params.dilation_h)
                            .checked_sub(pad_top)
                            .filter(|&iy| iy < h)
                        else {
                            continue;
                        };
                        for kx in 0..kw {
                            let Some(ix) = (ox * params.stride_w + kx * params.dilation_w)
                                .checked_sub(pad_left)
                                .filter(|&ix| ix < w)
                            else {
                                continue;
                            };
                            let in_base = ((b * h + iy) * w + ix) * c;
                            let f_base = ((o * kh + ky) * kw + kx) * c;
                            let pixel = &input.data[in_base..in_base + c];
                            let weights = &filter.data[f_base..f_base + c];
                            for (x, wgt) in pixel.iter().zip(weights) {
                                acc += x * wgt;
                            }
                        }
                    }
                    out[out_base + o] = params.activation.apply(acc + bias.data[o]);
                }
            }
        }
    }
    Ok(out)
}

/// Input `[n, h, w, c]`, filter `[1, kh, kw, c * multiplier]`, bias `[c * multiplier]`.
pub(super) fn depthwise_output_dims(
    params: &DepthwiseParams,
    input: &[usize],
    filter: &[usize],
    bias: &[usize],
) -> EngineResult<Vec<usize>> {
    let [n, h, w, c] = nhwc(DEPTHWISE, input)?;
    let [one, kh, kw, oc] = nhwc(DEPTHWISE, filter)?;
    if one != 1 {
        return Err(EngineError::prepare(
            DEPTHWISE,
            format!("filter must have a leading extent of 1, got {one}"),
        ));
    }
    if params.depth_multiplier == 0 || oc != c * params.depth_multiplier {
        return Err(EngineError::prepare(
            DEPTHWISE,
            format!(
                "filter depth {oc} does not equal input depth {c} x multiplier {}",
                params.depth_multiplier
            ),
        ));
    }
    if bias != [oc] {
        return Err(EngineError::prepare(
            DEPTHWISE,
            format!("bias shape {bias:?} does not match {oc} output channels"),
        ));
    }
    let rows = compute_window(
        DEPTHWISE,
        params.padding,
        h,
        kh,
        params.stride_h,
        params.dilation_h,
    )?;
    let cols = compute_window(
        DEPTHWISE,
        params.padding,
        w,
        kw,
        params.stride_w,
        params.dilation_w,
    )?;
    Ok(vec![n, rows.out, cols.out, oc])
}

pub(super) fn depthwise_conv2d(
    params: &DepthwiseParams,
    input: TensorView<'_>,
    filter: TensorView<'_>,
    bias: TensorView<'_>,
    output_dims: &[usize],
) -> EngineResult<Vec<f32>> {
    let [n, h, w, c] = nhwc(DEPTHWISE, input.dims)?;
    let [_, kh, kw, oc] = nhwc(DEPTHWISE, filter.dims)?;
    let [_, oh, ow, _] = nhwc(DEPTHWISE, output_dims)?;
    let multiplier = params.depth_multiplier;
    let pad_top = compute_window(
        DEPTHWISE,
        params.padding,
        h,
        kh,
        params.stride_h,
        params.dilation_h,
    )?
    .pad_before;
    let pad_left = compute_window(
        DEPTHWISE,
        params.padding,
        w,
        kw,
        params.stride_w,
        params.dilation_w,
    )?
    .pad_before;

    let mut out = vec![0.0f32; n * oh * ow * oc];
    for b in 0..n {
        for oy in 0..oh {
            for ox in 0..ow {
                let out_base = ((b * oh + oy) * ow + ox) * oc;
                for ic in 0..c {
                    for m in 0..multiplier {
                        let o = ic * multiplier + m;
                        let mut acc = 0.0f32;
                        for ky in 0..kh {
                            let Some(iy) = (oy * params.stride_h + ky * params.dilation_h)
                                .checked_sub(pad_top)
                                .filter(|&iy| iy < h)
                            else {
                                continue;
                            };
                            for kx in 0..kw {
                                let Some(ix) = (ox * params.stride_w + kx * params.dilation_w)
                                    .checked_sub(pad_left)
                                    .filter(|&ix| ix < w)
                                else {
                                    continue;
                                };
                                acc += input.data[((b * h + iy) * w + ix) * c + ic]
                                    * filter.data[(ky * kw + kx) * oc + o];
                            }
                        }
                        out[out_base + o] = params.activation.apply(acc + bias.data[o]);
                    }
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::FusedActivation;
    use crate::schema::Padding;

    fn conv_params(padding: Padding, stride: usize) -> ConvParams {
        ConvParams {
            padding,
            stride_w: stride,
            stride_h: stride,
            dilation_w: 1,
            dilation_h: 1,
            activation: FusedActivation::None,
        }
    }

    #[test]
    fn conv_same_padding_sums_the_neighbourhood() {
        // 3x3 ones over a 3x3 ramp with one channel: each output is the sum of its
        // in-bounds neighbours.
        let params = conv_params(Padding::Same, 1);
        let input: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let filter = vec![1.0f32; 9];
        let bias = [0.5f32];
        let dims = conv2d_output_dims(&params, &[1, 3, 3, 1], &[1, 3, 3, 1], &[1]).unwrap();
        assert_eq!(dims, vec![1, 3, 3, 1]);
        let out = conv2d(
            &params,
            TensorView { dims: &[1, 3, 3, 1], data: &input },
            TensorView { dims: &[1, 3, 3, 1], data: &filter },
            TensorView { dims: &[1], data: &bias },
            &dims,
        )
        .unwrap();
        assert_eq!(out[0], 1.0 + 2.0 + 4.0 + 5.0 + 0.5);
        assert_eq!(out[4], 45.0 + 0.5);
        assert_eq!(out[8], 5.0 + 6.0 + 8.0 + 9.0 + 0.5);
    }

    #[test]
    fn conv_rejects_mismatched_depth() {
        let params = conv_params(Padding::Valid, 1);
        assert!(conv2d_output_dims(&params, &[1, 4, 4, 3], &[8, 1, 1, 2], &[8]).is_err());
        assert!(conv2d_output_dims(&params, &[1, 4, 4, 3], &[8, 1, 1, 3], &[4]).is_err());
    }

    #[test]
    fn depthwise_applies_multiplier_per_channel() {
        let params = DepthwiseParams {
            padding: Padding::Valid,
            stride_w: 1,
            stride_h: 1,
            dilation_w: 1,
            dilation_h: 1,
            depth_multiplier: 2,
            activation: FusedActivation::Relu6,
        };
        let dims = depthwise_output_dims(&params, &[1, 1, 1, 2], &[1, 1, 1, 4], &[4]).unwrap();
        assert_eq!(dims, vec![1, 1, 1, 4]);
        let out = depthwise_conv2d(
            &params,
            TensorView { dims: &[1, 1, 1, 2], data: &[1.0, 2.0] },
            TensorView { dims: &[1, 1, 1, 4], data: &[1.0, -1.0, 2.0, 4.0] },
            TensorView { dims: &[4], data: &[0.0; 4] },
            &dims,
        )
        .unwrap();
        assert_eq!(out, vec![1.0, 0.0, 4.0, 6.0]);
    }
}
