use super::{compute_window, nhwc, PoolParams, TensorView};
use crate::error::EngineResult;

const AVERAGE_POOL: &str = "AVERAGE_POOL_2D";

pub(super) fn output_dims(params: &PoolParams, input: &[usize]) -> EngineResult<Vec<usize>> {
    let [n, h, w, c] = nhwc(AVERAGE_POOL, input)?;
    let rows = compute_window(
        AVERAGE_POOL,
        params.padding,
        h,
        params.filter_height,
        params.stride_h,
        1,
    )?;
    let cols = compute_window(
        AVERAGE_POOL,
        params.padding,
        w,
        params.filter_width,
        params.stride_w,
        1,
    )?;
    Ok(vec![n, rows.out, cols.out, c])
}

/// Averages over the in-bounds part of each window; padded cells are not counted.
pub(super) fn average_pool(
    params: &PoolParams,
    input: TensorView<'_>,
    output_dims: &[usize],
) -> EngineResult<Vec<f32>> {
    let [n, h, w, c] = nhwc(AVERAGE_POOL, input.dims)?;
    let [_, oh, ow, _] = nhwc(AVERAGE_POOL, output_dims)?;
    let pad_top = compute_window(
        AVERAGE_POOL,
        params.padding,
        h,
        params.filter_height,
        params.stride_h,
        1,
    )?
    .pad_before;
    let pad_left = compute_window(
        AVERAGE_POOL,
        params.padding,
        w,
        params.filter_width,
        params.stride_w,
        1,
    )?
    .pad_before;

    let mut out = vec![0.0f32; n * oh * ow * c];
    for b in 0..n {
        for oy in 0..oh {
            for ox in 0..ow {
                let out_base = ((b * oh + oy) * ow + ox) * c;
                for ch in 0..c {
                    let mut total = 0.0f32;
                    let mut count = 0usize;
                    for ky in 0..params.filter_height {
                        let Some(iy) = (oy * params.stride_h + ky)
                            .checked_sub(pad_top)
                            .filter(|&iy| iy < h)
                        else {
                            continue;
                        };
                        for kx in 0..params.filter_width {
                            let Some(ix) = (ox * params.stride_w + kx)
                                .checked_sub(pad_left)
                                .filter(|&ix| ix < w)
                            else {
                                continue;
                            };
                            total += input.data[((b * h + iy) * w + ix) * c + ch];
                            count += 1;
                        }
                    }
                    let average = if count == 0 { 0.0 } else { total / count as f32 };
                    out[out_base + ch] = params.activation.apply(average);
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

    #[test]
    fn same_padding_excludes_padded_cells() {
        let params = PoolParams {
            padding: Padding::Same,
            stride_w: 1,
            stride_h: 1,
            filter_width: 2,
            filter_height: 2,
            activation: FusedActivation::None,
        };
        let dims = output_dims(&params, &[1, 2, 2, 1]).unwrap();
        assert_eq!(dims, vec![1, 2, 2, 1]);
        let out = average_pool(
            &params,
            TensorView { dims: &[1, 2, 2, 1], data: &[1.0, 2.0, 3.0, 4.0] },
            &dims,
        )
        .unwrap();
        assert_eq!(out, vec![2.5, 3.0, 3.5, 4.0]);
    }
}
