use super::{FusedActivation, TensorView};

pub(super) fn unary(input: TensorView<'_>, activation: FusedActivation) -> Vec<f32> {
    input.data.iter().map(|&x| activation.apply(x)).collect()
}

/// Numpy-style broadcast of two shapes, right-aligned.
pub(super) fn broadcast_dims(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let mut dims = vec![0; rank];
    for (axis, dim) in dims.iter_mut().enumerate() {
        let l = extent_at(lhs, rank, axis);
        let r = extent_at(rhs, rank, axis);
        *dim = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => return None,
        };
    }
    Some(dims)
}

fn extent_at(dims: &[usize], rank: usize, axis: usize) -> usize {
    let offset = rank - dims.len();
    if axis < offset {
        1
    } else {
        dims[axis - offset]
    }
}

/// Strides of `dims` laid out against `out_dims`, zero along broadcast axes.
fn broadcast_strides(dims: &[usize], out_dims: &[usize]) -> Vec<usize> {
    let rank = out_dims.len();
    let mut strides = vec![0; rank];
    let mut stride = 1;
    for axis in (0..rank).rev() {
        let extent = extent_at(dims, rank, axis);
        strides[axis] = if extent == 1 { 0 } else { stride };
        stride *= extent;
    }
    strides
}

pub(super) fn add(
    lhs: TensorView<'_>,
    rhs: TensorView<'_>,
    output_dims: &[usize],
    activation: FusedActivation,
) -> Vec<f32> {
    if lhs.dims == rhs.dims {
        return lhs
            .data
            .iter()
            .zip(rhs.data)
            .map(|(a, b)| activation.apply(a + b))
            .collect();
    }

    let lhs_strides = broadcast_strides(lhs.dims, output_dims);
    let rhs_strides = broadcast_strides(rhs.dims, output_dims);
    let total: usize = output_dims.iter().product();
    let mut coords = vec![0usize; output_dims.len()];
    let mut out = Vec::with_capacity(total);
    for _ in 0..total {
        let (mut li, mut ri) = (0, 0);
        for (axis, &coord) in coords.iter().enumerate() {
            li += coord * lhs_strides[axis];
            ri += coord * rhs_strides[axis];
        }
        out.push(activation.apply(lhs.data[li] + rhs.data[ri]));
        for axis in (0..coords.len()).rev() {
            coords[axis] += 1;
            if coords[axis] < output_dims[axis] {
                break;
            }
            coords[axis] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_follows_numpy_rules() {
        assert_eq!(broadcast_dims(&[1, 2, 2, 3], &[3]), Some(vec![1, 2, 2, 3]));
        assert_eq!(broadcast_dims(&[4, 1], &[1, 5]), Some(vec![4, 5]));
        assert_eq!(broadcast_dims(&[2, 3], &[4]), None);
    }

    #[test]
    fn add_broadcasts_a_channel_vector() {
        let out = add(
            TensorView { dims: &[2, 2], data: &[1.0, 2.0, 3.0, 4.0] },
            TensorView { dims: &[2], data: &[10.0, -10.0] },
            &[2, 2],
            FusedActivation::Relu,
        );
        assert_eq!(out, vec![11.0, 0.0, 13.0, 0.0]);
    }
}
