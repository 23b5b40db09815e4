use super::TensorView;

/// Softmax over the innermost axis with inverse temperature `beta`.
pub(super) fn softmax(input: TensorView<'_>, beta: f32) -> Vec<f32> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sum_to_one() {
        let data = [1.0, 2.0, 3.0, -1.0, 0.0, 1.0];
        let out = softmax(TensorView { dims: &[2, 3], data: &data }, 1.0);
        for row in out.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        assert!(out[2] > out[1] && out[1] > out[0]);
        // shifting a row by a constant leaves it unchanged
        for (a, b) in out[..3].iter().zip(&out[3..]) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
