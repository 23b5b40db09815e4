//! Hand-checked results and runtime behavior every backend must show.

use crate::harness::{assert_close, compile_graph, run_graph};
use crate::models::{self, GraphBuilder};
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::selection::BackendSelection;
use nnrt::ir::{Activation, OpParams, Padding, Stride};

pub fn add_matches_expected(registry: &BackendRegistry, backend_id: &str) {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 2, 2, 1], vec![-3.0, -1.0, 0.5, 2.0]);
    let one = b.constant_values(&[1], &[1.0]);
    let y = b.op(models::add(Activation::Relu), &[x, one], &[1, 2, 2, 1]);
    let test = b.finish("add_expected", &[y]);

    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    assert_eq!(outputs[0], vec![0.0, 0.0, 1.5, 3.0]);
}

pub fn relu6_clamps_extremes(registry: &BackendRegistry, backend_id: &str) {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 1, 1, 5], vec![-1.0, 0.0, 3.0, 6.0, 7.5]);
    let y = b.op(OpParams::Relu6, &[x], &[1, 1, 1, 5]);
    let test = b.finish("relu6_expected", &[y]);

    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    assert_eq!(outputs[0], vec![0.0, 0.0, 3.0, 6.0, 6.0]);
}

pub fn conv2d_matches_expected(registry: &BackendRegistry, backend_id: &str) {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 2, 2, 1], vec![1.0, 2.0, 3.0, 4.0]);
    let filter = b.constant_values(&[1, 2, 2, 1], &[1.0, 1.0, 1.0, 1.0]);
    let bias = b.constant_values(&[1], &[0.5]);
    let y = b.op(
        models::conv(Padding::Valid, Stride::unit(), Activation::None),
        &[x, filter, bias],
        &[1, 1, 1, 1],
    );
    let test = b.finish("conv2d_expected", &[y]);

    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    assert_eq!(outputs[0], vec![10.5]);
}

/// 3x3 ones over a 5x5 ramp with stride 2. SAME pads one cell on each side, so the
/// corner windows see 2x2 cells and the edge windows 2x3.
pub fn conv2d_same_stride2_matches_expected(registry: &BackendRegistry, backend_id: &str) {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 5, 5, 1], (1..=25).map(|v| v as f32).collect());
    let filter = b.constant_values(&[1, 3, 3, 1], &[1.0; 9]);
    let bias = b.constant_values(&[1], &[0.5]);
    let y = b.op(
        models::conv(Padding::Same, Stride::new(2, 2), Activation::None),
        &[x, filter, bias],
        &[1, 3, 3, 1],
    );
    let test = b.finish("conv2d_same_stride2_expected", &[y]);

    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    assert_eq!(
        outputs[0],
        vec![16.5, 33.5, 28.5, 69.5, 117.5, 87.5, 76.5, 123.5, 88.5]
    );
}

/// Two input channels with a multiplier of 2: output channel `c * 2 + m` filters input
/// channel `c`.
pub fn depthwise_multiplier_matches_expected(registry: &BackendRegistry, backend_id: &str) {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 2, 2, 2], vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0]);
    let filter = b.constant_values(&[1, 2, 2, 4], &[
        1.0,  1.0, 0.5, 0.0,
        1.0,  0.0, 0.5, 1.0,
        1.0,  0.0, 0.5, 1.0,
        1.0, -1.0, 0.5, 0.0,
    ]);
    let bias = b.constant_values(&[4], &[0.0, 1.0, 0.0, -1.0]);
    let y = b.op(
        models::depthwise(Padding::Valid, Stride::unit(), 2, Activation::None),
        &[x, filter, bias],
        &[1, 1, 1, 4],
    );
    let test = b.finish("depthwise_multiplier_expected", &[y]);

    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    assert_eq!(outputs[0], vec![10.0, -2.0, 50.0, 49.0]);
}

/// 3x3 SAME average over a 3x3 ramp: padded cells do not count towards the divisor.
pub fn avg_pool_padding_matches_expected(registry: &BackendRegistry, backend_id: &str) {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 3, 3, 1], (1..=9).map(|v| v as f32).collect());
    let y = b.op(
        models::avg_pool((3, 3), Padding::Same, Stride::unit()),
        &[x],
        &[1, 3, 3, 1],
    );
    let test = b.finish("avg_pool_padding_expected", &[y]);

    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    assert_close(
        &outputs[0],
        &[3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0],
        "avg_pool_padding_expected",
    );
}

pub fn softmax_rows_sum_to_one(registry: &BackendRegistry, backend_id: &str) {
    let test = models::softmax();
    let outputs = run_graph(&test, registry, &BackendSelection::new(backend_id));
    for row in outputs[0].chunks(7) {
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "row sums to {sum}");
    }
}

/// Running a compiled graph again yields bit-identical outputs.
pub fn run_is_idempotent(registry: &BackendRegistry, backend_id: &str) {
    let test = models::conv_dw_conv();
    let mut compiled = compile_graph(&test, registry, &BackendSelection::new(backend_id)).unwrap();
    compiled.run().unwrap();
    let first = compiled.output(0).unwrap();
    compiled.run().unwrap();
    let second = compiled.output(0).unwrap();
    let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&first), bits(&second));
}

/// New inputs written after compilation are picked up by the next run.
pub fn inputs_can_change_between_runs(registry: &BackendRegistry, backend_id: &str) {
    let test = models::relu();
    let mut compiled = compile_graph(&test, registry, &BackendSelection::new(backend_id)).unwrap();
    compiled.run().unwrap();
    let negated: Vec<f32> = test.inputs[0].iter().map(|v| -v).collect();
    compiled.set_input(0, &negated).unwrap();
    compiled.run().unwrap();
    let expected: Vec<f32> = negated.iter().map(|v| v.max(0.0)).collect();
    assert_eq!(compiled.output(0).unwrap(), expected);
}

pub fn run_profiled_times_each_sequence(registry: &BackendRegistry, backend_id: &str) {
    let test = models::conv_dw_conv();
    let mut compiled = compile_graph(&test, registry, &BackendSelection::new(backend_id)).unwrap();
    let timings = compiled.run_profiled().unwrap();
    assert_eq!(timings.len(), compiled.op_sequences().count());
    assert_eq!(timings.iter().map(|t| t.operations).sum::<usize>(), 6);
    assert!(timings.iter().all(|t| t.backend_id == backend_id));
}
