//! Backend outputs compared against the CPU reference.

use crate::harness::{assert_close, reference_outputs, run_graph};
use crate::models::{self, TestGraph};
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::selection::BackendSelection;
use nnrt::ir::OpKind;

pub fn matches_reference_with(registry: &BackendRegistry, selection: &BackendSelection, test: &TestGraph) {
    let expected = reference_outputs(test);
    let actual = run_graph(test, registry, selection);
    assert_eq!(actual.len(), expected.len(), "{}: output count", test.name);
    for (position, (a, e)) in actual.iter().zip(&expected).enumerate() {
        assert_close(a, e, &format!("{} output {position}", test.name));
    }
}

/// Runs `test` entirely on `backend_id`.
pub fn matches_reference(registry: &BackendRegistry, backend_id: &str, test: &TestGraph) {
    matches_reference_with(registry, &BackendSelection::new(backend_id), test);
}

/// Joins and the activation between the rhombs run on the reference backend, the rest on
/// `backend_id`, so tensors cross backend boundaries in both directions.
pub fn mixed_rhombs_match_reference(registry: &BackendRegistry, backend_id: &str) {
    let selection = BackendSelection::new(backend_id)
        .with_override(OpKind::Add, nnrt_backend_ref_cpu::BACKEND_ID)
        .with_override(OpKind::Relu6, nnrt_backend_ref_cpu::BACKEND_ID);
    matches_reference_with(registry, &selection, &models::two_rhombs());
}

/// Only the convolutions run on `backend_id`.
pub fn mixed_chain_matches_reference(registry: &BackendRegistry, backend_id: &str) {
    let selection = BackendSelection::new(nnrt_backend_ref_cpu::BACKEND_ID)
        .with_override(OpKind::Conv2D, backend_id);
    matches_reference_with(registry, &selection, &models::conv_dw_conv());
}
