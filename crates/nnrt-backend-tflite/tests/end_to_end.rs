use anyhow::Result;
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::selection::BackendSelection;
use nnrt::ir::{Activation, Padding, Stride};
use nnrt::{compile, BufferOwnership};
use nnrt_backend_tests::harness::{compile_graph, reference_registry};
use nnrt_backend_tests::models::{self, GraphBuilder};
use nnrt_backend_tests::parity;
use nnrt_backend_tflite::BACKEND_ID;

fn registry() -> BackendRegistry {
    nnrt_backend_tests::init_test_logging();
    let mut registry = reference_registry();
    nnrt_backend_tflite::register(&mut registry);
    registry
}

#[test]
fn conv2d_56x56x128_matches_reference() {
    parity::matches_reference(&registry(), BACKEND_ID, &models::conv2d_56x56x128());
}

#[test]
fn graph_io_lives_in_interpreter_buffers() -> Result<()> {
    let test = models::relu();
    let compiled = compile_graph(&test, &registry(), &BackendSelection::new(BACKEND_ID))?;
    assert_eq!(compiled.input(0)?.ownership(), Some(BufferOwnership::Embedded));
    assert_eq!(
        compiled.output_tensor(0)?.ownership(),
        Some(BufferOwnership::Embedded)
    );
    Ok(())
}

#[test]
fn textual_selection_drives_mixed_graph() -> Result<()> {
    let selection = BackendSelection::parse("tflite;cpu", "Add=cpu,ReLU6=cpu")?;
    let test = models::two_rhombs();
    parity::matches_reference_with(&registry(), &selection, &test);

    let compiled = compile_graph(&test, &registry(), &selection)?;
    let backends: Vec<&str> = compiled.op_sequences().map(|s| s.backend_id()).collect();
    assert_eq!(backends, vec!["tflite", "cpu", "tflite", "cpu"]);
    Ok(())
}

#[test]
fn cpu_producer_writes_into_interpreter_buffer() -> Result<()> {
    let selection = BackendSelection::new("cpu").with_override(nnrt::OpKind::Softmax, BACKEND_ID);
    let test = models::conv_dw_conv();
    let compiled = compile_graph(&test, &registry(), &selection)?;
    // the squeezed logits are produced on cpu and consumed by the tflite softmax
    let logits = compiled.graph().operations()[5].inputs()[0];
    let tensor = compiled.tensor(logits).expect("logits tensor");
    assert_eq!(tensor.ownership(), Some(BufferOwnership::Embedded));
    parity::matches_reference_with(&registry(), &selection, &test);
    Ok(())
}

#[test]
fn unsupported_activation_fails_compilation() {
    let mut b = GraphBuilder::new(0);
    let x = b.input(&[1, 4, 4, 2], 1.0);
    let filter = b.constant(&[2, 1, 1, 2], 1.0);
    let bias = b.constant(&[2], 1.0);
    let y = b.op(
        models::conv(Padding::Same, Stride::unit(), Activation::Tanh),
        &[x, filter, bias],
        &[1, 4, 4, 2],
    );
    let test = b.finish("tanh_conv", &[y]);

    let err = compile(test.graph.clone(), &registry(), &BackendSelection::new(BACKEND_ID))
        .unwrap_err();
    assert!(err.is_unsupported(), "{err}");
    assert!(compile(test.graph.clone(), &registry(), &BackendSelection::new("cpu")).is_ok());
}
