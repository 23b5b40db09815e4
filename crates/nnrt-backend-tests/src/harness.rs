use crate::models::TestGraph;
use nnrt::backend::registry::BackendRegistry;
use nnrt::backend::selection::BackendSelection;
use nnrt::{compile, BackendResult, CompiledGraph};

/// Allowed absolute deviation of every element from the expected value.
pub const TOLERANCE: f32 = 1e-5;

/// Registry holding only the CPU reference backend.
pub fn reference_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    nnrt_backend_ref_cpu::register(&mut registry);
    registry
}

pub fn compile_graph(
    test: &TestGraph,
    registry: &BackendRegistry,
    selection: &BackendSelection,
) -> BackendResult<CompiledGraph> {
    let compiled = compile(test.graph.clone(), registry, selection)?;
    for (position, values) in test.inputs.iter().enumerate() {
        compiled.set_input(position, values)?;
    }
    Ok(compiled)
}

/// Compiles and runs `test` once, returning every graph output.
pub fn run_graph(
    test: &TestGraph,
    registry: &BackendRegistry,
    selection: &BackendSelection,
) -> Vec<Vec<f32>> {
    let mut compiled = compile_graph(test, registry, selection)
        .unwrap_or_else(|err| panic!("{}: compile failed: {err}", test.name));
    compiled
        .run()
        .unwrap_or_else(|err| panic!("{}: run failed: {err}", test.name));
    (0..compiled.output_count())
        .map(|position| compiled.output(position).unwrap())
        .collect()
}

pub fn reference_outputs(test: &TestGraph) -> Vec<Vec<f32>> {
    run_graph(
        test,
        &reference_registry(),
        &BackendSelection::new(nnrt_backend_ref_cpu::BACKEND_ID),
    )
}

pub fn assert_close(actual: &[f32], expected: &[f32], context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length {} vs expected {}",
        actual.len(),
        expected.len()
    );
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= TOLERANCE,
            "{context}: element {index} is {a}, expected {e}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_close_accepts_small_absolute_error() {
        assert_close(&[0.0, 10.0, -250.0], &[0.000_005, 10.000_005, -250.0], "close");
    }

    #[test]
    #[should_panic(expected = "element 1")]
    fn assert_close_is_absolute_for_large_values() {
        assert_close(&[1.0, 10.000_02], &[1.0, 10.0], "large");
    }

    #[test]
    #[should_panic(expected = "length")]
    fn assert_close_rejects_length_mismatch() {
        assert_close(&[1.0], &[1.0, 2.0], "short");
    }
}
