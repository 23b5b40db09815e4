#![allow(dead_code)]

use nnrt::backend::spec::TensorBuilder;
use nnrt::backend::tensor::Tensor;
use nnrt::ir::{Layout, OperandIndex, OperationIndex};
use nnrt_backend_tests::models::TestGraph;
use nnrt_backend_tflite::traits::OperationTraits;
use nnrt_backend_tflite::{TfliteKernelGenerator, TfliteTensorBuilder};
use std::sync::Arc;

pub fn tensor_for(test: &TestGraph, index: OperandIndex) -> Arc<Tensor> {
    let operand = test.graph.operand(index).unwrap();
    Arc::new(
        Tensor::new(
            index,
            operand.info().clone(),
            Layout::Nhwc,
            operand.is_constant(),
        )
        .unwrap(),
    )
}

/// Tensor builder with every operand of `test` registered.
pub fn registered(test: &TestGraph) -> Arc<TfliteTensorBuilder> {
    let builder = Arc::new(TfliteTensorBuilder::new());
    for position in 0..test.graph.operands().len() {
        let tensor = tensor_for(test, OperandIndex(position as u32));
        builder.register_tensor_info(tensor).unwrap();
    }
    builder
}

pub fn traits_of(test: &TestGraph, operation: usize) -> OperationTraits {
    let builder = registered(test);
    let operation = &test.graph.operations()[operation];
    OperationTraits::new(operation, &test.graph, builder.as_ref()).unwrap()
}

pub fn generator(test: &TestGraph) -> (TfliteKernelGenerator, Arc<TfliteTensorBuilder>) {
    let builder = registered(test);
    (
        TfliteKernelGenerator::new(test.graph.clone(), builder.clone()),
        builder,
    )
}

pub fn op(index: u32) -> OperationIndex {
    OperationIndex(index)
}
