mod common;

use common::{generator, op, registered, tensor_for};
use nnrt::backend::spec::{KernelGenerator, TensorBuilder};
use nnrt::backend::tensor::BufferOwnership;
use nnrt::exec::Function;
use nnrt::ir::OperandIndex;
use nnrt_backend_tests::models::{self, GraphBuilder};
use nnrt_backend_tflite::{TfliteKernelGenerator, TfliteTensorBuilder};
use nnrt::OpParams;
use std::sync::Arc;

#[test]
fn unregistered_operand_is_an_invariant_error() {
    let test = models::relu();
    let builder = Arc::new(TfliteTensorBuilder::new());
    // only the input is registered
    builder
        .register_tensor_info(tensor_for(&test, OperandIndex(0)))
        .unwrap();
    let mut kernel_gen = TfliteKernelGenerator::new(test.graph.clone(), builder);
    let err = kernel_gen.generate(op(0)).err().unwrap();
    assert!(err.is_invariant(), "{err}");
}

#[test]
fn unbound_tensors_adopt_interpreter_buffers() {
    let test = models::relu();
    let (kernel_gen, builder) = generator(&test);
    let kernel = kernel_gen.generate_kernel(op(0)).unwrap();
    for operand in [OperandIndex(0), OperandIndex(1)] {
        let tensor = builder.at(operand).unwrap();
        assert_eq!(tensor.ownership(), Some(BufferOwnership::Embedded));
        assert!(Arc::ptr_eq(
            tensor.buffer().unwrap(),
            kernel.embedded_buffer(operand).unwrap()
        ));
        assert!(kernel.copy_in_source(operand).is_none());
    }
}

#[test]
fn consumer_reads_producer_export() {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 1, 2, 2], vec![-7.0, -0.5, 3.0, 9.0]);
    let mid = b.op(OpParams::Relu, &[x], &[1, 1, 2, 2]);
    let y = b.op(OpParams::Relu6, &[mid], &[1, 1, 2, 2]);
    let test = b.finish("chain", &[y]);

    let (kernel_gen, builder) = generator(&test);
    let mut producer = kernel_gen.generate_kernel(op(0)).unwrap();
    let mut consumer = kernel_gen.generate_kernel(op(1)).unwrap();

    let exported = producer.embedded_buffer(mid).unwrap();
    let source = consumer.copy_in_source(mid).unwrap();
    assert!(Arc::ptr_eq(exported, source));
    assert!(Arc::ptr_eq(builder.at(mid).unwrap().buffer().unwrap(), exported));

    builder.at(x).unwrap().write_f32(&test.inputs[0]).unwrap();
    producer.run().unwrap();
    consumer.run().unwrap();
    assert_eq!(builder.at(y).unwrap().read_f32().unwrap(), vec![0.0, 0.0, 3.0, 6.0]);
}

#[test]
fn bound_output_is_copied_out() {
    let mut b = GraphBuilder::new(0);
    let x = b.input_values(&[1, 1, 1, 3], vec![-1.0, 2.0, 8.0]);
    let y = b.op(OpParams::Relu6, &[x], &[1, 1, 1, 3]);
    let test = b.finish("copy_out", &[y]);

    let builder = registered(&test);
    let output = builder.at(y).unwrap();
    output.allocate().unwrap();
    let kernel_gen = TfliteKernelGenerator::new(test.graph.clone(), builder.clone());
    let mut kernel = kernel_gen.generate_kernel(op(0)).unwrap();

    assert_eq!(output.ownership(), Some(BufferOwnership::External));
    assert!(Arc::ptr_eq(kernel.copy_out_target(y).unwrap(), output.buffer().unwrap()));
    assert!(!Arc::ptr_eq(
        kernel.embedded_buffer(y).unwrap(),
        output.buffer().unwrap()
    ));

    builder.at(x).unwrap().write_f32(&test.inputs[0]).unwrap();
    kernel.run().unwrap();
    assert_eq!(output.read_f32().unwrap(), vec![0.0, 2.0, 6.0]);
}

#[test]
fn kernel_run_is_bit_identical_across_runs() {
    let test = models::depthwise_conv2d();
    let (kernel_gen, builder) = generator(&test);
    let mut kernel = kernel_gen.generate_kernel(op(0)).unwrap();
    builder
        .at(OperandIndex(0))
        .unwrap()
        .write_f32(&test.inputs[0])
        .unwrap();
    let output = builder.at(test.graph.outputs()[0]).unwrap();

    kernel.run().unwrap();
    let first: Vec<u32> = output.read_f32().unwrap().iter().map(|v| v.to_bits()).collect();
    kernel.run_sync().unwrap();
    let second: Vec<u32> = output.read_f32().unwrap().iter().map(|v| v.to_bits()).collect();
    assert_eq!(first, second);
}

#[test]
fn interpreter_mirrors_the_operation() {
    let test = models::conv2d_same_strided();
    let (kernel_gen, _builder) = generator(&test);
    let kernel = kernel_gen.generate_kernel(op(0)).unwrap();
    assert_eq!(kernel.op(), "Conv2D");
    assert_eq!(kernel.interpreter().nodes_size(), 1);
    assert_eq!(kernel.interpreter().tensors_size(), 4);
    assert_eq!(kernel.interpreter().inputs().len(), 1);
    assert!(kernel.interpreter().is_allocated());
    let filter = kernel.tensor_slot(OperandIndex(1)).unwrap();
    assert!(filter.is_constant());
    assert_eq!(filter.dims(), &[5, 3, 3, 3]);
    assert!(kernel.model().bytes().len() > 5 * 27 * 4);
}
