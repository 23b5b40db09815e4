mod common;

use common::{registered, traits_of};
use nnrt::ir::{Activation, DataType, OpParams, OperandInfo, Operation, Padding, Stride};
use nnrt::Graph;
use nnrt_backend_tests::models::{self, GraphBuilder, TestGraph};
use nnrt_backend_tflite::synthesizer::{synthesize, MODEL_DESCRIPTION, SUBGRAPH_NAME};
use nnrt_backend_tflite::traits::OperationTraits;
use nnrt_tflite_engine::schema::{ActivationFunctionType, BuiltinOptions};
use nnrt_tflite_engine::FlatBufferModel;
use std::sync::Arc;

#[test]
fn synthesized_models_round_trip() {
    for test in models::single_op_graphs() {
        let traits = traits_of(&test, 0);
        let synthesized = synthesize(&traits).unwrap();
        let model = FlatBufferModel::from_bytes(synthesized.bytes().to_vec())
            .unwrap_or_else(|err| panic!("{}: {err}", test.name));
        let root = model.model().unwrap();
        assert_eq!(root.version(), 3);
        assert_eq!(model.description(), Some(MODEL_DESCRIPTION));

        let codes = root.operator_codes().unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(
            codes.get(0).effective_builtin_code(),
            traits.provider().builtin_code() as i32,
            "{}",
            test.name
        );

        let subgraphs = root.subgraphs().unwrap();
        assert_eq!(subgraphs.len(), 1);
        let subgraph = subgraphs.get(0);
        assert_eq!(subgraph.name(), Some(SUBGRAPH_NAME));
        assert_eq!(subgraph.operators().unwrap().len(), 1);

        let expected_tensors = traits.non_constant_inputs().count()
            + traits.constant_inputs().count()
            + traits.outputs().len();
        let tensors = subgraph.tensors().unwrap();
        assert_eq!(tensors.len(), expected_tensors, "{}", test.name);
        assert_eq!(synthesized.tensor_count(), expected_tensors);
        for (position, tensor) in tensors.iter().enumerate() {
            assert_eq!(tensor.name(), Some(format!("tensor_{position}").as_str()));
        }

        let buffers = root.buffers().unwrap();
        assert!(buffers.get(0).bytes().is_empty());
        assert_eq!(buffers.len(), 1 + traits.constant_inputs().count());
        for constant in traits.constant_inputs() {
            let index = synthesized.tensor_index(constant.operand()).unwrap();
            let tensor = tensors.get(index);
            let elements: i32 = tensor.shape().unwrap().iter().product();
            let bytes = buffers.get(tensor.buffer() as usize).bytes();
            assert_eq!(bytes.len(), elements as usize * 4);
            assert_eq!(Some(bytes), constant.data());
        }
    }
}

#[test]
fn operator_inputs_keep_operation_order() {
    // the constant is the first operand of the Add
    let test = models::add_constant_broadcast();
    let traits = traits_of(&test, 0);
    let synthesized = synthesize(&traits).unwrap();
    let model = FlatBufferModel::from_bytes(synthesized.into_bytes()).unwrap();
    let subgraph = model.model().unwrap().subgraphs().unwrap().get(0);
    let operator = subgraph.operators().unwrap().get(0);

    let operator_inputs: Vec<i32> = operator.inputs().unwrap().iter().collect();
    let model_inputs: Vec<i32> = subgraph.inputs().unwrap().iter().collect();
    let model_outputs: Vec<i32> = subgraph.outputs().unwrap().iter().collect();
    assert_eq!(operator_inputs, vec![1, 0]);
    assert_eq!(model_inputs, vec![0]);
    assert_eq!(model_outputs, vec![2]);
    assert_eq!(operator.builtin_options_type(), BuiltinOptions::AddOptions as u8);
    let options = operator.builtin_options_as_add_options().unwrap();
    assert_eq!(
        options.fused_activation_function(),
        ActivationFunctionType::Relu as i8
    );
}

#[test]
fn conv_options_carry_strides_per_axis() {
    let test = models::conv2d_same_strided();
    let model = FlatBufferModel::from_bytes(synthesize(&traits_of(&test, 0)).unwrap().into_bytes())
        .unwrap();
    let operator = model.model().unwrap().subgraphs().unwrap().get(0).operators().unwrap().get(0);
    let options = operator.builtin_options_as_conv_2d_options().unwrap();
    assert_eq!(options.stride_h(), 2);
    assert_eq!(options.stride_w(), 1);
    assert_eq!(options.padding(), 0);
    assert_eq!(
        options.fused_activation_function(),
        ActivationFunctionType::Relu6 as i8
    );
}

#[test]
fn repeated_operand_maps_to_one_tensor() {
    let mut b = GraphBuilder::new(0);
    let x = b.input(&[1, 2, 2, 3], 1.0);
    let y = b.op(models::add(Activation::None), &[x, x], &[1, 2, 2, 3]);
    let test = b.finish("double", &[y]);

    let synthesized = synthesize(&traits_of(&test, 0)).unwrap();
    assert_eq!(synthesized.tensor_count(), 2);
    let model = FlatBufferModel::from_bytes(synthesized.into_bytes()).unwrap();
    let subgraph = model.model().unwrap().subgraphs().unwrap().get(0);
    let operator_inputs: Vec<i32> = subgraph.operators().unwrap().get(0).inputs().unwrap().iter().collect();
    assert_eq!(operator_inputs, vec![0, 0]);
    assert_eq!(subgraph.inputs().unwrap().len(), 1);
}

fn conv_graph(padding: Padding, activation: Activation) -> TestGraph {
    let mut b = GraphBuilder::new(0);
    let x = b.input(&[1, 4, 4, 1], 1.0);
    let filter = b.constant(&[1, 3, 3, 1], 1.0);
    let bias = b.constant(&[1], 1.0);
    let y = b.op(
        models::conv(padding, Stride::unit(), activation),
        &[x, filter, bias],
        &[1, 4, 4, 1],
    );
    b.finish("conv", &[y])
}

#[test]
fn inexpressible_parameters_fail_before_synthesis() {
    let explicit = Padding::Explicit {
        top: 1,
        bottom: 1,
        left: 1,
        right: 1,
    };
    for test in [
        conv_graph(Padding::Same, Activation::Tanh),
        conv_graph(Padding::Same, Activation::Sigmoid),
        conv_graph(explicit, Activation::None),
    ] {
        let builder = registered(&test);
        let err = OperationTraits::new(&test.graph.operations()[0], &test.graph, builder.as_ref())
            .unwrap_err();
        assert!(err.is_unsupported(), "{err}");
    }
}

#[test]
fn non_float_operand_is_unsupported() {
    let mut graph = Graph::new();
    let x = graph
        .add_operand(OperandInfo::new([1, 2, 2, 1], DataType::Int32))
        .unwrap();
    let y = graph
        .add_operand(OperandInfo::new([1, 2, 2, 1], DataType::Int32))
        .unwrap();
    graph
        .add_operation(Operation::new(OpParams::Relu, vec![x], vec![y]))
        .unwrap();
    graph.add_input(x).unwrap();
    graph.add_output(y).unwrap();
    graph.finish().unwrap();
    let test = TestGraph {
        name: "int_relu",
        graph: Arc::new(graph),
        inputs: Vec::new(),
    };

    let builder = registered(&test);
    let err = OperationTraits::new(&test.graph.operations()[0], &test.graph, builder.as_ref())
        .unwrap_err();
    assert!(err.is_unsupported(), "{err}");
}
