use flatbuffers::FlatBufferBuilder;
use nnrt_tflite_engine::schema::{
    create_add_options, create_buffer, create_model, create_operator, create_operator_code,
    create_subgraph, create_tensor, finish_model_buffer,
    ActivationFunctionType, BuiltinOperator, BuiltinOptions, ModelArgs, OperatorArgs,
    SubGraphArgs, TensorArgs, TensorType,
};
use nnrt_tflite_engine::{
    BuiltinOpResolver, EngineError, FlatBufferModel, InterpreterBuilder, TensorBuffer,
};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn read(buffer: &TensorBuffer) -> Vec<f32> {
    buffer
        .read()
        .unwrap()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// `out = relu(x + c)` where `c` is a constant of shape [2].
fn add_model(constant: &[f32], builtin: BuiltinOperator) -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::new();
    let empty = create_buffer(&mut fbb, None);
    let data = fbb.create_vector(&f32_bytes(constant));
    let weights = create_buffer(&mut fbb, Some(data));
    let buffers = fbb.create_vector(&[empty, weights]);

    let mut tensors = Vec::new();
    for (name, shape, buffer) in [("x", [2, 2], 0u32), ("c", [1, 2], 1), ("out", [2, 2], 0)] {
        let shape = fbb.create_vector(&shape);
        let name = fbb.create_string(name);
        tensors.push(create_tensor(
            &mut fbb,
            &TensorArgs {
                shape: Some(shape),
                type_: TensorType::Float32,
                buffer,
                name: Some(name),
            },
        ));
    }
    let tensors = fbb.create_vector(&tensors);

    let options = create_add_options(&mut fbb, ActivationFunctionType::Relu);
    let op_inputs = fbb.create_vector(&[0, 1]);
    let op_outputs = fbb.create_vector(&[2]);
    let operator = create_operator(
        &mut fbb,
        &OperatorArgs {
            opcode_index: 0,
            inputs: Some(op_inputs),
            outputs: Some(op_outputs),
            builtin_options_type: BuiltinOptions::AddOptions,
            builtin_options: Some(options.as_union_value()),
        },
    );
    let operators = fbb.create_vector(&[operator]);
    let inputs = fbb.create_vector(&[0]);
    let outputs = fbb.create_vector(&[2]);
    let name = fbb.create_string("main");
    let subgraph = create_subgraph(
        &mut fbb,
        &SubGraphArgs {
            tensors: Some(tensors),
            inputs: Some(inputs),
            outputs: Some(outputs),
            operators: Some(operators),
            name: Some(name),
        },
    );
    let subgraphs = fbb.create_vector(&[subgraph]);
    let code = create_operator_code(&mut fbb, builtin, 1);
    let codes = fbb.create_vector(&[code]);
    let description = fbb.create_string("engine test");
    let model = create_model(
        &mut fbb,
        &ModelArgs {
            operator_codes: Some(codes),
            subgraphs: Some(subgraphs),
            description: Some(description),
            buffers: Some(buffers),
        },
    );
    finish_model_buffer(&mut fbb, model);
    fbb.finished_data().to_vec()
}

#[test]
fn add_with_constant_broadcasts_and_fuses_relu() {
    let model = FlatBufferModel::from_bytes(add_model(&[1.0, -5.0], BuiltinOperator::Add)).unwrap();
    assert_eq!(model.description(), Some("engine test"));
    let resolver = BuiltinOpResolver::new();
    let mut interpreter = InterpreterBuilder::new(&model, &resolver).build().unwrap();
    assert_eq!(interpreter.tensors_size(), 3);
    assert_eq!(interpreter.nodes_size(), 1);
    assert_eq!(interpreter.inputs(), &[0]);
    assert_eq!(interpreter.outputs(), &[2]);
    assert!(matches!(interpreter.invoke(), Err(EngineError::NotAllocated)));

    interpreter.allocate_tensors().unwrap();
    let constant = interpreter.tensor(1).unwrap();
    assert!(constant.is_constant());
    assert_eq!(constant.name(), "c");
    assert_eq!(read(constant.buffer().unwrap()), vec![1.0, -5.0]);

    let input = interpreter.tensor(0).unwrap().buffer().unwrap().clone();
    input
        .write()
        .unwrap()
        .copy_from_slice(&f32_bytes(&[1.0, 2.0, 3.0, 10.0]));
    interpreter.invoke().unwrap();
    let out = read(interpreter.tensor(2).unwrap().buffer().unwrap());
    assert_eq!(out, vec![2.0, 0.0, 4.0, 5.0]);
}

#[test]
fn allocation_keeps_buffer_identity() {
    let model = FlatBufferModel::from_bytes(add_model(&[0.0, 0.0], BuiltinOperator::Add)).unwrap();
    let resolver = BuiltinOpResolver::new();
    let mut interpreter = InterpreterBuilder::new(&model, &resolver).build().unwrap();
    interpreter.allocate_tensors().unwrap();
    let before = interpreter.tensor(2).unwrap().buffer().unwrap().clone();
    interpreter.allocate_tensors().unwrap();
    interpreter.invoke().unwrap();
    let after = interpreter.tensor(2).unwrap().buffer().unwrap();
    assert!(std::sync::Arc::ptr_eq(&before, after));
}

#[test]
fn missing_options_for_the_declared_builtin_is_rejected() {
    // Softmax requires SoftmaxOptions but the operator carries AddOptions.
    let model =
        FlatBufferModel::from_bytes(add_model(&[0.0, 0.0], BuiltinOperator::Softmax)).unwrap();
    let resolver = BuiltinOpResolver::new();
    let err = InterpreterBuilder::new(&model, &resolver).build().unwrap_err();
    assert!(matches!(err, EngineError::Malformed(_)), "{err}");
}

#[test]
fn identifier_and_structure_are_verified() {
    let err = FlatBufferModel::from_bytes(vec![0; 4]).unwrap_err();
    assert!(matches!(err, EngineError::Identifier { .. }));

    let mut bytes = add_model(&[0.0, 0.0], BuiltinOperator::Add);
    bytes[4..8].copy_from_slice(b"XXXX");
    let err = FlatBufferModel::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, EngineError::Identifier { .. }));

    let mut fbb = FlatBufferBuilder::new();
    let model = create_model(
        &mut fbb,
        &ModelArgs {
            operator_codes: None,
            subgraphs: None,
            description: None,
            buffers: None,
        },
    );
    finish_model_buffer(&mut fbb, model);
    let err = FlatBufferModel::from_bytes(fbb.finished_data().to_vec()).unwrap_err();
    assert!(matches!(err, EngineError::Malformed(_)));
}

#[test]
fn root_table_is_read_through_verification() {
    let bytes = add_model(&[0.0, 0.0], BuiltinOperator::Add);
    let model = FlatBufferModel::from_bytes(bytes.clone()).unwrap();
    let root = model.model().unwrap();
    assert_eq!(root.version(), 3);
    assert_eq!(root.subgraphs().unwrap().len(), 1);

    let truncated = bytes[..bytes.len() / 2].to_vec();
    let err = FlatBufferModel::from_bytes(truncated).unwrap_err();
    assert!(matches!(err, EngineError::InvalidFlatbuffer(_)), "{err}");
}
