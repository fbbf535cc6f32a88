use anyhow::Result;

use nnadapt::core::{Attributes, DType, FuseCode, Graph, OperandId, OperandType, OperationKind};
use nnadapt::{prepare_graph, ConfigErrorCode, HostExecutor, HostTensor};

fn run_single(mut graph: Graph, output: OperandId, inputs: &[HostTensor]) -> Result<HostTensor> {
    graph.mark_output(output)?;
    prepare_graph(&mut graph)?;
    let mut outputs = HostExecutor::new().run(&graph, inputs)?;
    Ok(outputs.remove(0))
}

fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len());
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= tol, "element {index}: {a} vs {e}");
    }
}

#[test]
fn add_broadcasts_a_constant_row_and_applies_the_fuse_code() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 3])?);
    let row = graph.add_constant_f32(&[3], &[1.0, -10.0, 0.5])?;
    let y = graph.add_unary_output(
        OperationKind::Add,
        Attributes::Elementwise {
            fuse_code: FuseCode::Relu,
        },
        &[x, row],
    )?;
    let input = HostTensor::from_f32(&[2, 3], vec![0.0, 1.0, 2.0, -3.0, 4.0, 5.0])?;
    let out = run_single(graph, y, &[input])?;
    assert_eq!(out.shape(), &[2, 3]);
    assert_eq!(out.as_f32(), Some(&[1.0, 0.0, 2.5, 0.0, 0.0, 5.5][..]));
    Ok(())
}

#[test]
fn comparison_yields_booleans() -> Result<()> {
    let mut graph = Graph::new();
    let a = graph.add_input(OperandType::int32(&[4])?);
    let b = graph.add_input(OperandType::int32(&[1])?);
    let y = graph.add_unary_output(OperationKind::GreaterEqual, Attributes::Comparison, &[a, b])?;
    let out = run_single(
        graph,
        y,
        &[
            HostTensor::from_i32(&[4], vec![-1, 2, 3, 7])?,
            HostTensor::from_i32(&[1], vec![3])?,
        ],
    )?;
    assert_eq!(out.dtype(), DType::Bool8);
    assert_eq!(out.as_bool(), Some(&[false, false, true, true][..]));
    Ok(())
}

#[test]
fn softmax_matches_a_direct_evaluation() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 3])?);
    let y = graph.add_unary_output(OperationKind::Softmax, Attributes::Softmax { axis: -1 }, &[x])?;
    let values = vec![1.0, 2.0, 3.0, 1000.0, 1000.0, 1000.0];
    let out = run_single(graph, y, &[HostTensor::from_f32(&[2, 3], values)?])?;

    let denom = 1f32.exp() + 2f32.exp() + 3f32.exp();
    let expected = [
        1f32.exp() / denom,
        2f32.exp() / denom,
        3f32.exp() / denom,
        1.0 / 3.0,
        1.0 / 3.0,
        1.0 / 3.0,
    ];
    assert_close(&out.to_f32_vec(), &expected, 1e-6);
    Ok(())
}

#[test]
fn mat_mul_with_transposed_rhs() -> Result<()> {
    let mut graph = Graph::new();
    let a = graph.add_input(OperandType::float32(&[2, 3])?);
    let b = graph.add_constant_f32(&[2, 3], &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0])?;
    let y = graph.add_unary_output(
        OperationKind::MatMul,
        Attributes::MatMul {
            transpose_x: false,
            transpose_y: true,
        },
        &[a, b],
    )?;
    let input = HostTensor::from_f32(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let out = run_single(graph, y, &[input])?;
    assert_eq!(out.shape(), &[2, 2]);
    assert_eq!(out.as_f32(), Some(&[4.0, 2.0, 10.0, 5.0][..]));
    Ok(())
}

#[test]
fn concat_then_transpose() -> Result<()> {
    let mut graph = Graph::new();
    let a = graph.add_input(OperandType::float32(&[1, 2])?);
    let b = graph.add_constant_f32(&[2, 2], &[3.0, 4.0, 5.0, 6.0])?;
    let joined = graph.add_unary_output(OperationKind::Concat, Attributes::Concat { axis: 0 }, &[a, b])?;
    let y = graph.add_unary_output(
        OperationKind::Transpose,
        Attributes::Transpose { perm: vec![] },
        &[joined],
    )?;
    let out = run_single(graph, y, &[HostTensor::from_f32(&[1, 2], vec![1.0, 2.0])?])?;
    assert_eq!(out.shape(), &[2, 3]);
    assert_eq!(out.as_f32(), Some(&[1.0, 3.0, 5.0, 2.0, 4.0, 6.0][..]));
    Ok(())
}

#[test]
fn split_produces_every_section() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 3])?);
    let parts = graph.add_operation(
        OperationKind::Split,
        Attributes::Split {
            axis: 1,
            split: vec![1, 2],
        },
        &[x],
        2,
    )?;
    for part in &parts {
        graph.mark_output(*part)?;
    }
    prepare_graph(&mut graph)?;
    let input = HostTensor::from_f32(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let outputs = HostExecutor::new().run(&graph, &[input])?;
    assert_eq!(outputs[0].shape(), &[2, 1]);
    assert_eq!(outputs[0].as_f32(), Some(&[1.0, 4.0][..]));
    assert_eq!(outputs[1].shape(), &[2, 2]);
    assert_eq!(outputs[1].as_f32(), Some(&[2.0, 3.0, 5.0, 6.0][..]));
    Ok(())
}

#[test]
fn batch_normalization_uses_the_channel_axis() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[1, 2, 2])?);
    let scale = graph.add_constant_f32(&[2], &[1.0, 2.0])?;
    let bias = graph.add_constant_f32(&[2], &[0.0, 1.0])?;
    let mean = graph.add_constant_f32(&[2], &[1.0, 0.0])?;
    let variance = graph.add_constant_f32(&[2], &[4.0, 1.0])?;
    let y = graph.add_unary_output(
        OperationKind::BatchNormalization,
        Attributes::BatchNormalization { epsilon: 0.0 },
        &[x, scale, bias, mean, variance],
    )?;
    let input = HostTensor::from_f32(&[1, 2, 2], vec![3.0, 5.0, 1.0, -1.0])?;
    let out = run_single(graph, y, &[input])?;
    assert_close(&out.to_f32_vec(), &[1.0, 2.0, 3.0, -1.0], 1e-6);
    Ok(())
}

#[test]
fn cast_to_int32_truncates_and_saturates() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[5])?);
    let y = graph.add_unary_output(
        OperationKind::Cast,
        Attributes::Cast {
            dtype: DType::Int32,
        },
        &[x],
    )?;
    let input = HostTensor::from_f32(&[5], vec![1.9, -1.9, f32::NAN, 1e20, -1e20])?;
    let out = run_single(graph, y, &[input])?;
    assert_eq!(out.as_i32(), Some(&[1, -1, 0, i32::MAX, i32::MIN][..]));
    Ok(())
}

#[test]
fn gelu_exact_and_approximate() -> Result<()> {
    for (approximate, expected) in [(false, 0.841_344_7_f32), (true, 0.841_192_f32)] {
        let mut graph = Graph::new();
        let x = graph.add_input(OperandType::float32(&[1])?);
        let y = graph.add_unary_output(OperationKind::Gelu, Attributes::Gelu { approximate }, &[x])?;
        let out = run_single(graph, y, &[HostTensor::from_f32(&[1], vec![1.0])?])?;
        assert_close(&out.to_f32_vec(), &[expected], 1e-5);
    }
    Ok(())
}

#[test]
fn mismatched_input_shape_is_rejected() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 3])?);
    let y = graph.add_unary_output(OperationKind::Relu, Attributes::None, &[x])?;
    let err = run_single(graph, y, &[HostTensor::from_f32(&[3, 2], vec![0.0; 6])?])
        .expect_err("declared [2, 3]");
    let err = err.downcast::<nnadapt::Error>()?;
    assert_eq!(err.config_code(), Some(ConfigErrorCode::InvalidInput));
    Ok(())
}

#[test]
fn unprepared_graph_is_rejected() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2])?);
    let y = graph.add_unary_output(OperationKind::Relu, Attributes::None, &[x])?;
    graph.mark_output(y)?;
    let err = HostExecutor::new()
        .run(&graph, &[HostTensor::from_f32(&[2], vec![1.0, -1.0])?])
        .expect_err("RELU output is unresolved");
    assert_eq!(err.config_code(), Some(ConfigErrorCode::OperandNotResolved));
    Ok(())
}
