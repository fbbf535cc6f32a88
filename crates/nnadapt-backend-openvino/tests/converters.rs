use anyhow::{anyhow, Result};

use nnadapt::core::{
    Attributes, Conv2dAttrs, DType, DataLayout, Dimensions, FuseCode, Graph, OperandId,
    OperandType, OperationKind, Pool2dAttrs, QuantParams,
};
use nnadapt::{BackendDriver, CompileOptions, Compiled, Error, Route, Session};
use nnadapt_backend_openvino::ov::{AttrValue, Output, OvModel, OvNode};
use nnadapt_backend_openvino::{OpenVinoDriver, OpenVinoProgram};

fn lower(graph: Graph) -> Result<OpenVinoProgram> {
    lower_with(graph, &CompileOptions::default())
}

fn lower_with(graph: Graph, options: &CompileOptions) -> Result<OpenVinoProgram> {
    let driver = OpenVinoDriver::new()?;
    let (compiled, report) = Session::compile(graph, &driver, options)?;
    assert_eq!(report.route, Route::Backend, "{:?}", report.backend.diagnostics);
    match compiled {
        Compiled::Backend(program) => Ok(program),
        Compiled::Host(_) => Err(anyhow!("graph fell back to the host")),
    }
}

fn single_op(op_type: &str, model: &OvModel) -> Result<OvNode> {
    model
        .nodes()
        .iter()
        .find(|node| node.op_type == op_type)
        .cloned()
        .ok_or_else(|| anyhow!("no {op_type} node in\n{model}"))
}

fn result_shape(model: &OvModel, index: usize) -> Option<Vec<i64>> {
    let result = model.node(model.results()[index])?;
    model.port(result.inputs[0]).map(|port| port.shape.clone())
}

fn with_output(mut graph: Graph, output: OperandId) -> Result<Graph> {
    graph.mark_output(output)?;
    Ok(graph)
}

#[test]
fn every_kind_has_a_converter() -> Result<()> {
    let driver = OpenVinoDriver::new()?;
    assert_eq!(driver.registry().len(), OperationKind::COUNT);
    Ok(())
}

#[test]
fn squeeze_lowers_to_one_squeeze_node() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[1, 3, 1, 5])?);
    let y = graph.add_unary_output(OperationKind::Squeeze, Attributes::Squeeze { axes: vec![] }, &[x])?;
    let program = lower(with_output(graph, y)?)?;

    let model = &program.model;
    assert_eq!(model.op_types(), vec!["Squeeze"]);
    let squeeze = single_op("Squeeze", model)?;
    let axes = model
        .producer(squeeze.inputs[1])
        .and_then(OvNode::constant_i64);
    assert_eq!(axes, Some(vec![0, 2]));
    assert_eq!(result_shape(model, 0), Some(vec![3, 5]));
    Ok(())
}

#[test]
fn stack_lowers_to_unsqueeze_and_concat() -> Result<()> {
    let mut graph = Graph::new();
    let ty = OperandType::float32(&[1, 3, 1, 5])?;
    let inputs = (0..3).map(|_| graph.add_input(ty.clone())).collect::<Vec<_>>();
    let y = graph.add_unary_output(OperationKind::Stack, Attributes::Stack { axis: 0 }, &inputs)?;
    let program = lower(with_output(graph, y)?)?;

    let model = &program.model;
    assert_eq!(program.parameters().len(), 3);
    assert_eq!(
        model.op_types(),
        vec!["Unsqueeze", "Unsqueeze", "Unsqueeze", "Concat"]
    );
    let concat = single_op("Concat", model)?;
    assert_eq!(concat.attribute("axis"), Some(&AttrValue::Int(0)));
    assert_eq!(concat.inputs.len(), 3);
    assert_eq!(result_shape(model, 0), Some(vec![3, 1, 3, 1, 5]));
    Ok(())
}

#[test]
fn nhwc_convolution_is_wrapped_in_transposes() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[1, 8, 8, 3])?.with_layout(DataLayout::Nhwc));
    let filter = graph.add_constant_f32(&[4, 3, 3, 3], &[0.5; 108])?;
    let bias = graph.add_constant_f32(&[4], &[0.0, 1.0, 2.0, 3.0])?;
    let y = graph.add_unary_output(
        OperationKind::Conv2d,
        Attributes::Conv2d(Conv2dAttrs {
            fuse_code: FuseCode::Relu,
            ..Conv2dAttrs::default()
        }),
        &[x, filter, bias],
    )?;
    let program = lower(with_output(graph, y)?)?;

    let model = &program.model;
    assert_eq!(
        model.op_types(),
        vec!["Transpose", "Convolution", "Reshape", "Add", "Relu", "Transpose"]
    );
    let conv = single_op("Convolution", model)?;
    let conv_port = model.port(Output {
        node: conv.id,
        port: 0,
    });
    assert_eq!(conv_port.map(|port| port.shape.clone()), Some(vec![1, 4, 6, 6]));
    assert_eq!(conv.attribute("auto_pad"), Some(&AttrValue::Str("explicit".into())));
    assert_eq!(result_shape(model, 0), Some(vec![1, 6, 6, 4]));
    Ok(())
}

#[test]
fn grouped_convolution_reshapes_the_filter() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[1, 4, 5, 5])?);
    let filter = graph.add_constant_f32(&[4, 2, 1, 1], &[1.0; 8])?;
    let y = graph.add_unary_output(
        OperationKind::Conv2d,
        Attributes::Conv2d(Conv2dAttrs {
            group: 2,
            ..Conv2dAttrs::default()
        }),
        &[x, filter],
    )?;
    let program = lower(with_output(graph, y)?)?;

    let model = &program.model;
    assert_eq!(model.op_types(), vec!["Reshape", "GroupConvolution"]);
    let reshape = single_op("Reshape", model)?;
    let pattern = model
        .producer(reshape.inputs[1])
        .and_then(OvNode::constant_i64);
    assert_eq!(pattern, Some(vec![2, 2, 2, 1, 1]));
    Ok(())
}

#[test]
fn global_average_pool_reduces_spatial_axes() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 8, 7, 7])?);
    let y = graph.add_unary_output(
        OperationKind::AveragePool2d,
        Attributes::Pool2d(Pool2dAttrs {
            kernel: None,
            ..Pool2dAttrs::default()
        }),
        &[x],
    )?;
    let program = lower(with_output(graph, y)?)?;
    assert_eq!(program.model.op_types(), vec!["ReduceMean"]);
    assert_eq!(result_shape(&program.model, 0), Some(vec![2, 8, 1, 1]));
    Ok(())
}

#[test]
fn fused_relu6_follows_the_arithmetic_node() -> Result<()> {
    let mut graph = Graph::new();
    let a = graph.add_input(OperandType::float32(&[2, 3])?);
    let b = graph.add_input(OperandType::float32(&[3])?);
    let y = graph.add_unary_output(
        OperationKind::Sub,
        Attributes::Elementwise {
            fuse_code: FuseCode::Relu6,
        },
        &[a, b],
    )?;
    let program = lower(with_output(graph, y)?)?;
    assert_eq!(program.model.op_types(), vec!["Subtract", "Clamp"]);
    let clamp = single_op("Clamp", &program.model)?;
    assert_eq!(clamp.attribute("max"), Some(&AttrValue::Float(6.0)));
    Ok(())
}

#[test]
fn split_binds_each_output_port() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[4, 6])?);
    let parts = graph.add_operation(
        OperationKind::Split,
        Attributes::Split {
            axis: -1,
            split: vec![2, 4],
        },
        &[x],
        2,
    )?;
    for part in &parts {
        graph.mark_output(*part)?;
    }
    let program = lower(graph)?;

    let model = &program.model;
    assert_eq!(model.op_types(), vec!["VariadicSplit"]);
    assert_eq!(result_shape(model, 0), Some(vec![4, 2]));
    assert_eq!(result_shape(model, 1), Some(vec![4, 4]));
    let ports = model
        .results()
        .iter()
        .filter_map(|id| model.node(*id))
        .map(|result| result.inputs[0].port)
        .collect::<Vec<_>>();
    assert_eq!(ports, vec![0, 1]);
    Ok(())
}

#[test]
fn assign_reuses_the_input_node() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2])?);
    let y = graph.add_unary_output(OperationKind::Assign, Attributes::None, &[x])?;
    let program = lower(with_output(graph, y)?)?;
    assert!(program.model.op_types().is_empty());
    let result = program
        .model
        .node(program.results()[0])
        .ok_or_else(|| anyhow!("missing result"))?;
    assert_eq!(result.inputs[0].node, program.parameters()[0]);
    Ok(())
}

#[test]
fn softplus_beta_decides_the_route() -> Result<()> {
    let softplus = |beta: f32| -> Result<Graph> {
        let mut graph = Graph::new();
        let x = graph.add_input(OperandType::float32(&[4])?);
        let y = graph.add_unary_output(
            OperationKind::Softplus,
            Attributes::Softplus {
                beta,
                threshold: 20.0,
            },
            &[x],
        )?;
        with_output(graph, y)
    };

    let program = lower(softplus(1.0)?)?;
    assert_eq!(program.model.op_types(), vec!["SoftPlus"]);

    let driver = OpenVinoDriver::new()?;
    let (_, report) = Session::compile(softplus(2.0)?, &driver, &CompileOptions::default())?;
    assert_eq!(report.route, Route::Host);
    assert!(report.backend.first().is_some_and(|d| d.reason.contains("beta")));
    Ok(())
}

#[test]
fn quantized_operands_have_no_target() -> Result<()> {
    let mut graph = Graph::new();
    let ty = OperandType::new(DType::QuantInt8SymmPerLayer, Dimensions::new(&[4])?).with_quant(
        QuantParams::PerTensor {
            scale: 0.1,
            zero_point: 0,
        },
    );
    let x = graph.add_input(ty);
    let y = graph.add_unary_output(OperationKind::Relu, Attributes::None, &[x])?;
    let driver = OpenVinoDriver::new()?;
    let err = Session::compile(with_output(graph, y)?, &driver, &CompileOptions::default())
        .expect_err("neither openvino nor the host take quantized storage");
    match err {
        Error::Unsupported { backend, kind, .. } => {
            assert_eq!(backend, "openvino");
            assert_eq!(kind, OperationKind::Relu);
        }
        other => panic!("expected unsupported, got {other}"),
    }
    Ok(())
}

#[test]
fn flatten_with_dynamic_trailing_axis_falls_back() -> Result<()> {
    let mut graph = Graph::new();
    let ty = OperandType::new(
        DType::Float32,
        Dimensions::with_dynamic(&[2, 3, -1], &[&[2, 3, 4], &[2, 3, 8]])?,
    );
    let x = graph.add_input(ty);
    let y = graph.add_unary_output(
        OperationKind::Flatten,
        Attributes::Flatten {
            start_axis: 0,
            end_axis: 1,
        },
        &[x],
    )?;
    let driver = OpenVinoDriver::new()?;
    let (_, report) = Session::compile(with_output(graph, y)?, &driver, &CompileOptions::default())?;
    assert_eq!(report.route, Route::Host);
    Ok(())
}

#[test]
fn device_comes_from_the_options() -> Result<()> {
    let graph = || -> Result<Graph> {
        let mut graph = Graph::new();
        let x = graph.add_input(OperandType::float32(&[2])?);
        let y = graph.add_unary_output(OperationKind::Tanh, Attributes::None, &[x])?;
        with_output(graph, y)
    };

    assert_eq!(lower(graph()?)?.device, "CPU");
    let gpu = CompileOptions::default().with_property("device", "gpu");
    assert_eq!(lower_with(graph()?, &gpu)?.device, "GPU");

    let driver = OpenVinoDriver::new()?;
    let tpu = CompileOptions::default().with_property("device", "TPU");
    let err = Session::compile(graph()?, &driver, &tpu).expect_err("unknown device");
    assert!(err.is_config());
    Ok(())
}

#[test]
fn lowered_model_survives_json_export() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 3])?);
    let w = graph.add_constant_f32(&[3, 2], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let y = graph.add_unary_output(
        OperationKind::MatMul,
        Attributes::MatMul {
            transpose_x: false,
            transpose_y: false,
        },
        &[x, w],
    )?;
    let z = graph.add_unary_output(OperationKind::Softmax, Attributes::Softmax { axis: -1 }, &[y])?;
    let program = lower(with_output(graph, z)?)?;

    let json = program.model.to_json()?;
    let back = OvModel::from_json(&json)?;
    assert_eq!(back, program.model);
    assert_eq!(back.op_types(), vec!["MatMul", "Softmax"]);
    let softmax = single_op("Softmax", &back)?;
    assert_eq!(softmax.attribute("axis"), Some(&AttrValue::Int(1)));
    Ok(())
}
