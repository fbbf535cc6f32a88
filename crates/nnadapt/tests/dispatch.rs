mod common;

use anyhow::Result;

use common::{convert_any, convert_nothing, RecordingContext, RecordingDriver};
use nnadapt::converter::{convert_graph, BackendDriver, ConverterContext, DriverTarget, RegistryBuilder};
use nnadapt::core::{Attributes, Graph, OperandType, OperationKind};
use nnadapt::{prepare_graph, register_converters, validate_graph, ConfigErrorCode, Error};

fn relu_exp_graph() -> Result<Graph> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 4])?);
    let r = graph.add_unary_output(OperationKind::Relu, Attributes::None, &[x])?;
    let e = graph.add_unary_output(OperationKind::Exp, Attributes::None, &[r])?;
    graph.mark_output(e)?;
    prepare_graph(&mut graph)?;
    Ok(graph)
}

#[test]
fn registering_the_same_converter_twice_is_a_no_op() -> Result<()> {
    let mut builder = RegistryBuilder::<RecordingContext>::new("recording");
    builder.register(OperationKind::Relu, "convert_any", convert_any)?;
    builder.register(OperationKind::Relu, "convert_any", convert_any)?;
    let err = builder
        .register(OperationKind::Relu, "convert_nothing", convert_nothing)
        .expect_err("a different converter for RELU");
    assert_eq!(err.config_code(), Some(ConfigErrorCode::DuplicateConverter));

    let registry = builder.build();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(OperationKind::Relu).map(|e| e.name), Some("convert_any"));
    Ok(())
}

#[test]
fn converter_table_macro_registers_every_row() -> Result<()> {
    let mut builder = RegistryBuilder::<RecordingContext>::new("recording");
    register_converters!(builder, {
        Relu => convert_any,
        Exp => common::convert_any,
        Squeeze => convert_any,
    })?;
    let registry = builder.build();
    assert_eq!(
        registry.kinds().collect::<Vec<_>>(),
        vec![OperationKind::Exp, OperationKind::Relu, OperationKind::Squeeze]
    );
    assert_eq!(
        registry.get(OperationKind::Exp).map(|e| e.name),
        Some("common::convert_any")
    );
    Ok(())
}

#[test]
fn every_validated_operation_is_dispatched_once_in_order() -> Result<()> {
    let graph = relu_exp_graph()?;
    let driver = RecordingDriver::all_kinds();
    assert!(validate_graph(&graph, &DriverTarget(&driver)).is_ok());

    let mut ctx = RecordingContext::default();
    convert_graph(driver.registry(), &mut ctx, &graph)?;
    assert_eq!(
        ctx.log,
        vec![
            "input %0 -> n1".to_string(),
            "RELU[1] -> [2]".to_string(),
            "EXP[2] -> [3]".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn missing_converter_is_unsupported_not_config() -> Result<()> {
    let graph = relu_exp_graph()?;
    let driver = RecordingDriver::with_kinds(&[OperationKind::Relu]);

    let report = validate_graph(&graph, &DriverTarget(&driver));
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, OperationKind::Exp);

    let mut ctx = RecordingContext::default();
    let err = convert_graph(driver.registry(), &mut ctx, &graph)
        .expect_err("EXP has no converter");
    assert!(err.is_unsupported());
    assert!(matches!(
        err,
        Error::Unsupported {
            kind: OperationKind::Exp,
            ..
        }
    ));
    Ok(())
}

#[test]
fn fan_out_consumers_share_one_node() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[3])?);
    let shared = graph.add_unary_output(OperationKind::Abs, Attributes::None, &[x])?;
    let a = graph.add_unary_output(OperationKind::Exp, Attributes::None, &[shared])?;
    let b = graph.add_unary_output(OperationKind::Log, Attributes::None, &[shared])?;
    let c = graph.add_unary_output(
        OperationKind::Add,
        Attributes::Elementwise {
            fuse_code: Default::default(),
        },
        &[shared, shared],
    )?;
    for out in [a, b, c] {
        graph.mark_output(out)?;
    }
    prepare_graph(&mut graph)?;
    assert_eq!(graph.consumers(shared).len(), 3);

    let driver = RecordingDriver::all_kinds();
    let mut ctx = RecordingContext::default();
    convert_graph(driver.registry(), &mut ctx, &graph)?;
    let shared_node = ctx.node(shared)?;
    assert_eq!(shared_node, 2);
    assert_eq!(ctx.log[2], "EXP[2] -> [3]");
    assert_eq!(ctx.log[3], "LOG[2] -> [4]");
    assert_eq!(ctx.log[4], "ADD[2, 2] -> [5]");

    let err = ctx.bind(shared, 99).expect_err("operand already lowered");
    assert_eq!(err.config_code(), Some(ConfigErrorCode::OperandAlreadyLowered));
    assert_eq!(ctx.node(shared)?, shared_node);
    Ok(())
}

#[test]
fn converter_that_leaves_an_output_unbound_fails() -> Result<()> {
    let graph = relu_exp_graph()?;
    let mut builder = RegistryBuilder::<RecordingContext>::new("recording");
    builder.register(OperationKind::Relu, "convert_nothing", convert_nothing)?;
    builder.register(OperationKind::Exp, "convert_any", convert_any)?;
    let registry = builder.build();

    let mut ctx = RecordingContext::default();
    let err = convert_graph(&registry, &mut ctx, &graph).expect_err("RELU output unbound");
    assert_eq!(err.config_code(), Some(ConfigErrorCode::OperandNotLowered));
    match err {
        Error::Config(config) => {
            assert_eq!(config.operation.map(|(_, kind)| kind), Some(OperationKind::Relu));
        }
        other => panic!("expected a config error, got {other}"),
    }
    Ok(())
}

#[test]
fn shared_registry_lowers_graphs_on_many_threads() -> Result<()> {
    let driver = RecordingDriver::all_kinds();
    let registry = driver.registry();
    let graphs = (0..8).map(|_| relu_exp_graph()).collect::<Result<Vec<_>>>()?;

    let logs = std::thread::scope(|scope| {
        let handles = graphs
            .iter()
            .map(|graph| {
                scope.spawn(move || -> nnadapt::Result<Vec<String>> {
                    let mut ctx = RecordingContext::default();
                    convert_graph(registry, &mut ctx, graph)?;
                    Ok(ctx.log)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("converter thread panicked"))
            .collect::<nnadapt::Result<Vec<_>>>()
    })?;

    assert_eq!(logs.len(), 8);
    assert!(logs.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}
