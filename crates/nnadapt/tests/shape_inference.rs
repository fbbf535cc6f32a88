use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nnadapt::core::{
    Attributes, DType, Dimensions, Graph, OperandType, OperationId, OperationKind, QuantParams,
};
use nnadapt::{prepare_graph, prepare_operation, ConfigErrorCode};

fn squeeze(dims: &[i32], axes: &[i32]) -> nnadapt::Result<Vec<i32>> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(dims)?);
    let y = graph.add_unary_output(
        OperationKind::Squeeze,
        Attributes::Squeeze {
            axes: axes.to_vec(),
        },
        &[x],
    )?;
    prepare_graph(&mut graph)?;
    Ok(graph.resolved_type(y)?.dims().to_vec())
}

#[test]
fn squeeze_cases() -> Result<()> {
    assert_eq!(squeeze(&[1, 3, 1, 5], &[])?, vec![3, 5]);
    assert_eq!(squeeze(&[1, 3, 1, 5], &[0])?, vec![3, 1, 5]);
    assert_eq!(squeeze(&[1, 3, 1, 5], &[-2, 0])?, vec![3, 5]);
    Ok(())
}

#[test]
fn squeeze_of_non_unit_axis_names_the_operation() {
    let err = squeeze(&[1, 3, 1, 5], &[1]).expect_err("axis 1 has extent 3");
    assert!(err.is_config());
    assert_eq!(err.config_code(), Some(ConfigErrorCode::DimensionNotOne));
    match err {
        nnadapt::Error::Config(config) => {
            assert_eq!(config.operation, Some((OperationId(0), OperationKind::Squeeze)));
        }
        other => panic!("expected a config error, got {other}"),
    }
}

#[test]
fn squeeze_keeps_quant_params_and_alternatives() -> Result<()> {
    let quant = QuantParams::PerTensor {
        scale: 0.25,
        zero_point: 3,
    };
    let ty = OperandType::new(
        DType::QuantUInt8AsymmPerLayer,
        Dimensions::with_dynamic(&[1, -1, 4], &[&[1, 2, 4], &[1, 7, 4]])?,
    )
    .with_quant(quant.clone());
    let mut graph = Graph::new();
    let x = graph.add_input(ty);
    let y = graph.add_unary_output(
        OperationKind::Squeeze,
        Attributes::Squeeze { axes: vec![0] },
        &[x],
    )?;
    prepare_graph(&mut graph)?;

    let out = graph.resolved_type(y)?;
    assert_eq!(out.precision, DType::QuantUInt8AsymmPerLayer);
    assert_eq!(out.quant, Some(quant));
    assert_eq!(out.dims(), &[-1, 4]);
    assert_eq!(out.dimensions.alternative(0), Some(&[2, 4][..]));
    assert_eq!(out.dimensions.alternative(1), Some(&[7, 4][..]));
    Ok(())
}

#[test]
fn stack_adds_one_axis_to_every_alternative() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..64 {
        let rank = rng.gen_range(1..=5usize);
        let dims = (0..rank).map(|_| rng.gen_range(1..=4)).collect::<Vec<i32>>();
        let alternatives = (0..rng.gen_range(0..=3usize))
            .map(|_| (0..rank).map(|_| rng.gen_range(1..=6)).collect::<Vec<i32>>())
            .collect::<Vec<_>>();
        let mut static_dims = dims.clone();
        if !alternatives.is_empty() {
            static_dims[0] = -1;
        }
        let alternative_refs = alternatives.iter().map(Vec::as_slice).collect::<Vec<_>>();
        let ty = OperandType::new(
            DType::Float32,
            Dimensions::with_dynamic(&static_dims, &alternative_refs)?,
        );

        let count = rng.gen_range(1..=4usize);
        let axis = rng.gen_range(-(rank as i32 + 1)..=rank as i32);
        let mut graph = Graph::new();
        let inputs = (0..count).map(|_| graph.add_input(ty.clone())).collect::<Vec<_>>();
        let y = graph.add_unary_output(OperationKind::Stack, Attributes::Stack { axis }, &inputs)?;
        prepare_graph(&mut graph)?;

        let out = graph.resolved_type(y)?;
        let at = if axis < 0 { axis + rank as i32 + 1 } else { axis } as usize;
        assert_eq!(out.rank(), rank + 1);
        assert_eq!(out.dims()[at], count as i32);
        assert_eq!(out.dimensions.dynamic_count(), alternatives.len());
        for (index, alternative) in alternatives.iter().enumerate() {
            let mut expected = alternative.clone();
            expected.insert(at, count as i32);
            assert_eq!(out.dimensions.alternative(index), Some(expected.as_slice()));
        }
    }
    Ok(())
}

#[test]
fn stack_of_three_unit_tensors() -> Result<()> {
    let mut graph = Graph::new();
    let ty = OperandType::float32(&[1, 3, 1, 5])?;
    let inputs = (0..3).map(|_| graph.add_input(ty.clone())).collect::<Vec<_>>();
    let y = graph.add_unary_output(OperationKind::Stack, Attributes::Stack { axis: 0 }, &inputs)?;
    prepare_graph(&mut graph)?;
    assert_eq!(graph.resolved_type(y)?.dims(), &[3, 1, 3, 1, 5]);
    Ok(())
}

#[test]
fn prepare_out_of_order_is_rejected() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 2])?);
    let a = graph.add_unary_output(OperationKind::Relu, Attributes::None, &[x])?;
    graph.add_unary_output(OperationKind::Exp, Attributes::None, &[a])?;

    let err = prepare_operation(&mut graph, OperationId(1)).expect_err("input of #1 is unresolved");
    assert_eq!(err.config_code(), Some(ConfigErrorCode::OperandNotResolved));

    prepare_operation(&mut graph, OperationId(0))?;
    prepare_operation(&mut graph, OperationId(1))?;
    assert!(graph.is_fully_resolved());
    Ok(())
}

#[test]
fn chained_inference_through_mixed_kinds() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.add_input(OperandType::float32(&[2, 3, 4])?);
    let bias = graph.add_constant_f32(&[4], &[0.0, 1.0, 2.0, 3.0])?;
    let sum = graph.add_unary_output(
        OperationKind::Add,
        Attributes::Elementwise {
            fuse_code: Default::default(),
        },
        &[x, bias],
    )?;
    let t = graph.add_unary_output(
        OperationKind::Transpose,
        Attributes::Transpose { perm: vec![2, 0, 1] },
        &[sum],
    )?;
    let flat = graph.add_unary_output(
        OperationKind::Flatten,
        Attributes::Flatten {
            start_axis: 1,
            end_axis: -1,
        },
        &[t],
    )?;
    let parts = graph.add_operation(
        OperationKind::Split,
        Attributes::Split {
            axis: 1,
            split: vec![2, 4],
        },
        &[flat],
        2,
    )?;
    let mask = graph.add_unary_output(OperationKind::GreaterEqual, Attributes::Comparison, &[parts[0], parts[0]])?;
    prepare_graph(&mut graph)?;

    assert_eq!(graph.resolved_type(t)?.dims(), &[4, 2, 3]);
    assert_eq!(graph.resolved_type(flat)?.dims(), &[4, 6]);
    assert_eq!(graph.resolved_type(parts[0])?.dims(), &[4, 2]);
    assert_eq!(graph.resolved_type(parts[1])?.dims(), &[4, 4]);
    assert_eq!(graph.resolved_type(mask)?.precision, DType::Bool8);
    Ok(())
}

#[test]
fn cast_changes_only_the_precision() -> Result<()> {
    let mut graph = Graph::new();
    let ty = OperandType::new(DType::QuantInt8SymmPerLayer, Dimensions::new(&[2, 3])?).with_quant(
        QuantParams::PerTensor {
            scale: 0.5,
            zero_point: 0,
        },
    );
    let x = graph.add_input(ty);
    let y = graph.add_unary_output(
        OperationKind::Cast,
        Attributes::Cast {
            dtype: DType::Float32,
        },
        &[x],
    )?;
    prepare_graph(&mut graph)?;
    let out = graph.resolved_type(y)?;
    assert_eq!(out.precision, DType::Float32);
    assert_eq!(out.quant, None);
    assert_eq!(out.dims(), &[2, 3]);
    Ok(())
}
