use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{DataLayout, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::compute_strides;
use crate::executor::HostTensor;
use crate::operation::utility::{check_rank, input_types, merge_extent, same_precision};
use crate::{config_bail, config_ensure};

fn channel_axis(ty: &OperandType) -> usize {
    match ty.layout {
        DataLayout::Nchw => 1,
        DataLayout::Nhwc => ty.rank() - 1,
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let types = input_types(graph, op)?;
    same_precision(&types)?;
    let input = types[0];
    config_ensure!(
        input.rank() >= 2,
        ConfigErrorCode::RankMismatch,
        "batch normalization input must have rank >= 2, got {}",
        input.rank()
    );
    let Attributes::BatchNormalization { epsilon } = op.attrs else {
        config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs);
    };
    config_ensure!(
        epsilon >= 0.0,
        ConfigErrorCode::InvalidAttributeValue,
        "epsilon must not be negative, got {}",
        epsilon
    );
    let channels = input.dims()[channel_axis(input)];
    for (ty, name) in types[1..].iter().zip(["scale", "bias", "mean", "variance"]) {
        check_rank(ty, 1, name)?;
        merge_extent(ty.dims()[0], channels)?;
    }
    Ok(input.clone())
}

pub(crate) fn execute(graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let Attributes::BatchNormalization { epsilon } = op.attrs else {
        config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs);
    };
    let input = inputs[0];
    let values = input.expect_f32("batch normalization")?;
    let params = inputs[1..]
        .iter()
        .map(|tensor| tensor.expect_f32("batch normalization"))
        .collect::<Result<Vec<_>>>()?;
    let (scale, bias, mean, variance) = (params[0], params[1], params[2], params[3]);

    let axis = channel_axis(graph.resolved_type(op.input(0))?);
    let channels = input.shape()[axis];
    config_ensure!(
        params.iter().all(|p| p.len() == channels),
        ConfigErrorCode::InvalidInput,
        "parameters must hold {} channels",
        channels
    );
    let stride = compute_strides(input.shape())[axis];
    let out = values
        .iter()
        .enumerate()
        .map(|(index, &x)| {
            let c = (index / stride) % channels;
            scale[c] * (x - mean[c]) / (variance[c] + epsilon).sqrt() + bias[c]
        })
        .collect();
    HostTensor::from_f32(input.shape(), out)
}
