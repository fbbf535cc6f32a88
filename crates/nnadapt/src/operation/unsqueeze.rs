use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::HostTensor;
use crate::operation::utility::{input_type, resolve_axis};
use crate::{config_bail, config_ensure};

/// Inserts unit axes; `axes` index the output shape.
pub fn unsqueeze_dims(dims: &[i32], axes: &[i32]) -> Result<Dims> {
    config_ensure!(
        !axes.is_empty(),
        ConfigErrorCode::InvalidAttributeValue,
        "unsqueeze needs at least one axis"
    );
    let out_rank = dims.len() + axes.len();
    let mut resolved = axes
        .iter()
        .map(|&axis| resolve_axis(axis, out_rank))
        .collect::<Result<Vec<_>>>()?;
    resolved.sort_unstable();
    let before = resolved.len();
    resolved.dedup();
    config_ensure!(
        resolved.len() == before,
        ConfigErrorCode::InvalidAxis,
        "axes {:?} repeat an output position",
        axes
    );

    let mut source = dims.iter();
    let mut out = Dims::with_capacity(out_rank);
    for axis in 0..out_rank {
        if resolved.binary_search(&axis).is_ok() {
            out.push(1);
        } else if let Some(&extent) = source.next() {
            out.push(extent);
        }
    }
    Ok(out)
}

fn axes_of(op: &Operation) -> Result<&[i32]> {
    match &op.attrs {
        Attributes::Unsqueeze { axes } => Ok(axes.as_slice()),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let axes = axes_of(op)?;
    let dimensions = input
        .dimensions
        .map_all(|dims| unsqueeze_dims(dims, axes))?;
    Ok(input.with_dimensions(dimensions))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let dims = unsqueeze_dims(&inputs[0].dims(), axes_of(op)?)?;
    inputs[0].reshaped(dims.iter().map(|&d| d as usize).collect())
}
