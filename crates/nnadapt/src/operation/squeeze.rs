use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dimensions, Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::HostTensor;
use crate::operation::utility::{input_type, resolve_axis};
use crate::{config_bail, config_ensure};

/// Resolves the axes SQUEEZE removes, sorted and de-duplicated.
///
/// With no requested axes every axis of static extent 1 is removed. A
/// requested axis must have extent 1; an unknown static extent is accepted
/// when every dynamic alternative has extent 1 there.
pub fn squeeze_axes(dimensions: &Dimensions, axes: &[i32]) -> Result<Vec<usize>> {
    let dims = dimensions.data();
    if axes.is_empty() {
        return Ok(dims
            .iter()
            .enumerate()
            .filter(|(_, &extent)| extent == 1)
            .map(|(axis, _)| axis)
            .collect());
    }
    let mut resolved = Vec::with_capacity(axes.len());
    for &axis in axes {
        let axis = resolve_axis(axis, dims.len())?;
        let extent = dims[axis];
        let squeezable = extent == 1
            || (extent == UNKNOWN_DIMENSION
                && dimensions.dynamic().all(|alternative| alternative[axis] == 1));
        config_ensure!(
            squeezable,
            ConfigErrorCode::DimensionNotOne,
            "axis {} has extent {}",
            axis,
            extent
        );
        resolved.push(axis);
    }
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

/// Drops `axes` (sorted, in range) from `dims`, keeping the order of the rest.
pub fn squeeze_dims(dims: &[i32], axes: &[usize]) -> Dims {
    dims.iter()
        .enumerate()
        .filter(|(axis, _)| axes.binary_search(axis).is_err())
        .map(|(_, &extent)| extent)
        .collect()
}

fn requested_axes(op: &Operation) -> Result<&[i32]> {
    match &op.attrs {
        Attributes::Squeeze { axes } => Ok(axes.as_slice()),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let axes = squeeze_axes(&input.dimensions, requested_axes(op)?)?;
    let dimensions = input
        .dimensions
        .map_all(|dims| Ok(squeeze_dims(dims, &axes)))?;
    Ok(input.with_dimensions(dimensions))
}

pub(crate) fn execute(graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let input = inputs[0];
    // Axes come from the static type so the runtime rank matches the prepared one.
    let axes = squeeze_axes(
        &graph.resolved_type(op.input(0))?.dimensions,
        requested_axes(op)?,
    )?;
    for &axis in &axes {
        config_ensure!(
            input.shape().get(axis) == Some(&1),
            ConfigErrorCode::InvalidInput,
            "runtime extent of axis {} in {:?} is not 1",
            axis,
            input.shape()
        );
    }
    let dims = squeeze_dims(&input.dims(), &axes);
    input.reshaped(dims.iter().map(|&d| d as usize).collect())
}
