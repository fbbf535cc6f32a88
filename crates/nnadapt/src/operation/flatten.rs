use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::HostTensor;
use crate::operation::utility::{input_type, product_or_unknown, resolve_axis};
use crate::{config_bail, config_ensure};

/// Collapses `start..=end` into one axis. A scalar flattens to `[1]`.
pub fn flatten_dims(dims: &[i32], start_axis: i32, end_axis: i32) -> Result<Dims> {
    if dims.is_empty() {
        return Ok(Dims::from_slice(&[1]));
    }
    let start = resolve_axis(start_axis, dims.len())?;
    let end = resolve_axis(end_axis, dims.len())?;
    config_ensure!(
        start <= end,
        ConfigErrorCode::InvalidAxis,
        "start axis {} is after end axis {}",
        start,
        end
    );
    let mut out = Dims::from_slice(&dims[..start]);
    out.push(product_or_unknown(&dims[start..=end])?);
    out.extend_from_slice(&dims[end + 1..]);
    Ok(out)
}

fn axes_of(op: &Operation) -> Result<(i32, i32)> {
    match op.attrs {
        Attributes::Flatten {
            start_axis,
            end_axis,
        } => Ok((start_axis, end_axis)),
        _ => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let (start, end) = axes_of(op)?;
    let dimensions = input
        .dimensions
        .map_all(|dims| flatten_dims(dims, start, end))?;
    Ok(input.with_dimensions(dimensions))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let (start, end) = axes_of(op)?;
    let dims = flatten_dims(&inputs[0].dims(), start, end)?;
    inputs[0].reshaped(dims.iter().map(|&d| d as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_inner_range() {
        assert_eq!(flatten_dims(&[2, 3, 4, 5], 1, 2).unwrap().as_slice(), &[2, 12, 5]);
        assert_eq!(flatten_dims(&[2, 3, 4, 5], 1, -1).unwrap().as_slice(), &[2, 60]);
        assert_eq!(flatten_dims(&[-1, 3, 4], 0, 1).unwrap().as_slice(), &[-1, 4]);
        assert!(flatten_dims(&[2, 3], 1, 0).is_err());
    }

    #[test]
    fn overflowing_element_count_is_a_config_error() {
        let err = flatten_dims(&[65536, 65536], 0, 1).expect_err("2^32 does not fit in i32");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
    }
}
