use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::{HostTensor, TensorData};
use crate::operation::utility::{
    dimensions_from, input_types, merge_extent, paired_alternatives, resolve_axis, same_precision,
};
use crate::{config_bail, config_ensure};

fn axis_of(op: &Operation) -> Result<i32> {
    match op.attrs {
        Attributes::Concat { axis } => Ok(axis),
        _ => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs),
    }
}

/// Joins shapes along `axis`; every other extent must agree.
pub fn concat_dims(shapes: &[&[i32]], axis: usize) -> Result<Dims> {
    let mut out = Dims::from_slice(shapes[0]);
    for shape in &shapes[1..] {
        config_ensure!(
            shape.len() == out.len(),
            ConfigErrorCode::RankMismatch,
            "cannot concatenate rank {} with rank {}",
            shape.len(),
            out.len()
        );
        for (i, &extent) in shape.iter().enumerate() {
            if i == axis {
                out[i] = if out[i] == UNKNOWN_DIMENSION || extent == UNKNOWN_DIMENSION {
                    UNKNOWN_DIMENSION
                } else {
                    match out[i].checked_add(extent) {
                        Some(sum) => sum,
                        None => config_bail!(
                            ConfigErrorCode::ShapeMismatch,
                            "concatenated extent {} + {} overflows i32",
                            out[i],
                            extent
                        ),
                    }
                };
            } else {
                out[i] = merge_extent(out[i], extent)?;
            }
        }
    }
    Ok(out)
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let types = input_types(graph, op)?;
    same_precision(&types)?;
    let axis = resolve_axis(axis_of(op)?, types[0].rank())?;
    let statics = types.iter().map(|ty| ty.dims()).collect::<Vec<_>>();
    let data = concat_dims(&statics, axis)?;

    let all = types.iter().map(|ty| &ty.dimensions).collect::<Vec<_>>();
    let mut alternatives = Vec::new();
    for index in 0..paired_alternatives(&all)? {
        let shapes = all
            .iter()
            .map(|d| d.alternative(index).unwrap_or(d.data()))
            .collect::<Vec<_>>();
        alternatives.push(concat_dims(&shapes, axis)?);
    }
    Ok(types[0].with_dimensions(dimensions_from(&data, &alternatives)?))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let axis = resolve_axis(axis_of(op)?, inputs[0].rank())?;
    let shapes = inputs.iter().map(|t| t.dims()).collect::<Vec<_>>();
    let slices = shapes.iter().map(|s| s.as_slice()).collect::<Vec<_>>();
    let out_dims = concat_dims(&slices, axis)?;
    let shape = out_dims.iter().map(|&d| d as usize).collect::<Vec<_>>();

    let outer = shape[..axis].iter().product::<usize>();
    let inner = shape[axis + 1..].iter().product::<usize>();
    let chunks = inputs
        .iter()
        .map(|t| t.shape()[axis] * inner)
        .collect::<Vec<_>>();
    let parts = inputs.iter().map(|t| t.data()).collect::<Vec<_>>();
    let data = TensorData::interleave(&parts, &chunks, outer)?;
    HostTensor::new(shape, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_the_joined_axis() {
        let out = concat_dims(&[&[2, 3], &[2, 5], &[2, -1]], 1).unwrap();
        assert_eq!(out.as_slice(), &[2, -1]);
        let out = concat_dims(&[&[2, 3], &[2, 5]], 1).unwrap();
        assert_eq!(out.as_slice(), &[2, 8]);
        let err = concat_dims(&[&[2, 3], &[4, 5]], 1).expect_err("leading extents differ");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
    }

    #[test]
    fn overflowing_axis_sum_is_a_config_error() {
        let err = concat_dims(&[&[1, i32::MAX], &[1, 1]], 1).expect_err("sum exceeds i32");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
    }
}
