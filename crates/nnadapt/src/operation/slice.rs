use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation, SliceAttrs};
use crate::core::types::{Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::{compute_strides, unravel_index};
use crate::executor::HostTensor;
use crate::operation::utility::{input_type, resolve_axis};
use crate::{config_bail, config_ensure};

/// One sliced axis: first index, step and resulting extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub start: i64,
    pub step: i64,
    pub len: i64,
}

/// Clamps `start..end` by `step` against an axis of extent `dim`, with
/// negative indices counted from the end.
pub fn slice_range(dim: i64, start: i64, end: i64, step: i64) -> AxisRange {
    let wrap = |index: i64| if index < 0 { index + dim } else { index };
    if step > 0 {
        let begin = wrap(start).clamp(0, dim);
        let end = wrap(end).clamp(0, dim);
        let len = if end > begin { (end - begin + step - 1) / step } else { 0 };
        AxisRange { start: begin, step, len }
    } else {
        let begin = wrap(start).clamp(-1, dim - 1);
        let end = wrap(end).clamp(-1, dim - 1);
        let len = if begin > end { (begin - end - step - 1) / -step } else { 0 };
        AxisRange { start: begin, step, len }
    }
}

fn attrs_of(op: &Operation) -> Result<&SliceAttrs> {
    match &op.attrs {
        Attributes::Slice(attrs) => Ok(attrs),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    }
}

/// Per-axis `(axis, start, end, step)` after attribute checks.
fn resolved_axes(attrs: &SliceAttrs, rank: usize) -> Result<Vec<(usize, i64, i64, i64)>> {
    let count = attrs.axes.len();
    config_ensure!(
        attrs.starts.len() == count
            && attrs.ends.len() == count
            && (attrs.steps.is_empty() || attrs.steps.len() == count),
        ConfigErrorCode::InvalidAttributeValue,
        "slice attributes have mismatched lengths"
    );
    (0..count)
        .map(|i| {
            let axis = resolve_axis(attrs.axes[i], rank)?;
            let step = attrs.steps.get(i).copied().unwrap_or(1) as i64;
            config_ensure!(
                step != 0,
                ConfigErrorCode::InvalidAttributeValue,
                "slice step must be non-zero"
            );
            Ok((axis, attrs.starts[i] as i64, attrs.ends[i] as i64, step))
        })
        .collect()
}

pub fn slice_dims(dims: &[i32], attrs: &SliceAttrs) -> Result<Dims> {
    let mut out = Dims::from_slice(dims);
    for (axis, start, end, step) in resolved_axes(attrs, dims.len())? {
        if dims[axis] != UNKNOWN_DIMENSION {
            out[axis] = slice_range(dims[axis] as i64, start, end, step).len as i32;
        }
    }
    Ok(out)
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let attrs = attrs_of(op)?;
    let dimensions = input.dimensions.map_all(|dims| slice_dims(dims, attrs))?;
    Ok(input.with_dimensions(dimensions))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let input = inputs[0];
    let attrs = attrs_of(op)?;
    let shape = input.shape();
    let mut ranges = shape
        .iter()
        .map(|&dim| AxisRange {
            start: 0,
            step: 1,
            len: dim as i64,
        })
        .collect::<Vec<_>>();
    for (axis, start, end, step) in resolved_axes(attrs, shape.len())? {
        ranges[axis] = slice_range(shape[axis] as i64, start, end, step);
    }

    let out_shape = ranges.iter().map(|r| r.len as usize).collect::<Vec<_>>();
    let strides = compute_strides(shape);
    let count = out_shape.iter().product::<usize>();
    let indices = (0..count)
        .map(|index| {
            unravel_index(index, &out_shape)
                .iter()
                .zip(&ranges)
                .zip(&strides)
                .map(|((&coord, range), &stride)| {
                    (range.start + coord as i64 * range.step) as usize * stride
                })
                .sum()
        })
        .collect::<Vec<usize>>();
    HostTensor::new(out_shape, input.data().gather(&indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_and_wraps_indices() {
        assert_eq!(slice_range(10, 2, 7, 1).len, 5);
        assert_eq!(slice_range(10, -3, i32::MAX as i64, 1).len, 3);
        assert_eq!(slice_range(10, 0, 10, 3).len, 4);
        assert_eq!(slice_range(10, 5, 2, 1).len, 0);
    }

    #[test]
    fn negative_steps_walk_backwards() {
        let range = slice_range(5, -1, i32::MIN as i64, -1);
        assert_eq!(range, AxisRange { start: 4, step: -1, len: 5 });
        assert_eq!(slice_range(6, 4, 0, -2).len, 2);
    }

    #[test]
    fn keeps_unknown_extents() {
        let attrs = SliceAttrs {
            axes: vec![0, 1],
            starts: vec![0, 1],
            ends: vec![2, 3],
            steps: vec![],
        };
        assert_eq!(slice_dims(&[-1, 8], &attrs).unwrap().as_slice(), &[-1, 2]);
    }
}
