use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::compute_strides;
use crate::executor::HostTensor;
use crate::operation::utility::{dimensions_from, input_type, resolve_axis};
use crate::{config_bail, config_ensure};

fn attrs_of(op: &Operation) -> Result<(i32, &[i32])> {
    match &op.attrs {
        Attributes::Split { axis, split } => Ok((*axis, split.as_slice())),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    }
}

fn check_sections(dims: &[i32], axis: usize, split: &[i32]) -> Result<()> {
    let total = split.iter().sum::<i32>();
    config_ensure!(
        dims[axis] == UNKNOWN_DIMENSION || dims[axis] == total,
        ConfigErrorCode::ShapeMismatch,
        "split sections {:?} sum to {}, axis {} has extent {}",
        split,
        total,
        axis,
        dims[axis]
    );
    Ok(())
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<Vec<OperandType>> {
    let input = input_type(graph, op, 0)?;
    let (axis, split) = attrs_of(op)?;
    let axis = resolve_axis(axis, input.rank())?;
    config_ensure!(
        split.len() == op.outputs.len(),
        ConfigErrorCode::ArityMismatch,
        "{} sections for {} outputs",
        split.len(),
        op.outputs.len()
    );
    config_ensure!(
        split.iter().all(|&s| s > 0),
        ConfigErrorCode::InvalidAttributeValue,
        "split sections {:?} must be positive",
        split
    );
    check_sections(input.dims(), axis, split)?;
    for alternative in input.dimensions.dynamic() {
        check_sections(alternative, axis, split)?;
    }

    split
        .iter()
        .map(|&section| {
            let with_section = |dims: &[i32]| {
                let mut out = Dims::from_slice(dims);
                out[axis] = section;
                out
            };
            let alternatives = input
                .dimensions
                .dynamic()
                .map(with_section)
                .collect::<Vec<_>>();
            Ok(input.with_dimensions(dimensions_from(&with_section(input.dims()), &alternatives)?))
        })
        .collect()
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
    let input = inputs[0];
    let (axis, split) = attrs_of(op)?;
    let axis = resolve_axis(axis, input.rank())?;
    check_sections(&input.dims(), axis, split)?;

    let shape = input.shape();
    let strides = compute_strides(shape);
    let outer = shape[..axis].iter().product::<usize>();
    let inner = strides[axis];
    let mut offset = 0usize;
    let mut outputs = Vec::with_capacity(split.len());
    for &section in split {
        let section = section as usize;
        let mut indices = Vec::with_capacity(outer * section * inner);
        for o in 0..outer {
            let base = o * shape[axis] * inner + offset * inner;
            indices.extend(base..base + section * inner);
        }
        let mut out_shape = shape.to_vec();
        out_shape[axis] = section;
        outputs.push(HostTensor::new(out_shape, input.data().gather(&indices))?);
        offset += section;
    }
    Ok(outputs)
}
