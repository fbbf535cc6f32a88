use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::{compute_strides, unravel_index};
use crate::executor::HostTensor;
use crate::operation::utility::input_type;
use crate::{config_bail, config_ensure};

/// Validates `perm` against `rank`; an empty permutation reverses the axes.
pub fn resolve_perm(perm: &[i32], rank: usize) -> Result<Vec<usize>> {
    if perm.is_empty() {
        return Ok((0..rank).rev().collect());
    }
    config_ensure!(
        perm.len() == rank,
        ConfigErrorCode::RankMismatch,
        "permutation {:?} does not cover rank {}",
        perm,
        rank
    );
    let mut seen = vec![false; rank];
    let mut out = Vec::with_capacity(rank);
    for &axis in perm {
        let resolved = crate::operation::utility::resolve_axis(axis, rank)?;
        config_ensure!(
            !seen[resolved],
            ConfigErrorCode::InvalidAttributeValue,
            "{:?} is not a permutation",
            perm
        );
        seen[resolved] = true;
        out.push(resolved);
    }
    Ok(out)
}

fn perm_of(op: &Operation) -> Result<&[i32]> {
    match &op.attrs {
        Attributes::Transpose { perm } => Ok(perm.as_slice()),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let perm = resolve_perm(perm_of(op)?, input.rank())?;
    let dimensions = input
        .dimensions
        .map_all(|dims| Ok(perm.iter().map(|&axis| dims[axis]).collect::<Dims>()))?;
    Ok(input.with_dimensions(dimensions))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let input = inputs[0];
    let perm = resolve_perm(perm_of(op)?, input.rank())?;
    let in_strides = compute_strides(input.shape());
    let out_shape = perm.iter().map(|&axis| input.shape()[axis]).collect::<Vec<_>>();
    let count = out_shape.iter().product::<usize>();
    let indices = (0..count)
        .map(|index| {
            unravel_index(index, &out_shape)
                .iter()
                .zip(&perm)
                .map(|(&coord, &axis)| coord * in_strides[axis])
                .sum()
        })
        .collect::<Vec<usize>>();
    HostTensor::new(out_shape, input.data().gather(&indices))
}
