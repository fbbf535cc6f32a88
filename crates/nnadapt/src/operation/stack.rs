//! STACK joins `n` equally shaped inputs along a new axis.
//!
//! Inference only: the host executor never runs STACK, backends lower it.

use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::operation::utility::{input_types, merge_extent, resolve_axis, same_precision};
use crate::{config_bail, config_ensure};

/// Inserts an axis of extent `count` at `axis`, which indexes the output
/// shape (`-1` appends).
pub fn stack_dims(dims: &[i32], axis: usize, count: usize) -> Dims {
    let mut out = Dims::with_capacity(dims.len() + 1);
    out.extend_from_slice(&dims[..axis]);
    out.push(count as i32);
    out.extend_from_slice(&dims[axis..]);
    out
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let types = input_types(graph, op)?;
    same_precision(&types)?;
    let Attributes::Stack { axis } = op.attrs else {
        config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs);
    };
    let first = types[0];
    for ty in &types[1..] {
        config_ensure!(
            ty.rank() == first.rank(),
            ConfigErrorCode::RankMismatch,
            "stacked inputs have ranks {} and {}",
            first.rank(),
            ty.rank()
        );
        for (&a, &b) in first.dims().iter().zip(ty.dims()) {
            merge_extent(a, b)?;
        }
    }
    let axis = resolve_axis(axis, first.rank() + 1)?;
    let count = types.len();
    let dimensions = first
        .dimensions
        .map_all(|dims| Ok(stack_dims(dims, axis, count)))?;
    Ok(first.with_dimensions(dimensions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_the_input_count() {
        assert_eq!(stack_dims(&[1, 3, 1, 5], 0, 3).as_slice(), &[3, 1, 3, 1, 5]);
        assert_eq!(stack_dims(&[2, 4], 2, 5).as_slice(), &[2, 4, 5]);
        assert_eq!(stack_dims(&[2, 4], 1, 2).as_slice(), &[2, 2, 4]);
    }
}
