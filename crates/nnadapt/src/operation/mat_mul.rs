//! MAT_MUL with optional transposition of either operand, broadcast batch
//! axes and numpy-style promotion of 1-D operands.

use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::{broadcast_source_indices, to_usize_shape};
use crate::executor::HostTensor;
use crate::operation::utility::{
    broadcast_dims, dimensions_from, input_types, merge_extent, paired_alternatives,
    same_precision,
};
use crate::{config_bail, config_ensure};

fn flags_of(op: &Operation) -> Result<(bool, bool)> {
    match op.attrs {
        Attributes::MatMul {
            transpose_x,
            transpose_y,
        } => Ok((transpose_x, transpose_y)),
        _ => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs),
    }
}

/// Output shape of `x @ y` after transposition flags.
pub fn mat_mul_dims(x: &[i32], y: &[i32], transpose_x: bool, transpose_y: bool) -> Result<Dims> {
    config_ensure!(
        !x.is_empty() && !y.is_empty(),
        ConfigErrorCode::RankMismatch,
        "mat_mul operands must have rank >= 1"
    );
    let x_vector = x.len() == 1;
    let y_vector = y.len() == 1;
    let x2: Dims = if x_vector { Dims::from_slice(&[1, x[0]]) } else { Dims::from_slice(x) };
    let y2: Dims = if y_vector { Dims::from_slice(&[y[0], 1]) } else { Dims::from_slice(y) };
    let (xr, yr) = (x2.len(), y2.len());
    let (m, kx) = if transpose_x && !x_vector {
        (x2[xr - 1], x2[xr - 2])
    } else {
        (x2[xr - 2], x2[xr - 1])
    };
    let (ky, n) = if transpose_y && !y_vector {
        (y2[yr - 1], y2[yr - 2])
    } else {
        (y2[yr - 2], y2[yr - 1])
    };
    merge_extent(kx, ky)?;

    let mut out = broadcast_dims(&x2[..xr - 2], &y2[..yr - 2])?;
    if !x_vector {
        out.push(m);
    }
    if !y_vector {
        out.push(n);
    }
    Ok(out)
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let types = input_types(graph, op)?;
    same_precision(&types)?;
    let (x, y) = (types[0], types[1]);
    let (tx, ty) = flags_of(op)?;
    let data = mat_mul_dims(x.dims(), y.dims(), tx, ty)?;
    let mut alternatives = Vec::new();
    for index in 0..paired_alternatives(&[&x.dimensions, &y.dimensions])? {
        let xa = x.dimensions.alternative(index).unwrap_or(x.dims());
        let ya = y.dimensions.alternative(index).unwrap_or(y.dims());
        alternatives.push(mat_mul_dims(xa, ya, tx, ty)?);
    }
    Ok(x.with_dimensions(dimensions_from(&data, &alternatives)?))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let (x, y) = (inputs[0], inputs[1]);
    let (tx, ty) = flags_of(op)?;
    let xv = x.expect_f32("mat_mul")?;
    let yv = y.expect_f32("mat_mul")?;
    let out_shape = to_usize_shape(&mat_mul_dims(&x.dims(), &y.dims(), tx, ty)?)?;

    // Work on rank >= 2 views: [batch.., rows, cols].
    let promote = |shape: &[usize], vector_as_row: bool| -> Vec<usize> {
        match shape.len() {
            1 if vector_as_row => vec![1, shape[0]],
            1 => vec![shape[0], 1],
            _ => shape.to_vec(),
        }
    };
    let xs = promote(x.shape(), true);
    let ys = promote(y.shape(), false);
    let (xr, yr) = (xs.len(), ys.len());
    let x_batch = &xs[..xr - 2];
    let y_batch = &ys[..yr - 2];
    let batch_dims = to_usize_shape(&broadcast_dims(
        &x_batch.iter().map(|&d| d as i32).collect::<Vec<_>>(),
        &y_batch.iter().map(|&d| d as i32).collect::<Vec<_>>(),
    )?)?;
    let x_mat = (xs[xr - 2], xs[xr - 1]);
    let y_mat = (ys[yr - 2], ys[yr - 1]);
    let (m, k) = if tx && x.rank() > 1 { (x_mat.1, x_mat.0) } else { x_mat };
    let n = if ty && y.rank() > 1 { y_mat.0 } else { y_mat.1 };

    let x_batches = broadcast_source_indices(x_batch, &batch_dims);
    let y_batches = broadcast_source_indices(y_batch, &batch_dims);
    let mut out = Vec::with_capacity(x_batches.len() * m * n);
    for (&xb, &yb) in x_batches.iter().zip(&y_batches) {
        let xo = xb * x_mat.0 * x_mat.1;
        let yo = yb * y_mat.0 * y_mat.1;
        for i in 0..m {
            for j in 0..n {
                let mut acc = 0.0f32;
                for p in 0..k {
                    let xi = if tx && x.rank() > 1 { p * x_mat.1 + i } else { i * x_mat.1 + p };
                    let yi = if ty && y.rank() > 1 { j * y_mat.1 + p } else { p * y_mat.1 + j };
                    acc += xv[xo + xi] * yv[yo + yi];
                }
                out.push(acc);
            }
        }
    }
    HostTensor::from_f32(&out_shape, out)
}
