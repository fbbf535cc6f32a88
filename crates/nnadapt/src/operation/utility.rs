//! Shape helpers shared by the per-kind inference routines.

use crate::core::graph::Graph;
use crate::core::operation::{AutoPad, Operation};
use crate::core::types::{Dimensions, Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::{config_bail, config_ensure};

/// Maps a possibly negative axis into `0..rank`.
pub fn resolve_axis(axis: i32, rank: usize) -> Result<usize> {
    let rank_i = rank as i32;
    let resolved = if axis < 0 { axis + rank_i } else { axis };
    config_ensure!(
        (0..rank_i).contains(&resolved),
        ConfigErrorCode::InvalidAxis,
        "axis {} is out of range for rank {}",
        axis,
        rank
    );
    Ok(resolved as usize)
}

/// Resolved input types of an operation, in input order.
pub(crate) fn input_types<'g>(graph: &'g Graph, op: &Operation) -> Result<Vec<&'g OperandType>> {
    op.inputs
        .iter()
        .map(|id| graph.resolved_type(*id))
        .collect()
}

pub(crate) fn input_type<'g>(graph: &'g Graph, op: &Operation, index: usize) -> Result<&'g OperandType> {
    graph.resolved_type(op.input(index))
}

pub(crate) fn same_precision(types: &[&OperandType]) -> Result<()> {
    if let Some(first) = types.first() {
        for ty in &types[1..] {
            config_ensure!(
                ty.precision == first.precision,
                ConfigErrorCode::DTypeMismatch,
                "{:?} does not match {:?}",
                ty.precision,
                first.precision
            );
        }
    }
    Ok(())
}

/// Merges two extents that must describe the same axis.
pub(crate) fn merge_extent(a: i32, b: i32) -> Result<i32> {
    if a == UNKNOWN_DIMENSION {
        return Ok(b);
    }
    if b == UNKNOWN_DIMENSION || a == b {
        return Ok(a);
    }
    config_bail!(ConfigErrorCode::ShapeMismatch, "extent {} does not match {}", a, b)
}

/// Numpy-style broadcast of two static shapes; unknown extents stay unknown
/// unless the other side pins them.
pub fn broadcast_dims(a: &[i32], b: &[i32]) -> Result<Dims> {
    let rank = a.len().max(b.len());
    let mut out = Dims::from_elem(1, rank);
    for i in 0..rank {
        let lhs = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let rhs = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (lhs, rhs) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            (UNKNOWN_DIMENSION, y) => y,
            (x, UNKNOWN_DIMENSION) => x,
            (x, y) => config_bail!(
                ConfigErrorCode::ShapeMismatch,
                "cannot broadcast {:?} with {:?} (extent {} vs {})",
                a,
                b,
                x,
                y
            ),
        };
    }
    Ok(out)
}

/// Broadcasts the static shapes and the dynamic alternatives. Alternatives
/// pair by index; an operand without alternatives contributes its static shape.
pub fn broadcast_dimensions(a: &Dimensions, b: &Dimensions) -> Result<Dimensions> {
    let data = broadcast_dims(a.data(), b.data())?;
    let mut out = Dimensions::new(&data)?;
    for index in 0..paired_alternatives(&[a, b])? {
        let lhs = a.alternative(index).unwrap_or(a.data());
        let rhs = b.alternative(index).unwrap_or(b.data());
        out.push_alternative(&broadcast_dims(lhs, rhs)?)?;
    }
    Ok(out)
}

/// Number of alternatives shared by a set of operands that are combined
/// element by element; every operand has either none or the same count.
pub(crate) fn paired_alternatives(dims: &[&Dimensions]) -> Result<usize> {
    let count = dims.iter().map(|d| d.dynamic_count()).max().unwrap_or(0);
    for d in dims {
        config_ensure!(
            d.dynamic_count() == 0 || d.dynamic_count() == count,
            ConfigErrorCode::ShapeMismatch,
            "operands carry {} and {} dynamic alternatives",
            d.dynamic_count(),
            count
        );
    }
    Ok(count)
}

/// Builds `Dimensions` from a static shape and per-alternative shapes.
pub(crate) fn dimensions_from(data: &[i32], alternatives: &[Dims]) -> Result<Dimensions> {
    let mut out = Dimensions::new(data)?;
    for alternative in alternatives {
        out.push_alternative(alternative)?;
    }
    Ok(out)
}

pub(crate) fn product_or_unknown(dims: &[i32]) -> Result<i32> {
    if dims.iter().any(|&d| d == UNKNOWN_DIMENSION) {
        return Ok(UNKNOWN_DIMENSION);
    }
    match dims.iter().try_fold(1i32, |acc, &d| acc.checked_mul(d)) {
        Some(product) => Ok(product),
        None => config_bail!(
            ConfigErrorCode::ShapeMismatch,
            "element count of {:?} overflows i32",
            dims
        ),
    }
}

/// Begin/end padding of one spatial axis after applying the auto-pad policy.
pub fn resolve_padding(
    auto_pad: AutoPad,
    explicit: (i32, i32),
    input: i32,
    kernel: i32,
    stride: i32,
    dilation: i32,
) -> (i32, i32) {
    match auto_pad {
        AutoPad::Explicit => explicit,
        AutoPad::Valid => (0, 0),
        AutoPad::Same => {
            if input == UNKNOWN_DIMENSION {
                return (0, 0);
            }
            let effective = dilation * (kernel - 1) + 1;
            let output = (input + stride - 1) / stride;
            let total = ((output - 1) * stride + effective - input).max(0);
            (total / 2, total - total / 2)
        }
    }
}

/// Rejects a computed spatial extent that leaves no output element.
fn positive_extent(extent: i32, input: i32, kernel: i32) -> Result<i32> {
    config_ensure!(
        extent >= 1,
        ConfigErrorCode::ShapeMismatch,
        "window of extent {} over input extent {} yields output extent {}",
        kernel,
        input,
        extent
    );
    Ok(extent)
}

/// Spatial output extent of a convolution or pooling window.
pub fn conv_output_size(
    auto_pad: AutoPad,
    pads: (i32, i32),
    input: i32,
    kernel: i32,
    stride: i32,
    dilation: i32,
    ceil_mode: bool,
) -> Result<i32> {
    if input == UNKNOWN_DIMENSION || kernel == UNKNOWN_DIMENSION {
        return Ok(UNKNOWN_DIMENSION);
    }
    if auto_pad == AutoPad::Same {
        return positive_extent((input + stride - 1) / stride, input, kernel);
    }
    let (begin, end) = resolve_padding(auto_pad, pads, input, kernel, stride, dilation);
    let effective = dilation * (kernel - 1) + 1;
    let span = input + begin + end - effective;
    config_ensure!(
        span >= 0,
        ConfigErrorCode::ShapeMismatch,
        "window of extent {} exceeds padded input extent {}",
        effective,
        input + begin + end
    );
    let extent = if ceil_mode {
        (span + stride - 1) / stride + 1
    } else {
        span / stride + 1
    };
    positive_extent(extent, input, kernel)
}

/// Spatial output extent of a transposed convolution.
pub fn conv_transpose_output_size(
    auto_pad: AutoPad,
    pads: (i32, i32),
    input: i32,
    kernel: i32,
    stride: i32,
    dilation: i32,
    output_padding: i32,
) -> Result<i32> {
    if input == UNKNOWN_DIMENSION || kernel == UNKNOWN_DIMENSION {
        return Ok(UNKNOWN_DIMENSION);
    }
    let extent = match auto_pad {
        AutoPad::Same => input * stride,
        _ => {
            let (begin, end) = if auto_pad == AutoPad::Valid { (0, 0) } else { pads };
            (input - 1) * stride - begin - end + dilation * (kernel - 1) + output_padding + 1
        }
    };
    positive_extent(extent, input, kernel)
}

pub(crate) fn check_rank(ty: &OperandType, expected: usize, what: &str) -> Result<()> {
    config_ensure!(
        ty.rank() == expected,
        ConfigErrorCode::RankMismatch,
        "{} must have rank {}, got {}",
        what,
        expected,
        ty.rank()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_axis_handles_negative_values() {
        assert_eq!(resolve_axis(-1, 4).unwrap(), 3);
        assert_eq!(resolve_axis(0, 4).unwrap(), 0);
        let err = resolve_axis(4, 4).expect_err("axis 4 is out of range");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::InvalidAxis));
        assert!(resolve_axis(-5, 4).is_err());
    }

    #[test]
    fn broadcast_aligns_trailing_axes() {
        assert_eq!(broadcast_dims(&[2, 3, 4], &[4]).unwrap().as_slice(), &[2, 3, 4]);
        assert_eq!(broadcast_dims(&[2, 1], &[1, 5]).unwrap().as_slice(), &[2, 5]);
        assert_eq!(broadcast_dims(&[-1, 3], &[2, 3]).unwrap().as_slice(), &[2, 3]);
        assert_eq!(broadcast_dims(&[-1, 3], &[1, 3]).unwrap().as_slice(), &[-1, 3]);
        let err = broadcast_dims(&[2, 3], &[4, 3]).expect_err("2 vs 4");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
    }

    #[test]
    fn broadcast_pairs_alternatives_by_index() {
        let a = Dimensions::with_dynamic(&[-1, 4], &[&[1, 4], &[8, 4]]).unwrap();
        let b = Dimensions::new(&[4]).unwrap();
        let out = broadcast_dimensions(&a, &b).unwrap();
        assert_eq!(out.data(), &[-1, 4]);
        assert_eq!(out.alternative(0), Some(&[1, 4][..]));
        assert_eq!(out.alternative(1), Some(&[8, 4][..]));
    }

    #[test]
    fn conv_output_sizes() {
        assert_eq!(conv_output_size(AutoPad::Explicit, (1, 1), 224, 3, 2, 1, false).unwrap(), 112);
        assert_eq!(conv_output_size(AutoPad::Valid, (5, 5), 7, 3, 1, 1, false).unwrap(), 5);
        assert_eq!(conv_output_size(AutoPad::Same, (0, 0), 7, 3, 2, 1, false).unwrap(), 4);
        assert_eq!(conv_output_size(AutoPad::Explicit, (0, 0), 5, 2, 2, 1, true).unwrap(), 3);
        assert_eq!(conv_output_size(AutoPad::Explicit, (0, 0), -1, 3, 1, 1, false).unwrap(), -1);
        assert_eq!(
            conv_transpose_output_size(AutoPad::Explicit, (1, 1), 4, 3, 2, 1, 1).unwrap(),
            8
        );
    }

    #[test]
    fn window_larger_than_input_is_rejected() {
        let err = conv_output_size(AutoPad::Explicit, (0, 0), 3, 5, 1, 1, false)
            .expect_err("5-wide window over 3 elements");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
        let err = conv_output_size(AutoPad::Valid, (0, 0), 2, 5, 1, 1, true)
            .expect_err("valid padding adds nothing");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
        // padding can make up the difference
        assert_eq!(conv_output_size(AutoPad::Explicit, (1, 1), 3, 5, 1, 1, false).unwrap(), 1);
    }

    #[test]
    fn transposed_window_with_excess_padding_is_rejected() {
        let err = conv_transpose_output_size(AutoPad::Explicit, (3, 3), 1, 3, 1, 1, 0)
            .expect_err("padding removes every element");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
    }

    #[test]
    fn flattened_extent_overflow_is_rejected() {
        assert_eq!(product_or_unknown(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(product_or_unknown(&[2, -1]).unwrap(), UNKNOWN_DIMENSION);
        let err = product_or_unknown(&[65536, 65536]).expect_err("2^32 elements");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::ShapeMismatch));
    }
}
