//! CONV_2D and CONV_2D_TRANSPOSE.
//!
//! Filters are `[out, in / group, kh, kw]` for CONV_2D and
//! `[in, out / group, kh, kw]` for CONV_2D_TRANSPOSE regardless of the data
//! layout; the layout only selects where the channel axis of the input and
//! output lives.

use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Conv2dAttrs, Operation};
use crate::core::types::{DataLayout, Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::operation::utility::{
    check_rank, conv_output_size, conv_transpose_output_size, input_types, merge_extent,
};
use crate::{config_bail, config_ensure};

/// Spatial and channel axes of a rank-4 activation: `(channel, height, width)`.
pub fn layout_axes(layout: DataLayout) -> (usize, usize, usize) {
    match layout {
        DataLayout::Nchw => (1, 2, 3),
        DataLayout::Nhwc => (3, 1, 2),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let types = input_types(graph, op)?;
    let (input, filter) = (types[0], types[1]);
    check_rank(input, 4, "convolution input")?;
    check_rank(filter, 4, "convolution filter")?;

    let (conv, transpose) = match &op.attrs {
        Attributes::Conv2d(conv) => (conv, None),
        Attributes::Conv2dTranspose(attrs) => (&attrs.conv, Some(attrs)),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    };
    check_conv_attrs(conv)?;
    if let Some(shape) = transpose.and_then(|attrs| attrs.output_shape) {
        config_ensure!(
            shape.iter().all(|&extent| extent >= 1),
            ConfigErrorCode::ShapeMismatch,
            "output shape {:?} must be positive",
            shape
        );
    }

    let group = conv.group;
    let (in_channels_per_group, out_channels) = match transpose {
        None => (filter.dims()[1], filter.dims()[0]),
        Some(_) => (
            if filter.dims()[0] == UNKNOWN_DIMENSION {
                UNKNOWN_DIMENSION
            } else {
                filter.dims()[0] / group
            },
            if filter.dims()[1] == UNKNOWN_DIMENSION {
                UNKNOWN_DIMENSION
            } else {
                filter.dims()[1] * group
            },
        ),
    };
    let (c_axis, h_axis, w_axis) = layout_axes(input.layout);
    let in_channels = input.dims()[c_axis];
    if in_channels != UNKNOWN_DIMENSION && in_channels_per_group != UNKNOWN_DIMENSION {
        config_ensure!(
            in_channels == in_channels_per_group * group,
            ConfigErrorCode::ShapeMismatch,
            "input has {} channels, filter expects {} x {} groups",
            in_channels,
            in_channels_per_group,
            group
        );
    }
    if let Some(bias) = types.get(2) {
        check_rank(bias, 1, "convolution bias")?;
        merge_extent(bias.dims()[0], out_channels)?;
    }

    let kernel = [filter.dims()[2], filter.dims()[3]];
    let dimensions = input.dimensions.map_all(|dims| {
        let mut out = Dims::from_slice(dims);
        out[c_axis] = out_channels;
        for (spatial, axis) in [h_axis, w_axis].into_iter().enumerate() {
            let pads = (conv.pads[spatial * 2], conv.pads[spatial * 2 + 1]);
            out[axis] = match transpose {
                None => conv_output_size(
                    conv.auto_pad,
                    pads,
                    dims[axis],
                    kernel[spatial],
                    conv.strides[spatial],
                    conv.dilations[spatial],
                    false,
                )?,
                Some(attrs) => match attrs.output_shape {
                    Some(shape) => shape[spatial],
                    None => conv_transpose_output_size(
                        conv.auto_pad,
                        pads,
                        dims[axis],
                        kernel[spatial],
                        conv.strides[spatial],
                        conv.dilations[spatial],
                        attrs.output_padding[spatial],
                    )?,
                },
            };
        }
        Ok(out)
    })?;
    Ok(input.with_dimensions(dimensions))
}

fn check_conv_attrs(conv: &Conv2dAttrs) -> Result<()> {
    config_ensure!(
        conv.group >= 1,
        ConfigErrorCode::InvalidAttributeValue,
        "group must be positive, got {}",
        conv.group
    );
    config_ensure!(
        conv.strides.iter().all(|&s| s >= 1) && conv.dilations.iter().all(|&d| d >= 1),
        ConfigErrorCode::InvalidAttributeValue,
        "strides {:?} and dilations {:?} must be positive",
        conv.strides,
        conv.dilations
    );
    config_ensure!(
        conv.pads.iter().all(|&p| p >= 0),
        ConfigErrorCode::InvalidAttributeValue,
        "pads {:?} must not be negative",
        conv.pads
    );
    Ok(())
}
