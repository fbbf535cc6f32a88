//! AVERAGE_POOL_2D and MAX_POOL_2D.

use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{Dims, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::operation::conv2d::layout_axes;
use crate::operation::utility::{check_rank, conv_output_size, input_type};
use crate::{config_bail, config_ensure};

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    check_rank(input, 4, "pooling input")?;
    let Attributes::Pool2d(attrs) = &op.attrs else {
        config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs);
    };
    config_ensure!(
        attrs.strides.iter().all(|&s| s >= 1),
        ConfigErrorCode::InvalidAttributeValue,
        "strides {:?} must be positive",
        attrs.strides
    );
    if let Some(kernel) = attrs.kernel {
        config_ensure!(
            kernel.iter().all(|&k| k >= 1),
            ConfigErrorCode::InvalidAttributeValue,
            "kernel {:?} must be positive",
            kernel
        );
    }

    let (_, h_axis, w_axis) = layout_axes(input.layout);
    let dimensions = input.dimensions.map_all(|dims| {
        let mut out = Dims::from_slice(dims);
        for (spatial, axis) in [h_axis, w_axis].into_iter().enumerate() {
            out[axis] = match attrs.kernel {
                // global pooling
                None => 1,
                Some(kernel) => conv_output_size(
                    attrs.auto_pad,
                    (attrs.pads[spatial * 2], attrs.pads[spatial * 2 + 1]),
                    dims[axis],
                    kernel[spatial],
                    attrs.strides[spatial],
                    1,
                    attrs.ceil_mode,
                )?,
            };
        }
        Ok(out)
    })?;
    Ok(input.with_dimensions(dimensions))
}
