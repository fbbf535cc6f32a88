//! CONV_2D and CONV_2D_TRANSPOSE.
//!
//! The opset convolutions are channels-first, so NHWC activations are
//! transposed around the convolution. Grouped filters are reshaped to the
//! opset's `[group, out / group, in / group, kh, kw]` form.

use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, Conv2dAttrs, DataLayout, Graph, OperandId, Operation};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::context::OpenVinoContext;
use crate::converter::{
    apply_fuse_code, bind_single, channels_first_perm, channels_last_perm, padding_attrs, to_i64,
    transpose,
};
use crate::ov::{attrs, Attrs, Output, PortType};

fn window_attrs(conv: &Conv2dAttrs) -> Attrs {
    let mut out = attrs([
        ("strides", to_i64(&conv.strides).into()),
        ("dilations", to_i64(&conv.dilations).into()),
    ]);
    out.extend(
        padding_attrs(conv.auto_pad, conv.pads)
            .into_iter()
            .map(|(name, value)| (name.to_string(), value)),
    );
    out
}

fn permuted(port: &PortType, perm: &[usize]) -> PortType {
    port.with_shape(perm.iter().map(|&axis| port.shape[axis]).collect())
}

/// Splits the leading filter axis into `[group, extent / group]`.
fn group_filter(ctx: &mut OpenVinoContext, filter: Output, group: i32) -> Result<Output> {
    let port = ctx.port(filter)?;
    let group = group as i64;
    let leading = if port.shape[0] < 0 { -1 } else { port.shape[0] / group };
    let mut grouped = vec![group, leading];
    grouped.extend_from_slice(&port.shape[1..]);
    let pattern = ctx.const_i64(&grouped);
    Ok(ctx.add_op(
        "Reshape",
        vec![filter, pattern],
        attrs([("special_zero", false.into())]),
        port.with_shape(grouped),
    ))
}

/// Adds a per-channel bias to a channels-first value.
fn add_channel_bias(ctx: &mut OpenVinoContext, value: Output, bias: OperandId) -> Result<Output> {
    let port = ctx.port(value)?;
    let bias = ctx.node(bias)?;
    let bias_port = ctx.port(bias)?;
    let pattern = ctx.const_i64(&[1, -1, 1, 1]);
    let reshaped = ctx.add_op(
        "Reshape",
        vec![bias, pattern],
        attrs([("special_zero", false.into())]),
        bias_port.with_shape(vec![1, bias_port.shape[0], 1, 1]),
    );
    Ok(ctx.add_op(
        "Add",
        vec![value, reshaped],
        attrs([("auto_broadcast", "numpy".into())]),
        port,
    ))
}

/// Shared tail: bias, fused activation and the layout transpose back.
fn finish(
    ctx: &mut OpenVinoContext,
    op: &Operation,
    value: Output,
    conv: &Conv2dAttrs,
    nhwc: bool,
) -> Result<()> {
    let mut value = value;
    if let Some(&bias) = op.inputs.get(2) {
        value = add_channel_bias(ctx, value, bias)?;
    }
    value = apply_fuse_code(ctx, value, conv.fuse_code)?;
    if nhwc {
        value = transpose(ctx, value, &channels_last_perm(4))?;
    }
    bind_single(ctx, op, value)
}

/// Channels-first input value and output port of a convolution.
fn channels_first_io(
    ctx: &mut OpenVinoContext,
    graph: &Graph,
    op: &Operation,
) -> Result<(Output, PortType, bool)> {
    let nhwc = graph.resolved_type(op.input(0))?.layout == DataLayout::Nhwc;
    let mut input = ctx.node(op.input(0))?;
    let mut port = ctx.operand_port(graph, op.output())?;
    if nhwc {
        input = transpose(ctx, input, &channels_first_perm(4))?;
        port = permuted(&port, &channels_first_perm(4));
    }
    Ok((input, port, nhwc))
}

pub fn convert_conv2d(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Conv2d(conv) = &op.attrs else {
        return Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{:?}", op.attrs),
        ));
    };
    let (input, port, nhwc) = channels_first_io(ctx, graph, op)?;
    let mut filter = ctx.node(op.input(1))?;
    let op_type = if conv.group > 1 {
        filter = group_filter(ctx, filter, conv.group)?;
        "GroupConvolution"
    } else {
        "Convolution"
    };
    let value = ctx.add_op(op_type, vec![input, filter], window_attrs(conv), port);
    finish(ctx, op, value, conv, nhwc)
}

pub fn convert_conv2d_transpose(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Conv2dTranspose(transpose_attrs) = &op.attrs else {
        return Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{:?}", op.attrs),
        ));
    };
    let conv = &transpose_attrs.conv;
    let (input, port, nhwc) = channels_first_io(ctx, graph, op)?;
    let mut filter = ctx.node(op.input(1))?;
    let op_type = if conv.group > 1 {
        filter = group_filter(ctx, filter, conv.group)?;
        "GroupConvolutionBackpropData"
    } else {
        "ConvolutionBackpropData"
    };

    let mut inputs = vec![input, filter];
    if let Some(shape) = transpose_attrs.output_shape {
        inputs.push(ctx.const_i64(&to_i64(&shape)));
    }
    let mut window = window_attrs(conv);
    window.insert(
        "output_padding".to_string(),
        to_i64(&transpose_attrs.output_padding).into(),
    );
    let value = ctx.add_op(op_type, inputs, window, port);
    finish(ctx, op, value, conv, nhwc)
}
