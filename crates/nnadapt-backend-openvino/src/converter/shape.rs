//! Data-movement kinds: CONCAT, FLATTEN, RESHAPE, SLICE, SPLIT, SQUEEZE,
//! STACK, TRANSPOSE and UNSQUEEZE.

use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, Graph, Operation};
use nnadapt::error::{ConfigErrorCode, Error, Result};
use nnadapt::operation::squeeze::squeeze_axes;
use nnadapt::operation::transpose::resolve_perm;
use nnadapt::operation::utility::resolve_axis;

use crate::context::OpenVinoContext;
use crate::converter::{bind_single, to_i64, transpose};
use crate::ov::{attrs, Attrs, Output};

fn attribute_mismatch(op: &Operation) -> Error {
    Error::config(
        ConfigErrorCode::AttributeKindMismatch,
        format!("{:?}", op.attrs),
    )
}

fn input_rank(graph: &Graph, op: &Operation) -> Result<usize> {
    Ok(graph.resolved_type(op.input(0))?.rank())
}

pub fn convert_concat(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Concat { axis } = op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let axis = resolve_axis(axis, input_rank(graph, op)?)?;
    let inputs = op
        .inputs
        .iter()
        .map(|id| ctx.node(*id))
        .collect::<Result<Vec<_>>>()?;
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op("Concat", inputs, attrs([("axis", (axis as i64).into())]), port);
    bind_single(ctx, op, value)
}

fn flatten_range(graph: &Graph, op: &Operation) -> Result<Option<(usize, usize)>> {
    let Attributes::Flatten {
        start_axis,
        end_axis,
    } = op.attrs
    else {
        return Err(attribute_mismatch(op));
    };
    let rank = input_rank(graph, op)?;
    if rank == 0 {
        return Ok(None);
    }
    Ok(Some((
        resolve_axis(start_axis, rank)?,
        resolve_axis(end_axis, rank)?,
    )))
}

/// FLATTEN lowers to a `Reshape` pattern that can only copy leading extents,
/// so axes after the flattened range must be static.
pub fn validate_flatten(graph: &Graph, op: &Operation) -> std::result::Result<(), String> {
    let Ok(Some((_, end))) = flatten_range(graph, op) else {
        return Ok(());
    };
    let dims = graph
        .resolved_type(op.input(0))
        .map_err(|err| err.to_string())?
        .dims();
    if dims[end + 1..].iter().any(|&extent| extent < 0) {
        return Err(format!(
            "dynamic extents after flattened axis {end} in {dims:?}"
        ));
    }
    Ok(())
}

pub fn convert_flatten(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let pattern = match flatten_range(graph, op)? {
        None => vec![1],
        Some((start, end)) => {
            let dims = graph.resolved_type(op.input(0))?.dims();
            let mut pattern = vec![0; start];
            pattern.push(-1);
            pattern.extend(to_i64(&dims[end + 1..]));
            pattern
        }
    };
    reshape_to(ctx, graph, op, &pattern)
}

pub fn convert_reshape(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Reshape { shape } = &op.attrs else {
        return Err(attribute_mismatch(op));
    };
    reshape_to(ctx, graph, op, &to_i64(shape))
}

/// `Reshape` with `special_zero`: `0` copies the input extent at that index.
fn reshape_to(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation, pattern: &[i64]) -> Result<()> {
    let input = ctx.node(op.input(0))?;
    let pattern = ctx.const_i64(pattern);
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op(
        "Reshape",
        vec![input, pattern],
        attrs([("special_zero", true.into())]),
        port,
    );
    bind_single(ctx, op, value)
}

pub fn convert_slice(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Slice(slice) = &op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let rank = input_rank(graph, op)?;
    let axes = slice
        .axes
        .iter()
        .map(|&axis| resolve_axis(axis, rank).map(|axis| axis as i64))
        .collect::<Result<Vec<_>>>()?;
    let steps = if slice.steps.is_empty() {
        vec![1; axes.len()]
    } else {
        to_i64(&slice.steps)
    };

    let input = ctx.node(op.input(0))?;
    let start = ctx.const_i64(&to_i64(&slice.starts));
    let stop = ctx.const_i64(&to_i64(&slice.ends));
    let step = ctx.const_i64(&steps);
    let axes = ctx.const_i64(&axes);
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op("Slice", vec![input, start, stop, step, axes], Attrs::new(), port);
    bind_single(ctx, op, value)
}

pub fn convert_split(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Split { axis, split } = &op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let axis = resolve_axis(*axis, input_rank(graph, op)?)?;
    let input = ctx.node(op.input(0))?;
    let axis = ctx.scalar_i64(axis as i64);
    let lengths = ctx.const_i64(&to_i64(split));
    let ports = op
        .outputs
        .iter()
        .map(|id| ctx.operand_port(graph, *id))
        .collect::<Result<Vec<_>>>()?;
    let node = ctx.add_multi_output_op("VariadicSplit", vec![input, axis, lengths], Attrs::new(), ports);
    for (port, id) in op.outputs.iter().enumerate() {
        ctx.bind(
            *id,
            Output {
                node,
                port: port as u32,
            },
        )?;
    }
    Ok(())
}

pub fn convert_squeeze(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Squeeze { axes } = &op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let axes = squeeze_axes(&graph.resolved_type(op.input(0))?.dimensions, axes)?;
    let input = ctx.node(op.input(0))?;
    if axes.is_empty() {
        return bind_single(ctx, op, input);
    }
    let axes = ctx.const_i64(&axes.iter().map(|&axis| axis as i64).collect::<Vec<_>>());
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op("Squeeze", vec![input, axes], Attrs::new(), port);
    bind_single(ctx, op, value)
}

pub fn convert_unsqueeze(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Unsqueeze { axes } = &op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let out_rank = input_rank(graph, op)? + axes.len();
    let axes = axes
        .iter()
        .map(|&axis| resolve_axis(axis, out_rank).map(|axis| axis as i64))
        .collect::<Result<Vec<_>>>()?;
    let input = ctx.node(op.input(0))?;
    let axes = ctx.const_i64(&axes);
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op("Unsqueeze", vec![input, axes], Attrs::new(), port);
    bind_single(ctx, op, value)
}

/// The opset has no stack: every input gains a unit axis, then the results
/// are concatenated along it.
pub fn convert_stack(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Stack { axis } = op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let axis = resolve_axis(axis, input_rank(graph, op)? + 1)?;
    let mut parts = Vec::with_capacity(op.inputs.len());
    for id in &op.inputs {
        let input = ctx.node(*id)?;
        let port = ctx.port(input)?;
        let mut shape = port.shape.clone();
        shape.insert(axis, 1);
        let axes = ctx.const_i64(&[axis as i64]);
        parts.push(ctx.add_op("Unsqueeze", vec![input, axes], Attrs::new(), port.with_shape(shape)));
    }
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op("Concat", parts, attrs([("axis", (axis as i64).into())]), port);
    bind_single(ctx, op, value)
}

pub fn convert_transpose(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Transpose { perm } = &op.attrs else {
        return Err(attribute_mismatch(op));
    };
    let perm = resolve_perm(perm, input_rank(graph, op)?)?;
    let input = ctx.node(op.input(0))?;
    let value = transpose(ctx, input, &perm)?;
    bind_single(ctx, op, value)
}
