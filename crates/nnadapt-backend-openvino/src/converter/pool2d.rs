use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, DataLayout, Graph, Operation, OperationKind};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::context::OpenVinoContext;
use crate::converter::{
    apply_fuse_code, bind_single, channels_first_perm, channels_last_perm, padding_attrs, to_i64,
    transpose,
};
use crate::ov::{attrs, ElementType, Output, PortType};

pub fn convert_pool2d(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Pool2d(pool) = &op.attrs else {
        return Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{:?}", op.attrs),
        ));
    };
    let average = op.kind == OperationKind::AveragePool2d;
    let nhwc = graph.resolved_type(op.input(0))?.layout == DataLayout::Nhwc;
    let mut input = ctx.node(op.input(0))?;
    if nhwc {
        input = transpose(ctx, input, &channels_first_perm(4))?;
    }
    let mut port = ctx.operand_port(graph, op.output())?;
    if nhwc {
        port = port.with_shape(channels_first_perm(4).iter().map(|&axis| port.shape[axis]).collect());
    }

    let mut value: Output = match pool.kernel {
        // Global pooling reduces both spatial axes.
        None => {
            let axes = ctx.const_i64(&[2, 3]);
            let op_type = if average { "ReduceMean" } else { "ReduceMax" };
            ctx.add_op(
                op_type,
                vec![input, axes],
                attrs([("keep_dims", true.into())]),
                port,
            )
        }
        Some(kernel) => {
            let mut window = attrs([
                ("kernel", to_i64(&kernel).into()),
                ("strides", to_i64(&pool.strides).into()),
                (
                    "rounding_type",
                    if pool.ceil_mode { "ceil" } else { "floor" }.into(),
                ),
            ]);
            window.extend(
                padding_attrs(pool.auto_pad, pool.pads)
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value)),
            );
            if average {
                window.insert("exclude-pad".to_string(), (!pool.count_include_pad).into());
                ctx.add_op("AvgPool", vec![input], window, port)
            } else {
                let node = ctx.add_multi_output_op(
                    "MaxPool",
                    vec![input],
                    window,
                    vec![port.clone(), PortType::new(ElementType::I64, port.shape.clone())],
                );
                Output { node, port: 0 }
            }
        }
    };
    value = apply_fuse_code(ctx, value, pool.fuse_code)?;
    if nhwc {
        value = transpose(ctx, value, &channels_last_perm(4))?;
    }
    bind_single(ctx, op, value)
}
