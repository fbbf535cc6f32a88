use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, Graph, Operation};
use nnadapt::error::{ConfigErrorCode, Error, Result};
use nnadapt::operation::utility::resolve_axis;

use crate::context::OpenVinoContext;
use crate::converter::bind_single;
use crate::ov::attrs;

pub fn convert_softmax(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::Softmax { axis } = op.attrs else {
        return Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{:?}", op.attrs),
        ));
    };
    let axis = resolve_axis(axis, graph.resolved_type(op.input(0))?.rank())?;
    let input = ctx.node(op.input(0))?;
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op(
        "Softmax",
        vec![input],
        attrs([("axis", (axis as i64).into())]),
        port,
    );
    bind_single(ctx, op, value)
}
