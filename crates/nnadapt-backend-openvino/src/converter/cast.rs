use nnadapt::converter::ConverterContext;
use nnadapt::core::{Graph, Operation};
use nnadapt::error::Result;

use crate::context::OpenVinoContext;
use crate::converter::bind_single;
use crate::ov::attrs;

pub fn convert_cast(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let input = ctx.node(op.input(0))?;
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op(
        "Convert",
        vec![input],
        attrs([("destination_type", port.element_type.into())]),
        port,
    );
    bind_single(ctx, op, value)
}
