use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, Graph, Operation};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::context::OpenVinoContext;
use crate::converter::bind_single;
use crate::ov::attrs;

pub fn convert_mat_mul(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::MatMul {
        transpose_x,
        transpose_y,
    } = op.attrs
    else {
        return Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{:?}", op.attrs),
        ));
    };
    let x = ctx.node(op.input(0))?;
    let y = ctx.node(op.input(1))?;
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op(
        "MatMul",
        vec![x, y],
        attrs([
            ("transpose_a", transpose_x.into()),
            ("transpose_b", transpose_y.into()),
        ]),
        port,
    );
    bind_single(ctx, op, value)
}
