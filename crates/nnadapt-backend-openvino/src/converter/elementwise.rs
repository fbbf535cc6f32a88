use nnadapt::converter::ConverterContext;
use nnadapt::core::{Graph, Operation, OperationKind};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::context::OpenVinoContext;
use crate::converter::{apply_fuse_code, bind_single};
use crate::ov::attrs;

fn opset_name(kind: OperationKind) -> Option<&'static str> {
    Some(match kind {
        OperationKind::Add => "Add",
        OperationKind::Sub => "Subtract",
        OperationKind::Mul => "Multiply",
        OperationKind::Div => "Divide",
        OperationKind::Max => "Maximum",
        OperationKind::Min => "Minimum",
        OperationKind::Pow => "Power",
        OperationKind::Equal => "Equal",
        OperationKind::GreaterEqual => "GreaterEqual",
        _ => return None,
    })
}

pub fn convert_elementwise(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let name = opset_name(op.kind).ok_or_else(|| {
        Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{} is not an elementwise kind", op.kind),
        )
    })?;
    let lhs = ctx.node(op.input(0))?;
    let rhs = ctx.node(op.input(1))?;
    let port = ctx.operand_port(graph, op.output())?;
    let value = ctx.add_op(
        name,
        vec![lhs, rhs],
        attrs([("auto_broadcast", "numpy".into())]),
        port,
    );
    let value = apply_fuse_code(ctx, value, op.attrs.fuse_code())?;
    bind_single(ctx, op, value)
}
