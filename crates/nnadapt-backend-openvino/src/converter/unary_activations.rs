use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, Graph, Operation, OperationKind};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::context::OpenVinoContext;
use crate::converter::bind_single;
use crate::ov::{attrs, Attrs};

fn opset_name(kind: OperationKind) -> Option<&'static str> {
    Some(match kind {
        OperationKind::Abs => "Abs",
        OperationKind::Exp => "Exp",
        OperationKind::Floor => "Floor",
        OperationKind::HardSwish => "HSwish",
        OperationKind::Log => "Log",
        OperationKind::Relu => "Relu",
        OperationKind::Sigmoid => "Sigmoid",
        OperationKind::Softplus => "SoftPlus",
        OperationKind::Swish => "Swish",
        OperationKind::Tanh => "Tanh",
        _ => return None,
    })
}

/// SoftPlus in the opset has no `beta`.
pub fn validate_softplus(_graph: &Graph, op: &Operation) -> std::result::Result<(), String> {
    match op.attrs {
        Attributes::Softplus { beta, .. } if beta != 1.0 => {
            Err(format!("SoftPlus only supports beta 1, got {beta}"))
        }
        _ => Ok(()),
    }
}

pub fn convert_unary_activations(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let input = ctx.node(op.input(0))?;
    if op.kind == OperationKind::Assign {
        return bind_single(ctx, op, input);
    }
    let port = ctx.operand_port(graph, op.output())?;

    let output = match (op.kind, &op.attrs) {
        (OperationKind::Relu6, _) => ctx.add_op(
            "Clamp",
            vec![input],
            attrs([("min", 0.0f32.into()), ("max", 6.0f32.into())]),
            port,
        ),
        (OperationKind::Gelu, Attributes::Gelu { approximate }) => {
            let mode = if *approximate { "TANH" } else { "ERF" };
            ctx.add_op(
                "Gelu",
                vec![input],
                attrs([("approximation_mode", mode.into())]),
                port,
            )
        }
        (OperationKind::LeakyRelu, Attributes::LeakyRelu { alpha }) => {
            let slope = ctx.scalar_float(port.element_type, *alpha);
            ctx.add_op("PRelu", vec![input, slope], Attrs::new(), port)
        }
        (OperationKind::HardSigmoid, Attributes::HardSigmoid { alpha, beta }) => {
            let alpha = ctx.scalar_float(port.element_type, *alpha);
            let beta = ctx.scalar_float(port.element_type, *beta);
            ctx.add_op("HardSigmoid", vec![input, alpha, beta], Attrs::new(), port)
        }
        (kind, _) => {
            let name = opset_name(kind).ok_or_else(|| {
                Error::config(
                    ConfigErrorCode::AttributeKindMismatch,
                    format!("{kind} is not a unary activation"),
                )
            })?;
            ctx.add_op(name, vec![input], Attrs::new(), port)
        }
    };
    bind_single(ctx, op, output)
}
