use nnadapt::converter::ConverterContext;
use nnadapt::core::{Attributes, DataLayout, Graph, Operation};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::context::OpenVinoContext;
use crate::converter::{bind_single, channels_first_perm, channels_last_perm, transpose};
use crate::ov::attrs;

/// `BatchNormInference` takes the channel on axis 1; channels-last inputs
/// are transposed around it.
pub fn convert_batch_normalization(ctx: &mut OpenVinoContext, graph: &Graph, op: &Operation) -> Result<()> {
    let Attributes::BatchNormalization { epsilon } = op.attrs else {
        return Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("{:?}", op.attrs),
        ));
    };
    let input_ty = graph.resolved_type(op.input(0))?;
    let rank = input_ty.rank();
    let channels_last = input_ty.layout == DataLayout::Nhwc && rank > 2;

    let mut input = ctx.node(op.input(0))?;
    if channels_last {
        input = transpose(ctx, input, &channels_first_perm(rank))?;
    }
    let port = ctx.port(input)?;
    // input, gamma, beta, mean, variance
    let mut inputs = vec![input];
    for id in &op.inputs[1..] {
        inputs.push(ctx.node(*id)?);
    }
    let mut value = ctx.add_op(
        "BatchNormInference",
        inputs,
        attrs([("epsilon", epsilon.into())]),
        port,
    );
    if channels_last {
        value = transpose(ctx, value, &channels_last_perm(rank))?;
    }
    bind_single(ctx, op, value)
}
