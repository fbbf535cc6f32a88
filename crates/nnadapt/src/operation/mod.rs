//! Per-kind shape/type inference ("Prepare") and host execution ("Execute").
//!
//! Each family module exposes a pure `prepare` that derives the output types
//! from resolved input types, and an `execute` when the host can run it.

pub mod batch_normalization;
pub mod cast;
pub mod concat;
pub mod conv2d;
pub mod elementwise;
pub mod flatten;
pub mod mat_mul;
pub mod pool2d;
pub mod reshape;
pub mod slice;
pub mod softmax;
pub mod split;
pub mod squeeze;
pub mod stack;
pub mod transpose;
pub mod unary_activations;
pub mod unsqueeze;
pub mod utility;

use tracing::trace;

use crate::core::graph::{Graph, OperationId};
use crate::core::operation::{Operation, OperationKind};
use crate::core::types::OperandType;
use crate::error::{ConfigErrorCode, Error, Result};
use crate::executor::HostTensor;

/// Computes the output types of one operation without touching the graph.
pub fn infer_output_types(graph: &Graph, op: &Operation) -> Result<Vec<OperandType>> {
    use OperationKind as K;
    let single = match op.kind {
        kind if unary_activations::is_unary_activation(kind) => unary_activations::prepare(graph, op),
        kind if kind.is_elementwise_binary() || kind.is_comparison() => {
            elementwise::prepare(graph, op)
        }
        K::Conv2d | K::Conv2dTranspose => conv2d::prepare(graph, op),
        K::AveragePool2d | K::MaxPool2d => pool2d::prepare(graph, op),
        K::BatchNormalization => batch_normalization::prepare(graph, op),
        K::Cast => cast::prepare(graph, op),
        K::Concat => concat::prepare(graph, op),
        K::Flatten => flatten::prepare(graph, op),
        K::MatMul => mat_mul::prepare(graph, op),
        K::Reshape => reshape::prepare(graph, op),
        K::Slice => slice::prepare(graph, op),
        K::Softmax => softmax::prepare(graph, op),
        K::Split => return split::prepare(graph, op),
        K::Squeeze => squeeze::prepare(graph, op),
        K::Stack => stack::prepare(graph, op),
        K::Transpose => transpose::prepare(graph, op),
        K::Unsqueeze => unsqueeze::prepare(graph, op),
        other => Err(Error::config(
            ConfigErrorCode::AttributeKindMismatch,
            format!("no inference routine for {other}"),
        )),
    };
    single.map(|ty| vec![ty])
}

/// Prepare for one operation: infers and writes every output type.
///
/// Inputs must already be resolved, which holds when operations are
/// prepared in graph order.
pub fn prepare_operation(graph: &mut Graph, id: OperationId) -> Result<()> {
    let op = graph
        .operation(id)
        .cloned()
        .ok_or_else(|| Error::config(ConfigErrorCode::InvalidInput, format!("no operation #{}", id.0)))?;
    let located = |err: Error| err.at_operation(op.id, op.kind);

    let types = infer_output_types(graph, &op).map_err(located)?;
    if types.len() != op.outputs.len() {
        return Err(located(Error::config(
            ConfigErrorCode::ArityMismatch,
            format!("inferred {} outputs for {}", types.len(), op.outputs.len()),
        )));
    }
    for (output, ty) in op.outputs.iter().zip(types) {
        graph.resolve(*output, ty).map_err(located)?;
        if let Ok(operand) = graph.operand(*output) {
            trace!(
                operation = op.id.0,
                kind = %op.kind,
                output = %crate::core::graph::format_operand(operand),
                "inferred output"
            );
        }
    }
    Ok(())
}

/// Runs Prepare over every operation in topological order.
pub fn prepare_graph(graph: &mut Graph) -> Result<()> {
    for index in 0..graph.operations().len() {
        prepare_operation(graph, OperationId(index as u32))?;
    }
    trace!(graph = %graph, "prepared graph");
    Ok(())
}

/// Runs one operation on host tensors; returns one tensor per output.
pub(crate) fn execute_operation(
    graph: &Graph,
    op: &Operation,
    inputs: &[&HostTensor],
) -> Result<Vec<HostTensor>> {
    use OperationKind as K;
    let single = match op.kind {
        kind if unary_activations::is_unary_activation(kind) => {
            unary_activations::execute(graph, op, inputs)
        }
        kind if kind.is_elementwise_binary() || kind.is_comparison() => {
            elementwise::execute(graph, op, inputs)
        }
        K::BatchNormalization => batch_normalization::execute(graph, op, inputs),
        K::Cast => cast::execute(graph, op, inputs),
        K::Concat => concat::execute(graph, op, inputs),
        K::Flatten => flatten::execute(graph, op, inputs),
        K::MatMul => mat_mul::execute(graph, op, inputs),
        K::Reshape => reshape::execute(graph, op, inputs),
        K::Slice => slice::execute(graph, op, inputs),
        K::Softmax => softmax::execute(graph, op, inputs),
        K::Split => return split::execute(graph, op, inputs),
        K::Squeeze => squeeze::execute(graph, op, inputs),
        K::Transpose => transpose::execute(graph, op, inputs),
        K::Unsqueeze => unsqueeze::execute(graph, op, inputs),
        other => Err(Error::unsupported(
            crate::executor::HOST_TARGET,
            other,
            "no host kernel",
        )),
    };
    single.map(|tensor| vec![tensor])
}

/// Kinds the host executor has kernels for.
pub fn has_host_kernel(kind: OperationKind) -> bool {
    !matches!(
        kind,
        OperationKind::Conv2d
            | OperationKind::Conv2dTranspose
            | OperationKind::AveragePool2d
            | OperationKind::MaxPool2d
            | OperationKind::Stack
    )
}
