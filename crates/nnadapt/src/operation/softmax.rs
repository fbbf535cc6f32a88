use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::OperandType;
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::compute_strides;
use crate::executor::HostTensor;
use crate::operation::utility::{input_type, resolve_axis};
use crate::config_bail;

fn axis_of(op: &Operation) -> Result<i32> {
    match op.attrs {
        Attributes::Softmax { axis } => Ok(axis),
        _ => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    resolve_axis(axis_of(op)?, input.rank())?;
    Ok(input.clone())
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let input = inputs[0];
    let values = input.expect_f32("softmax")?;
    let axis = resolve_axis(axis_of(op)?, input.rank())?;
    let shape = input.shape();
    let axis_len = shape[axis];
    let inner = compute_strides(shape)[axis];
    let outer = if axis_len * inner == 0 {
        0
    } else {
        values.len() / (axis_len * inner)
    };

    let mut out = vec![0.0f32; values.len()];
    for o in 0..outer {
        for i in 0..inner {
            let base = o * axis_len * inner + i;
            let max = (0..axis_len)
                .map(|a| values[base + a * inner])
                .fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0f32;
            for a in 0..axis_len {
                let e = (values[base + a * inner] - max).exp();
                out[base + a * inner] = e;
                sum += e;
            }
            for a in 0..axis_len {
                out[base + a * inner] /= sum;
            }
        }
    }
    HostTensor::from_f32(shape, out)
}
