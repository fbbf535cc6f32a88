//! Broadcasting binary kinds: ADD, SUB, MUL, DIV, MAX, MIN, POW, plus the
//! comparisons EQUAL and GREATER_EQUAL.

use crate::core::graph::Graph;
use crate::core::operation::{FuseCode, Operation, OperationKind};
use crate::core::types::{DType, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::host_tensor::{broadcast_source_indices, to_usize_shape};
use crate::executor::{HostTensor, TensorData};
use crate::operation::utility::{broadcast_dimensions, broadcast_dims, input_types, same_precision};
use crate::config_bail;

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let types = input_types(graph, op)?;
    same_precision(&types)?;
    let (lhs, rhs) = (types[0], types[1]);
    let dimensions = broadcast_dimensions(&lhs.dimensions, &rhs.dimensions)?;
    if op.kind.is_comparison() {
        let mut out = OperandType::new(DType::Bool8, dimensions);
        out.layout = lhs.layout;
        return Ok(out);
    }
    Ok(lhs.with_dimensions(dimensions))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let (lhs, rhs) = (inputs[0], inputs[1]);
    let out_dims = broadcast_dims(&lhs.dims(), &rhs.dims())?;
    let shape = to_usize_shape(&out_dims)?;
    let lhs_index = broadcast_source_indices(lhs.shape(), &shape);
    let rhs_index = broadcast_source_indices(rhs.shape(), &shape);
    let pairs = lhs_index.iter().zip(&rhs_index);

    let data = match (lhs.data(), rhs.data()) {
        (TensorData::F32(a), TensorData::F32(b)) => {
            if op.kind.is_comparison() {
                TensorData::Bool(pairs.map(|(&i, &j)| compare(op.kind, a[i], b[j])).collect())
            } else {
                let fuse = op.attrs.fuse_code();
                TensorData::F32(
                    pairs
                        .map(|(&i, &j)| Ok(fuse_f32(fuse, binary_f32(op.kind, a[i], b[j])?)))
                        .collect::<Result<_>>()?,
                )
            }
        }
        (TensorData::I32(a), TensorData::I32(b)) => {
            if op.kind.is_comparison() {
                TensorData::Bool(pairs.map(|(&i, &j)| compare(op.kind, a[i], b[j])).collect())
            } else {
                let fuse = op.attrs.fuse_code();
                TensorData::I32(
                    pairs
                        .map(|(&i, &j)| Ok(fuse_i32(fuse, binary_i32(op.kind, a[i], b[j])?)))
                        .collect::<Result<_>>()?,
                )
            }
        }
        (TensorData::Bool(a), TensorData::Bool(b)) if op.kind == OperationKind::Equal => {
            TensorData::Bool(pairs.map(|(&i, &j)| a[i] == b[j]).collect())
        }
        (a, b) => config_bail!(
            ConfigErrorCode::DTypeMismatch,
            "{} cannot combine {:?} and {:?}",
            op.kind,
            a.dtype(),
            b.dtype()
        ),
    };
    HostTensor::new(shape, data)
}

fn compare<T: PartialOrd>(kind: OperationKind, a: T, b: T) -> bool {
    match kind {
        OperationKind::GreaterEqual => a >= b,
        _ => a == b,
    }
}

fn binary_f32(kind: OperationKind, a: f32, b: f32) -> Result<f32> {
    Ok(match kind {
        OperationKind::Add => a + b,
        OperationKind::Sub => a - b,
        OperationKind::Mul => a * b,
        OperationKind::Div => a / b,
        OperationKind::Max => a.max(b),
        OperationKind::Min => a.min(b),
        OperationKind::Pow => a.powf(b),
        other => config_bail!(
            ConfigErrorCode::AttributeKindMismatch,
            "{} is not an elementwise kind",
            other
        ),
    })
}

fn binary_i32(kind: OperationKind, a: i32, b: i32) -> Result<i32> {
    Ok(match kind {
        OperationKind::Add => a.wrapping_add(b),
        OperationKind::Sub => a.wrapping_sub(b),
        OperationKind::Mul => a.wrapping_mul(b),
        OperationKind::Div => {
            if b == 0 {
                config_bail!(ConfigErrorCode::InvalidInput, "integer division by zero");
            }
            a.wrapping_div(b)
        }
        OperationKind::Max => a.max(b),
        OperationKind::Min => a.min(b),
        OperationKind::Pow => {
            if b < 0 {
                config_bail!(ConfigErrorCode::InvalidInput, "negative integer exponent {}", b);
            }
            a.wrapping_pow(b as u32)
        }
        other => config_bail!(
            ConfigErrorCode::AttributeKindMismatch,
            "{} is not an elementwise kind",
            other
        ),
    })
}

pub(crate) fn fuse_f32(fuse: FuseCode, x: f32) -> f32 {
    match fuse {
        FuseCode::None => x,
        FuseCode::Relu => x.max(0.0),
        FuseCode::Relu1 => x.clamp(-1.0, 1.0),
        FuseCode::Relu6 => x.clamp(0.0, 6.0),
    }
}

fn fuse_i32(fuse: FuseCode, x: i32) -> i32 {
    match fuse {
        FuseCode::None => x,
        FuseCode::Relu => x.max(0),
        FuseCode::Relu1 => x.clamp(-1, 1),
        FuseCode::Relu6 => x.clamp(0, 6),
    }
}
