use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{DType, OperandType};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::{HostTensor, TensorData};
use crate::operation::utility::input_type;
use crate::config_bail;

fn target_of(op: &Operation) -> Result<DType> {
    match op.attrs {
        Attributes::Cast { dtype } => Ok(dtype),
        _ => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", op.attrs),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let dtype = target_of(op)?;
    let mut out = OperandType::new(dtype, input.dimensions.clone());
    out.layout = input.layout;
    Ok(out)
}

fn f32_to_i32_trunc_saturating(value: f32) -> i32 {
    if value.is_nan() {
        0
    } else {
        value.trunc().clamp(i32::MIN as f32, i32::MAX as f32) as i32
    }
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let input = inputs[0];
    let target = target_of(op)?;
    let data = match (input.data(), target) {
        (TensorData::F32(v), DType::Float32) => TensorData::F32(v.clone()),
        (TensorData::F32(v), DType::Int32) => {
            TensorData::I32(v.iter().map(|&x| f32_to_i32_trunc_saturating(x)).collect())
        }
        (TensorData::F32(v), DType::Int64) => {
            TensorData::I64(v.iter().map(|&x| if x.is_nan() { 0 } else { x.trunc() as i64 }).collect())
        }
        (TensorData::F32(v), DType::Bool8) => TensorData::Bool(v.iter().map(|&x| x != 0.0).collect()),
        (TensorData::I32(v), DType::Float32) => TensorData::F32(v.iter().map(|&x| x as f32).collect()),
        (TensorData::I32(v), DType::Int32) => TensorData::I32(v.clone()),
        (TensorData::I32(v), DType::Int64) => TensorData::I64(v.iter().map(|&x| x as i64).collect()),
        (TensorData::I32(v), DType::Bool8) => TensorData::Bool(v.iter().map(|&x| x != 0).collect()),
        (TensorData::I64(v), DType::Float32) => TensorData::F32(v.iter().map(|&x| x as f32).collect()),
        (TensorData::I64(v), DType::Int32) => TensorData::I32(v.iter().map(|&x| x as i32).collect()),
        (TensorData::I64(v), DType::Int64) => TensorData::I64(v.clone()),
        (TensorData::I64(v), DType::Bool8) => TensorData::Bool(v.iter().map(|&x| x != 0).collect()),
        (TensorData::Bool(v), DType::Float32) => {
            TensorData::F32(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect())
        }
        (TensorData::Bool(v), DType::Int32) => TensorData::I32(v.iter().map(|&x| x as i32).collect()),
        (TensorData::Bool(v), DType::Int64) => TensorData::I64(v.iter().map(|&x| x as i64).collect()),
        (TensorData::Bool(v), DType::Bool8) => TensorData::Bool(v.clone()),
        (data, target) => config_bail!(
            ConfigErrorCode::DTypeMismatch,
            "host cannot cast {:?} to {:?}",
            data.dtype(),
            target
        ),
    };
    HostTensor::new(input.shape().to_vec(), data)
}
