use std::fmt;

use crate::core::graph::Operand;
use crate::core::types::{DType, Dims};
use crate::error::{ConfigErrorCode, Error, Result};
use crate::{config_bail, config_ensure};

/// Element storage of a host tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

/// Applies the same element-generic expression to whichever variant is present.
macro_rules! map_data {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            TensorData::F32($values) => TensorData::F32($body),
            TensorData::I32($values) => TensorData::I32($body),
            TensorData::I64($values) => TensorData::I64($body),
            TensorData::Bool($values) => TensorData::Bool($body),
        }
    };
}

pub(crate) use map_data;

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(values) => values.len(),
            TensorData::I32(values) => values.len(),
            TensorData::I64(values) => values.len(),
            TensorData::Bool(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::Float32,
            TensorData::I32(_) => DType::Int32,
            TensorData::I64(_) => DType::Int64,
            TensorData::Bool(_) => DType::Bool8,
        }
    }

    /// Picks elements by flat source index.
    pub(crate) fn gather(&self, indices: &[usize]) -> TensorData {
        map_data!(self, values => indices.iter().map(|&index| values[index]).collect())
    }

    /// Concatenates same-typed buffers, taking `chunks[i]` contiguous elements
    /// from part `i` per outer step.
    pub(crate) fn interleave(parts: &[&TensorData], chunks: &[usize], outer: usize) -> Result<TensorData> {
        let first = match parts.first() {
            Some(first) => *first,
            None => config_bail!(ConfigErrorCode::InvalidInput, "no tensors to concatenate"),
        };
        macro_rules! interleave_as {
            ($variant:ident) => {{
                let total = parts.iter().map(|part| part.len()).sum();
                let mut out = Vec::with_capacity(total);
                for step in 0..outer {
                    for (part, &chunk) in parts.iter().zip(chunks) {
                        let TensorData::$variant(values) = part else {
                            config_bail!(
                                ConfigErrorCode::DTypeMismatch,
                                "cannot mix {:?} and {:?}",
                                first.dtype(),
                                part.dtype()
                            );
                        };
                        out.extend_from_slice(&values[step * chunk..(step + 1) * chunk]);
                    }
                }
                TensorData::$variant(out)
            }};
        }
        Ok(match first {
            TensorData::F32(_) => interleave_as!(F32),
            TensorData::I32(_) => interleave_as!(I32),
            TensorData::I64(_) => interleave_as!(I64),
            TensorData::Bool(_) => interleave_as!(Bool),
        })
    }
}

/// Dense row-major tensor owned by the host executor.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl HostTensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        config_ensure!(
            expected == data.len(),
            ConfigErrorCode::InvalidInput,
            "shape {:?} holds {} elements, buffer has {}",
            shape,
            expected,
            data.len()
        );
        Ok(Self { shape, data })
    }

    pub fn from_f32(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        Self::new(shape.to_vec(), TensorData::F32(values))
    }

    pub fn from_i32(shape: &[usize], values: Vec<i32>) -> Result<Self> {
        Self::new(shape.to_vec(), TensorData::I32(values))
    }

    pub fn from_bool(shape: &[usize], values: Vec<bool>) -> Result<Self> {
        Self::new(shape.to_vec(), TensorData::Bool(values))
    }

    /// Decodes the payload of a constant operand.
    pub fn from_constant(operand: &Operand) -> Result<Self> {
        let bytes = operand.buffer().ok_or_else(|| {
            Error::config(
                ConfigErrorCode::InvalidInput,
                format!("operand %{} has no constant payload", operand.id.0),
            )
        })?;
        let shape = to_usize_shape(operand.ty.dims())?;
        let data = match operand.ty.precision {
            DType::Float32 => TensorData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect(),
            ),
            DType::Int32 => TensorData::I32(
                bytes
                    .chunks_exact(4)
                    .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect(),
            ),
            DType::Int64 => TensorData::I64(
                bytes
                    .chunks_exact(8)
                    .map(|chunk| {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(chunk);
                        i64::from_le_bytes(raw)
                    })
                    .collect(),
            ),
            DType::Bool8 => TensorData::Bool(bytes.iter().map(|&byte| byte != 0).collect()),
            other => config_bail!(
                ConfigErrorCode::DTypeMismatch,
                "host tensors cannot hold {:?}",
                other
            ),
        };
        Self::new(shape, data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_data(self) -> TensorData {
        self.data
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            TensorData::I32(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.data {
            TensorData::Bool(values) => Some(values),
            _ => None,
        }
    }

    /// Values widened to `f32`, for tolerance comparisons.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match &self.data {
            TensorData::F32(values) => values.clone(),
            TensorData::I32(values) => values.iter().map(|&v| v as f32).collect(),
            TensorData::I64(values) => values.iter().map(|&v| v as f32).collect(),
            TensorData::Bool(values) => values.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect(),
        }
    }

    pub(crate) fn expect_f32(&self, what: &str) -> Result<&[f32]> {
        self.as_f32().ok_or_else(|| {
            Error::config(
                ConfigErrorCode::DTypeMismatch,
                format!("{what} expects Float32, got {:?}", self.dtype()),
            )
        })
    }

    /// Same elements under a new shape of equal element count.
    pub(crate) fn reshaped(&self, shape: Vec<usize>) -> Result<HostTensor> {
        HostTensor::new(shape, self.data.clone())
    }

    /// Shape in the signed form used by shape inference.
    pub(crate) fn dims(&self) -> Dims {
        self.shape.iter().map(|&dim| dim as i32).collect()
    }
}

impl fmt::Display for HostTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.dtype(), self.shape)
    }
}

/// Converts a fully known signed shape into extents.
pub(crate) fn to_usize_shape(dims: &[i32]) -> Result<Vec<usize>> {
    dims.iter()
        .map(|&dim| {
            if dim < 0 {
                Err(Error::config(
                    ConfigErrorCode::InvalidInput,
                    format!("shape {dims:?} is not fully known"),
                ))
            } else {
                Ok(dim as usize)
            }
        })
        .collect()
}

pub(crate) fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1usize;
    for (i, dim) in dims.iter().enumerate().rev() {
        strides[i] = acc;
        acc *= *dim;
    }
    strides
}

pub(crate) fn unravel_index(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (i, dim) in dims.iter().enumerate().rev() {
        if *dim == 0 {
            continue;
        }
        coords[i] = index % *dim;
        index /= *dim;
    }
    coords
}

/// For every element of `out_dims`, the flat index of the element of
/// `in_dims` it reads under numpy broadcasting.
pub(crate) fn broadcast_source_indices(in_dims: &[usize], out_dims: &[usize]) -> Vec<usize> {
    let count = out_dims.iter().product::<usize>();
    let in_strides = compute_strides(in_dims);
    let offset = out_dims.len() - in_dims.len();
    (0..count)
        .map(|index| {
            let coords = unravel_index(index, out_dims);
            in_dims
                .iter()
                .enumerate()
                .map(|(axis, &dim)| {
                    if dim == 1 {
                        0
                    } else {
                        coords[axis + offset] * in_strides[axis]
                    }
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_element_count() {
        let err = HostTensor::from_f32(&[2, 3], vec![0.0; 5]).expect_err("5 != 6");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::InvalidInput));
    }

    #[test]
    fn broadcast_indices_repeat_rows() {
        let indices = broadcast_source_indices(&[3], &[2, 3]);
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);
        let indices = broadcast_source_indices(&[2, 1], &[2, 3]);
        assert_eq!(indices, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn interleave_concatenates_along_inner_axis() {
        let a = TensorData::I32(vec![1, 2, 3, 4]);
        let b = TensorData::I32(vec![5, 6]);
        let out = TensorData::interleave(&[&a, &b], &[2, 1], 2).unwrap();
        assert_eq!(out, TensorData::I32(vec![1, 2, 5, 3, 4, 6]));
    }
}
