use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ConfigErrorCode, Result};
use crate::{config_bail, config_ensure};

/// Maximum rank of any operand.
pub const MAX_DIMENSIONS_COUNT: usize = 8;
/// Maximum number of dynamic shape alternatives carried by one operand.
pub const MAX_DYNAMIC_DIMENSIONS_COUNT: usize = 8;
/// Extent that is not known until run time.
pub const UNKNOWN_DIMENSION: i32 = -1;

/// One full shape: a bounded sequence of signed extents.
pub type Dims = SmallVec<[i32; MAX_DIMENSIONS_COUNT]>;

/// Enumerates scalar element kinds, including quantized integer storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool8,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float16,
    Float32,
    Float64,
    QuantInt8SymmPerLayer,
    QuantInt8SymmPerChannel,
    QuantUInt8AsymmPerLayer,
    QuantInt32SymmPerLayer,
    QuantInt32SymmPerChannel,
}

impl DType {
    pub fn is_quantized(self) -> bool {
        matches!(
            self,
            DType::QuantInt8SymmPerLayer
                | DType::QuantInt8SymmPerChannel
                | DType::QuantUInt8AsymmPerLayer
                | DType::QuantInt32SymmPerLayer
                | DType::QuantInt32SymmPerChannel
        )
    }

    pub fn is_per_channel(self) -> bool {
        matches!(
            self,
            DType::QuantInt8SymmPerChannel | DType::QuantInt32SymmPerChannel
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float16 | DType::Float32 | DType::Float64)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::UInt8
                | DType::Int16
                | DType::UInt16
                | DType::Int32
                | DType::UInt32
                | DType::Int64
                | DType::UInt64
        )
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool8
            | DType::Int8
            | DType::UInt8
            | DType::QuantInt8SymmPerLayer
            | DType::QuantInt8SymmPerChannel
            | DType::QuantUInt8AsymmPerLayer => 1,
            DType::Int16 | DType::UInt16 | DType::Float16 => 2,
            DType::Int32
            | DType::UInt32
            | DType::Float32
            | DType::QuantInt32SymmPerLayer
            | DType::QuantInt32SymmPerChannel => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }
}

/// Memory layout hint used by spatial operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataLayout {
    #[default]
    Nchw,
    Nhwc,
}

/// Scale/zero-point pairs attached to quantized operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuantParams {
    PerTensor {
        scale: f32,
        zero_point: i32,
    },
    PerChannel {
        scales: Vec<f32>,
        zero_points: Vec<i32>,
        channel_dim: u32,
    },
}

/// Static shape plus the bounded list of alternative runtime shapes.
///
/// Every alternative has the rank of the static shape; the constructors
/// enforce it so shape routines can transform all entries uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    data: Dims,
    dynamic: SmallVec<[Dims; MAX_DYNAMIC_DIMENSIONS_COUNT]>,
}

impl Dimensions {
    pub fn new(dims: &[i32]) -> Result<Self> {
        check_rank(dims.len())?;
        Ok(Self {
            data: Dims::from_slice(dims),
            dynamic: SmallVec::new(),
        })
    }

    pub fn with_dynamic(dims: &[i32], alternatives: &[&[i32]]) -> Result<Self> {
        let mut out = Self::new(dims)?;
        for alternative in alternatives {
            out.push_alternative(alternative)?;
        }
        Ok(out)
    }

    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn push_alternative(&mut self, dims: &[i32]) -> Result<()> {
        config_ensure!(
            dims.len() == self.data.len(),
            ConfigErrorCode::RankMismatch,
            "dynamic alternative {:?} has rank {}, static shape has rank {}",
            dims,
            dims.len(),
            self.data.len()
        );
        config_ensure!(
            self.dynamic.len() < MAX_DYNAMIC_DIMENSIONS_COUNT,
            ConfigErrorCode::TooManyDynamicAlternatives,
            "at most {} alternatives are allowed",
            MAX_DYNAMIC_DIMENSIONS_COUNT
        );
        self.dynamic.push(Dims::from_slice(dims));
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic.len()
    }

    pub fn dynamic(&self) -> impl ExactSizeIterator<Item = &[i32]> {
        self.dynamic.iter().map(|dims| dims.as_slice())
    }

    pub fn alternative(&self, index: usize) -> Option<&[i32]> {
        self.dynamic.get(index).map(|dims| dims.as_slice())
    }

    pub fn has_unknown(&self) -> bool {
        self.data.iter().any(|&dim| dim == UNKNOWN_DIMENSION)
    }

    /// Returns the element count when every static extent is known.
    pub fn production(&self) -> Option<usize> {
        production(&self.data)
    }

    /// Applies one shape transform to the static shape and to every
    /// alternative, keeping alternatives at their original index.
    pub fn map_all<F>(&self, mut transform: F) -> Result<Self>
    where
        F: FnMut(&[i32]) -> Result<Dims>,
    {
        let data = transform(&self.data)?;
        check_rank(data.len())?;
        let mut dynamic = SmallVec::new();
        for alternative in &self.dynamic {
            let mapped = transform(alternative)?;
            config_ensure!(
                mapped.len() == data.len(),
                ConfigErrorCode::RankMismatch,
                "transformed alternative has rank {}, static shape has rank {}",
                mapped.len(),
                data.len()
            );
            dynamic.push(mapped);
        }
        Ok(Self { data, dynamic })
    }
}

fn check_rank(rank: usize) -> Result<()> {
    if rank > MAX_DIMENSIONS_COUNT {
        config_bail!(
            ConfigErrorCode::RankTooLarge,
            "rank {} exceeds {}",
            rank,
            MAX_DIMENSIONS_COUNT
        );
    }
    Ok(())
}

/// Element count of a fully known shape.
pub fn production(dims: &[i32]) -> Option<usize> {
    let mut count = 1usize;
    for &dim in dims {
        if dim < 0 {
            return None;
        }
        count = count.checked_mul(dim as usize)?;
    }
    Some(count)
}

/// Shape, precision and quantization contract of one tensor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandType {
    pub precision: DType,
    pub layout: DataLayout,
    pub dimensions: Dimensions,
    pub quant: Option<QuantParams>,
}

impl OperandType {
    pub fn new(precision: DType, dimensions: Dimensions) -> Self {
        Self {
            precision,
            layout: DataLayout::default(),
            dimensions,
            quant: None,
        }
    }

    pub fn float32(dims: &[i32]) -> Result<Self> {
        Ok(Self::new(DType::Float32, Dimensions::new(dims)?))
    }

    pub fn int32(dims: &[i32]) -> Result<Self> {
        Ok(Self::new(DType::Int32, Dimensions::new(dims)?))
    }

    pub fn with_quant(mut self, quant: QuantParams) -> Self {
        self.quant = Some(quant);
        self
    }

    pub fn with_layout(mut self, layout: DataLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Copies precision, layout and quantization parameters and replaces the shape.
    pub fn with_dimensions(&self, dimensions: Dimensions) -> Self {
        Self {
            precision: self.precision,
            layout: self.layout,
            dimensions,
            quant: self.quant.clone(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dimensions.count()
    }

    pub fn dims(&self) -> &[i32] {
        self.dimensions.data()
    }

    pub fn byte_len(&self) -> Option<usize> {
        self.dimensions
            .production()?
            .checked_mul(self.precision.size_in_bytes())
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.precision, format_dims(self.dims()))?;
        if self.dimensions.dynamic_count() > 0 {
            let alternatives = self
                .dimensions
                .dynamic()
                .map(format_dims)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " dynamic={{{alternatives}}}")?;
        }
        match &self.quant {
            Some(QuantParams::PerTensor { scale, zero_point }) => {
                write!(f, " scale={scale} zero_point={zero_point}")
            }
            Some(QuantParams::PerChannel {
                scales,
                channel_dim,
                ..
            }) => write!(f, " per_channel(dim={channel_dim}, n={})", scales.len()),
            None => Ok(()),
        }
    }
}

pub(crate) fn format_dims(dims: &[i32]) -> String {
    let inner = dims
        .iter()
        .map(|dim| {
            if *dim == UNKNOWN_DIMENSION {
                "?".to_string()
            } else {
                dim.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("[{inner}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternatives_must_match_static_rank() {
        let err = Dimensions::with_dynamic(&[-1, 3], &[&[1, 3], &[2, 3, 4]])
            .expect_err("rank 3 alternative must be rejected");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::RankMismatch));
    }

    #[test]
    fn rank_above_maximum_is_rejected() {
        let dims = [1; MAX_DIMENSIONS_COUNT + 1];
        let err = Dimensions::new(&dims).expect_err("rank 9 must be rejected");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::RankTooLarge));
    }

    #[test]
    fn with_dimensions_keeps_quant_params() {
        let base = OperandType::new(DType::QuantInt8SymmPerLayer, Dimensions::new(&[2, 2]).unwrap())
            .with_quant(QuantParams::PerTensor {
                scale: 0.5,
                zero_point: 0,
            });
        let derived = base.with_dimensions(Dimensions::new(&[4]).unwrap());
        assert_eq!(derived.precision, DType::QuantInt8SymmPerLayer);
        assert_eq!(derived.quant, base.quant);
        assert_eq!(derived.dims(), &[4]);
    }

    #[test]
    fn map_all_transforms_every_alternative() {
        let dims = Dimensions::with_dynamic(&[-1, 4], &[&[1, 4], &[8, 4]]).unwrap();
        let doubled = dims
            .map_all(|d| Ok(d.iter().map(|&x| if x < 0 { x } else { x * 2 }).collect()))
            .unwrap();
        assert_eq!(doubled.data(), &[-1, 8]);
        assert_eq!(doubled.alternative(0), Some(&[2, 8][..]));
        assert_eq!(doubled.alternative(1), Some(&[16, 8][..]));
    }

    #[test]
    fn display_marks_unknown_extents() {
        let ty = OperandType::float32(&[-1, 3]).unwrap();
        assert_eq!(ty.to_string(), "Float32[?,3]");
    }
}
