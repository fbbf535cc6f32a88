use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::graph::{OperandId, OperationId};
use crate::core::types::DType;

macro_rules! operation_kinds {
    ($($variant:ident => $name:literal,)*) => {
        /// Closed set of operation kinds understood by every stage of the pipeline.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[allow(clippy::upper_case_acronyms)]
        pub enum OperationKind {
            $($variant,)*
        }

        impl OperationKind {
            pub const ALL: &'static [OperationKind] = &[$(OperationKind::$variant,)*];
            pub const COUNT: usize = OperationKind::ALL.len();

            /// Canonical upper-case name, as used by registration tables.
            pub fn name(self) -> &'static str {
                match self {
                    $(OperationKind::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(OperationKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

operation_kinds! {
    Abs => "ABS",
    Add => "ADD",
    Assign => "ASSIGN",
    AveragePool2d => "AVERAGE_POOL_2D",
    BatchNormalization => "BATCH_NORMALIZATION",
    Cast => "CAST",
    Concat => "CONCAT",
    Conv2d => "CONV_2D",
    Conv2dTranspose => "CONV_2D_TRANSPOSE",
    Div => "DIV",
    Equal => "EQUAL",
    Exp => "EXP",
    Flatten => "FLATTEN",
    Floor => "FLOOR",
    Gelu => "GELU",
    GreaterEqual => "GREATER_EQUAL",
    HardSigmoid => "HARD_SIGMOID",
    HardSwish => "HARD_SWISH",
    LeakyRelu => "LEAKY_RELU",
    Log => "LOG",
    MatMul => "MAT_MUL",
    Max => "MAX",
    MaxPool2d => "MAX_POOL_2D",
    Min => "MIN",
    Mul => "MUL",
    Pow => "POW",
    Relu => "RELU",
    Relu6 => "RELU6",
    Reshape => "RESHAPE",
    Sigmoid => "SIGMOID",
    Slice => "SLICE",
    Softmax => "SOFTMAX",
    Softplus => "SOFTPLUS",
    Split => "SPLIT",
    Squeeze => "SQUEEZE",
    Stack => "STACK",
    Sub => "SUB",
    Swish => "SWISH",
    Tanh => "TANH",
    Transpose => "TRANSPOSE",
    Unsqueeze => "UNSQUEEZE",
}

impl OperationKind {
    /// Dense ordinal used to index per-kind tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_elementwise_binary(self) -> bool {
        matches!(
            self,
            OperationKind::Add
                | OperationKind::Sub
                | OperationKind::Mul
                | OperationKind::Div
                | OperationKind::Max
                | OperationKind::Min
                | OperationKind::Pow
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, OperationKind::Equal | OperationKind::GreaterEqual)
    }

    /// Kinds whose only attribute-free semantics is `y = f(x)`.
    pub fn is_plain_unary(self) -> bool {
        matches!(
            self,
            OperationKind::Abs
                | OperationKind::Assign
                | OperationKind::Exp
                | OperationKind::Floor
                | OperationKind::HardSwish
                | OperationKind::Log
                | OperationKind::Relu
                | OperationKind::Relu6
                | OperationKind::Sigmoid
                | OperationKind::Swish
                | OperationKind::Tanh
        )
    }

    /// Expected number of input and output operands.
    pub fn arity(self) -> (Arity, Arity) {
        use OperationKind::*;
        match self {
            Add | Sub | Mul | Div | Max | Min | Pow | Equal | GreaterEqual | MatMul => {
                (Arity::Exact(2), Arity::Exact(1))
            }
            // input, filter, optional bias
            Conv2d | Conv2dTranspose => (Arity::Range(2, 3), Arity::Exact(1)),
            // input, scale, bias, mean, variance
            BatchNormalization => (Arity::Exact(5), Arity::Exact(1)),
            Concat | Stack => (Arity::AtLeast(1), Arity::Exact(1)),
            Split => (Arity::Exact(1), Arity::AtLeast(1)),
            _ => (Arity::Exact(1), Arity::Exact(1)),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand-count contract of one side of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(lo, hi) => write!(f, "{lo}..={hi}"),
        }
    }
}

/// Activation fused into the tail of arithmetic and convolution kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FuseCode {
    #[default]
    None,
    Relu,
    Relu1,
    Relu6,
}

/// Padding policy for spatial kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoPad {
    /// Use the explicit `pads` values.
    #[default]
    Explicit,
    Same,
    Valid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2dAttrs {
    pub auto_pad: AutoPad,
    /// top, bottom, left, right
    pub pads: [i32; 4],
    pub strides: [i32; 2],
    pub dilations: [i32; 2],
    pub group: i32,
    pub fuse_code: FuseCode,
}

impl Default for Conv2dAttrs {
    fn default() -> Self {
        Self {
            auto_pad: AutoPad::Explicit,
            pads: [0; 4],
            strides: [1, 1],
            dilations: [1, 1],
            group: 1,
            fuse_code: FuseCode::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2dTransposeAttrs {
    pub conv: Conv2dAttrs,
    pub output_padding: [i32; 2],
    pub output_shape: Option<[i32; 2]>,
}

impl Default for Conv2dTransposeAttrs {
    fn default() -> Self {
        Self {
            conv: Conv2dAttrs::default(),
            output_padding: [0, 0],
            output_shape: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool2dAttrs {
    pub auto_pad: AutoPad,
    pub pads: [i32; 4],
    /// `None` pools over the whole spatial extent.
    pub kernel: Option<[i32; 2]>,
    pub strides: [i32; 2],
    pub ceil_mode: bool,
    /// Only meaningful for average pooling.
    pub count_include_pad: bool,
    pub fuse_code: FuseCode,
}

impl Default for Pool2dAttrs {
    fn default() -> Self {
        Self {
            auto_pad: AutoPad::Explicit,
            pads: [0; 4],
            kernel: Some([2, 2]),
            strides: [2, 2],
            ceil_mode: false,
            count_include_pad: false,
            fuse_code: FuseCode::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceAttrs {
    pub axes: Vec<i32>,
    pub starts: Vec<i32>,
    pub ends: Vec<i32>,
    pub steps: Vec<i32>,
}

/// Typed attribute record; each variant belongs to a fixed set of kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attributes {
    /// Attribute-free unary kinds (see [`OperationKind::is_plain_unary`]).
    None,
    Elementwise { fuse_code: FuseCode },
    Comparison,
    Conv2d(Conv2dAttrs),
    Conv2dTranspose(Conv2dTransposeAttrs),
    Pool2d(Pool2dAttrs),
    BatchNormalization { epsilon: f32 },
    Cast { dtype: DType },
    Concat { axis: i32 },
    Flatten { start_axis: i32, end_axis: i32 },
    Gelu { approximate: bool },
    HardSigmoid { alpha: f32, beta: f32 },
    LeakyRelu { alpha: f32 },
    MatMul { transpose_x: bool, transpose_y: bool },
    Reshape { shape: Vec<i32> },
    Slice(SliceAttrs),
    Softmax { axis: i32 },
    Softplus { beta: f32, threshold: f32 },
    Split { axis: i32, split: Vec<i32> },
    Squeeze { axes: Vec<i32> },
    Stack { axis: i32 },
    Transpose { perm: Vec<i32> },
    Unsqueeze { axes: Vec<i32> },
}

impl Attributes {
    /// Returns true when this record is the attribute shape of `kind`.
    pub fn accepts(&self, kind: OperationKind) -> bool {
        use OperationKind as K;
        match self {
            Attributes::None => kind.is_plain_unary(),
            Attributes::Elementwise { .. } => kind.is_elementwise_binary(),
            Attributes::Comparison => kind.is_comparison(),
            Attributes::Conv2d(_) => kind == K::Conv2d,
            Attributes::Conv2dTranspose(_) => kind == K::Conv2dTranspose,
            Attributes::Pool2d(_) => matches!(kind, K::AveragePool2d | K::MaxPool2d),
            Attributes::BatchNormalization { .. } => kind == K::BatchNormalization,
            Attributes::Cast { .. } => kind == K::Cast,
            Attributes::Concat { .. } => kind == K::Concat,
            Attributes::Flatten { .. } => kind == K::Flatten,
            Attributes::Gelu { .. } => kind == K::Gelu,
            Attributes::HardSigmoid { .. } => kind == K::HardSigmoid,
            Attributes::LeakyRelu { .. } => kind == K::LeakyRelu,
            Attributes::MatMul { .. } => kind == K::MatMul,
            Attributes::Reshape { .. } => kind == K::Reshape,
            Attributes::Slice(_) => kind == K::Slice,
            Attributes::Softmax { .. } => kind == K::Softmax,
            Attributes::Softplus { .. } => kind == K::Softplus,
            Attributes::Split { .. } => kind == K::Split,
            Attributes::Squeeze { .. } => kind == K::Squeeze,
            Attributes::Stack { .. } => kind == K::Stack,
            Attributes::Transpose { .. } => kind == K::Transpose,
            Attributes::Unsqueeze { .. } => kind == K::Unsqueeze,
        }
    }

    pub fn fuse_code(&self) -> FuseCode {
        match self {
            Attributes::Elementwise { fuse_code } => *fuse_code,
            Attributes::Conv2d(attrs) => attrs.fuse_code,
            Attributes::Conv2dTranspose(attrs) => attrs.conv.fuse_code,
            Attributes::Pool2d(attrs) => attrs.fuse_code,
            _ => FuseCode::None,
        }
    }
}

/// One typed computation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub inputs: Vec<OperandId>,
    pub outputs: Vec<OperandId>,
    pub attrs: Attributes,
}

impl Operation {
    pub fn input(&self, index: usize) -> OperandId {
        self.inputs[index]
    }

    pub fn output(&self) -> OperandId {
        self.outputs[0]
    }
}
