//! Backend-neutral data model: operand types, operations and the graph that owns them.

pub mod graph;
pub mod operation;
pub mod types;

pub use graph::{Graph, Operand, OperandId, OperandLifetime, OperationId};
pub use operation::{
    Arity, Attributes, AutoPad, Conv2dAttrs, Conv2dTransposeAttrs, FuseCode, Operation,
    OperationKind, Pool2dAttrs, SliceAttrs,
};
pub use types::{
    production, DType, DataLayout, Dimensions, Dims, OperandType, QuantParams,
    MAX_DIMENSIONS_COUNT, MAX_DYNAMIC_DIMENSIONS_COUNT, UNKNOWN_DIMENSION,
};
