extern crate self as nnadapt;

pub mod config;
pub mod converter;
pub mod core;
pub mod error;
pub mod executor;
pub mod logging;
pub mod operation;
pub mod session;
pub mod validation;

pub use crate::config::{CompileCacheKey, CompileOptions};
pub use crate::converter::{
    convert_graph, BackendDriver, ConverterContext, ConverterEntry, ConverterRegistry,
    OperandNodeCache, RegistryBuilder,
};
pub use crate::core::{
    Attributes, DType, DataLayout, Dimensions, Graph, Operand, OperandId, OperandType, Operation,
    OperationId, OperationKind,
};
pub use crate::error::{ConfigError, ConfigErrorCode, Error, Result};
pub use crate::executor::{HostExecutor, HostTensor, TensorData};
pub use crate::operation::{prepare_graph, prepare_operation};
pub use crate::session::{CompileReport, Compiled, HostProgram, OperationState, Route, Session};
pub use crate::validation::{
    validate_graph, validate_operation, CapabilitySpec, Diagnostic, ValidationReport,
    ValidationTarget,
};
