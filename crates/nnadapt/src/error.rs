use std::fmt;

use thiserror::Error;

use crate::core::graph::{OperandId, OperationId};
use crate::core::operation::OperationKind;

/// Stable identifiers for configuration failures detected while building,
/// preparing or lowering a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigErrorCode {
    InvalidAxis,
    RankMismatch,
    RankTooLarge,
    TooManyDynamicAlternatives,
    ArityMismatch,
    AttributeKindMismatch,
    DimensionNotOne,
    ShapeMismatch,
    DTypeMismatch,
    InvalidAttributeValue,
    BufferSizeMismatch,
    UnknownOperand,
    OperandNotResolved,
    OperandNotLowered,
    OperandAlreadyLowered,
    DuplicateConverter,
    InvalidInput,
    EncodingFailed,
}

impl ConfigErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigErrorCode::InvalidAxis => "axis out of range",
            ConfigErrorCode::RankMismatch => "rank mismatch",
            ConfigErrorCode::RankTooLarge => "rank exceeds the maximum dimension count",
            ConfigErrorCode::TooManyDynamicAlternatives => {
                "dynamic shape alternatives exceed the maximum count"
            }
            ConfigErrorCode::ArityMismatch => "operand arity does not match the operation kind",
            ConfigErrorCode::AttributeKindMismatch => {
                "attributes do not belong to the operation kind"
            }
            ConfigErrorCode::DimensionNotOne => "axis to squeeze must have extent 1",
            ConfigErrorCode::ShapeMismatch => "shape mismatch",
            ConfigErrorCode::DTypeMismatch => "precision mismatch",
            ConfigErrorCode::InvalidAttributeValue => "invalid attribute value",
            ConfigErrorCode::BufferSizeMismatch => "constant buffer size does not match its type",
            ConfigErrorCode::UnknownOperand => "unknown operand",
            ConfigErrorCode::OperandNotResolved => "operand type is not resolved yet",
            ConfigErrorCode::OperandNotLowered => "operand has no backend node",
            ConfigErrorCode::OperandAlreadyLowered => "operand already has a backend node",
            ConfigErrorCode::DuplicateConverter => "a different converter is already registered",
            ConfigErrorCode::InvalidInput => "invalid runtime input",
            ConfigErrorCode::EncodingFailed => "value could not be encoded for hashing",
        }
    }
}

/// Deterministic configuration failure, optionally pinned to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub code: ConfigErrorCode,
    pub operation: Option<(OperationId, OperationKind)>,
    pub operand: Option<OperandId>,
    pub detail: Option<String>,
}

impl ConfigError {
    pub fn new(code: ConfigErrorCode, detail: impl Into<Option<String>>) -> Self {
        Self {
            code,
            operation: None,
            operand: None,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code.as_str())?;
        if let Some((id, kind)) = &self.operation {
            write!(f, " in operation #{} ({})", id.0, kind)?;
        }
        if let Some(operand) = &self.operand {
            write!(f, " at operand %{}", operand.0)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// All failures surfaced by the core.
///
/// `Config` is a rejection of the graph as built and is never retried.
/// `Unsupported` is a capability gap of one target: callers route the
/// operation somewhere else instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(ConfigError),
    #[error("{kind} is not supported by {backend}: {reason}")]
    Unsupported {
        backend: String,
        kind: OperationKind,
        reason: String,
    },
}

impl Error {
    pub fn config(code: ConfigErrorCode, detail: impl Into<Option<String>>) -> Self {
        Error::Config(ConfigError::new(code, detail))
    }

    pub fn unsupported(
        backend: impl Into<String>,
        kind: OperationKind,
        reason: impl Into<String>,
    ) -> Self {
        Error::Unsupported {
            backend: backend.into(),
            kind,
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    pub fn config_code(&self) -> Option<ConfigErrorCode> {
        match self {
            Error::Config(err) => Some(err.code),
            Error::Unsupported { .. } => None,
        }
    }

    /// Attaches the offending operation unless one is already recorded.
    pub fn at_operation(mut self, id: OperationId, kind: OperationKind) -> Self {
        if let Error::Config(err) = &mut self {
            if err.operation.is_none() {
                err.operation = Some((id, kind));
            }
        }
        self
    }

    pub fn at_operand(mut self, operand: OperandId) -> Self {
        if let Error::Config(err) = &mut self {
            if err.operand.is_none() {
                err.operand = Some(operand);
            }
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Returns early with a configuration error built from a code and a formatted detail.
#[macro_export]
macro_rules! config_bail {
    ($code:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::config($code, format!($($arg)*)))
    };
}

/// Checks a configuration precondition, returning the error when it does not hold.
#[macro_export]
macro_rules! config_ensure {
    ($cond:expr, $code:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::config_bail!($code, $($arg)*);
        }
    };
}
