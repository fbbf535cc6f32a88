//! Target-specific validation ("Validate").
//!
//! A verdict is a plain `bool`: a rejected operation is routed elsewhere,
//! never reported as an error.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::core::graph::{Graph, OperationId};
use crate::core::operation::{Attributes, Operation, OperationKind};
use crate::core::types::{DType, MAX_DIMENSIONS_COUNT};

/// Static capabilities of an execution target.
#[derive(Debug, Clone)]
pub struct CapabilitySpec {
    pub allowed_kinds: Option<HashSet<OperationKind>>,
    pub allowed_dtypes: Option<HashSet<DType>>,
    pub allow_dynamic_shapes: bool,
    pub max_rank: usize,
}

impl Default for CapabilitySpec {
    fn default() -> Self {
        Self {
            allowed_kinds: None,
            allowed_dtypes: None,
            allow_dynamic_shapes: true,
            max_rank: MAX_DIMENSIONS_COUNT,
        }
    }
}

impl CapabilitySpec {
    pub fn allow_kinds(mut self, kinds: impl IntoIterator<Item = OperationKind>) -> Self {
        self.allowed_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn allow_dtypes(mut self, dtypes: impl IntoIterator<Item = DType>) -> Self {
        self.allowed_dtypes = Some(dtypes.into_iter().collect());
        self
    }

    pub fn with_dynamic_shapes(mut self, allowed: bool) -> Self {
        self.allow_dynamic_shapes = allowed;
        self
    }

    pub fn with_max_rank(mut self, max_rank: usize) -> Self {
        self.max_rank = max_rank;
        self
    }

    fn allows_dtype(&self, dtype: DType) -> bool {
        self.allowed_dtypes
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&dtype))
    }

    /// Checks the operation against the static capabilities; `Err` carries the reason.
    pub fn check(&self, graph: &Graph, op: &Operation) -> Result<(), String> {
        if let Some(kinds) = &self.allowed_kinds {
            if !kinds.contains(&op.kind) {
                return Err(format!("{} is not in the supported operation set", op.kind));
            }
        }
        for input in &op.inputs {
            let ty = graph
                .resolved_type(*input)
                .map_err(|err| format!("input %{}: {err}", input.0))?;
            if !self.allows_dtype(ty.precision) {
                return Err(format!("input %{} has unsupported precision {:?}", input.0, ty.precision));
            }
            if ty.rank() > self.max_rank {
                return Err(format!(
                    "input %{} has rank {}, at most {} is supported",
                    input.0,
                    ty.rank(),
                    self.max_rank
                ));
            }
            if !self.allow_dynamic_shapes
                && (ty.dimensions.has_unknown() || ty.dimensions.dynamic_count() > 0)
            {
                return Err(format!("input %{} has a dynamic shape", input.0));
            }
        }
        if let Attributes::Cast { dtype } = op.attrs {
            if !self.allows_dtype(dtype) {
                return Err(format!("cast target {dtype:?} is not supported"));
            }
        }
        Ok(())
    }
}

/// Anything an operation can be validated against: a backend or the host.
pub trait ValidationTarget {
    fn target_name(&self) -> &str;

    fn capabilities(&self) -> &CapabilitySpec;

    /// Per-kind predicate applied after the capability check.
    fn check_operation(&self, _graph: &Graph, _op: &Operation) -> Result<(), String> {
        Ok(())
    }
}

/// Full verdict with the rejection reason.
pub fn check_operation<T: ValidationTarget + ?Sized>(
    graph: &Graph,
    op: &Operation,
    target: &T,
) -> Result<(), String> {
    target.capabilities().check(graph, op)?;
    target.check_operation(graph, op)
}

/// Returns whether `target` accepts `op` as currently typed. Pure.
pub fn validate_operation<T: ValidationTarget + ?Sized>(graph: &Graph, op: &Operation, target: &T) -> bool {
    match check_operation(graph, op, target) {
        Ok(()) => true,
        Err(reason) => {
            debug!(
                target_name = target.target_name(),
                operation = op.id.0,
                kind = %op.kind,
                %reason,
                "operation rejected"
            );
            false
        }
    }
}

/// One rejected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub operation: OperationId,
    pub kind: OperationKind,
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.operation.0, self.kind, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub target: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn rejects(&self, id: OperationId) -> bool {
        self.diagnostics.iter().any(|d| d.operation == id)
    }

    pub fn first(&self) -> Option<&Diagnostic> {
        self.diagnostics.first()
    }

    pub(crate) fn record(&mut self, op: &Operation, reason: String) {
        debug!(
            target_name = %self.target,
            operation = op.id.0,
            kind = %op.kind,
            %reason,
            "operation rejected"
        );
        self.diagnostics.push(Diagnostic {
            operation: op.id,
            kind: op.kind,
            reason,
        });
    }
}

/// Validates every operation of a fully prepared graph.
pub fn validate_graph<T: ValidationTarget + ?Sized>(graph: &Graph, target: &T) -> ValidationReport {
    let mut report = ValidationReport::new(target.target_name());
    for op in graph.operations() {
        if let Err(reason) = check_operation(graph, op, target) {
            report.record(op, reason);
        }
    }
    report
}
