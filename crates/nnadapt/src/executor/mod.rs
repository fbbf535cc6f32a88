//! Fallback executor: runs a prepared graph on host tensors.

pub mod host_tensor;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::core::graph::{Graph, OperandLifetime};
use crate::core::operation::{Operation, OperationKind};
use crate::core::types::DType;
use crate::error::{ConfigErrorCode, Error, Result};
use crate::operation::{execute_operation, has_host_kernel};
use crate::validation::{CapabilitySpec, ValidationTarget};
use crate::{config_bail, config_ensure};

pub use host_tensor::{HostTensor, TensorData};

/// Name the host reports in verdicts and errors.
pub const HOST_TARGET: &str = "host";

static HOST_CAPABILITIES: Lazy<CapabilitySpec> = Lazy::new(|| {
    CapabilitySpec::default()
        .allow_kinds(
            OperationKind::ALL
                .iter()
                .copied()
                .filter(|kind| has_host_kernel(*kind)),
        )
        .allow_dtypes([DType::Bool8, DType::Int32, DType::Int64, DType::Float32])
});

/// Interprets graphs operation by operation in topological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostExecutor;

impl HostExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Executes `graph`, which must be fully prepared, on `inputs` given in
    /// declared input order. Returns the declared outputs in order.
    pub fn run(&self, graph: &Graph, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        config_ensure!(
            graph.is_fully_resolved(),
            ConfigErrorCode::OperandNotResolved,
            "graph must be prepared before execution"
        );
        config_ensure!(
            inputs.len() == graph.inputs().len(),
            ConfigErrorCode::InvalidInput,
            "graph has {} inputs, got {} tensors",
            graph.inputs().len(),
            inputs.len()
        );

        let mut values: Vec<Option<HostTensor>> = vec![None; graph.operands().len()];
        for (id, tensor) in graph.inputs().iter().zip(inputs) {
            let ty = graph.resolved_type(*id)?;
            config_ensure!(
                tensor.dtype() == ty.precision && tensor.rank() == ty.rank(),
                ConfigErrorCode::InvalidInput,
                "input %{} expects {}, got {}",
                id.0,
                ty,
                tensor
            );
            for (&expected, &actual) in ty.dims().iter().zip(tensor.shape()) {
                config_ensure!(
                    expected < 0 || expected as usize == actual,
                    ConfigErrorCode::InvalidInput,
                    "input %{} expects {}, got {}",
                    id.0,
                    ty,
                    tensor
                );
            }
            values[id.0 as usize] = Some(tensor.clone());
        }
        for operand in graph.operands() {
            if operand.lifetime == OperandLifetime::Constant {
                values[operand.id.0 as usize] = Some(HostTensor::from_constant(operand)?);
            }
        }

        for op in graph.operations() {
            let args = op
                .inputs
                .iter()
                .map(|id| {
                    values[id.0 as usize].as_ref().ok_or_else(|| {
                        Error::config(ConfigErrorCode::OperandNotResolved, None::<String>)
                            .at_operand(*id)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let outputs = execute_operation(graph, op, &args)
                .map_err(|err| err.at_operation(op.id, op.kind))?;
            debug!(operation = op.id.0, kind = %op.kind, "executed on host");
            for (id, tensor) in op.outputs.iter().zip(outputs) {
                values[id.0 as usize] = Some(tensor);
            }
        }

        graph
            .outputs()
            .iter()
            .map(|id| match values[id.0 as usize].take() {
                Some(tensor) => Ok(tensor),
                None => config_bail!(ConfigErrorCode::OperandNotResolved, "output %{} was never computed", id.0),
            })
            .collect()
    }
}

impl ValidationTarget for HostExecutor {
    fn target_name(&self) -> &str {
        HOST_TARGET
    }

    fn capabilities(&self) -> &CapabilitySpec {
        &HOST_CAPABILITIES
    }

    fn check_operation(&self, graph: &Graph, op: &Operation) -> std::result::Result<(), String> {
        // Float-only kernels.
        let float_only = (crate::operation::unary_activations::is_unary_activation(op.kind)
            && op.kind != OperationKind::Assign)
            || matches!(
                op.kind,
                OperationKind::BatchNormalization | OperationKind::MatMul | OperationKind::Softmax
            );
        if float_only {
            for input in &op.inputs {
                let precision = graph
                    .resolved_type(*input)
                    .map_err(|err| err.to_string())?
                    .precision;
                if precision != DType::Float32 {
                    return Err(format!("host {} runs on Float32 only, got {precision:?}", op.kind));
                }
            }
        }
        if op.kind.is_elementwise_binary() {
            let precision = graph
                .resolved_type(op.input(0))
                .map_err(|err| err.to_string())?
                .precision;
            if !matches!(precision, DType::Float32 | DType::Int32) {
                return Err(format!("host {} has no {precision:?} kernel", op.kind));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_follow_host_kernels() {
        let (host, other) = (HostExecutor::new(), HostExecutor::new());
        let caps = host.capabilities();
        let kinds = caps.allowed_kinds.as_ref().unwrap();
        assert!(kinds.contains(&OperationKind::Add));
        assert!(kinds.contains(&OperationKind::Softmax));
        assert!(!kinds.contains(&OperationKind::Conv2d));
        assert!(!kinds.contains(&OperationKind::MaxPool2d));

        let dtypes = caps.allowed_dtypes.as_ref().unwrap();
        assert!(dtypes.contains(&DType::Float32));
        assert!(!dtypes.contains(&DType::Float16));
        assert!(std::ptr::eq(caps, other.capabilities()));
    }
}
