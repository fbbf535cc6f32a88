//! Shape-preserving activations: ABS, ASSIGN, EXP, FLOOR, GELU, HARD_SIGMOID,
//! HARD_SWISH, LEAKY_RELU, LOG, RELU, RELU6, SIGMOID, SOFTPLUS, SWISH, TANH.

use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation, OperationKind};
use crate::core::types::OperandType;
use crate::error::{ConfigErrorCode, Result};
use crate::executor::HostTensor;
use crate::operation::utility::input_type;
use crate::{config_bail, config_ensure};

pub fn is_unary_activation(kind: OperationKind) -> bool {
    kind.is_plain_unary()
        || matches!(
            kind,
            OperationKind::Gelu
                | OperationKind::HardSigmoid
                | OperationKind::LeakyRelu
                | OperationKind::Softplus
        )
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    if let Attributes::Softplus { beta, .. } = op.attrs {
        config_ensure!(
            beta != 0.0,
            ConfigErrorCode::InvalidAttributeValue,
            "softplus beta must be non-zero"
        );
    }
    Ok(input.clone())
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let input = inputs[0];
    if op.kind == OperationKind::Assign {
        return Ok(input.clone());
    }
    let values = input.expect_f32(op.kind.name())?;
    let apply: Box<dyn Fn(f32) -> f32> = match (&op.kind, &op.attrs) {
        (OperationKind::Abs, _) => Box::new(f32::abs),
        (OperationKind::Exp, _) => Box::new(f32::exp),
        (OperationKind::Floor, _) => Box::new(f32::floor),
        (OperationKind::Log, _) => Box::new(f32::ln),
        (OperationKind::Tanh, _) => Box::new(f32::tanh),
        (OperationKind::Relu, _) => Box::new(|x: f32| x.max(0.0)),
        (OperationKind::Relu6, _) => Box::new(|x: f32| x.clamp(0.0, 6.0)),
        (OperationKind::Sigmoid, _) => Box::new(sigmoid),
        (OperationKind::Swish, _) => Box::new(|x: f32| x * sigmoid(x)),
        (OperationKind::HardSwish, _) => Box::new(|x: f32| x * (x + 3.0).clamp(0.0, 6.0) / 6.0),
        (OperationKind::Gelu, Attributes::Gelu { approximate }) => {
            if *approximate {
                Box::new(gelu_tanh)
            } else {
                Box::new(|x: f32| 0.5 * x * (1.0 + libm::erff(x / std::f32::consts::SQRT_2)))
            }
        }
        (OperationKind::HardSigmoid, Attributes::HardSigmoid { alpha, beta }) => {
            let (alpha, beta) = (*alpha, *beta);
            Box::new(move |x: f32| (alpha * x + beta).clamp(0.0, 1.0))
        }
        (OperationKind::LeakyRelu, Attributes::LeakyRelu { alpha }) => {
            let alpha = *alpha;
            Box::new(move |x: f32| if x >= 0.0 { x } else { alpha * x })
        }
        (OperationKind::Softplus, Attributes::Softplus { beta, threshold }) => {
            let (beta, threshold) = (*beta, *threshold);
            Box::new(move |x: f32| {
                if beta * x > threshold {
                    x
                } else {
                    (1.0 + (beta * x).exp()).ln() / beta
                }
            })
        }
        (kind, attrs) => config_bail!(
            ConfigErrorCode::AttributeKindMismatch,
            "{} cannot run with {:?}",
            kind,
            attrs
        ),
    };
    HostTensor::from_f32(input.shape(), values.iter().map(|&x| apply(x)).collect())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn gelu_tanh(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tanh_approximation_is_close_to_exact_gelu() {
        for x in [-3.0f32, -1.0, -0.1, 0.0, 0.5, 2.0] {
            let exact = 0.5 * x * (1.0 + libm::erff(x / std::f32::consts::SQRT_2));
            assert!((gelu_tanh(x) - exact).abs() < 1e-3, "x = {x}");
        }
    }
}
