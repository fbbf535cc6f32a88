use crate::core::graph::Graph;
use crate::core::operation::{Attributes, Operation};
use crate::core::types::{production, Dims, OperandType, UNKNOWN_DIMENSION};
use crate::error::{ConfigErrorCode, Result};
use crate::executor::HostTensor;
use crate::operation::utility::input_type;
use crate::{config_bail, config_ensure};

/// Applies a target shape where `0` copies the input extent at the same
/// position and a single `-1` absorbs the remaining element count.
pub fn reshape_dims(input: &[i32], target: &[i32]) -> Result<Dims> {
    let mut out = Dims::with_capacity(target.len());
    let mut infer_at = None;
    for (i, &extent) in target.iter().enumerate() {
        match extent {
            0 => {
                config_ensure!(
                    i < input.len(),
                    ConfigErrorCode::InvalidAttributeValue,
                    "target position {} copies a missing input axis",
                    i
                );
                out.push(input[i]);
            }
            UNKNOWN_DIMENSION => {
                config_ensure!(
                    infer_at.is_none(),
                    ConfigErrorCode::InvalidAttributeValue,
                    "target shape {:?} has more than one -1",
                    target
                );
                infer_at = Some(i);
                out.push(UNKNOWN_DIMENSION);
            }
            e if e > 0 => out.push(e),
            e => config_bail!(
                ConfigErrorCode::InvalidAttributeValue,
                "target extent {} is invalid",
                e
            ),
        }
    }

    let total = production(input);
    let known = out
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != infer_at)
        .map(|(_, &d)| d)
        .collect::<Dims>();
    let known_count = production(&known);
    match (infer_at, total, known_count) {
        (Some(at), Some(total), Some(known)) => {
            config_ensure!(
                known > 0 && total % known == 0,
                ConfigErrorCode::ShapeMismatch,
                "cannot reshape {:?} into {:?}",
                input,
                target
            );
            out[at] = (total / known) as i32;
        }
        (None, Some(total), Some(known)) => {
            config_ensure!(
                total == known,
                ConfigErrorCode::ShapeMismatch,
                "cannot reshape {} elements into {:?}",
                total,
                target
            );
        }
        _ => {}
    }
    Ok(out)
}

fn target_of(op: &Operation) -> Result<&[i32]> {
    match &op.attrs {
        Attributes::Reshape { shape } => Ok(shape.as_slice()),
        other => config_bail!(ConfigErrorCode::AttributeKindMismatch, "{:?}", other),
    }
}

pub(crate) fn prepare(graph: &Graph, op: &Operation) -> Result<OperandType> {
    let input = input_type(graph, op, 0)?;
    let target = target_of(op)?;
    let dimensions = input
        .dimensions
        .map_all(|dims| reshape_dims(dims, target))?;
    Ok(input.with_dimensions(dimensions))
}

pub(crate) fn execute(_graph: &Graph, op: &Operation, inputs: &[&HostTensor]) -> Result<HostTensor> {
    let dims = reshape_dims(&inputs[0].dims(), target_of(op)?)?;
    inputs[0].reshaped(dims.iter().map(|&d| d as usize).collect())
}
