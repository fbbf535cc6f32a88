use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::operation::{Attributes, Operation, OperationKind};
use crate::core::types::{Dimensions, OperandType};
use crate::error::{ConfigErrorCode, Error, Result};
use crate::{config_bail, config_ensure};

/// Position of an operand inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperandId(pub u32);

/// Position of an operation inside its graph; also its topological rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandLifetime {
    /// Supplied by the caller at run time.
    Input,
    /// Owns a constant payload.
    Constant,
    /// Produced by an operation.
    Temporary,
}

/// One tensor value of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    pub id: OperandId,
    pub ty: OperandType,
    pub lifetime: OperandLifetime,
    pub is_output: bool,
    buffer: Option<Arc<[u8]>>,
    resolved: bool,
}

impl Operand {
    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    pub fn is_constant(&self) -> bool {
        self.lifetime == OperandLifetime::Constant
    }

    /// True once the full type is known: at creation for inputs and
    /// constants, after Prepare for computed operands.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Decodes the constant payload as little-endian `i32` values.
    pub fn constant_i32(&self) -> Option<Vec<i32>> {
        let bytes = self.buffer()?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    /// Decodes the constant payload as little-endian `f32` values.
    pub fn constant_f32(&self) -> Option<Vec<f32>> {
        let bytes = self.buffer()?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }
}

/// Owns every operand and operation of one model.
///
/// Operations can only reference operands that already exist, so the
/// insertion order of `operations` is a topological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    operands: Vec<Operand>,
    operations: Vec<Operation>,
    producers: Vec<Option<OperationId>>,
    consumers: Vec<Vec<OperationId>>,
    inputs: Vec<OperandId>,
    outputs: Vec<OperandId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_operand(
        &mut self,
        ty: OperandType,
        lifetime: OperandLifetime,
        buffer: Option<Arc<[u8]>>,
    ) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        let resolved = lifetime != OperandLifetime::Temporary;
        self.operands.push(Operand {
            id,
            ty,
            lifetime,
            is_output: false,
            buffer,
            resolved,
        });
        self.producers.push(None);
        self.consumers.push(Vec::new());
        id
    }

    /// Declares a model input whose type is supplied by the caller.
    pub fn add_input(&mut self, ty: OperandType) -> OperandId {
        let id = self.push_operand(ty, OperandLifetime::Input, None);
        self.inputs.push(id);
        id
    }

    /// Adds a constant operand owning `bytes`; the payload must match the type exactly.
    pub fn add_constant(
        &mut self,
        ty: OperandType,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<OperandId> {
        let bytes = bytes.into();
        let expected = ty.byte_len().ok_or_else(|| {
            Error::config(
                ConfigErrorCode::BufferSizeMismatch,
                format!("constant type {ty} must have a fully known shape"),
            )
        })?;
        config_ensure!(
            expected == bytes.len(),
            ConfigErrorCode::BufferSizeMismatch,
            "constant of type {} needs {} bytes, got {}",
            ty,
            expected,
            bytes.len()
        );
        Ok(self.push_operand(ty, OperandLifetime::Constant, Some(bytes)))
    }

    pub fn add_constant_f32(&mut self, dims: &[i32], values: &[f32]) -> Result<OperandId> {
        let ty = OperandType::float32(dims)?;
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>();
        self.add_constant(ty, bytes)
    }

    pub fn add_constant_i32(&mut self, dims: &[i32], values: &[i32]) -> Result<OperandId> {
        let ty = OperandType::int32(dims)?;
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>();
        self.add_constant(ty, bytes)
    }

    /// Appends an operation and creates its output operands.
    ///
    /// Arity and the attribute record are checked here so that Prepare can
    /// rely on them. `num_outputs` matters only for kinds with a variable
    /// output count (`SPLIT`).
    pub fn add_operation(
        &mut self,
        kind: OperationKind,
        attrs: Attributes,
        inputs: &[OperandId],
        num_outputs: usize,
    ) -> Result<Vec<OperandId>> {
        let id = OperationId(self.operations.len() as u32);
        let (input_arity, output_arity) = kind.arity();
        let located = |err: Error| err.at_operation(id, kind);

        if !attrs.accepts(kind) {
            return Err(located(Error::config(
                ConfigErrorCode::AttributeKindMismatch,
                format!("{attrs:?}"),
            )));
        }
        if !input_arity.accepts(inputs.len()) {
            return Err(located(Error::config(
                ConfigErrorCode::ArityMismatch,
                format!("expected {input_arity} inputs, got {}", inputs.len()),
            )));
        }
        if !output_arity.accepts(num_outputs) {
            return Err(located(Error::config(
                ConfigErrorCode::ArityMismatch,
                format!("expected {output_arity} outputs, got {num_outputs}"),
            )));
        }
        for input in inputs {
            self.operand(*input).map_err(located)?;
        }

        let placeholder_ty = match inputs.first() {
            Some(first) => self.operands[first.0 as usize]
                .ty
                .with_dimensions(Dimensions::scalar()),
            None => OperandType::new(crate::core::types::DType::Float32, Dimensions::scalar()),
        };
        let outputs = (0..num_outputs)
            .map(|_| self.push_operand(placeholder_ty.clone(), OperandLifetime::Temporary, None))
            .collect::<Vec<_>>();
        for output in &outputs {
            self.producers[output.0 as usize] = Some(id);
        }
        for input in inputs {
            let consumers = &mut self.consumers[input.0 as usize];
            if !consumers.contains(&id) {
                consumers.push(id);
            }
        }
        self.operations.push(Operation {
            id,
            kind,
            inputs: inputs.to_vec(),
            outputs: outputs.clone(),
            attrs,
        });
        Ok(outputs)
    }

    /// Convenience wrapper for kinds with exactly one output.
    pub fn add_unary_output(
        &mut self,
        kind: OperationKind,
        attrs: Attributes,
        inputs: &[OperandId],
    ) -> Result<OperandId> {
        let outputs = self.add_operation(kind, attrs, inputs, 1)?;
        Ok(outputs[0])
    }

    pub fn mark_output(&mut self, id: OperandId) -> Result<()> {
        self.operand(id)?;
        let operand = &mut self.operands[id.0 as usize];
        if !operand.is_output {
            operand.is_output = true;
            self.outputs.push(id);
        }
        Ok(())
    }

    pub fn operand(&self, id: OperandId) -> Result<&Operand> {
        self.operands.get(id.0 as usize).ok_or_else(|| {
            Error::config(ConfigErrorCode::UnknownOperand, None::<String>).at_operand(id)
        })
    }

    /// Returns the operand type, failing when it is not resolved yet.
    pub fn resolved_type(&self, id: OperandId) -> Result<&OperandType> {
        let operand = self.operand(id)?;
        if !operand.resolved {
            return Err(Error::config(ConfigErrorCode::OperandNotResolved, None::<String>).at_operand(id));
        }
        Ok(&operand.ty)
    }

    /// Writes the inferred type of a computed operand.
    pub(crate) fn resolve(&mut self, id: OperandId, ty: OperandType) -> Result<()> {
        let operand = self.operand(id)?;
        if operand.lifetime != OperandLifetime::Temporary {
            config_bail!(
                ConfigErrorCode::InvalidInput,
                "operand %{} is not produced by an operation",
                id.0
            );
        }
        let operand = &mut self.operands[id.0 as usize];
        operand.ty = ty;
        operand.resolved = true;
        Ok(())
    }

    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.0 as usize)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn inputs(&self) -> &[OperandId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandId] {
        &self.outputs
    }

    pub fn producer(&self, id: OperandId) -> Option<OperationId> {
        self.producers.get(id.0 as usize).copied().flatten()
    }

    pub fn consumers(&self, id: OperandId) -> &[OperationId] {
        self.consumers
            .get(id.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.operands.iter().all(|operand| operand.resolved)
    }

    /// Stable digest of the graph structure, types and constants.
    pub fn fingerprint(&self) -> Result<u64> {
        crate::config::encoded_hash(self)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(f, 0, "graph {")?;
        if !self.inputs.is_empty() {
            write_line(f, 1, "inputs:")?;
            for id in &self.inputs {
                write_line(f, 2, &format_operand(&self.operands[id.0 as usize]))?;
            }
        }
        let constants = self
            .operands
            .iter()
            .filter(|operand| operand.is_constant())
            .collect::<Vec<_>>();
        if !constants.is_empty() {
            write_line(f, 1, "constants:")?;
            for operand in constants {
                write_line(f, 2, &format_operand(operand))?;
            }
        }
        if !self.operations.is_empty() {
            write_line(f, 1, "body:")?;
            for operation in &self.operations {
                write_line(f, 2, &format_operation(self, operation))?;
            }
        }
        if !self.outputs.is_empty() {
            let outputs = self
                .outputs
                .iter()
                .map(|id| format!("%{}", id.0))
                .collect::<Vec<_>>()
                .join(", ");
            write_line(f, 1, &format!("outputs: [{outputs}]"))?;
        }
        write_line(f, 0, "}")
    }
}

pub(crate) fn format_operand(operand: &Operand) -> String {
    let state = if operand.resolved { "" } else { " (unresolved)" };
    format!("%{} : {}{}", operand.id.0, operand.ty, state)
}

fn format_operation(graph: &Graph, operation: &Operation) -> String {
    let ids = |list: &[OperandId]| {
        list.iter()
            .map(|id| format!("%{}", id.0))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let outputs = operation
        .outputs
        .iter()
        .map(|id| format_operand(&graph.operands[id.0 as usize]))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "#{} {}({}) -> {}",
        operation.id.0,
        operation.kind,
        ids(&operation.inputs),
        outputs
    )
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}
