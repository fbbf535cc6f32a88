use nnadapt::converter::{ConverterContext, OperandNodeCache};
use nnadapt::core::{DType, Graph, Operand, OperandId, OperandType};
use nnadapt::error::{ConfigErrorCode, Error, Result};

use crate::ov::{attrs, Attrs, ElementType, NodeId, OvModel, Output, PortType};

/// Maps an operand precision to the opset element type.
///
/// Quantized precisions have no counterpart; the driver's capabilities keep
/// them away from the converters.
pub fn element_type(dtype: DType) -> Option<ElementType> {
    match dtype {
        DType::Bool8 => Some(ElementType::Boolean),
        DType::Int8 => Some(ElementType::I8),
        DType::UInt8 => Some(ElementType::U8),
        DType::Int16 => Some(ElementType::I16),
        DType::UInt16 => Some(ElementType::U16),
        DType::Int32 => Some(ElementType::I32),
        DType::UInt32 => Some(ElementType::U32),
        DType::Int64 => Some(ElementType::I64),
        DType::UInt64 => Some(ElementType::U64),
        DType::Float16 => Some(ElementType::F16),
        DType::Float32 => Some(ElementType::F32),
        DType::Float64 => Some(ElementType::F64),
        _ => None,
    }
}

pub fn port_type(ty: &OperandType) -> Result<PortType> {
    let element_type = element_type(ty.precision).ok_or_else(|| {
        Error::config(
            ConfigErrorCode::DTypeMismatch,
            format!("{:?} has no OpenVINO element type", ty.precision),
        )
    })?;
    Ok(PortType::new(
        element_type,
        ty.dims().iter().map(|&extent| extent as i64).collect(),
    ))
}

/// Model under construction plus the operand → output map of one compile.
#[derive(Debug)]
pub struct OpenVinoContext {
    model: OvModel,
    cache: OperandNodeCache<Output>,
    device: String,
}

impl OpenVinoContext {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            model: OvModel::new(),
            cache: OperandNodeCache::new(),
            device: device.into(),
        }
    }

    pub fn model(&self) -> &OvModel {
        &self.model
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub(crate) fn into_model(self) -> (OvModel, String) {
        (self.model, self.device)
    }

    /// Port type of an already created value.
    pub fn port(&self, value: Output) -> Result<PortType> {
        self.model.port(value).cloned().ok_or_else(|| {
            Error::config(
                ConfigErrorCode::OperandNotLowered,
                format!("{value} does not name a node output"),
            )
        })
    }

    /// Port type the graph assigns to `operand`.
    pub fn operand_port(&self, graph: &Graph, operand: OperandId) -> Result<PortType> {
        port_type(graph.resolved_type(operand)?)
    }

    pub fn add_op(&mut self, op_type: &str, inputs: Vec<Output>, attributes: Attrs, port: PortType) -> Output {
        let node = self.model.add_node(op_type, inputs, attributes, vec![port]);
        Output { node, port: 0 }
    }

    pub fn add_multi_output_op(
        &mut self,
        op_type: &str,
        inputs: Vec<Output>,
        attributes: Attrs,
        ports: Vec<PortType>,
    ) -> NodeId {
        self.model.add_node(op_type, inputs, attributes, ports)
    }

    pub fn const_i64(&mut self, values: &[i64]) -> Output {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.model.add_constant(
            PortType::new(ElementType::I64, vec![values.len() as i64]),
            data,
        )
    }

    pub fn scalar_i64(&mut self, value: i64) -> Output {
        self.model.add_constant(
            PortType::new(ElementType::I64, Vec::new()),
            value.to_le_bytes().to_vec(),
        )
    }

    /// Scalar constant in `element_type`; non-f32 types go through a `Convert`.
    pub fn scalar_float(&mut self, element_type: ElementType, value: f32) -> Output {
        let scalar = self.model.add_constant(
            PortType::new(ElementType::F32, Vec::new()),
            value.to_le_bytes().to_vec(),
        );
        if element_type == ElementType::F32 {
            return scalar;
        }
        self.add_op(
            "Convert",
            vec![scalar],
            attrs([("destination_type", element_type.into())]),
            PortType::new(element_type, Vec::new()),
        )
    }

    pub fn add_result(&mut self, value: Output) -> NodeId {
        self.model.add_result(value)
    }
}

impl ConverterContext for OpenVinoContext {
    type Node = Output;

    fn cache(&self) -> &OperandNodeCache<Output> {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OperandNodeCache<Output> {
        &mut self.cache
    }

    fn lower_input(&mut self, _graph: &Graph, operand: &Operand) -> Result<Output> {
        Ok(self.model.add_parameter(port_type(&operand.ty)?))
    }

    fn lower_constant(&mut self, _graph: &Graph, operand: &Operand) -> Result<Output> {
        let data = operand.buffer().map(<[u8]>::to_vec).unwrap_or_default();
        Ok(self.model.add_constant(port_type(&operand.ty)?, data))
    }
}
