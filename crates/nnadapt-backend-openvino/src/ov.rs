//! In-memory OpenVINO-style opset model produced by the converters.
//!
//! Nodes are appended in topological order and addressed by `NodeId`; a
//! value is one output port of a node.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Boolean,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F16,
    F32,
    F64,
}

impl ElementType {
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Boolean => "boolean",
            ElementType::I8 => "i8",
            ElementType::U8 => "u8",
            ElementType::I16 => "i16",
            ElementType::U16 => "u16",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// One output port of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    pub node: NodeId,
    pub port: u32,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}:{}", self.node.0, self.port)
    }
}

/// Element type plus partial shape; `-1` marks a dynamic extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortType {
    pub element_type: ElementType,
    pub shape: Vec<i64>,
}

impl PortType {
    pub fn new(element_type: ElementType, shape: Vec<i64>) -> Self {
        Self {
            element_type,
            shape,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn with_shape(&self, shape: Vec<i64>) -> Self {
        Self::new(self.element_type, shape)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.element_type)?;
        for (index, extent) in self.shape.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            if *extent < 0 {
                f.write_str("?")?;
            } else {
                write!(f, "{extent}")?;
            }
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Str(String),
    ElementType(ElementType),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(value: Vec<i64>) -> Self {
        AttrValue::Ints(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<ElementType> for AttrValue {
    fn from(value: ElementType) -> Self {
        AttrValue::ElementType(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Ints(v) => write!(f, "{v:?}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Str(v) => write!(f, "{v:?}"),
            AttrValue::ElementType(v) => write!(f, "{v}"),
        }
    }
}

pub type Attrs = BTreeMap<String, AttrValue>;

/// Builds an attribute map from `(name, value)` pairs.
pub fn attrs<const N: usize>(pairs: [(&str, AttrValue); N]) -> Attrs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvNode {
    pub id: NodeId,
    pub op_type: String,
    pub inputs: Vec<Output>,
    pub attributes: Attrs,
    pub outputs: Vec<PortType>,
    /// Raw little-endian payload of `Constant` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl OvNode {
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Decodes the payload of an `i64` constant.
    pub fn constant_i64(&self) -> Option<Vec<i64>> {
        let data = self.data.as_ref()?;
        if self.outputs.first()?.element_type != ElementType::I64 {
            return None;
        }
        Some(
            data.chunks_exact(8)
                .map(|chunk| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(chunk);
                    i64::from_le_bytes(bytes)
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OvModel {
    nodes: Vec<OvNode>,
    parameters: Vec<NodeId>,
    results: Vec<NodeId>,
}

impl OvModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        op_type: &str,
        inputs: Vec<Output>,
        attributes: Attrs,
        outputs: Vec<PortType>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(OvNode {
            id,
            op_type: op_type.to_string(),
            inputs,
            attributes,
            outputs,
            data: None,
        });
        id
    }

    pub fn add_parameter(&mut self, port: PortType) -> Output {
        let node = self.add_node("Parameter", Vec::new(), Attrs::new(), vec![port]);
        self.parameters.push(node);
        Output { node, port: 0 }
    }

    pub fn add_constant(&mut self, port: PortType, data: Vec<u8>) -> Output {
        let node = self.add_node("Constant", Vec::new(), Attrs::new(), vec![port]);
        self.nodes[node.0 as usize].data = Some(data);
        Output { node, port: 0 }
    }

    pub fn add_result(&mut self, value: Output) -> NodeId {
        let node = self.add_node("Result", vec![value], Attrs::new(), Vec::new());
        self.results.push(node);
        node
    }

    pub fn node(&self, id: NodeId) -> Option<&OvNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[OvNode] {
        &self.nodes
    }

    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    pub fn port(&self, value: Output) -> Option<&PortType> {
        self.node(value.node)?.outputs.get(value.port as usize)
    }

    /// Node producing `value`, or `None` for a dangling handle.
    pub fn producer(&self, value: Output) -> Option<&OvNode> {
        self.node(value.node)
    }

    pub fn count_op(&self, op_type: &str) -> usize {
        self.nodes.iter().filter(|node| node.op_type == op_type).count()
    }

    /// Operation types in insertion order, without parameters, constants and results.
    pub fn op_types(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .map(|node| node.op_type.as_str())
            .filter(|op| !matches!(*op, "Parameter" | "Constant" | "Result"))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(src: &str) -> serde_json::Result<Self> {
        serde_json::from_str(src)
    }
}

impl fmt::Display for OvModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model {{")?;
        for node in &self.nodes {
            write!(f, "  n{} = {}(", node.id.0, node.op_type)?;
            for (index, input) in node.inputs.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{input}")?;
            }
            f.write_str(")")?;
            if !node.attributes.is_empty() {
                f.write_str(" {")?;
                for (index, (name, value)) in node.attributes.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str("}")?;
            }
            if !node.outputs.is_empty() {
                f.write_str(" -> ")?;
                for (index, port) in node.outputs.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{port}")?;
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_nodes_in_insertion_order() {
        let mut model = OvModel::new();
        let x = model.add_parameter(PortType::new(ElementType::F32, vec![-1, 4]));
        let relu = model.add_node(
            "Relu",
            vec![x],
            Attrs::new(),
            vec![PortType::new(ElementType::F32, vec![-1, 4])],
        );
        model.add_result(Output { node: relu, port: 0 });

        let text = model.to_string();
        assert!(text.contains("n0 = Parameter() -> f32[?,4]"), "{text}");
        assert!(text.contains("n1 = Relu(n0:0) -> f32[?,4]"), "{text}");
        assert!(text.contains("n2 = Result(n1:0)"), "{text}");
        assert_eq!(model.op_types(), vec!["Relu"]);
    }

    #[test]
    fn json_export_keeps_constants() {
        let mut model = OvModel::new();
        let bytes = [3i64, -1].iter().flat_map(|v| v.to_le_bytes()).collect();
        let shape = model.add_constant(PortType::new(ElementType::I64, vec![2]), bytes);
        let json = model.to_json().unwrap();
        let back = OvModel::from_json(&json).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.producer(shape).and_then(OvNode::constant_i64), Some(vec![3, -1]));
    }
}
