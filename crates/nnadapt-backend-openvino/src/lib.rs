//! OpenVINO-style backend driver.
//!
//! Lowers a prepared nnadapt graph into an in-memory opset model through a
//! driver-owned converter table. The model is the compile artifact; loading it
//! onto a device is outside this crate.

mod context;
pub mod converter;
pub mod ov;

use std::fmt;

use nnadapt::config::{CompileOptions, PROPERTY_DEVICE};
use nnadapt::converter::{BackendDriver, ConverterContext, ConverterRegistry, RegistryBuilder};
use nnadapt::core::{DType, Graph};
use nnadapt::error::{ConfigErrorCode, Error, Result};
use nnadapt::validation::CapabilitySpec;
use tracing::debug;

pub use crate::context::{element_type, port_type, OpenVinoContext};
use crate::ov::{NodeId, OvModel};

pub const BACKEND_NAME: &str = "openvino";
pub const DEFAULT_DEVICE: &str = "CPU";
pub const SUPPORTED_DEVICES: &[&str] = &["CPU", "GPU", "NPU", "AUTO"];

/// Precisions with an opset element type; quantized storage is left to the host.
const SUPPORTED_DTYPES: &[DType] = &[
    DType::Bool8,
    DType::Int8,
    DType::UInt8,
    DType::Int16,
    DType::UInt16,
    DType::Int32,
    DType::UInt32,
    DType::Int64,
    DType::UInt64,
    DType::Float16,
    DType::Float32,
    DType::Float64,
];

pub struct OpenVinoDriver {
    registry: ConverterRegistry<OpenVinoContext>,
    capabilities: CapabilitySpec,
}

impl OpenVinoDriver {
    pub fn new() -> Result<Self> {
        let mut builder = RegistryBuilder::new(BACKEND_NAME);
        converter::register_all(&mut builder)?;
        let registry = builder.build();
        debug!(backend = BACKEND_NAME, converters = registry.len(), "built converter table");
        Ok(Self {
            capabilities: CapabilitySpec::default()
                .allow_kinds(registry.kinds())
                .allow_dtypes(SUPPORTED_DTYPES.iter().copied()),
            registry,
        })
    }
}

impl fmt::Debug for OpenVinoDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenVinoDriver")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Lowered model ready to be handed to a device plugin.
#[derive(Debug, Clone)]
pub struct OpenVinoProgram {
    pub model: OvModel,
    pub device: String,
}

impl OpenVinoProgram {
    pub fn parameters(&self) -> &[NodeId] {
        self.model.parameters()
    }

    pub fn results(&self) -> &[NodeId] {
        self.model.results()
    }
}

impl fmt::Display for OpenVinoProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "device {}", self.device)?;
        write!(f, "{}", self.model)
    }
}

impl BackendDriver for OpenVinoDriver {
    type Context = OpenVinoContext;
    type Program = OpenVinoProgram;

    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn capabilities(&self) -> &CapabilitySpec {
        &self.capabilities
    }

    fn registry(&self) -> &ConverterRegistry<OpenVinoContext> {
        &self.registry
    }

    fn new_context(&self, options: &CompileOptions) -> Result<OpenVinoContext> {
        let device = options
            .property(PROPERTY_DEVICE)
            .unwrap_or(DEFAULT_DEVICE)
            .to_ascii_uppercase();
        if !SUPPORTED_DEVICES.contains(&device.as_str()) {
            return Err(Error::config(
                ConfigErrorCode::InvalidAttributeValue,
                format!("unknown OpenVINO device {device:?}, expected one of {SUPPORTED_DEVICES:?}"),
            ));
        }
        Ok(OpenVinoContext::new(device))
    }

    fn finish(&self, mut context: OpenVinoContext, graph: &Graph) -> Result<OpenVinoProgram> {
        for output in graph.outputs() {
            let value = context.node(*output)?;
            context.add_result(value);
        }
        let (model, device) = context.into_model();
        debug!(
            backend = BACKEND_NAME,
            device = %device,
            nodes = model.nodes().len(),
            results = model.results().len(),
            "finished OpenVINO model"
        );
        Ok(OpenVinoProgram { model, device })
    }
}
