//! Per-backend converter registries and the dispatch loop that lowers a
//! prepared graph through them.

mod cache;
mod registry;

pub use cache::OperandNodeCache;
pub use registry::{ConvertFn, ConverterEntry, ConverterRegistry, RegistryBuilder, ValidateFn};

use tracing::debug;

use crate::config::CompileOptions;
use crate::core::graph::{Graph, Operand, OperandLifetime};
use crate::core::operation::Operation;
use crate::error::{ConfigErrorCode, Error, Result};
use crate::validation::{CapabilitySpec, ValidationTarget};

/// Builder state threaded through the converters of one compile.
pub trait ConverterContext {
    /// Handle of one backend value, e.g. a node output.
    type Node: Clone;

    fn cache(&self) -> &OperandNodeCache<Self::Node>;

    fn cache_mut(&mut self) -> &mut OperandNodeCache<Self::Node>;

    /// Creates the backend node standing for a graph input.
    fn lower_input(&mut self, graph: &Graph, operand: &Operand) -> Result<Self::Node>;

    /// Creates the backend node holding a constant payload.
    fn lower_constant(&mut self, graph: &Graph, operand: &Operand) -> Result<Self::Node>;

    /// Node already produced for an input operand of the current operation.
    fn node(&self, operand: crate::core::graph::OperandId) -> Result<Self::Node> {
        self.cache().get(operand).cloned()
    }

    /// Binds the node produced for an output operand.
    fn bind(&mut self, operand: crate::core::graph::OperandId, node: Self::Node) -> Result<()> {
        self.cache_mut().insert(operand, node)
    }
}

/// One accelerator target: its capabilities, its converter table and the
/// way it packages a lowered graph.
pub trait BackendDriver: Send + Sync {
    type Context: ConverterContext;
    type Program;

    fn name(&self) -> &str;

    fn capabilities(&self) -> &CapabilitySpec;

    fn registry(&self) -> &ConverterRegistry<Self::Context>;

    fn new_context(&self, options: &CompileOptions) -> Result<Self::Context>;

    fn finish(&self, context: Self::Context, graph: &Graph) -> Result<Self::Program>;
}

/// Validation view of a driver: capabilities plus the converter predicates.
pub struct DriverTarget<'a, D: BackendDriver>(pub &'a D);

impl<D: BackendDriver> ValidationTarget for DriverTarget<'_, D> {
    fn target_name(&self) -> &str {
        self.0.name()
    }

    fn capabilities(&self) -> &CapabilitySpec {
        self.0.capabilities()
    }

    fn check_operation(&self, graph: &Graph, op: &Operation) -> std::result::Result<(), String> {
        self.0.registry().check(graph, op)
    }
}

/// Lowers every operation of a prepared graph through `registry`.
///
/// Inputs and constants are seeded first; each converter must then bind
/// every output of its operation.
pub fn convert_graph<C: ConverterContext>(
    registry: &ConverterRegistry<C>,
    ctx: &mut C,
    graph: &Graph,
) -> Result<()> {
    for operand in graph.operands() {
        let node = match operand.lifetime {
            OperandLifetime::Input => ctx.lower_input(graph, operand)?,
            OperandLifetime::Constant => ctx.lower_constant(graph, operand)?,
            OperandLifetime::Temporary => continue,
        };
        ctx.bind(operand.id, node)?;
    }

    for op in graph.operations() {
        let entry = registry.get(op.kind).ok_or_else(|| {
            Error::unsupported(registry.backend(), op.kind, "no converter registered")
        })?;
        debug!(
            backend = registry.backend(),
            operation = op.id.0,
            kind = %op.kind,
            converter = entry.name,
            "converting operation"
        );
        (entry.convert)(ctx, graph, op).map_err(|err| err.at_operation(op.id, op.kind))?;
        for output in &op.outputs {
            if !ctx.cache().contains(*output) {
                return Err(Error::config(
                    ConfigErrorCode::OperandNotLowered,
                    format!("converter {} left an output unbound", entry.name),
                )
                .at_operation(op.id, op.kind)
                .at_operand(*output));
            }
        }
    }
    Ok(())
}
