#![allow(dead_code)]

use nnadapt::config::CompileOptions;
use nnadapt::converter::{
    BackendDriver, ConverterContext, ConverterRegistry, OperandNodeCache, RegistryBuilder,
};
use nnadapt::core::{Graph, Operand, OperandId, Operation, OperationKind};
use nnadapt::validation::CapabilitySpec;
use nnadapt::Result;

/// Test-only context that hands out numbered nodes and records every converter call.
#[derive(Default)]
pub struct RecordingContext {
    cache: OperandNodeCache<u32>,
    next: u32,
    pub log: Vec<String>,
}

impl RecordingContext {
    pub fn fresh(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}

impl ConverterContext for RecordingContext {
    type Node = u32;

    fn cache(&self) -> &OperandNodeCache<u32> {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OperandNodeCache<u32> {
        &mut self.cache
    }

    fn lower_input(&mut self, _graph: &Graph, operand: &Operand) -> Result<u32> {
        let node = self.fresh();
        self.log.push(format!("input %{} -> n{}", operand.id.0, node));
        Ok(node)
    }

    fn lower_constant(&mut self, _graph: &Graph, operand: &Operand) -> Result<u32> {
        let node = self.fresh();
        self.log.push(format!("constant %{} -> n{}", operand.id.0, node));
        Ok(node)
    }
}

pub fn convert_any(ctx: &mut RecordingContext, _graph: &Graph, op: &Operation) -> Result<()> {
    let inputs = op
        .inputs
        .iter()
        .map(|id| ctx.node(*id))
        .collect::<Result<Vec<_>>>()?;
    let mut outputs = Vec::new();
    for output in &op.outputs {
        let node = ctx.fresh();
        ctx.bind(*output, node)?;
        outputs.push(node);
    }
    ctx.log.push(format!("{}{:?} -> {:?}", op.kind, inputs, outputs));
    Ok(())
}

/// Converter that forgets to bind its output.
pub fn convert_nothing(_ctx: &mut RecordingContext, _graph: &Graph, _op: &Operation) -> Result<()> {
    Ok(())
}

#[derive(Debug)]
pub struct RecordingProgram {
    pub log: Vec<String>,
    pub outputs: Vec<u32>,
}

pub struct RecordingDriver {
    registry: ConverterRegistry<RecordingContext>,
    capabilities: CapabilitySpec,
}

impl RecordingDriver {
    pub fn with_kinds(kinds: &[OperationKind]) -> Self {
        let mut builder = RegistryBuilder::new("recording");
        for kind in kinds {
            builder
                .register(*kind, "convert_any", convert_any)
                .expect("fresh builder accepts every kind");
        }
        Self {
            registry: builder.build(),
            capabilities: CapabilitySpec::default(),
        }
    }

    pub fn with_registry(registry: ConverterRegistry<RecordingContext>) -> Self {
        Self {
            registry,
            capabilities: CapabilitySpec::default(),
        }
    }

    pub fn all_kinds() -> Self {
        Self::with_kinds(OperationKind::ALL)
    }
}

impl BackendDriver for RecordingDriver {
    type Context = RecordingContext;
    type Program = RecordingProgram;

    fn name(&self) -> &str {
        "recording"
    }

    fn capabilities(&self) -> &CapabilitySpec {
        &self.capabilities
    }

    fn registry(&self) -> &ConverterRegistry<RecordingContext> {
        &self.registry
    }

    fn new_context(&self, _options: &CompileOptions) -> Result<RecordingContext> {
        Ok(RecordingContext::default())
    }

    fn finish(&self, context: RecordingContext, graph: &Graph) -> Result<RecordingProgram> {
        let outputs = graph
            .outputs()
            .iter()
            .map(|id: &OperandId| context.node(*id))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordingProgram {
            log: context.log,
            outputs,
        })
    }
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
