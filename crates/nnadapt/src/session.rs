//! Compile session: validates, prepares and routes a graph to a backend or
//! to the host executor.

use std::fmt;

use tracing::{debug, info};

use crate::config::{CompileCacheKey, CompileOptions};
use crate::converter::{convert_graph, BackendDriver, DriverTarget};
use crate::core::graph::{Graph, OperationId};
use crate::error::{Error, Result};
use crate::executor::{HostExecutor, HostTensor, HOST_TARGET};
use crate::operation::prepare_operation;
use crate::validation::{check_operation, ValidationReport};

/// Lifecycle position of one operation inside a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Unvalidated,
    Validated,
    ShapeInferred,
    /// Converted into the backend artifact.
    Lowered,
    /// Routed to the host executor.
    Executed,
    /// Accepted by no available target.
    Rejected,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Unvalidated => "unvalidated",
            OperationState::Validated => "validated",
            OperationState::ShapeInferred => "shape-inferred",
            OperationState::Lowered => "lowered",
            OperationState::Executed => "executed",
            OperationState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Where a compiled graph runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Backend,
    Host,
}

/// Per-operation outcome of a compile.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub key: CompileCacheKey,
    pub route: Route,
    pub states: Vec<OperationState>,
    pub backend: ValidationReport,
    pub host: ValidationReport,
}

impl CompileReport {
    pub fn state(&self, id: OperationId) -> Option<OperationState> {
        self.states.get(id.0 as usize).copied()
    }
}

/// Graph prepared for the host executor.
#[derive(Debug, Clone)]
pub struct HostProgram {
    graph: Graph,
    executor: HostExecutor,
}

impl HostProgram {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn run(&self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        self.executor.run(&self.graph, inputs)
    }
}

/// Result of a successful compile.
#[derive(Debug)]
pub enum Compiled<P> {
    Backend(P),
    Host(HostProgram),
}

impl<P> Compiled<P> {
    pub fn route(&self) -> Route {
        match self {
            Compiled::Backend(_) => Route::Backend,
            Compiled::Host(_) => Route::Host,
        }
    }

    pub fn backend_program(&self) -> Option<&P> {
        match self {
            Compiled::Backend(program) => Some(program),
            Compiled::Host(_) => None,
        }
    }

    pub fn host_program(&self) -> Option<&HostProgram> {
        match self {
            Compiled::Host(program) => Some(program),
            Compiled::Backend(_) => None,
        }
    }
}

/// Drives one graph through validate → prepare → lower-or-execute.
pub struct Session;

impl Session {
    pub fn compile<D: BackendDriver>(
        mut graph: Graph,
        driver: &D,
        options: &CompileOptions,
    ) -> Result<(Compiled<D::Program>, CompileReport)> {
        let backend_target = DriverTarget(driver);
        let host = HostExecutor::new();
        let mut states = vec![OperationState::Unvalidated; graph.operations().len()];
        let mut backend_report = ValidationReport::new(driver.name());
        let mut host_report = ValidationReport::new(HOST_TARGET);

        for index in 0..graph.operations().len() {
            let id = OperationId(index as u32);
            let Some(op) = graph.operation(id).cloned() else {
                continue;
            };
            let on_backend = check_operation(&graph, &op, &backend_target);
            if let Err(reason) = &on_backend {
                backend_report.record(&op, reason.clone());
            }
            let on_host = if options.allow_host_fallback {
                let verdict = check_operation(&graph, &op, &host);
                if let Err(reason) = &verdict {
                    host_report.record(&op, reason.clone());
                }
                verdict.is_ok()
            } else {
                false
            };
            let accepted = on_backend.is_ok() || on_host;
            states[index] = if accepted {
                OperationState::Validated
            } else {
                OperationState::Rejected
            };

            // Rejected operations are still inferred so later operations can be judged.
            prepare_operation(&mut graph, id)?;
            if accepted {
                states[index] = OperationState::ShapeInferred;
            }
        }

        let key = CompileCacheKey::new(&graph, driver.name(), options)?;
        let backend_ok = backend_report.is_ok();
        let host_ok = options.allow_host_fallback && host_report.is_ok();

        if let Some(rejected) = backend_report.first() {
            if options.strict_validation || !host_ok {
                let reason = match host_report.first() {
                    Some(on_host) if options.allow_host_fallback => {
                        format!("{}; host: {}", rejected.reason, on_host)
                    }
                    _ => rejected.reason.clone(),
                };
                return Err(Error::unsupported(driver.name(), rejected.kind, reason));
            }
        }

        let (compiled, route, final_state) = if backend_ok {
            let mut context = driver.new_context(options)?;
            convert_graph(driver.registry(), &mut context, &graph)?;
            let program = driver.finish(context, &graph)?;
            (Compiled::Backend(program), Route::Backend, OperationState::Lowered)
        } else {
            debug!(
                backend = driver.name(),
                rejected = backend_report.diagnostics.len(),
                "falling back to the host executor"
            );
            (
                Compiled::Host(HostProgram {
                    graph,
                    executor: host,
                }),
                Route::Host,
                OperationState::Executed,
            )
        };
        for state in &mut states {
            *state = final_state;
        }
        info!(
            backend = driver.name(),
            route = ?route,
            operations = states.len(),
            graph_hash = key.graph_hash,
            "compiled graph"
        );

        Ok((
            compiled,
            CompileReport {
                key,
                route,
                states,
                backend: backend_report,
                host: host_report,
            },
        ))
    }
}
