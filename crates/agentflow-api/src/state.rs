//! Application state shared by the CLI and the REST API.

use std::sync::Arc;

use agentflow_core::flow::executor::FlowExecutor;
use agentflow_core::flow::registry::HandlerRegistry;
use agentflow_infra::handler::register_infra_handlers;
use agentflow_types::config::EngineConfig;

/// Shared application state.
///
/// The handler registry is built once here and shared read-only by every
/// run through the executor.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<FlowExecutor>,
}

impl AppState {
    /// Build the registry (built-ins plus infrastructure handlers) and the
    /// executor for `config`.
    pub fn init(config: EngineConfig) -> anyhow::Result<Self> {
        let mut registry = HandlerRegistry::with_builtins();
        register_infra_handlers(&mut registry, &config)?;

        tracing::info!(
            node_types = ?registry.node_types(),
            mode = ?config.mode,
            strict = config.strict,
            "flow engine initialized"
        );

        let executor = FlowExecutor::with_config(Arc::new(registry), config);
        Ok(Self::from_executor(executor))
    }

    pub fn from_executor(executor: FlowExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }
}
