//! I/O-backed node handlers.

pub mod http;

use agentflow_core::flow::registry::HandlerRegistry;
use agentflow_types::config::EngineConfig;

use self::http::{HTTP_NODE_TYPE, HttpHandler};

/// Register every infrastructure handler on `registry`.
pub fn register_infra_handlers(
    registry: &mut HandlerRegistry,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    registry.register(HTTP_NODE_TYPE, HttpHandler::new(&config.http)?);
    tracing::debug!(node_types = ?registry.node_types(), "registered infrastructure handlers");
    Ok(())
}
