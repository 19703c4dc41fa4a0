//! Built-in node handlers.

use agentflow_types::flow::NodeConfig;
use serde_json::Value;

use super::handler::{HandlerError, NodeHandler};

/// Entry node type: emits its input text.
pub const INPUT_NODE_TYPE: &str = "input";

/// Sink node type. The scheduler feeds it the labeled results of every node
/// completed before it, instead of only its direct predecessors.
pub const OUTPUT_NODE_TYPE: &str = "output";

/// Returns its input unchanged. Backs both `input` and `output`: the
/// interesting work for those types is input assembly, done by the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughHandler;

impl NodeHandler for PassThroughHandler {
    async fn call(&self, input: &str, _config: &NodeConfig) -> Result<Value, HandlerError> {
        Ok(Value::String(input.to_string()))
    }
}
