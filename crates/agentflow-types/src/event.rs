//! Event types for the flow run event bus.
//!
//! `FlowEvent` is broadcast while a run progresses. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle events emitted during a flow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A run has started.
    RunStarted {
        run_id: Uuid,
        node_count: usize,
        edge_count: usize,
    },

    /// A node's handler has been invoked.
    NodeStarted {
        run_id: Uuid,
        node_id: String,
        node_type: String,
    },

    /// A node's handler returned normally.
    NodeCompleted {
        run_id: Uuid,
        node_id: String,
        duration_ms: u64,
    },

    /// A node's handler failed, timed out, or panicked.
    NodeFailed {
        run_id: Uuid,
        node_id: String,
        error: String,
    },

    /// No handler is registered for the node's type.
    NodeUnsupported {
        run_id: Uuid,
        node_id: String,
        node_type: String,
    },

    /// The ready queue drained.
    RunCompleted {
        run_id: Uuid,
        nodes_executed: usize,
        nodes_unscheduled: usize,
        duration_ms: u64,
    },
}

impl FlowEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            FlowEvent::RunStarted { run_id, .. }
            | FlowEvent::NodeStarted { run_id, .. }
            | FlowEvent::NodeCompleted { run_id, .. }
            | FlowEvent::NodeFailed { run_id, .. }
            | FlowEvent::NodeUnsupported { run_id, .. }
            | FlowEvent::RunCompleted { run_id, .. } => *run_id,
        }
    }
}
