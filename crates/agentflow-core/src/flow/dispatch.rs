//! Per-node failure boundary.
//!
//! `Dispatcher::invoke` runs one handler and always yields a `NodeResult`.
//! Handler errors, panics, and timeouts are converted into error results
//! here so the scheduler never sees them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use agentflow_types::event::FlowEvent;
use agentflow_types::flow::{Node, NodeResult};
use futures_util::FutureExt;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::event::bus::EventBus;

use super::handler::BoxNodeHandler;
use super::normalize::extract_content;

/// Invokes handlers for a single run.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    run_id: Uuid,
    timeout: Option<Duration>,
    events: Option<EventBus>,
}

impl Dispatcher {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            timeout: None,
            events: None,
        }
    }

    /// Bound each handler call. Expiry becomes an error result.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: Option<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Run `handler` for `node` with the assembled `input`.
    ///
    /// A missing handler yields the informational "No service matched"
    /// result, which is not an error.
    pub async fn invoke(
        &self,
        node: &Node,
        handler: Option<&BoxNodeHandler>,
        input: &str,
    ) -> NodeResult {
        let Some(handler) = handler else {
            tracing::warn!(
                run_id = %self.run_id,
                node_id = node.id.as_str(),
                node_type = node.node_type.as_str(),
                "no handler registered for node type"
            );
            self.publish(FlowEvent::NodeUnsupported {
                run_id: self.run_id,
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
            return NodeResult::unsupported(node);
        };

        self.publish(FlowEvent::NodeStarted {
            run_id: self.run_id,
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
        });

        let started = Instant::now();
        let span = info_span!(
            "flow_node",
            run_id = %self.run_id,
            node_id = node.id.as_str(),
            node_type = node.node_type.as_str(),
        );
        let outcome = self.call_guarded(handler, node, input).instrument(span).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(raw) => {
                let content = extract_content(&raw);
                tracing::debug!(
                    run_id = %self.run_id,
                    node_id = node.id.as_str(),
                    duration_ms,
                    content_len = content.len(),
                    "node completed"
                );
                self.publish(FlowEvent::NodeCompleted {
                    run_id: self.run_id,
                    node_id: node.id.clone(),
                    duration_ms,
                });
                NodeResult::success(node, content)
            }
            Err(message) => {
                tracing::warn!(
                    run_id = %self.run_id,
                    node_id = node.id.as_str(),
                    node_type = node.node_type.as_str(),
                    duration_ms,
                    error = message.as_str(),
                    "node failed"
                );
                self.publish(FlowEvent::NodeFailed {
                    run_id: self.run_id,
                    node_id: node.id.clone(),
                    error: message.clone(),
                });
                NodeResult::failure(node, message)
            }
        }
    }

    /// Await the handler with panic capture and the optional deadline.
    async fn call_guarded(
        &self,
        handler: &BoxNodeHandler,
        node: &Node,
        input: &str,
    ) -> Result<serde_json::Value, String> {
        let call = AssertUnwindSafe(handler.call(input, &node.config)).catch_unwind();

        let caught = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(caught) => caught,
                Err(_) => return Err(format!("node timed out after {limit:?}")),
            },
            None => call.await,
        };

        match caught {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("handler panicked: {}", panic_message(&*payload))),
        }
    }

    fn publish(&self, event: FlowEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
