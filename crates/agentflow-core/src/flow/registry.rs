//! Handler registry for node type dispatch.
//!
//! Maps a node's declared `type` string to its handler. Populated once at
//! process start and shared read-only (behind an `Arc`) by every run.

use std::collections::HashMap;
use std::future::Future;

use agentflow_types::flow::NodeConfig;
use serde_json::Value;

use super::builtin::{PassThroughHandler, INPUT_NODE_TYPE, OUTPUT_NODE_TYPE};
use super::handler::{BoxNodeHandler, FnHandler, HandlerError, NodeHandler};

/// Registry of node handlers, indexed by node type.
pub struct HandlerRegistry {
    handlers: HashMap<String, BoxNodeHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in `input` and `output` handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(INPUT_NODE_TYPE, PassThroughHandler);
        registry.register(OUTPUT_NODE_TYPE, PassThroughHandler);
        registry
    }

    /// Register a handler under the given node type.
    ///
    /// If a handler with this type already exists, it is replaced.
    pub fn register<H: NodeHandler + 'static>(&mut self, node_type: impl Into<String>, handler: H) {
        self.register_boxed(node_type, BoxNodeHandler::new(handler));
    }

    pub fn register_boxed(&mut self, node_type: impl Into<String>, handler: BoxNodeHandler) {
        let node_type = node_type.into();
        if self.handlers.insert(node_type.clone(), handler).is_some() {
            tracing::debug!(node_type = node_type.as_str(), "replaced node handler");
        }
    }

    /// Register an async closure as a handler.
    pub fn register_fn<F, Fut>(&mut self, node_type: impl Into<String>, f: F)
    where
        F: Fn(String, NodeConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.register(node_type, FnHandler::new(f));
    }

    /// Look up the handler for a node type.
    pub fn resolve(&self, node_type: &str) -> Option<&BoxNodeHandler> {
        self.handlers.get(node_type)
    }

    /// All registered node types, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
