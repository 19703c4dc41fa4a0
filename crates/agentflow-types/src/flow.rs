//! Flow graph domain types.
//!
//! A flow run is submitted as a flat list of nodes plus a list of directed
//! edges. Field names are camelCase on the wire (`inputText`, `nodeId`,
//! `nodeResults`) to match the graph editor's JSON.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::RequestError;

/// Identifier of a node, unique within one run.
pub type NodeId = String;

/// Handler-specific node configuration. Opaque to the engine.
pub type NodeConfig = serde_json::Map<String, Value>;

/// Token in `inputText` replaced by upstream content.
pub const PREV_RESULT_PLACEHOLDER: &str = "{PREV_RESULT}";

// ---------------------------------------------------------------------------
// Node / Edge
// ---------------------------------------------------------------------------

/// A unit of work in the flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique id within the run.
    pub id: NodeId,
    /// Selects the handler in the registry.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Handler-specific configuration.
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: NodeConfig,
    /// Literal input, possibly containing `{PREV_RESULT}`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_text: String,
}

impl Node {
    /// Create a node with empty config and input text.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: NodeConfig::new(),
            input_text: String::new(),
        }
    }

    /// Set the node's input text.
    pub fn with_input_text(mut self, input_text: impl Into<String>) -> Self {
        self.input_text = input_text.into();
        self
    }

    /// Set a single config entry.
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// A directed dependency from `source`'s output to `target`'s input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeResult
// ---------------------------------------------------------------------------

/// The recorded outcome of one executed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// Normalized textual content handed to successors.
    pub content: String,
    pub metadata: NodeResultMetadata,
}

/// Bookkeeping attached to every node result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResultMetadata {
    pub node_id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub timestamp: DateTime<Utc>,
    /// Set only when the handler failed, timed out, or panicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeResult {
    /// A successful result carrying normalized content.
    pub fn success(node: &Node, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: NodeResultMetadata::for_node(node, None),
        }
    }

    /// A failed result. The content embeds the node id and message so
    /// successors receive a readable upstream string.
    pub fn failure(node: &Node, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            content: format!("Error in node {}: {}", node.id, message),
            metadata: NodeResultMetadata::for_node(node, Some(message)),
        }
    }

    /// The informational result for a node type with no registered handler.
    /// Not an error.
    pub fn unsupported(node: &Node) -> Self {
        Self {
            content: format!("No service matched for type: {}", node.node_type),
            metadata: NodeResultMetadata::for_node(node, None),
        }
    }

    pub fn is_error(&self) -> bool {
        self.metadata.error.is_some()
    }
}

impl NodeResultMetadata {
    fn for_node(node: &Node, error: Option<String>) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            timestamp: Utc::now(),
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// Body of an `execute-flow` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FlowRequest {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Parse and validate an untyped request body.
    ///
    /// Reports the first shape violation found: non-object body, missing or
    /// non-array `nodes`/`edges`, an element that is not a valid node or
    /// edge, or duplicate node ids.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let Value::Object(mut body) = value else {
            return Err(RequestError::NotAnObject);
        };

        let nodes = take_array(&mut body, "nodes")?
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<Node>(item).map_err(|e| RequestError::InvalidNode {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let edges = take_array(&mut body, "edges")?
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<Edge>(item).map_err(|e| RequestError::InvalidEdge {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = Self { nodes, edges };
        request.validate()?;
        Ok(request)
    }

    /// Check invariants the scheduler relies on (unique node ids).
    pub fn validate(&self) -> Result<(), RequestError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(RequestError::DuplicateNodeId(node.id.clone()));
            }
        }
        Ok(())
    }
}

/// Successful response of an `execute-flow` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub node_results: HashMap<NodeId, NodeResult>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn take_array(
    body: &mut serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Vec<Value>, RequestError> {
    match body.remove(field) {
        None | Some(Value::Null) => Err(RequestError::MissingField(field)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(RequestError::NotAnArray(field)),
    }
}

/// Editors send `null` for untouched fields; treat it like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
