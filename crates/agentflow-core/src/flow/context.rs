//! Per-run execution state.
//!
//! `ExecutionContext` owns the live in-degree table, the FIFO ready queue,
//! the recorded results, and the processing order for exactly one run. It
//! is created by the executor at the start of a run and consumed into a
//! `RunReport` at the end; nothing in it is shared across runs.

use std::collections::{HashMap, VecDeque};

use agentflow_types::flow::{FlowResponse, Node, NodeId, NodeResult, PREV_RESULT_PLACEHOLDER};
use uuid::Uuid;

use super::builtin::OUTPUT_NODE_TYPE;
use super::graph::FlowGraph;

/// Separator between upstream contents at a join.
pub const JOIN_SEPARATOR: &str = "\n\n";

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub node_results: HashMap<NodeId, NodeResult>,
    /// Node ids in completion order.
    pub processing_order: Vec<NodeId>,
    /// Node ids never scheduled, in input order.
    pub unscheduled: Vec<NodeId>,
}

impl RunReport {
    /// Results in completion order.
    pub fn ordered_results(&self) -> impl Iterator<Item = &NodeResult> + '_ {
        self.processing_order
            .iter()
            .filter_map(|id| self.node_results.get(id))
    }

    pub fn into_response(self) -> FlowResponse {
        FlowResponse {
            node_results: self.node_results,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Mutable scheduling state for one run over a borrowed graph.
#[derive(Debug)]
pub struct ExecutionContext<'g> {
    graph: &'g FlowGraph,
    run_id: Uuid,
    in_degree: HashMap<&'g str, usize>,
    ready: VecDeque<&'g Node>,
    results: HashMap<NodeId, NodeResult>,
    processing_order: Vec<NodeId>,
}

impl<'g> ExecutionContext<'g> {
    /// Compute in-degrees and seed the ready queue with every zero-in-degree
    /// node, in input order.
    pub fn new(graph: &'g FlowGraph, run_id: Uuid) -> Self {
        let in_degree: HashMap<&'g str, usize> = graph
            .nodes()
            .iter()
            .map(|n| (n.id.as_str(), graph.in_degree(&n.id)))
            .collect();

        let ready: VecDeque<&'g Node> = graph
            .nodes()
            .iter()
            .filter(|n| in_degree[n.id.as_str()] == 0)
            .collect();

        Self {
            graph,
            run_id,
            in_degree,
            ready,
            results: HashMap::with_capacity(graph.nodes().len()),
            processing_order: Vec::with_capacity(graph.nodes().len()),
        }
    }

    /// Pop the next ready node. The returned reference borrows the graph,
    /// not the context.
    pub fn next_ready(&mut self) -> Option<&'g Node> {
        while let Some(node) = self.ready.pop_front() {
            if !self.results.contains_key(&node.id) {
                return Some(node);
            }
        }
        None
    }

    /// Assemble the effective input for `node` from what has run so far.
    ///
    /// - `output` nodes get every recorded result, labeled, in processing
    ///   order (falling back to the rules below when nothing has run);
    /// - nodes without incoming edges get their `input_text` verbatim;
    /// - a single predecessor's content is spliced in via
    ///   [`resolve_input_text`];
    /// - at a join the predecessors' contents, in edge-list order and joined
    ///   by [`JOIN_SEPARATOR`], replace `{PREV_RESULT}` if present and are
    ///   the input otherwise.
    pub fn build_input(&self, node: &Node) -> String {
        if node.node_type == OUTPUT_NODE_TYPE && !self.processing_order.is_empty() {
            return self.aggregate_results();
        }

        let incoming: Vec<_> = self.graph.incoming(&node.id).collect();
        if incoming.is_empty() {
            return node.input_text.clone();
        }

        let upstream = incoming
            .iter()
            .filter_map(|edge| self.results.get(&edge.source))
            .map(|result| result.content.as_str())
            .collect::<Vec<_>>()
            .join(JOIN_SEPARATOR);

        if incoming.len() > 1 {
            resolve_join_input(&node.input_text, &upstream)
        } else {
            resolve_input_text(&node.input_text, &upstream)
        }
    }

    /// Labeled contents of every recorded result, in processing order.
    pub fn aggregate_results(&self) -> String {
        self.processing_order
            .iter()
            .filter_map(|id| self.results.get(id))
            .map(|result| {
                format!(
                    "{} ({}):\n{}",
                    result.metadata.node_type, result.metadata.node_id, result.content
                )
            })
            .collect::<Vec<_>>()
            .join(JOIN_SEPARATOR)
    }

    /// Record `node`'s result, then release its successors.
    ///
    /// A second result for the same node is dropped; each node is recorded
    /// at most once per run.
    pub fn complete(&mut self, node: &'g Node, result: NodeResult) {
        if self.results.contains_key(&node.id) {
            tracing::warn!(
                run_id = %self.run_id,
                node_id = node.id.as_str(),
                "ignoring duplicate result for node"
            );
            return;
        }
        self.results.insert(node.id.clone(), result);
        self.processing_order.push(node.id.clone());
        self.release_successors(node);
    }

    /// Decrement the in-degree of every known target of `node`'s outgoing
    /// edges, enqueueing targets that reach zero.
    fn release_successors(&mut self, node: &Node) {
        let graph = self.graph;
        for edge in graph.outgoing(&node.id) {
            let Some(target) = graph.node(&edge.target) else {
                continue;
            };
            if let Some(degree) = self.in_degree.get_mut(target.id.as_str()) {
                if *degree > 0 {
                    *degree -= 1;
                    if *degree == 0 {
                        self.ready.push_back(target);
                    }
                }
            }
        }
    }

    pub fn result(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    pub fn processing_order(&self) -> &[NodeId] {
        &self.processing_order
    }

    /// Nodes with no recorded result, in input order.
    pub fn unscheduled(&self) -> Vec<NodeId> {
        self.graph
            .nodes()
            .iter()
            .filter(|n| !self.results.contains_key(&n.id))
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn into_report(self) -> RunReport {
        let unscheduled = self.unscheduled();
        RunReport {
            run_id: self.run_id,
            node_results: self.results,
            processing_order: self.processing_order,
            unscheduled,
        }
    }
}

/// Splice upstream content into a node's `input_text`.
///
/// Every `{PREV_RESULT}` is replaced; a blank `input_text` becomes the
/// upstream content itself; any other text is used verbatim.
pub fn resolve_input_text(input_text: &str, upstream: &str) -> String {
    if input_text.contains(PREV_RESULT_PLACEHOLDER) {
        input_text.replace(PREV_RESULT_PLACEHOLDER, upstream)
    } else if input_text.trim().is_empty() {
        upstream.to_string()
    } else {
        input_text.to_string()
    }
}

/// Input for a node with several incoming edges.
///
/// `{PREV_RESULT}` is replaced by the joined upstream content; without the
/// placeholder the joined content is the input and `input_text` is unused.
pub fn resolve_join_input(input_text: &str, joined: &str) -> String {
    if input_text.contains(PREV_RESULT_PLACEHOLDER) {
        input_text.replace(PREV_RESULT_PLACEHOLDER, joined)
    } else {
        joined.to_string()
    }
}
