//! Immutable graph model for one flow run.
//!
//! `FlowGraph` keeps the submitted nodes and edges in input order and
//! precomputes per-node incoming/outgoing edge lists. Edges that reference
//! unknown ids are kept in the edge list but only indexed on the side whose
//! endpoint exists, so scheduling never crashes on them.

use std::collections::{HashMap, HashSet};

use agentflow_types::error::RequestError;
use agentflow_types::flow::{Edge, FlowRequest, Node};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

/// Read-only node/edge set for a single run.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    /// Edge indices by target node index, in edge-list order.
    incoming: Vec<Vec<usize>>,
    /// Edge indices by source node index, in edge-list order.
    outgoing: Vec<Vec<usize>>,
}

impl FlowGraph {
    /// Build a graph from a request, rejecting duplicate node ids.
    pub fn new(request: FlowRequest) -> Result<Self, RequestError> {
        request.validate()?;
        let FlowRequest { nodes, edges } = request;

        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (edge_idx, edge) in edges.iter().enumerate() {
            match index.get(edge.target.as_str()) {
                Some(&target) => incoming[target].push(edge_idx),
                None => tracing::debug!(
                    source = edge.source.as_str(),
                    target = edge.target.as_str(),
                    "edge targets unknown node"
                ),
            }
            match index.get(edge.source.as_str()) {
                Some(&source) => outgoing[source].push(edge_idx),
                None => tracing::debug!(
                    source = edge.source.as_str(),
                    target = edge.target.as_str(),
                    "edge originates from unknown node"
                ),
            }
        }

        Ok(Self {
            nodes,
            edges,
            index,
            incoming,
            outgoing,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Edges whose target is `id`, in edge-list order. Includes edges from
    /// unknown sources.
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.edge_list(&self.incoming, id)
    }

    /// Edges whose source is `id`, in edge-list order. Includes edges to
    /// unknown targets.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.edge_list(&self.outgoing, id)
    }

    /// Number of edges pointing at `id`.
    pub fn in_degree(&self, id: &str) -> usize {
        self.index.get(id).map_or(0, |&i| self.incoming[i].len())
    }

    fn edge_list<'a>(
        &'a self,
        lists: &'a [Vec<usize>],
        id: &str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        let indices: &'a [usize] = match self.index.get(id) {
            Some(&i) => &lists[i],
            None => &[],
        };
        indices.iter().map(move |&e| &self.edges[e])
    }

    /// Split never-scheduled nodes into those on a cycle and those merely
    /// blocked (downstream of a cycle, or waiting on an edge from an unknown
    /// source).
    ///
    /// A node is cyclic when it belongs to a strongly connected component of
    /// more than one node, or has an edge to itself. Input order is kept.
    pub fn classify_unscheduled(&self, unscheduled: &[String]) -> (Vec<String>, Vec<String>) {
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.nodes.len(), self.edges.len());
        let indices: Vec<_> = (0..self.nodes.len()).map(|i| graph.add_node(i)).collect();
        for edge in &self.edges {
            if let (Some(&s), Some(&t)) = (
                self.index.get(edge.source.as_str()),
                self.index.get(edge.target.as_str()),
            ) {
                graph.add_edge(indices[s], indices[t], ());
            }
        }

        let mut on_cycle: HashSet<usize> = HashSet::new();
        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&n| graph.contains_edge(n, n));
            if cyclic {
                on_cycle.extend(component.iter().map(|&n| graph[n]));
            }
        }

        let pending: HashSet<&str> = unscheduled.iter().map(|s| s.as_str()).collect();
        let mut cyclic = Vec::new();
        let mut blocked = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if !pending.contains(node.id.as_str()) {
                continue;
            }
            if on_cycle.contains(&i) {
                cyclic.push(node.id.clone());
            } else {
                blocked.push(node.id.clone());
            }
        }
        (cyclic, blocked)
    }
}
