//! Flow executor: Kahn-style scheduling over a node/edge graph.
//!
//! `FlowExecutor` owns the shared handler registry and engine config. Each
//! call to [`FlowExecutor::run`] creates a fresh `ExecutionContext`, drains
//! its FIFO ready queue, and returns a `RunReport`.
//!
//! # Execution flow
//!
//! 1. Seed the ready queue with zero-in-degree nodes in input order.
//! 2. Pop a node, assemble its input from recorded predecessor results.
//! 3. Dispatch to the registered handler through the failure boundary.
//! 4. Record the result and release successors whose in-degree hits zero.
//! 5. When the queue drains, report nodes that never became ready.
//!
//! In sequential mode exactly one handler runs at a time. In concurrent
//! mode up to `max_workers` ready nodes are in flight and the processing
//! order is completion order.

use std::sync::Arc;
use std::time::Instant;

use agentflow_types::config::{EngineConfig, ExecutionMode};
use agentflow_types::error::RequestError;
use agentflow_types::event::FlowEvent;
use agentflow_types::flow::{FlowRequest, FlowResponse, NodeId};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::event::bus::EventBus;

use super::context::{ExecutionContext, RunReport};
use super::dispatch::Dispatcher;
use super::graph::FlowGraph;
use super::registry::HandlerRegistry;

// ---------------------------------------------------------------------------
// ExecutionError
// ---------------------------------------------------------------------------

/// Run-level failures. Node-local failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("invalid flow request: {0}")]
    Request(#[from] RequestError),

    /// Strict mode only: some nodes never became ready.
    #[error("flow left nodes unscheduled (cyclic: {cyclic:?}, blocked: {blocked:?})")]
    UnscheduledNodes {
        cyclic: Vec<NodeId>,
        blocked: Vec<NodeId>,
    },
}

// ---------------------------------------------------------------------------
// FlowExecutor
// ---------------------------------------------------------------------------

/// Schedules and runs flow graphs against a shared handler registry.
#[derive(Debug, Clone)]
pub struct FlowExecutor {
    registry: Arc<HandlerRegistry>,
    config: EngineConfig,
    event_bus: Option<EventBus>,
}

impl FlowExecutor {
    /// Create an executor with the default (sequential, lenient) config.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: Arc<HandlerRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            event_bus: None,
        }
    }

    /// Publish run and node lifecycle events to `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate `request`, run it, and return the per-node results.
    pub async fn execute_flow(&self, request: FlowRequest) -> Result<FlowResponse, ExecutionError> {
        let graph = FlowGraph::new(request)?;
        let report = self.run(&graph).await?;
        Ok(report.into_response())
    }

    /// Run an already-built graph to completion.
    ///
    /// Nodes that never become ready (cycles, edges from unknown sources)
    /// are left out of the results; in strict mode they fail the run.
    pub async fn run(&self, graph: &FlowGraph) -> Result<RunReport, ExecutionError> {
        let run_id = Uuid::now_v7();
        let span = info_span!(
            "flow_run",
            run_id = %run_id,
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
        );
        self.run_with_id(graph, run_id).instrument(span).await
    }

    async fn run_with_id(
        &self,
        graph: &FlowGraph,
        run_id: Uuid,
    ) -> Result<RunReport, ExecutionError> {
        let started = Instant::now();

        tracing::info!(
            run_id = %run_id,
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            mode = ?self.config.mode,
            "starting flow run"
        );
        self.publish(FlowEvent::RunStarted {
            run_id,
            node_count: graph.nodes().len(),
            edge_count: graph.edges().len(),
        });

        let dispatcher = Dispatcher::new(run_id)
            .with_timeout(self.config.node_timeout())
            .with_events(self.event_bus.clone());
        let mut ctx = ExecutionContext::new(graph, run_id);

        match self.config.mode {
            ExecutionMode::Sequential => self.drain_sequential(&mut ctx, &dispatcher).await,
            ExecutionMode::Concurrent { max_workers } => {
                self.drain_concurrent(&mut ctx, &dispatcher, max_workers.max(1))
                    .await
            }
        }

        let report = ctx.into_report();
        let duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            run_id = %run_id,
            executed = report.processing_order.len(),
            unscheduled = report.unscheduled.len(),
            duration_ms,
            "flow run finished"
        );
        self.publish(FlowEvent::RunCompleted {
            run_id,
            nodes_executed: report.processing_order.len(),
            nodes_unscheduled: report.unscheduled.len(),
            duration_ms,
        });

        if !report.unscheduled.is_empty() {
            let (cyclic, blocked) = graph.classify_unscheduled(&report.unscheduled);
            if self.config.strict {
                return Err(ExecutionError::UnscheduledNodes { cyclic, blocked });
            }
            tracing::debug!(
                run_id = %run_id,
                ?cyclic,
                ?blocked,
                "dropping unscheduled nodes"
            );
        }

        Ok(report)
    }

    async fn drain_sequential<'g>(&self, ctx: &mut ExecutionContext<'g>, dispatcher: &Dispatcher) {
        while let Some(node) = ctx.next_ready() {
            let input = ctx.build_input(node);
            let handler = self.registry.resolve(&node.node_type);
            let result = dispatcher.invoke(node, handler, &input).await;
            ctx.complete(node, result);
        }
    }

    async fn drain_concurrent<'g>(
        &self,
        ctx: &mut ExecutionContext<'g>,
        dispatcher: &Dispatcher,
        max_workers: usize,
    ) {
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < max_workers {
                let Some(node) = ctx.next_ready() else {
                    break;
                };
                let input = ctx.build_input(node);
                let handler = self.registry.resolve(&node.node_type);
                in_flight.push(async move {
                    let result = dispatcher.invoke(node, handler, &input).await;
                    (node, result)
                });
            }

            match in_flight.next().await {
                Some((node, result)) => ctx.complete(node, result),
                None => break,
            }
        }
    }

    fn publish(&self, event: FlowEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use agentflow_types::flow::{Edge, Node};
    use serde_json::json;

    use crate::flow::handler::HandlerError;

    /// Registry with the built-ins plus:
    /// - `echo`: returns its input
    /// - `upper`: uppercases its input
    /// - `fail`: always errors with "boom"
    /// - `structured`: returns `{ "response": <input> }`
    fn test_registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::with_builtins();
        registry.register_fn("echo", |input, _| async move { Ok(json!(input)) });
        registry.register_fn("upper", |input: String, _| async move {
            Ok(json!(input.to_uppercase()))
        });
        registry.register_fn("fail", |_, _| async { Err(HandlerError::failed("boom")) });
        registry.register_fn("structured", |input, _| async move {
            Ok(json!({ "response": input }))
        });
        registry
    }

    fn executor() -> FlowExecutor {
        FlowExecutor::new(Arc::new(test_registry()))
    }

    fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
        pairs.iter().map(|(s, t)| Edge::new(*s, *t)).collect()
    }

    async fn run(executor: &FlowExecutor, nodes: Vec<Node>, pairs: &[(&str, &str)]) -> RunReport {
        let graph = FlowGraph::new(FlowRequest::new(nodes, edges(pairs))).unwrap();
        executor.run(&graph).await.unwrap()
    }

    fn position(report: &RunReport, id: &str) -> usize {
        report
            .processing_order
            .iter()
            .position(|n| n == id)
            .unwrap_or_else(|| panic!("{id} not processed"))
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn single_input_node() {
        let response = executor()
            .execute_flow(FlowRequest::new(
                vec![Node::new("1", "input").with_input_text("hi")],
                vec![],
            ))
            .await
            .unwrap();
        assert_eq!(response.node_results["1"].content, "hi");
    }

    #[tokio::test]
    async fn two_starts_feed_output() {
        let report = run(
            &executor(),
            vec![
                Node::new("out", "output"),
                Node::new("a", "input").with_input_text("alpha"),
                Node::new("b", "input").with_input_text("beta"),
            ],
            &[("a", "out"), ("b", "out")],
        )
        .await;

        assert_eq!(report.processing_order, vec!["a", "b", "out"]);
        let content = &report.node_results["out"].content;
        assert!(content.contains("input (a):\nalpha"), "got: {content}");
        assert!(content.contains("input (b):\nbeta"), "got: {content}");
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn predecessors_run_first() {
        // d depends on b and c, which both depend on a.
        let report = run(
            &executor(),
            vec![
                Node::new("d", "echo"),
                Node::new("c", "echo"),
                Node::new("b", "echo"),
                Node::new("a", "input").with_input_text("seed"),
            ],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        )
        .await;

        assert_eq!(report.processing_order, vec!["a", "b", "c", "d"]);
        for (s, t) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")] {
            assert!(position(&report, s) < position(&report, t), "{s} before {t}");
        }
    }

    #[tokio::test]
    async fn each_node_recorded_once() {
        let report = run(
            &executor(),
            vec![Node::new("a", "input"), Node::new("b", "echo")],
            &[("a", "b"), ("a", "b"), ("a", "b")],
        )
        .await;

        assert_eq!(report.processing_order, vec!["a", "b"]);
        assert_eq!(report.node_results.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Input assembly
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn prev_result_substitution() {
        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("hello"),
                Node::new("b", "echo").with_input_text("got: {PREV_RESULT}"),
            ],
            &[("a", "b")],
        )
        .await;
        assert_eq!(report.node_results["b"].content, "got: hello");
    }

    #[tokio::test]
    async fn fan_in_joins_in_edge_order() {
        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("x"),
                Node::new("b", "input").with_input_text("y"),
                Node::new("c", "echo"),
            ],
            &[("a", "c"), ("b", "c")],
        )
        .await;
        assert_eq!(report.node_results["c"].content, "x\n\ny");

        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("x"),
                Node::new("b", "input").with_input_text("y"),
                Node::new("c", "echo"),
            ],
            &[("b", "c"), ("a", "c")],
        )
        .await;
        assert_eq!(report.node_results["c"].content, "y\n\nx");
    }

    #[tokio::test]
    async fn join_with_fixed_prompt_keeps_upstream() {
        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("x"),
                Node::new("b", "input").with_input_text("y"),
                Node::new("c", "echo").with_input_text("Summarize the tweets"),
                Node::new("d", "echo").with_input_text("Tweets:\n{PREV_RESULT}"),
            ],
            &[("a", "c"), ("b", "c"), ("a", "d"), ("b", "d")],
        )
        .await;
        assert_eq!(report.node_results["c"].content, "x\n\ny");
        assert_eq!(report.node_results["d"].content, "Tweets:\nx\n\ny");
    }

    #[tokio::test]
    async fn output_aggregates_in_processing_order() {
        let report = run(
            &executor(),
            vec![
                Node::new("1", "input").with_input_text("hi"),
                Node::new("2", "upper"),
                Node::new("3", "output"),
            ],
            &[("1", "2"), ("2", "3")],
        )
        .await;
        assert_eq!(
            report.node_results["3"].content,
            "input (1):\nhi\n\nupper (2):\nHI"
        );
    }

    #[tokio::test]
    async fn structured_result_is_normalized_before_successor() {
        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("plain"),
                Node::new("b", "structured"),
                Node::new("c", "echo").with_input_text("[{PREV_RESULT}]"),
            ],
            &[("a", "b"), ("b", "c")],
        )
        .await;
        assert_eq!(report.node_results["b"].content, "plain");
        assert_eq!(report.node_results["c"].content, "[plain]");
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn error_isolated_and_forwarded() {
        let report = run(
            &executor(),
            vec![Node::new("n", "fail"), Node::new("next", "echo")],
            &[("n", "next")],
        )
        .await;

        let failed = &report.node_results["n"];
        assert_eq!(failed.metadata.error.as_deref(), Some("boom"));
        assert!(failed.content.contains("boom"));
        assert_eq!(report.node_results["next"].content, "Error in node n: boom");
        assert!(!report.node_results["next"].is_error());
    }

    #[tokio::test]
    async fn unknown_type_not_an_error() {
        let report = run(&executor(), vec![Node::new("x", "nonexistent")], &[]).await;
        let result = &report.node_results["x"];
        assert_eq!(result.content, "No service matched for type: nonexistent");
        assert!(result.metadata.error.is_none());
    }

    #[tokio::test]
    async fn panicking_handler_does_not_abort_run() {
        let mut registry = test_registry();
        registry.register_fn("panics", |_, _| async {
            if true {
                panic!("handler bug");
            }
            Ok(json!(null))
        });
        let executor = FlowExecutor::new(Arc::new(registry));

        let report = run(
            &executor,
            vec![Node::new("p", "panics"), Node::new("q", "echo")],
            &[("p", "q")],
        )
        .await;
        assert!(report.node_results["p"].is_error());
        assert!(report.node_results["q"].content.contains("handler bug"));
    }

    #[tokio::test(start_paused = true)]
    async fn node_timeout_produces_error_result() {
        let mut registry = test_registry();
        registry.register_fn("slow", |_, _| async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(json!("too late"))
        });
        let config = EngineConfig {
            node_timeout_secs: Some(5),
            ..EngineConfig::default()
        };
        let executor = FlowExecutor::with_config(Arc::new(registry), config);

        let report = run(&executor, vec![Node::new("s", "slow")], &[]).await;
        assert_eq!(
            report.node_results["s"].metadata.error.as_deref(),
            Some("node timed out after 5s")
        );
    }

    // -----------------------------------------------------------------------
    // Unschedulable nodes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cycle_nodes_dropped_silently() {
        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("ok"),
                Node::new("x", "echo"),
                Node::new("y", "echo"),
            ],
            &[("x", "y"), ("y", "x")],
        )
        .await;

        assert_eq!(report.processing_order, vec!["a"]);
        assert!(!report.node_results.contains_key("x"));
        assert_eq!(report.unscheduled, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn dangling_edges_do_not_crash() {
        let report = run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("ok"),
                Node::new("b", "echo"),
            ],
            &[("a", "ghost"), ("phantom", "b")],
        )
        .await;

        assert_eq!(report.processing_order, vec!["a"]);
        assert_eq!(report.unscheduled, vec!["b"]);
    }

    #[tokio::test]
    async fn strict_mode_rejects_unscheduled() {
        let config = EngineConfig {
            strict: true,
            ..EngineConfig::default()
        };
        let executor = FlowExecutor::with_config(Arc::new(test_registry()), config);
        let err = executor
            .execute_flow(FlowRequest::new(
                vec![
                    Node::new("x", "echo"),
                    Node::new("y", "echo"),
                    Node::new("z", "echo"),
                ],
                edges(&[("x", "y"), ("y", "x"), ("y", "z")]),
            ))
            .await
            .unwrap_err();

        match err {
            ExecutionError::UnscheduledNodes { cyclic, blocked } => {
                assert_eq!(cyclic, vec!["x", "y"]);
                assert_eq!(blocked, vec!["z"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn strict_mode_accepts_acyclic_flow() {
        let config = EngineConfig {
            strict: true,
            ..EngineConfig::default()
        };
        let executor = FlowExecutor::with_config(Arc::new(test_registry()), config);
        let response = executor
            .execute_flow(FlowRequest::new(
                vec![Node::new("a", "input"), Node::new("b", "echo")],
                edges(&[("a", "b")]),
            ))
            .await
            .unwrap();
        assert_eq!(response.node_results.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_rejected() {
        let err = executor()
            .execute_flow(FlowRequest::new(
                vec![Node::new("a", "input"), Node::new("a", "echo")],
                vec![],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Request(RequestError::DuplicateNodeId(ref id)) if id == "a"
        ));
    }

    #[tokio::test]
    async fn empty_flow_yields_empty_results() {
        let response = executor()
            .execute_flow(FlowRequest::default())
            .await
            .unwrap();
        assert!(response.node_results.is_empty());
    }

    // -----------------------------------------------------------------------
    // Concurrent mode
    // -----------------------------------------------------------------------

    fn concurrent(registry: HandlerRegistry, max_workers: usize) -> FlowExecutor {
        let config = EngineConfig {
            mode: ExecutionMode::Concurrent { max_workers },
            ..EngineConfig::default()
        };
        FlowExecutor::with_config(Arc::new(registry), config)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_processing_order_is_completion_order() {
        let mut registry = test_registry();
        registry.register_fn("sleepy", |input: String, config| async move {
            let ms = config.get("ms").and_then(|v| v.as_u64()).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(json!(input))
        });
        let executor = concurrent(registry, 4);

        let report = run(
            &executor,
            vec![
                Node::new("slow", "sleepy").with_config("ms", json!(300)).with_input_text("s"),
                Node::new("fast", "sleepy").with_config("ms", json!(10)).with_input_text("f"),
                Node::new("join", "echo"),
            ],
            &[("slow", "join"), ("fast", "join")],
        )
        .await;

        assert_eq!(report.processing_order, vec!["fast", "slow", "join"]);
        // Join still follows edge-list order, not completion order.
        assert_eq!(report.node_results["join"].content, "s\n\nf");
    }

    #[tokio::test]
    async fn concurrent_matches_sequential_topology() {
        let nodes = vec![
            Node::new("a", "input").with_input_text("x"),
            Node::new("b", "upper"),
            Node::new("c", "echo"),
            Node::new("d", "fail"),
            Node::new("out", "output"),
        ];
        let pairs = [("a", "b"), ("a", "c"), ("b", "d"), ("c", "out"), ("d", "out")];

        let report = run(&concurrent(test_registry(), 2), nodes, &pairs).await;

        assert_eq!(report.node_results.len(), 5);
        for (s, t) in pairs {
            assert!(position(&report, s) < position(&report, t), "{s} before {t}");
        }
        assert_eq!(report.node_results["b"].content, "X");
        assert!(report.node_results["d"].is_error());
    }

    #[tokio::test]
    async fn zero_workers_treated_as_one() {
        let report = run(
            &concurrent(test_registry(), 0),
            vec![Node::new("a", "input").with_input_text("x"), Node::new("b", "echo")],
            &[("a", "b")],
        )
        .await;
        assert_eq!(report.node_results["b"].content, "x");
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn run_publishes_lifecycle_events() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let executor = executor().with_event_bus(bus);

        run(
            &executor,
            vec![Node::new("a", "input"), Node::new("b", "nonexistent")],
            &[("a", "b")],
        )
        .await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(FlowEvent::RunStarted { node_count: 2, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            FlowEvent::NodeUnsupported { node_id, .. } if node_id == "b"
        )));
        assert!(matches!(
            events.last(),
            Some(FlowEvent::RunCompleted { nodes_executed: 2, nodes_unscheduled: 0, .. })
        ));
        let run_id = events[0].run_id();
        assert!(events.iter().all(|e| e.run_id() == run_id));
    }

    // -----------------------------------------------------------------------
    // Tracing
    // -----------------------------------------------------------------------

    /// Records the name of every span opened while installed.
    #[derive(Clone, Default)]
    struct SpanNames(Arc<std::sync::Mutex<Vec<&'static str>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanNames {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().unwrap().push(attrs.metadata().name());
        }
    }

    #[tokio::test]
    async fn run_and_nodes_are_spanned() {
        use tracing_subscriber::layer::SubscriberExt;

        let names = SpanNames::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(names.clone()));

        run(
            &executor(),
            vec![
                Node::new("a", "input").with_input_text("x"),
                Node::new("b", "echo"),
                Node::new("c", "nonexistent"),
            ],
            &[("a", "b")],
        )
        .await;

        let names = names.0.lock().unwrap().clone();
        assert_eq!(names.iter().filter(|n| **n == "flow_run").count(), 1);
        // Unsupported nodes never reach a handler.
        assert_eq!(names.iter().filter(|n| **n == "flow_node").count(), 2);
    }
}
