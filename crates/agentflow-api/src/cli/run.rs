//! `agentflow run` and `agentflow types`.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use agentflow_core::event::bus::{EventBus, RunEvents};
use agentflow_core::flow::context::RunReport;
use agentflow_core::flow::executor::FlowExecutor;
use agentflow_core::flow::graph::FlowGraph;
use agentflow_types::event::FlowEvent;
use agentflow_types::flow::{FlowRequest, NodeResult};

use crate::state::AppState;

/// Characters of content shown per row before truncating.
const PREVIEW_CHARS: usize = 60;

/// Load a flow file and parse it into a request.
pub async fn load_flow_file(path: &Path) -> Result<FlowRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read flow file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let request = FlowRequest::from_value(value)
        .with_context(|| format!("{} is not a valid flow", path.display()))?;
    Ok(request)
}

/// Execute a flow file and print its results.
pub async fn run_flow(state: &AppState, path: &Path, json: bool, quiet: bool) -> Result<()> {
    let request = load_flow_file(path).await?;
    let graph = FlowGraph::new(request)?;

    if json || quiet {
        let report = state.executor.run(&graph).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&report.into_response())?);
        }
        return Ok(());
    }

    // Stream node progress while the run is in flight.
    let bus = EventBus::for_nodes(graph.nodes().len());
    let progress = tokio::spawn(print_progress(bus.subscribe_run()));
    let executor = FlowExecutor::clone(&state.executor).with_event_bus(bus);
    let outcome = executor.run(&graph).await;
    drop(executor);
    if let Err(e) = progress.await {
        tracing::warn!("progress printer failed: {e}");
    }
    let report = outcome?;

    println!();
    println!(
        "  {} Run {} ({} executed)",
        style("▶").bold(),
        style(report.run_id).cyan(),
        report.processing_order.len()
    );
    println!();
    println!("{}", render_report(&report));

    if !report.unscheduled.is_empty() {
        println!();
        println!(
            "  {} Not scheduled: {}",
            style("!").yellow().bold(),
            style(report.unscheduled.join(", ")).dim()
        );
    }
    println!();

    Ok(())
}

/// Print one line per finished node until the run completes.
async fn print_progress(mut events: RunEvents) {
    while let Some(event) = events.next().await {
        if let Some(line) = progress_line(&event) {
            eprintln!("{line}");
        }
    }
}

fn progress_line(event: &FlowEvent) -> Option<String> {
    match event {
        FlowEvent::NodeCompleted {
            node_id,
            duration_ms,
            ..
        } => Some(format!(
            "  {} {} {}",
            style("✓").green(),
            node_id,
            style(format!("{duration_ms}ms")).dim()
        )),
        FlowEvent::NodeFailed { node_id, error, .. } => Some(format!(
            "  {} {} {}",
            style("✗").red(),
            node_id,
            style(error).red()
        )),
        FlowEvent::NodeUnsupported {
            node_id, node_type, ..
        } => Some(format!(
            "  {} {} {}",
            style("?").yellow(),
            node_id,
            style(format!("no handler for '{node_type}'")).dim()
        )),
        _ => None,
    }
}

/// Results as a table, one row per executed node in processing order.
pub fn render_report(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Content"),
        ]);

    for (position, result) in report.ordered_results().enumerate() {
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(&result.metadata.node_id),
            Cell::new(&result.metadata.node_type),
            format_status(result),
            Cell::new(preview(&result.content)),
        ]);
    }

    table
}

fn format_status(result: &NodeResult) -> Cell {
    if result.is_error() {
        Cell::new("error").fg(Color::Red)
    } else {
        Cell::new("ok").fg(Color::Green)
    }
}

/// First line of `content`, cut to [`PREVIEW_CHARS`].
fn preview(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or("");
    let mut out: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if first_line.chars().count() > PREVIEW_CHARS || content.lines().nth(1).is_some() {
        out.push('…');
    }
    out
}

/// List registered node types.
pub fn list_types(state: &AppState, json: bool) -> Result<()> {
    let types = state.executor.registry().node_types();

    if json {
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }

    println!();
    for node_type in types {
        println!("  {}", style(node_type).cyan());
    }
    println!();
    Ok(())
}
