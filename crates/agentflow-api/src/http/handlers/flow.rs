//! Flow execution endpoint.
//!
//! POST /execute-flow - Run a node/edge graph and return every executed
//! node's result.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::Value;

use agentflow_types::flow::{FlowRequest, FlowResponse};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /execute-flow
///
/// Body: `{ "nodes": [...], "edges": [...] }`. Responds with
/// `{ "nodeResults": { <id>: NodeResult } }`, or `{ "error": ... }` when
/// the body cannot be scheduled.
pub async fn execute_flow(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<FlowResponse>, AppError> {
    let Json(body) = body?;
    let request = FlowRequest::from_value(body).inspect_err(|e| {
        tracing::info!(error = %e, "rejected malformed flow request");
    })?;

    tracing::debug!(
        nodes = request.nodes.len(),
        edges = request.edges.len(),
        "executing flow request"
    );

    let response = state.executor.execute_flow(request).await?;
    Ok(Json(response))
}
