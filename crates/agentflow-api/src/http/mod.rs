//! HTTP/REST API layer for AgentFlow.
//!
//! Axum-based API exposing `POST /execute-flow` and `GET /health`, with
//! CORS and request tracing.

pub mod error;
pub mod handlers;
pub mod router;
