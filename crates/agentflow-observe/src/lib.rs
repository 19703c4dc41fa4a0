//! Observability setup for AgentFlow binaries.

pub mod tracing_setup;
