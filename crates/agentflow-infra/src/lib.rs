//! Infrastructure layer for AgentFlow.
//!
//! Holds everything that touches the outside world: the TOML config loader
//! and node handlers backed by network I/O. The scheduling core in
//! `agentflow-core` never depends on this crate.

pub mod config;
pub mod handler;
