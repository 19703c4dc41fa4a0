//! Flow execution engine for AgentFlow.
//!
//! This crate owns the scheduling core: the graph model, the handler
//! contract and registry, result normalization, and the executors. It
//! depends only on `agentflow-types` -- concrete I/O handlers live in
//! `agentflow-infra` and are registered by the hosting binary.

pub mod event;
pub mod flow;
