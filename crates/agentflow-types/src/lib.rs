//! Shared domain types for AgentFlow.
//!
//! This crate contains the types exchanged between the flow engine, its
//! hosting application, and the HTTP surface: nodes, edges, node results,
//! engine configuration, run events, and request validation errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod flow;
