//! Flow engine core: graph model, dispatch, normalization, and scheduling.
//!
//! - `graph` -- immutable node/edge model with adjacency and cycle analysis
//! - `handler` -- `NodeHandler` trait and its type-erased `BoxNodeHandler`
//! - `registry` -- node type string -> handler lookup
//! - `builtin` -- `input` and `output` pass-through handlers
//! - `normalize` -- canonical content extraction from handler results
//! - `context` -- per-run in-degree table, ready queue, and results
//! - `dispatch` -- per-node failure boundary (errors, panics, timeouts)
//! - `executor` -- sequential and bounded-concurrent Kahn schedulers

pub mod builtin;
pub mod context;
pub mod dispatch;
pub mod executor;
pub mod graph;
pub mod handler;
pub mod normalize;
pub mod registry;
