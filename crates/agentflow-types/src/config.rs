//! Engine configuration types for AgentFlow.
//!
//! `EngineConfig` represents the top-level `agentflow.toml` that controls
//! scheduling mode, strictness, timeouts, and the server/HTTP handler
//! settings. Every field has a default, so an empty file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the flow engine and its host binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How ready nodes are dispatched.
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Fail the run when nodes are left unscheduled (cycles, dangling edges).
    #[serde(default)]
    pub strict: bool,

    /// Per-node handler timeout. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_timeout_secs: Option<u64>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub http: HttpHandlerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            strict: false,
            node_timeout_secs: None,
            server: ServerConfig::default(),
            http: HttpHandlerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_secs.map(Duration::from_secs)
    }
}

/// Scheduling strategy for one run.
///
/// ```toml
/// [mode]
/// type = "concurrent"
/// max_workers = 8
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One node at a time, in ready-queue order. Deterministic.
    #[default]
    Sequential,
    /// Up to `max_workers` ready nodes in flight; completion order decides
    /// the processing order.
    Concurrent {
        #[serde(default = "default_max_workers")]
        max_workers: usize,
    },
}

fn default_max_workers() -> usize {
    4
}

/// Bind address for `agentflow serve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Client settings for the built-in `http` node handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHandlerConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "agentflow/0.1".to_string()
}

impl Default for HttpHandlerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}
