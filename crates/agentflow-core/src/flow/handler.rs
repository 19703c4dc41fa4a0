//! NodeHandler trait and its object-safe wrapper.
//!
//! Follows the same blanket-impl pattern as the rest of the engine's
//! RPITIT traits:
//! 1. `NodeHandler` uses native async fn in traits for implementors
//! 2. `NodeHandlerDyn` is the object-safe twin with boxed futures
//! 3. `BoxNodeHandler` wraps `Arc<dyn NodeHandlerDyn>` and delegates
//!
//! A handler only ever sees its own input string and config map. It never
//! learns about the graph it runs in.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agentflow_types::flow::NodeConfig;
use serde_json::Value;

// ---------------------------------------------------------------------------
// HandlerError
// ---------------------------------------------------------------------------

/// Errors a handler can report. The scheduler converts every variant into an
/// error `NodeResult`; none of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Generic failure; the message is shown verbatim.
    #[error("{0}")]
    Failed(String),

    /// The node's config is missing a field or holds the wrong type.
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    /// A remote service answered with an error.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

// ---------------------------------------------------------------------------
// NodeHandler
// ---------------------------------------------------------------------------

/// Executable behavior behind a node type.
///
/// The returned value may be any shape; it is reduced to a content string
/// by `normalize::extract_content` at the scheduler boundary.
pub trait NodeHandler: Send + Sync {
    fn call(
        &self,
        input: &str,
        config: &NodeConfig,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send;
}

/// Object-safe version of [`NodeHandler`] with boxed futures.
///
/// A blanket implementation is provided for all types implementing
/// `NodeHandler`.
pub trait NodeHandlerDyn: Send + Sync {
    fn call_boxed<'a>(
        &'a self,
        input: &'a str,
        config: &'a NodeConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send + 'a>>;
}

impl<T: NodeHandler> NodeHandlerDyn for T {
    fn call_boxed<'a>(
        &'a self,
        input: &'a str,
        config: &'a NodeConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send + 'a>> {
        Box::pin(self.call(input, config))
    }
}

/// Type-erased, cheaply clonable node handler.
#[derive(Clone)]
pub struct BoxNodeHandler {
    inner: Arc<dyn NodeHandlerDyn>,
}

impl BoxNodeHandler {
    pub fn new<T: NodeHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    pub async fn call(&self, input: &str, config: &NodeConfig) -> Result<Value, HandlerError> {
        self.inner.call_boxed(input, config).await
    }
}

impl std::fmt::Debug for BoxNodeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNodeHandler").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FnHandler
// ---------------------------------------------------------------------------

/// Adapter turning an async closure into a [`NodeHandler`].
///
/// The closure receives owned copies of the input and config so the future
/// it returns does not borrow from the scheduler.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> NodeHandler for FnHandler<F>
where
    F: Fn(String, NodeConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    fn call(
        &self,
        input: &str,
        config: &NodeConfig,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send {
        (self.f)(input.to_string(), config.clone())
    }
}
