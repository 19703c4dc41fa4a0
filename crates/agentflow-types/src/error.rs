use thiserror::Error;

/// A flow request whose shape cannot be scheduled.
///
/// The only error class that aborts a run; everything node-local is
/// converted into a `NodeResult` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' must be an array")]
    NotAnArray(&'static str),

    #[error("invalid node at index {index}: {reason}")]
    InvalidNode { index: usize, reason: String },

    #[error("invalid edge at index {index}: {reason}")]
    InvalidEdge { index: usize, reason: String },

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),
}
