//! `http` node handler.
//!
//! Sends the node's input to a configured URL and returns the response
//! body. Node config:
//!
//! ```json
//! {
//!   "url": "https://example.com/hook",
//!   "method": "POST",
//!   "headers": { "Authorization": "Bearer ..." },
//!   "body": "json"
//! }
//! ```
//!
//! `body = "json"` (default) sends `{ "input": <input> }`; `body = "text"`
//! sends the input as the raw request body. JSON responses are returned as
//! structured values and reduced by the normalizer; anything else is
//! returned as text.

use std::time::Duration;

use agentflow_core::flow::handler::{HandlerError, NodeHandler};
use agentflow_types::config::HttpHandlerConfig;
use agentflow_types::flow::NodeConfig;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};

/// Node type served by [`HttpHandler`].
pub const HTTP_NODE_TYPE: &str = "http";

/// Characters of a non-2xx response body kept in the error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// How the node input is placed in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// `{ "input": <input> }` with a JSON content type.
    Json,
    /// The input string verbatim.
    Text,
}

/// A request description parsed from node config.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: BodyMode,
}

impl HttpRequestSpec {
    /// Parse the handler's node config.
    pub fn from_config(config: &NodeConfig) -> Result<Self, HandlerError> {
        let url = match config.get("url") {
            Some(Value::String(url)) if !url.trim().is_empty() => url.clone(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(HandlerError::InvalidConfig("missing 'url'".to_string()));
            }
            Some(_) => {
                return Err(HandlerError::InvalidConfig("'url' must be a string".to_string()));
            }
        };

        let method = match config.get("method") {
            None | Some(Value::Null) => Method::POST,
            Some(Value::String(m)) => parse_method(m)?,
            Some(_) => {
                return Err(HandlerError::InvalidConfig("'method' must be a string".to_string()));
            }
        };

        let headers = match config.get("headers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| match value {
                    Value::String(v) => Ok((name.clone(), v.clone())),
                    _ => Err(HandlerError::InvalidConfig(format!(
                        "header '{name}' must be a string"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(HandlerError::InvalidConfig("'headers' must be an object".to_string()));
            }
        };

        let body = match config.get("body").and_then(Value::as_str) {
            None | Some("json") => BodyMode::Json,
            Some("text") => BodyMode::Text,
            Some(other) => {
                return Err(HandlerError::InvalidConfig(format!(
                    "unknown body mode '{other}' (expected 'json' or 'text')"
                )));
            }
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }
}

fn parse_method(raw: &str) -> Result<Method, HandlerError> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(HandlerError::InvalidConfig(format!("unsupported HTTP method: {raw}"))),
    }
}

/// Decode a response body: JSON content types become structured values,
/// everything else stays text.
fn decode_body(content_type: Option<&str>, body: String) -> Value {
    let is_json = content_type.is_some_and(|ct| {
        let mime = ct.split(';').next().unwrap_or("").trim();
        mime == "application/json" || mime.ends_with("+json")
    });
    if is_json {
        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            return value;
        }
    }
    Value::String(body)
}

/// Cut an error response body to [`MAX_ERROR_BODY_CHARS`].
fn truncate_body(body: &str) -> String {
    let mut chars = body.chars();
    let mut out: String = chars.by_ref().take(MAX_ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        out.push('…');
    }
    out
}

// ---------------------------------------------------------------------------
// HttpHandler
// ---------------------------------------------------------------------------

/// Calls an HTTP endpoint with the node's input.
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: reqwest::Client,
}

impl HttpHandler {
    pub fn new(config: &HttpHandlerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::from_client(client))
    }

    /// Wrap a preconfigured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl NodeHandler for HttpHandler {
    async fn call(&self, input: &str, config: &NodeConfig) -> Result<Value, HandlerError> {
        let spec = HttpRequestSpec::from_config(config)?;

        let mut request = self.client.request(spec.method.clone(), &spec.url);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match spec.body {
            BodyMode::Json => request.json(&json!({ "input": input })),
            BodyMode::Text => request.body(input.to_string()),
        };

        let response = request.send().await.map_err(|e| {
            HandlerError::Upstream(format!("request to '{}' failed: {e}", spec.url))
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| {
            HandlerError::Upstream(format!("failed to read response body: {e}"))
        })?;

        tracing::debug!(
            url = spec.url.as_str(),
            method = %spec.method,
            status = status.as_u16(),
            body_len = body.len(),
            "http node request completed"
        );

        if !status.is_success() {
            return Err(HandlerError::Upstream(format!(
                "{} {} returned {status}: {}",
                spec.method,
                spec.url,
                truncate_body(&body)
            )));
        }

        Ok(decode_body(content_type.as_deref(), body))
    }
}
