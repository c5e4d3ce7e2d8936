use crate::protocol::JsonRpcError;

/// Failure talking to an upstream data source.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for url: {url}")]
    Status { url: String, status: u16 },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected response from {url}: missing {field}")]
    MissingField { url: String, field: &'static str },
    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),
}

/// Failure inside a tool or resource handler.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("{0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ToolError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

/// Every failure the dispatcher can report, before translation to JSON-RPC.
///
/// Handlers return these freely; [`From<DispatchError> for JsonRpcError`]
/// is the only place an error envelope is formed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error("Tool error: {0}")]
    Tool(#[source] ToolError),
    #[error("Resource error: {0}")]
    Resource(#[source] ToolError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for JsonRpcError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::MethodNotFound(method) => JsonRpcError::method_not_found(&method),
            DispatchError::UnknownTool(_)
            | DispatchError::UnknownResource(_)
            | DispatchError::InvalidParams(_) => JsonRpcError::invalid_params(message),
            DispatchError::Tool(_) | DispatchError::Resource(_) | DispatchError::Internal(_) => {
                JsonRpcError::internal_error(message)
            }
        }
    }
}

/// Startup failure, or a fatal transport failure that ends the read loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaValidationError),
    #[error("stdio failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("response serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};

    #[test]
    fn dispatch_errors_map_to_json_rpc_codes() {
        let err: JsonRpcError = DispatchError::MethodNotFound("bogus".into()).into();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert_eq!(err.message, "Method not found: bogus");

        let err: JsonRpcError = DispatchError::UnknownTool("unknown_tool".into()).into();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(err.message, "Unknown tool: unknown_tool");

        let err: JsonRpcError = DispatchError::UnknownResource("f1://nope".into()).into();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(err.message, "Unknown resource: f1://nope");

        let err: JsonRpcError =
            DispatchError::Tool(ToolError::not_found("Driver XYZ not found")).into();
        assert_eq!(err.code, INTERNAL_ERROR);
        assert_eq!(err.message, "Tool error: Driver XYZ not found");
    }

    #[test]
    fn upstream_status_message_names_url() {
        let err = ToolError::from(UpstreamError::Status {
            url: "http://example.test/2024/drivers.json".into(),
            status: 503,
        });
        assert_eq!(
            err.to_string(),
            "HTTP 503 for url: http://example.test/2024/drivers.json"
        );
    }
}
