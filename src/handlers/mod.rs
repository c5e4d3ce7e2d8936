pub mod resources;
pub mod tools;

use serde_json::{json, Value};

use crate::config::ServerConfig;
use crate::error::{DispatchError, ServerError};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::schema::ArgumentValidator;
use crate::tools::{ToolContext, ToolRegistry};

pub const SERVER_NAME: &str = "f1-mcp-server";

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Routes one request to its handler and wraps the outcome in an envelope.
///
/// Handlers report failures as [`DispatchError`]; [`Dispatcher::dispatch`]
/// is the only place those become JSON-RPC error objects.
pub struct Dispatcher {
    registry: ToolRegistry,
    context: ToolContext,
    validator: Option<ArgumentValidator>,
}

impl Dispatcher {
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let context = ToolContext::from_config(config)?;
        Self::with_registry(ToolRegistry::with_default_tools(), context, config.validate_arguments)
    }

    pub fn with_registry(
        registry: ToolRegistry,
        context: ToolContext,
        validate_arguments: bool,
    ) -> Result<Self, ServerError> {
        let validator = if validate_arguments {
            Some(ArgumentValidator::compile(registry.descriptors())?)
        } else {
            None
        };
        Ok(Self {
            registry,
            context,
            validator,
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Handle one request. Always returns a response carrying the request's id.
    pub async fn dispatch(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %req.method, id = %req.id, "request");

        match self.route(req).await {
            Ok(result) => JsonRpcResponse::success(req.id.clone(), result),
            Err(err) => {
                tracing::warn!(method = %req.method, id = %req.id, error = %err, "request failed");
                JsonRpcResponse::error(req.id.clone(), err.into())
            }
        }
    }

    async fn route(&self, req: &JsonRpcRequest) -> Result<Value, DispatchError> {
        match req.method.as_str() {
            "initialize" => Ok(initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools::list(&self.registry)),
            "tools/call" => {
                tools::call(&self.registry, &self.context, self.validator.as_ref(), req.params_or_empty()).await
            }
            "resources/list" => Ok(resources::list()),
            "resources/read" => resources::read(&self.registry, &self.context, req.params_or_empty()).await,
            other => Err(DispatchError::MethodNotFound(other.to_string())),
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
