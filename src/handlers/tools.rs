use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::{ToolCallParams, ToolResult};
use crate::schema::ArgumentValidator;
use crate::tools::{Arguments, ToolContext, ToolRegistry};

/// `tools/list`: every registered descriptor, in registration order.
pub fn list(registry: &ToolRegistry) -> Value {
    let tools: Vec<_> = registry.descriptors().collect();
    json!({ "tools": tools })
}

/// `tools/call`: look the tool up by name, optionally check its arguments,
/// run it, and wrap its JSON output as a text content block.
pub async fn call(
    registry: &ToolRegistry,
    ctx: &ToolContext,
    validator: Option<&ArgumentValidator>,
    params: Value,
) -> Result<Value, DispatchError> {
    if !params.is_object() {
        return Err(DispatchError::InvalidParams(
            "Invalid tools/call params: expected an object".into(),
        ));
    }
    let params: ToolCallParams = serde_json::from_value(params)
        .map_err(|e| DispatchError::InvalidParams(format!("Invalid tools/call params: {e}")))?;

    let name = params
        .name
        .ok_or_else(|| DispatchError::InvalidParams("Missing tool name".into()))?;
    let tool = registry
        .get(&name)
        .ok_or_else(|| DispatchError::UnknownTool(name.clone()))?;

    if let Some(validator) = validator {
        validator
            .validate(&name, params.arguments.as_ref())
            .map_err(|e| DispatchError::InvalidParams(e.to_string()))?;
    }

    let args = Arguments::from_value(params.arguments)
        .map_err(|e| DispatchError::InvalidParams(format!("Invalid arguments for {name}: {e}")))?;

    tracing::debug!(tool = %name, "calling tool");
    let output = tool.call(ctx, args).await.map_err(DispatchError::Tool)?;

    let text = serde_json::to_string_pretty(&output)
        .map_err(|e| DispatchError::Internal(e.to_string()))?;
    serde_json::to_value(ToolResult::text(text)).map_err(|e| DispatchError::Internal(e.to_string()))
}
