use serde::Deserialize;
use serde_json::Value;

/// JSON-RPC 2.0 request envelope.
///
/// `id` is opaque: it is echoed back verbatim and never interpreted. An
/// absent `id` is treated the same as an explicit `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some("2.0".into()),
            id,
            method: method.into(),
            params,
        }
    }

    /// Request params, defaulting to an empty object when absent or `null`.
    pub fn params_or_empty(&self) -> Value {
        match &self.params {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(v) => v.clone(),
        }
    }
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Parameters for `resources/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    #[serde(default)]
    pub uri: Option<String>,
}
