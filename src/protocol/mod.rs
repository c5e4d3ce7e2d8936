pub mod request;
pub mod response;

pub use request::{JsonRpcRequest, ResourceReadParams, ToolCallParams};
pub use response::{
    JsonRpcError, JsonRpcResponse, ResourceContent, ResourceContents, ToolResult,
    ToolResultContent, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
