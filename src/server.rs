use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers::Dispatcher;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Maximum bytes per JSON-RPC message (1 MiB).
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// MCP server that communicates over stdio using newline-delimited JSON-RPC 2.0.
///
/// Requests are handled one at a time: a line is read, dispatched to
/// completion, and its response written and flushed before the next line
/// is read.
pub struct McpServer {
    dispatcher: Dispatcher,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Ok(Self::with_dispatcher(Dispatcher::new(&config)?))
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve stdin/stdout until end of input.
    pub async fn run(&self) -> Result<(), ServerError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve any line-oriented reader/writer pair until end of input.
    ///
    /// At most `MAX_MESSAGE_BYTES + 1` bytes of a line are buffered; the
    /// rest of an oversized line is discarded unread.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut raw = Vec::new();

        loop {
            raw.clear();
            let n = (&mut reader)
                .take(MAX_MESSAGE_BYTES as u64 + 1)
                .read_until(b'\n', &mut raw)
                .await?;
            if n == 0 {
                break;
            }
            if raw.len() > MAX_MESSAGE_BYTES && raw.last() != Some(&b'\n') {
                discard_line(&mut reader).await?;
            }

            if let Some(resp) = self.handle_bytes(&raw).await {
                write_response(&mut writer, &resp).await?;
            }
        }

        Ok(())
    }

    /// Handle one raw input line, including its terminator if any.
    pub async fn handle_bytes(&self, raw: &[u8]) -> Option<JsonRpcResponse> {
        if raw.len() > MAX_MESSAGE_BYTES {
            tracing::warn!(bytes = raw.len(), limit = MAX_MESSAGE_BYTES, "message too large");
            return Some(JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::parse_error(format!(
                    "message too large: {} bytes (limit {MAX_MESSAGE_BYTES})",
                    raw.len()
                )),
            ));
        }

        match std::str::from_utf8(raw) {
            Ok(line) => self.handle_line(line).await,
            Err(e) => {
                tracing::warn!(error = %e, "non UTF-8 input line");
                Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error("invalid UTF-8"),
                ))
            }
        }
    }

    /// Handle one text line. Blank lines produce no response; every other
    /// line produces exactly one.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "parse error");
                return Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(e)));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let req = match parse_request(value) {
            Ok(req) => req,
            Err(detail) => {
                tracing::warn!(id = %id, detail = %detail, "invalid request");
                return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request(detail)));
            }
        };

        Some(self.dispatcher.dispatch(&req).await)
    }
}

fn parse_request(value: Value) -> Result<JsonRpcRequest, String> {
    if !value.is_object() {
        return Err("Invalid Request: expected a JSON object".into());
    }

    let req: JsonRpcRequest =
        serde_json::from_value(value).map_err(|e| format!("Invalid Request: {e}"))?;

    match req.jsonrpc.as_deref() {
        None | Some("2.0") => Ok(req),
        Some(other) => Err(format!("Invalid Request: unsupported jsonrpc version {other:?}")),
    }
}

/// Skip input up to and including the next newline, or to end of input.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        let (consumed, done) = match buf.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (buf.len(), false),
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

async fn write_response<W>(writer: &mut W, resp: &JsonRpcResponse) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let out = serde_json::to_string(resp)?;
    writer.write_all(out.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_objects_with_a_method_are_requests() {
        assert!(parse_request(serde_json::json!([1, 2])).is_err());
        assert!(parse_request(serde_json::json!({"id": 1})).is_err());
        assert!(parse_request(serde_json::json!({"jsonrpc": "1.0", "id": 1, "method": "ping"})).is_err());

        let req = parse_request(serde_json::json!({"id": "a", "method": "ping"})).unwrap();
        assert_eq!(req.id, "a");
        assert!(req.params.is_none());
    }

    #[tokio::test]
    async fn discard_line_stops_after_the_newline() {
        let mut reader: &[u8] = b"rest of a long line\nnext\n";
        discard_line(&mut reader).await.unwrap();
        assert_eq!(reader, b"next\n");

        let mut reader: &[u8] = b"no terminator";
        discard_line(&mut reader).await.unwrap();
        assert!(reader.is_empty());
    }
}
