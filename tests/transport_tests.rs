//! End-to-end tests of the stdio transport: one JSON line in, one JSON line
//! out, in order, with the id echoed.
//!
//! None of these requests reach an upstream API.

use serde_json::{json, Value};

use f1_mcp_server::config::ServerConfig;
use f1_mcp_server::server::{McpServer, MAX_MESSAGE_BYTES};

fn test_server(cache_dir: &std::path::Path) -> McpServer {
    let config = ServerConfig {
        cache_dir: cache_dir.to_path_buf(),
        ..ServerConfig::default()
    };
    McpServer::new(config).unwrap()
}

/// Feed `input` through `serve` and return every output line, parsed.
async fn run(input: &str) -> Vec<Value> {
    let tmp = tempfile::tempdir().unwrap();
    let server = test_server(tmp.path());
    let mut output: Vec<u8> = Vec::new();

    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.is_empty() || text.ends_with('\n'), "every response ends with a newline");
    text.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
}

async fn run_one(line: &str) -> Value {
    let mut responses = run(&format!("{line}\n")).await;
    assert_eq!(responses.len(), 1, "expected exactly one response to {line}");
    responses.remove(0)
}

// ---------------------------------------------------------------------------
// Protocol scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_reports_server_info() {
    let resp = run_one(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;

    assert_eq!(
        resp,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}, "resources": {}},
                "serverInfo": {"name": "f1-mcp-server", "version": env!("CARGO_PKG_VERSION")}
            }
        })
    );
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let resp = run_one(r#"{"jsonrpc":"2.0","id":2,"method":"bogus"}"#).await;

    assert_eq!(
        resp,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32601, "message": "Method not found: bogus"}
        })
    );
}

#[tokio::test]
async fn malformed_json_is_parse_error_with_null_id() {
    let resp = run_one("not-json").await;

    assert_eq!(resp["jsonrpc"], "2.0");
    assert!(resp["id"].is_null());
    assert!(resp.get("result").is_none());
    assert_eq!(resp["error"]["code"], -32700);
    assert!(resp["error"]["message"].as_str().unwrap().contains("Parse error"));
}

#[tokio::test]
async fn unknown_tool_is_invalid_params() {
    let resp = run_one(
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"unknown_tool","arguments":{}}}"#,
    )
    .await;

    assert_eq!(
        resp,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32602, "message": "Unknown tool: unknown_tool"}
        })
    );
}

#[tokio::test]
async fn ping_returns_empty_object() {
    let resp = run_one(r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#).await;
    assert_eq!(resp["result"], json!({}));
    assert_eq!(resp["id"], "p");
}

#[tokio::test]
async fn notifications_still_get_one_response() {
    let resp = run_one(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
    assert!(resp["id"].is_null());
    assert_eq!(resp["error"]["code"], -32601);
}

// ---------------------------------------------------------------------------
// Framing and ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_follow_request_order_and_skip_blank_lines() {
    let input = concat!(
        "\n",
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, "\n",
        "   \n",
        r#"{"jsonrpc":"2.0","id":2,"method":"bogus"}"#, "\n",
        "{oops\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#, "\n",
        "\t\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#,
    );

    let responses = run(input).await;
    let ids: Vec<Value> = responses.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2), Value::Null, json!(3), json!(4)]);

    for resp in &responses {
        assert_eq!(resp["jsonrpc"], "2.0");
        assert!(
            resp.get("result").is_some() != resp.get("error").is_some(),
            "exactly one of result/error: {resp}"
        );
    }
}

#[tokio::test]
async fn ids_are_echoed_verbatim() {
    for id in [json!(7), json!("abc"), json!(null), json!({"k": [1, 2]}), json!(1.5)] {
        let line = json!({"jsonrpc": "2.0", "id": id.clone(), "method": "ping"}).to_string();
        let resp = run_one(&line).await;
        assert_eq!(resp["id"], id);

        let line = json!({"jsonrpc": "2.0", "id": id.clone(), "method": "nope"}).to_string();
        let resp = run_one(&line).await;
        assert_eq!(resp["id"], id);
    }

    let resp = run_one(r#"{"jsonrpc":"2.0","method":"ping"}"#).await;
    assert!(resp["id"].is_null());
}

#[tokio::test]
async fn non_request_json_is_invalid_request() {
    let resp = run_one("[1,2,3]").await;
    assert_eq!(resp["error"]["code"], -32600);
    assert!(resp["id"].is_null());

    let resp = run_one(r#"{"jsonrpc":"2.0","id":9}"#).await;
    assert_eq!(resp["error"]["code"], -32600);
    assert_eq!(resp["id"], 9);

    let resp = run_one(r#"{"jsonrpc":"1.0","id":10,"method":"ping"}"#).await;
    assert_eq!(resp["error"]["code"], -32600);
    assert_eq!(resp["id"], 10);
}

#[tokio::test]
async fn oversized_and_non_utf8_lines_are_parse_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let server = test_server(tmp.path());

    let big = vec![b' '; MAX_MESSAGE_BYTES + 1];
    let resp = server.handle_bytes(&big).await.unwrap();
    assert_eq!(resp.error.as_ref().unwrap().code, -32700);
    assert!(resp.id.is_null());

    let resp = server.handle_bytes(b"{\"id\":1,\xff}\n").await.unwrap();
    assert_eq!(resp.error.as_ref().unwrap().code, -32700);
    assert!(resp.id.is_null());
}

#[tokio::test]
async fn oversized_line_is_skipped_and_reading_resumes() {
    let mut input = "x".repeat(3 * MAX_MESSAGE_BYTES);
    input.push('\n');
    input.push_str(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
    input.push('\n');
    input.push_str(&"y".repeat(MAX_MESSAGE_BYTES + 1));

    let responses = run(&input).await;
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert!(responses[0]["id"].is_null());
    assert_eq!(responses[1], json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
    assert_eq!(responses[2]["error"]["code"], -32700);
}

#[tokio::test]
async fn session_survives_bad_requests() {
    let input = concat!(
        "garbage\n",
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"nope"}}"#, "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{}}"#, "\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"f1://nowhere"}}"#, "\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"initialize"}"#, "\n",
    );

    let responses = run(input).await;
    assert_eq!(responses.len(), 5);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["error"]["message"], "Unknown tool: nope");
    assert_eq!(responses[2]["error"]["code"], -32602);
    assert_eq!(responses[3]["error"]["code"], -32602);
    assert_eq!(responses[3]["error"]["message"], "Unknown resource: f1://nowhere");
    assert_eq!(responses[4]["result"]["serverInfo"]["name"], "f1-mcp-server");
}
