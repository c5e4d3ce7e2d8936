//! In-process HTTP stub standing in for the Ergast and OpenF1 APIs.
//!
//! Routes are keyed by request target: an exact `path?query` match wins,
//! otherwise the path alone is tried. A route given several replies serves
//! them in order and then keeps repeating the last one. Unknown targets get
//! a 404.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use f1_mcp_server::config::ServerConfig;
use f1_mcp_server::handlers::Dispatcher;
use f1_mcp_server::protocol::{JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    body: String,
}

#[derive(Default)]
pub struct Stub {
    routes: HashMap<String, VecDeque<Reply>>,
}

impl Stub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 reply with a JSON body.
    pub fn json(self, target: &str, body: Value) -> Self {
        self.reply(target, 200, body.to_string())
    }

    /// Queue an error status with an empty JSON object body.
    pub fn status(self, target: &str, status: u16) -> Self {
        self.reply(target, status, "{}".into())
    }

    pub fn reply(mut self, target: &str, status: u16, body: String) -> Self {
        self.routes
            .entry(target.to_string())
            .or_default()
            .push_back(Reply { status, body });
        self
    }

    pub async fn start(self) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State {
            routes: Mutex::new(self.routes),
            hits: Mutex::new(HashMap::new()),
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = serve_connection(socket, state).await;
                });
            }
        });

        StubServer {
            base: format!("http://{addr}"),
            state,
        }
    }
}

struct State {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl State {
    fn next_reply(&self, target: &str) -> Reply {
        let path = target.split('?').next().unwrap_or(target);
        *self.hits.lock().entry(path.to_string()).or_default() += 1;

        let mut routes = self.routes.lock();
        let key = if routes.contains_key(target) { target } else { path };
        let queue = routes.get_mut(key);
        match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Reply {
                status: 404,
                body: json!({"detail": "Not Found"}).to_string(),
            },
        }
    }
}

async fn serve_connection(mut socket: TcpStream, state: Arc<State>) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&head);
    let target = text.split_whitespace().nth(1).unwrap_or("/").to_string();
    let reply = state.next_reply(&target);

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        if reply.status == 200 { "OK" } else { "Stub" },
        reply.body.len(),
        reply.body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

pub struct StubServer {
    base: String,
    state: Arc<State>,
}

impl StubServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Requests received for `path`, whatever their query.
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }
}

/// Config pointing both upstreams at the stub, with the cache off and
/// retries that do not sleep.
pub fn stub_config(stub: &StubServer, cache_dir: &Path) -> ServerConfig {
    ServerConfig {
        ergast_base_url: stub.url("/ergast"),
        openf1_base_url: stub.url("/openf1"),
        http_timeout: Duration::from_secs(5),
        http_max_retries: 2,
        http_backoff: Duration::ZERO,
        cache_enabled: false,
        cache_dir: cache_dir.to_path_buf(),
        cache_ttl: None,
        validate_arguments: false,
    }
}

pub fn dispatcher(config: &ServerConfig) -> Dispatcher {
    Dispatcher::new(config).unwrap()
}

pub async fn call_tool(dispatcher: &Dispatcher, name: &str, arguments: Value) -> JsonRpcResponse {
    let req = JsonRpcRequest::new(
        json!(1),
        "tools/call",
        Some(json!({ "name": name, "arguments": arguments })),
    );
    dispatcher.dispatch(&req).await
}

/// The JSON document carried in a successful tool result's text block.
pub fn tool_output(resp: &JsonRpcResponse) -> Value {
    assert!(resp.error.is_none(), "unexpected error: {:?}", resp.error);
    let text = resp.result.as_ref().unwrap()["content"][0]["text"]
        .as_str()
        .unwrap();
    serde_json::from_str(text).unwrap()
}

/// Ergast `MRData` envelope around one table.
pub fn mrdata(total: usize, offset: usize, table: &str, list: &str, items: Value) -> Value {
    let mut mrdata = json!({
        "limit": "100",
        "offset": offset.to_string(),
        "total": total.to_string(),
    });
    mrdata[table] = json!({ list: items });
    json!({ "MRData": mrdata })
}

/// One 2024 season of OpenF1 fixtures: a pre-season test and two race
/// weekends, each with a race session.
pub fn openf1_season(stub: Stub) -> Stub {
    stub.json(
        "/openf1/meetings?year=2024",
        json!([
            {"meeting_key": 1229, "meeting_name": "Bahrain Grand Prix", "country_name": "Bahrain",
             "location": "Sakhir", "circuit_short_name": "Sakhir", "date_start": "2024-02-29T11:30:00+00:00"},
            {"meeting_key": 1228, "meeting_name": "Pre-Season Testing", "country_name": "Bahrain",
             "location": "Sakhir", "circuit_short_name": "Sakhir", "date_start": "2024-02-21T07:00:00+00:00"},
            {"meeting_key": 1230, "meeting_name": "Saudi Arabian Grand Prix", "country_name": "Saudi Arabia",
             "location": "Jeddah", "circuit_short_name": "Jeddah", "date_start": "2024-03-07T13:30:00+00:00"}
        ]),
    )
    .json(
        "/openf1/sessions?meeting_key=1229",
        json!([
            {"session_key": 9468, "meeting_key": 1229, "session_name": "Qualifying", "session_type": "Qualifying",
             "date_start": "2024-03-01T16:00:00+00:00"},
            {"session_key": 9472, "meeting_key": 1229, "session_name": "Race", "session_type": "Race",
             "date_start": "2024-03-02T15:00:00+00:00"}
        ]),
    )
    .json(
        "/openf1/sessions?meeting_key=1230",
        json!([
            {"session_key": 9480, "meeting_key": 1230, "session_name": "Race", "session_type": "Race",
             "date_start": "2024-03-09T17:00:00+00:00"}
        ]),
    )
    .json("/openf1/drivers?session_key=9472", drivers_fixture())
    .json("/openf1/drivers?session_key=9480", drivers_fixture())
}

pub fn drivers_fixture() -> Value {
    json!([
        {"driver_number": 1, "name_acronym": "VER", "full_name": "Max VERSTAPPEN", "last_name": "Verstappen",
         "team_name": "Red Bull Racing"},
        {"driver_number": 16, "name_acronym": "LEC", "full_name": "Charles LECLERC", "last_name": "Leclerc",
         "team_name": "Ferrari"},
        {"driver_number": 55, "name_acronym": "SAI", "full_name": "Carlos SAINZ", "last_name": "Sainz",
         "team_name": "Ferrari"}
    ])
}

pub fn lap(driver: u32, number: u32, start: &str, duration: Option<f64>, pit_out: bool) -> Value {
    json!({
        "driver_number": driver,
        "lap_number": number,
        "date_start": start,
        "lap_duration": duration,
        "is_pit_out_lap": pit_out,
    })
}
