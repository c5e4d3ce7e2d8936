//! Named tools invocable through `tools/call`.
//!
//! Each tool publishes a descriptor (name, description, JSON Schema for its
//! arguments) and an async `call`. The registry is built once at startup and
//! maps names to tools in a fixed order; `tools/list` reports that order.

pub mod cache;
pub mod results;
pub mod session;
pub mod standings;
pub mod statistics;
pub mod timing;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ServerConfig;
use crate::error::{ToolError, UpstreamError};
use crate::upstream::{CacheSettings, ErgastClient, HttpFetcher, OpenF1Client, ResponseCache};

/// Published description of a tool. The schema is descriptive; it is only
/// enforced when argument validation is switched on.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError>;
}

/// Upstream clients and cache state shared by every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub ergast: ErgastClient,
    pub openf1: OpenF1Client,
    pub cache: Arc<ResponseCache>,
}

impl ToolContext {
    pub fn from_config(config: &ServerConfig) -> Result<Self, UpstreamError> {
        let cache = Arc::new(ResponseCache::new(
            CacheSettings {
                enabled: config.cache_enabled,
                dir: config.cache_dir.clone(),
            },
            config.cache_ttl,
        ));
        let http = Arc::new(HttpFetcher::new(config, Arc::clone(&cache))?);

        Ok(Self {
            ergast: ErgastClient::new(Arc::clone(&http), config.ergast_base_url.clone()),
            openf1: OpenF1Client::new(http, config.openf1_base_url.clone()),
            cache,
        })
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    tool: Box<dyn Tool>,
}

/// Fixed name → tool mapping.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The full tool catalogue.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(results::GetDrivers);
        registry.register(results::GetDriverResults);
        registry.register(results::CalculateAveragePosition);
        registry.register(session::GetEventSchedule);
        registry.register(session::GetSession);
        registry.register(session::GetSessionResults);
        registry.register(timing::GetLapTimes);
        registry.register(timing::GetTelemetry);
        registry.register(session::GetWeatherData);
        registry.register(session::GetTrackStatus);
        registry.register(session::GetDriverInfo);
        registry.register(session::GetTeamInfo);
        registry.register(standings::GetDriverStandings);
        registry.register(standings::GetConstructorStandings);
        registry.register(results::GetHistoricalResults);
        registry.register(results::GetLapRecords);
        registry.register(statistics::CalculateDriverStatistics);
        registry.register(statistics::CompareDrivers);
        registry.register(cache::ConfigureCache);
        registry.register(cache::GetCacheInfo);
        registry
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one in place.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let descriptor = tool.descriptor();
        let entry = RegisteredTool {
            descriptor,
            tool: Box::new(tool),
        };
        match self.index.get(entry.descriptor.name) {
            Some(&i) => self.tools[i] = entry,
            None => {
                self.index.insert(entry.descriptor.name, self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i].descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].tool.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_default_tools()
    }
}

/// Tool arguments. `null` values are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn from_value(value: Option<Value>) -> Result<Self, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(map)) => Ok(Self(map)),
            Some(other) => Err(ToolError::InvalidArguments(format!(
                "arguments must be an object, got {other}"
            ))),
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn opt_i64(&self, key: &str) -> Result<Option<i64>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| invalid_type(key, "an integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid_type(key, "an integer")),
            Some(_) => Err(invalid_type(key, "an integer")),
        }
    }

    pub fn require_i64(&self, key: &str) -> Result<i64, ToolError> {
        self.opt_i64(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_u32(&self, key: &str) -> Result<Option<u32>, ToolError> {
        match self.opt_i64(key)? {
            None => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| invalid_type(key, "a non-negative integer")),
        }
    }

    /// String argument; numbers are accepted and rendered as text.
    pub fn opt_str(&self, key: &str) -> Result<Option<String>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(invalid_type(key, "a string")),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<String, ToolError> {
        self.opt_str(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(invalid_type(key, "a boolean")),
        }
    }
}

impl From<Value> for Arguments {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

fn missing(key: &str) -> ToolError {
    ToolError::InvalidArguments(format!("missing required argument `{key}`"))
}

fn invalid_type(key: &str, expected: &str) -> ToolError {
    ToolError::InvalidArguments(format!("argument `{key}` must be {expected}"))
}

/// Validate an identifier that is interpolated into an upstream URL path.
pub(crate) fn path_segment(key: &str, value: &str) -> Result<String, ToolError> {
    let trimmed = value.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(ToolError::InvalidArguments(format!(
            "argument `{key}` is not a valid identifier: {value:?}"
        )))
    }
}

/// Current calendar year, used where a season defaults to "now".
pub(crate) fn current_year() -> i64 {
    use chrono::Datelike;
    i64::from(chrono::Utc::now().year())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn arguments_coerce_numeric_strings() {
        let args = Arguments::from(json!({"year": "2024", "gp": 5, "driver": null, "lap": 12}));
        assert_eq!(args.require_i64("year").unwrap(), 2024);
        assert_eq!(args.require_str("gp").unwrap(), "5");
        assert_eq!(args.opt_str("driver").unwrap(), None);
        assert_eq!(args.opt_u32("lap").unwrap(), Some(12));
    }

    #[test]
    fn missing_and_mistyped_arguments_fail() {
        let args = Arguments::from(json!({"year": true, "lap": -1}));
        let err = args.require_str("driver").unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: missing required argument `driver`");
        assert!(args.require_i64("year").is_err());
        assert!(args.opt_u32("lap").is_err());
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        assert!(Arguments::from_value(Some(json!([1, 2]))).is_err());
        assert!(Arguments::from_value(None).is_ok());
        assert!(Arguments::from_value(Some(Value::Null)).is_ok());
    }

    #[test]
    fn path_segments_reject_traversal() {
        assert_eq!(path_segment("driver_id", " max_verstappen ").unwrap(), "max_verstappen");
        assert!(path_segment("driver_id", "../2024").is_err());
        assert!(path_segment("circuit", "monza?x=1").is_err());
        assert!(path_segment("circuit", "").is_err());
    }

    #[test]
    fn default_registry_has_unique_ordered_names() {
        let registry = ToolRegistry::with_default_tools();
        let names: Vec<&str> = registry.descriptors().map(|d| d.name).collect();
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], "get_drivers");
        assert_eq!(names[19], "get_cache_info");
        assert!(registry.get("compare_drivers").is_some());
        assert!(registry.get("unknown_tool").is_none());
    }
}
