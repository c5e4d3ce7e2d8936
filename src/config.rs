use std::path::PathBuf;
use std::time::Duration;

/// Jolpica mirror of the Ergast API.
pub const DEFAULT_ERGAST_BASE_URL: &str = "http://api.jolpi.ca/ergast/f1";

/// OpenF1 REST API (sessions, laps, car data, weather, race control).
pub const DEFAULT_OPENF1_BASE_URL: &str = "https://api.openf1.org/v1";

/// Default timeout for a single upstream HTTP call (10 seconds).
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

const DEFAULT_HTTP_MAX_RETRIES: u32 = 3;

const DEFAULT_HTTP_BACKOFF_MS: u64 = 500;

const DEFAULT_CACHE_DIR: &str = "./f1_cache";

/// Cache entries older than this are fetched again (1 hour).
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ergast_base_url: String,
    pub openf1_base_url: String,
    pub http_timeout: Duration,
    pub http_max_retries: u32,
    /// Backoff factor; retry `n` sleeps `http_backoff * 2^(n-1)`.
    pub http_backoff: Duration,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    /// Maximum age of a cache entry; `None` keeps entries until cleared.
    pub cache_ttl: Option<Duration>,
    /// Validate `tools/call` arguments against the published input schema
    /// before invoking the tool.
    pub validate_arguments: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ergast_base_url: DEFAULT_ERGAST_BASE_URL.to_string(),
            openf1_base_url: DEFAULT_OPENF1_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            http_max_retries: DEFAULT_HTTP_MAX_RETRIES,
            http_backoff: Duration::from_millis(DEFAULT_HTTP_BACKOFF_MS),
            cache_enabled: true,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_ttl: Some(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
            validate_arguments: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `F1_ERGAST_BASE_URL` (optional): Ergast-compatible API root
    /// - `F1_OPENF1_BASE_URL` (optional): OpenF1 API root
    /// - `F1_HTTP_TIMEOUT_SECS` (optional, default 10): per-request timeout
    /// - `F1_HTTP_MAX_RETRIES` (optional, default 3): retries for transient failures
    /// - `F1_HTTP_BACKOFF_MS` (optional, default 500): retry backoff factor
    /// - `F1_CACHE_ENABLED` (optional, default true): response disk cache
    /// - `F1_CACHE_DIR` (optional, default `./f1_cache`): cache directory
    /// - `F1_CACHE_TTL_SECS` (optional, default 3600): entry max age, `0` never expires
    /// - `F1_VALIDATE_ARGUMENTS` (optional, default false): schema-check tool arguments
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ergast_base_url = lookup("F1_ERGAST_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.ergast_base_url);

        let openf1_base_url = lookup("F1_OPENF1_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.openf1_base_url);

        let http_timeout = match lookup("F1_HTTP_TIMEOUT_SECS") {
            Some(val) => Duration::from_secs(parse_positive(&val, "F1_HTTP_TIMEOUT_SECS")?),
            None => defaults.http_timeout,
        };

        let http_max_retries = match lookup("F1_HTTP_MAX_RETRIES") {
            Some(val) => val
                .parse::<u32>()
                .map_err(|_| "F1_HTTP_MAX_RETRIES must be a non-negative integer".to_string())?,
            None => defaults.http_max_retries,
        };

        let http_backoff = match lookup("F1_HTTP_BACKOFF_MS") {
            Some(val) => Duration::from_millis(
                val.parse::<u64>()
                    .map_err(|_| "F1_HTTP_BACKOFF_MS must be a non-negative integer".to_string())?,
            ),
            None => defaults.http_backoff,
        };

        let cache_enabled = match lookup("F1_CACHE_ENABLED") {
            Some(val) => parse_bool(&val, "F1_CACHE_ENABLED")?,
            None => defaults.cache_enabled,
        };

        let cache_dir = lookup("F1_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let cache_ttl = match lookup("F1_CACHE_TTL_SECS") {
            Some(val) => match val.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => return Err("F1_CACHE_TTL_SECS must be a non-negative integer".to_string()),
            },
            None => defaults.cache_ttl,
        };

        let validate_arguments = match lookup("F1_VALIDATE_ARGUMENTS") {
            Some(val) => parse_bool(&val, "F1_VALIDATE_ARGUMENTS")?,
            None => defaults.validate_arguments,
        };

        Ok(Self {
            ergast_base_url,
            openf1_base_url,
            http_timeout,
            http_max_retries,
            http_backoff,
            cache_enabled,
            cache_dir,
            cache_ttl,
            validate_arguments,
        })
    }
}

fn parse_positive(val: &str, name: &str) -> Result<u64, String> {
    match val.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{name} must be a positive integer")),
    }
}

fn parse_bool(val: &str, name: &str) -> Result<bool, String> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{name} must be a boolean (true/false)")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.ergast_base_url, DEFAULT_ERGAST_BASE_URL);
        assert_eq!(config.openf1_base_url, DEFAULT_OPENF1_BASE_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.http_max_retries, 3);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(3600)));
        assert!(!config.validate_arguments);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("F1_ERGAST_BASE_URL", "http://localhost:9000/ergast/"),
            ("F1_HTTP_TIMEOUT_SECS", "3"),
            ("F1_HTTP_MAX_RETRIES", "0"),
            ("F1_CACHE_ENABLED", "off"),
            ("F1_CACHE_DIR", "/tmp/f1"),
            ("F1_CACHE_TTL_SECS", "60"),
            ("F1_VALIDATE_ARGUMENTS", "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.ergast_base_url, "http://localhost:9000/ergast");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.http_max_retries, 0);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/f1"));
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(60)));
        assert!(config.validate_arguments);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("F1_HTTP_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("F1_HTTP_TIMEOUT_SECS", "ten")]).is_err());
        assert!(load(&[("F1_CACHE_ENABLED", "maybe")]).is_err());
        assert!(load(&[("F1_HTTP_MAX_RETRIES", "-1")]).is_err());
        assert!(load(&[("F1_CACHE_TTL_SECS", "1h")]).is_err());
    }

    #[test]
    fn zero_ttl_keeps_entries_forever() {
        assert_eq!(load(&[("F1_CACHE_TTL_SECS", "0")]).unwrap().cache_ttl, None);
    }
}
