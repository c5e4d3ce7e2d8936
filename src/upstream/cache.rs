use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Current cache configuration. Last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: PathBuf,
}

/// Disk usage of the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    pub entries: u64,
    pub bytes: u64,
}

/// Upstream response cache: one JSON file per URL, named by the URL's
/// SHA-256 digest. Entries older than `max_age` (by mtime) are misses.
#[derive(Debug)]
pub struct ResponseCache {
    settings: RwLock<CacheSettings>,
    max_age: Option<Duration>,
}

impl ResponseCache {
    pub fn new(settings: CacheSettings, max_age: Option<Duration>) -> Self {
        Self {
            settings: RwLock::new(settings),
            max_age,
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings.read().clone()
    }

    /// Update the cache configuration; `None` keeps the current value.
    pub fn configure(&self, enabled: Option<bool>, dir: Option<PathBuf>) -> CacheSettings {
        let mut settings = self.settings.write();
        if let Some(enabled) = enabled {
            settings.enabled = enabled;
        }
        if let Some(dir) = dir {
            settings.dir = dir;
        }
        settings.clone()
    }

    /// Look up a cached body. Expired, unreadable or corrupt entries count
    /// as misses.
    pub async fn get(&self, url: &str) -> Option<Value> {
        let settings = self.settings();
        if !settings.enabled {
            return None;
        }

        let path = entry_path(&settings.dir, url);
        if let Some(max_age) = self.max_age {
            let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == ErrorKind::NotFound => return None,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot stat cache entry");
                    return None;
                }
            };
            if is_expired(modified, max_age) {
                tracing::debug!(path = %path.display(), "cache entry expired");
                return None;
            }
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read cache entry");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding corrupt cache entry");
                None
            }
        }
    }

    /// Store a body. A no-op while the cache is disabled.
    pub async fn put(&self, url: &str, body: &Value) -> std::io::Result<()> {
        let settings = self.settings();
        if !settings.enabled {
            return Ok(());
        }

        tokio::fs::create_dir_all(&settings.dir).await?;
        let path = entry_path(&settings.dir, url);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(body)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Remove every cache entry in the current directory. Returns the number
    /// of entries removed; a missing directory is an empty cache.
    pub async fn clear(&self) -> std::io::Result<u64> {
        let dir = self.settings().dir;
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_cache_entry(&path) {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    pub async fn usage(&self) -> std::io::Result<CacheUsage> {
        let dir = self.settings().dir;
        let mut usage = CacheUsage::default();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(usage),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_file() && is_cache_entry(&path) {
                usage.entries += 1;
                usage.bytes += metadata.len();
            }
        }

        Ok(usage)
    }
}

fn entry_path(dir: &Path, url: &str) -> PathBuf {
    let digest = Sha256::digest(url.as_bytes());
    dir.join(format!("{digest:x}.json"))
}

/// Entries stamped in the future count as fresh.
fn is_expired(modified: SystemTime, max_age: Duration) -> bool {
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age > max_age)
}

fn is_cache_entry(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match name.strip_suffix(".json") {
        Some(stem) => stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}
