use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Arguments, Tool, ToolContext, ToolDescriptor};
use crate::error::ToolError;

pub struct ConfigureCache;

#[async_trait]
impl Tool for ConfigureCache {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "configure_cache",
            description: "Enable, disable, relocate or clear the upstream response cache",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "enabled": {
                        "type": "boolean",
                        "description": "Serve and store upstream responses from disk"
                    },
                    "cache_dir": {
                        "type": "string",
                        "description": "Cache directory"
                    },
                    "clear_cache": {
                        "type": "boolean",
                        "description": "Remove every entry of the current cache directory first",
                        "default": false
                    }
                }
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let enabled = args.opt_bool("enabled")?;
        let cache_dir = args.opt_str("cache_dir")?.map(PathBuf::from);
        let clear_cache = args.opt_bool("clear_cache")?.unwrap_or(false);

        if cache_dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
            return Err(ToolError::InvalidArguments("`cache_dir` must not be empty".into()));
        }

        let cache_cleared = if clear_cache {
            let removed = ctx.cache.clear().await?;
            tracing::info!(removed, "cache cleared");
            true
        } else {
            false
        };

        let settings = ctx.cache.configure(enabled, cache_dir);
        tracing::info!(enabled = settings.enabled, dir = %settings.dir.display(), "cache configured");

        Ok(json!({
            "cache_enabled": settings.enabled,
            "cache_dir": settings.dir.display().to_string(),
            "cache_cleared": cache_cleared,
        }))
    }
}

pub struct GetCacheInfo;

#[async_trait]
impl Tool for GetCacheInfo {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_cache_info",
            description: "Current cache settings and on-disk size",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, _args: Arguments) -> Result<Value, ToolError> {
        let settings = ctx.cache.settings();
        let usage = ctx.cache.usage().await?;

        Ok(json!({
            "cache_enabled": settings.enabled,
            "cache_dir": settings.dir.display().to_string(),
            "cache_size": usage.bytes,
            "entries": usage.entries,
        }))
    }
}
