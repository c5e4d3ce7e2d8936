use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::{ResourceContents, ResourceReadParams};
use crate::tools::{current_year, Arguments, ToolContext, ToolRegistry};

enum Season {
    Fixed(i64),
    Current,
}

impl Season {
    fn year(&self) -> i64 {
        match self {
            Season::Fixed(year) => *year,
            Season::Current => current_year(),
        }
    }
}

/// A static resource, read by running a tool for a season.
struct Resource {
    uri: &'static str,
    name: &'static str,
    description: &'static str,
    tool: &'static str,
    season: Season,
}

static RESOURCES: [Resource; 4] = [
    Resource {
        uri: "f1://drivers/2025",
        name: "2025 F1 Drivers",
        description: "Drivers entered in the 2025 season",
        tool: "get_drivers",
        season: Season::Fixed(2025),
    },
    Resource {
        uri: "f1://schedule/current",
        name: "Current Season Schedule",
        description: "Event calendar of the current season",
        tool: "get_event_schedule",
        season: Season::Current,
    },
    Resource {
        uri: "f1://standings/drivers",
        name: "Drivers' Championship",
        description: "Current drivers' championship standings",
        tool: "get_driver_standings",
        season: Season::Current,
    },
    Resource {
        uri: "f1://standings/constructors",
        name: "Constructors' Championship",
        description: "Current constructors' championship standings",
        tool: "get_constructor_standings",
        season: Season::Current,
    },
];

const MIME_TYPE: &str = "application/json";

/// `resources/list`.
pub fn list() -> Value {
    let resources: Vec<Value> = RESOURCES
        .iter()
        .map(|r| {
            json!({
                "uri": r.uri,
                "name": r.name,
                "description": r.description,
                "mimeType": MIME_TYPE,
            })
        })
        .collect();
    json!({ "resources": resources })
}

/// `resources/read`.
pub async fn read(registry: &ToolRegistry, ctx: &ToolContext, params: Value) -> Result<Value, DispatchError> {
    let params: ResourceReadParams = serde_json::from_value(params)
        .map_err(|e| DispatchError::InvalidParams(format!("Invalid resources/read params: {e}")))?;
    let uri = params
        .uri
        .ok_or_else(|| DispatchError::InvalidParams("Missing resource uri".into()))?;

    let resource = RESOURCES
        .iter()
        .find(|r| r.uri == uri)
        .ok_or_else(|| DispatchError::UnknownResource(uri.clone()))?;
    let tool = registry
        .get(resource.tool)
        .ok_or_else(|| DispatchError::Internal(format!("resource {uri} has no tool {}", resource.tool)))?;

    let args = Arguments::from(json!({ "year": resource.season.year() }));
    let output = tool.call(ctx, args).await.map_err(DispatchError::Resource)?;

    let text = serde_json::to_string_pretty(&output)
        .map_err(|e| DispatchError::Internal(e.to_string()))?;
    serde_json::to_value(ResourceContents::json(uri, text))
        .map_err(|e| DispatchError::Internal(e.to_string()))
}
