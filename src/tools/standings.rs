use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{Arguments, Tool, ToolContext, ToolDescriptor};
use crate::error::ToolError;
use crate::upstream::ergast::{value_as_f64, value_as_u64};

fn standings_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "year": {
                "type": "integer",
                "description": "Season year"
            },
            "round": {
                "type": "integer",
                "description": "Standings after this round (optional, defaults to latest)"
            }
        },
        "required": ["year"]
    })
}

/// One row of the drivers' championship table.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DriverStanding {
    position: Option<u64>,
    position_text: Option<String>,
    points: Option<f64>,
    wins: Option<u64>,
    driver_id: Option<String>,
    driver_number: Option<String>,
    driver_code: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    driver_nationality: Option<String>,
    constructor_ids: Vec<String>,
    constructor_names: Vec<String>,
}

/// One row of the constructors' championship table.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstructorStanding {
    position: Option<u64>,
    position_text: Option<String>,
    points: Option<f64>,
    wins: Option<u64>,
    constructor_id: Option<String>,
    constructor_name: Option<String>,
    constructor_nationality: Option<String>,
}

fn text(v: &Value, path: &str) -> Option<String> {
    v.pointer(path).and_then(Value::as_str).map(str::to_string)
}

fn driver_standing(row: &Value) -> DriverStanding {
    let constructors = row
        .get("Constructors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    DriverStanding {
        position: row.get("position").and_then(value_as_u64),
        position_text: text(row, "/positionText"),
        points: row.get("points").and_then(value_as_f64),
        wins: row.get("wins").and_then(value_as_u64),
        driver_id: text(row, "/Driver/driverId"),
        driver_number: text(row, "/Driver/permanentNumber"),
        driver_code: text(row, "/Driver/code"),
        given_name: text(row, "/Driver/givenName"),
        family_name: text(row, "/Driver/familyName"),
        driver_nationality: text(row, "/Driver/nationality"),
        constructor_ids: constructors.iter().filter_map(|c| text(c, "/constructorId")).collect(),
        constructor_names: constructors.iter().filter_map(|c| text(c, "/name")).collect(),
    }
}

fn constructor_standing(row: &Value) -> ConstructorStanding {
    ConstructorStanding {
        position: row.get("position").and_then(value_as_u64),
        position_text: text(row, "/positionText"),
        points: row.get("points").and_then(value_as_f64),
        wins: row.get("wins").and_then(value_as_u64),
        constructor_id: text(row, "/Constructor/constructorId"),
        constructor_name: text(row, "/Constructor/name"),
        constructor_nationality: text(row, "/Constructor/nationality"),
    }
}

/// Rows of the first standings list, or a not-found error when the season
/// (or round) has no table yet.
fn first_table<'a>(lists: &'a [Value], key: &str, year: i64) -> Result<&'a [Value], ToolError> {
    lists
        .first()
        .and_then(|list| list.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| ToolError::not_found(format!("No standings available for {year}")))
}

pub struct GetDriverStandings;

#[async_trait]
impl Tool for GetDriverStandings {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_driver_standings",
            description: "Drivers' championship standings",
            input_schema: standings_schema(),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let round = args.opt_u32("round")?;

        let lists = ctx.ergast.driver_standings(year, round).await?;
        let rows = first_table(&lists, "DriverStandings", year)?;
        let standings: Vec<DriverStanding> = rows.iter().map(driver_standing).collect();

        Ok(json!({
            "year": year,
            "round": round,
            "standings": standings,
        }))
    }
}

pub struct GetConstructorStandings;

#[async_trait]
impl Tool for GetConstructorStandings {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_constructor_standings",
            description: "Constructors' championship standings",
            input_schema: standings_schema(),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let round = args.opt_u32("round")?;

        let lists = ctx.ergast.constructor_standings(year, round).await?;
        let rows = first_table(&lists, "ConstructorStandings", year)?;
        let standings: Vec<ConstructorStanding> = rows.iter().map(constructor_standing).collect();

        Ok(json!({
            "year": year,
            "round": round,
            "standings": standings,
        }))
    }
}
