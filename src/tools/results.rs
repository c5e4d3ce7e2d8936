use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{path_segment, Arguments, Tool, ToolContext, ToolDescriptor};
use crate::error::ToolError;
use crate::upstream::ergast::{round_of, value_as_u64};
use crate::upstream::openf1::GrandPrix;

/// Finishing position recorded for a classified result without a numeric
/// position (retirements, disqualifications).
const UNCLASSIFIED_POSITION: u32 = 25;

const DEFAULT_DRIVERS_YEAR: i64 = 2025;

pub struct GetDrivers;

#[async_trait]
impl Tool for GetDrivers {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_drivers",
            description: "List the Formula 1 drivers entered in a season",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Season year",
                        "default": DEFAULT_DRIVERS_YEAR
                    }
                }
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.opt_i64("year")?.unwrap_or(DEFAULT_DRIVERS_YEAR);
        let drivers = ctx.ergast.drivers(year).await?;
        Ok(Value::Array(drivers))
    }
}

pub struct GetDriverResults;

#[async_trait]
impl Tool for GetDriverResults {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_driver_results",
            description: "Race results of a driver in a season, ordered by round",
            input_schema: driver_year_schema(),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let driver_id = path_segment("driver_id", &args.require_str("driver_id")?)?;
        let year = args.require_i64("year")?;
        let races = ctx.ergast.driver_results(&driver_id, year).await?;
        Ok(Value::Array(races))
    }
}

pub struct CalculateAveragePosition;

#[async_trait]
impl Tool for CalculateAveragePosition {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "calculate_average_position",
            description: "Average finishing position of a driver over a season",
            input_schema: driver_year_schema(),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let driver_id = path_segment("driver_id", &args.require_str("driver_id")?)?;
        let year = args.require_i64("year")?;
        let races = ctx.ergast.driver_results(&driver_id, year).await?;

        if races.is_empty() {
            return Ok(json!({ "error": "No race data found" }));
        }

        let positions = finishing_positions(&races);
        let average_position = mean_position(&positions);

        Ok(json!({
            "driver_id": driver_id,
            "year": year,
            "average_position": average_position,
            "races_count": races.len(),
            "positions": positions,
        }))
    }
}

fn driver_year_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "driver_id": {
                "type": "string",
                "description": "Ergast driver id, e.g. max_verstappen"
            },
            "year": {
                "type": "integer",
                "description": "Season year"
            }
        },
        "required": ["driver_id", "year"]
    })
}

/// First result of each race that has one; non-numeric positions count as
/// [`UNCLASSIFIED_POSITION`].
fn finishing_positions(races: &[Value]) -> Vec<u32> {
    races
        .iter()
        .filter_map(|race| race.get("Results")?.as_array()?.first())
        .map(|result| {
            result
                .get("position")
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse().ok())
                .unwrap_or(UNCLASSIFIED_POSITION)
        })
        .collect()
}

fn mean_position(positions: &[u32]) -> Option<f64> {
    if positions.is_empty() {
        return None;
    }
    let sum: u64 = positions.iter().map(|&p| u64::from(p)).sum();
    Some(sum as f64 / positions.len() as f64)
}

pub struct GetHistoricalResults;

#[async_trait]
impl Tool for GetHistoricalResults {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_historical_results",
            description: "Race results for a season, or for one Grand Prix of that season",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Season year"
                    },
                    "gp": {
                        "type": ["string", "integer"],
                        "description": "Grand Prix name or round number (optional)"
                    }
                },
                "required": ["year"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let gp = args.opt_str("gp")?;

        let round = match gp.as_deref().map(GrandPrix::parse) {
            None => None,
            Some(GrandPrix::Round(round)) => Some(round),
            Some(GrandPrix::Name(name)) => {
                let races = ctx.ergast.races(year).await?;
                let race = find_race_by_name(&races, &name).ok_or_else(|| {
                    ToolError::not_found(format!("Grand Prix {name} not found in {year}"))
                })?;
                Some(round_of(race))
            }
        };

        let results = ctx.ergast.race_results(year, round).await?;

        Ok(json!({
            "year": year,
            "gp": gp,
            "results": results,
        }))
    }
}

/// Case-insensitive match against race name, circuit name, locality and
/// country.
fn find_race_by_name<'a>(races: &'a [Value], name: &str) -> Option<&'a Value> {
    let needle = name.to_lowercase();
    races.iter().find(|race| {
        let fields = [
            race.get("raceName"),
            race.pointer("/Circuit/circuitName"),
            race.pointer("/Circuit/circuitId"),
            race.pointer("/Circuit/Location/locality"),
            race.pointer("/Circuit/Location/country"),
        ];
        fields
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .any(|field| field.to_lowercase().contains(&needle))
    })
}

pub struct GetLapRecords;

#[derive(Debug, Clone, Serialize)]
struct LapRecord {
    season: Option<String>,
    round: u32,
    race_name: Option<String>,
    driver_id: Option<String>,
    driver: Option<String>,
    constructor: Option<String>,
    lap: Option<u64>,
    time: String,
    seconds: f64,
}

#[async_trait]
impl Tool for GetLapRecords {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_lap_records",
            description: "Fastest race laps ever set at a circuit, quickest first",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "circuit": {
                        "type": "string",
                        "description": "Ergast circuit id, e.g. monza"
                    }
                },
                "required": ["circuit"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let circuit = path_segment("circuit", &args.require_str("circuit")?)?;

        let circuit_info = ctx
            .ergast
            .circuit(&circuit)
            .await?
            .ok_or_else(|| ToolError::not_found(format!("Circuit {circuit} not found")))?;

        let races = ctx.ergast.circuit_fastest_laps(&circuit).await?;
        let mut records: Vec<LapRecord> = races.iter().filter_map(lap_record).collect();
        records.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));

        Ok(json!({
            "circuit": circuit,
            "circuit_info": circuit_info,
            "record": records.first(),
            "records": records,
        }))
    }
}

fn lap_record(race: &Value) -> Option<LapRecord> {
    let result = race.get("Results")?.as_array()?.first()?;
    let fastest = result.get("FastestLap")?;
    let time = fastest.pointer("/Time/time")?.as_str()?.to_string();
    let seconds = parse_lap_time(&time)?;

    let str_at = |v: &Value, path: &str| v.pointer(path).and_then(Value::as_str).map(str::to_string);
    let driver = match (str_at(result, "/Driver/givenName"), str_at(result, "/Driver/familyName")) {
        (Some(given), Some(family)) => Some(format!("{given} {family}")),
        (given, family) => given.or(family),
    };

    Some(LapRecord {
        season: str_at(race, "/season"),
        round: round_of(race),
        race_name: str_at(race, "/raceName"),
        driver_id: str_at(result, "/Driver/driverId"),
        driver,
        constructor: str_at(result, "/Constructor/name"),
        lap: fastest.get("lap").and_then(value_as_u64),
        time,
        seconds,
    })
}

/// Parse `m:ss.fff` or `ss.fff` (or `h:mm:ss.fff`) into seconds.
pub(crate) fn parse_lap_time(text: &str) -> Option<f64> {
    let mut seconds = 0.0;
    for part in text.trim().split(':') {
        let value: f64 = part.parse().ok()?;
        if value.is_nan() || value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}
