use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use serde_json::{json, Value};

use super::session::{find_driver, resolve_driver, session_schema, SessionArgs};
use super::{Arguments, Tool, ToolContext, ToolDescriptor};
use crate::error::ToolError;
use crate::upstream::openf1::{Lap, SessionDriver};

pub struct GetLapTimes;

#[async_trait]
impl Tool for GetLapTimes {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_lap_times",
            description: "Lap times of a session, for every driver or a single one",
            input_schema: session_schema(
                &[(
                    "driver",
                    json!({
                        "type": ["string", "integer"],
                        "description": "Driver acronym, name or number (optional)"
                    }),
                )],
                &[],
            ),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let session_args = SessionArgs::parse(&args)?;
        let driver = args.opt_str("driver")?;
        let loaded = session_args.load(ctx).await?;
        let key = loaded.session.session_key;

        let drivers = ctx.openf1.drivers(key).await?;
        let number = match &driver {
            Some(needle) => Some(
                find_driver(&drivers, needle)
                    .map(|d| d.driver_number)
                    .ok_or_else(|| ToolError::not_found(format!("Driver {needle} not found")))?,
            ),
            None => None,
        };

        let laps = ctx.openf1.laps(key, number).await?;
        let lap_times = annotate_laps(&laps, &drivers)?;

        Ok(json!({
            "session": session_args.session,
            "driver": driver,
            "total_laps": lap_times.len(),
            "lap_times": lap_times,
        }))
    }
}

/// Lap records with the driver's acronym added under `driver`.
fn annotate_laps(laps: &[Lap], drivers: &[SessionDriver]) -> Result<Vec<Value>, ToolError> {
    let acronyms: HashMap<u32, &str> = drivers
        .iter()
        .filter_map(|d| Some((d.driver_number, d.name_acronym.as_deref()?)))
        .collect();

    laps.iter()
        .map(|lap| {
            let mut value = serde_json::to_value(lap)?;
            if let (Some(acronym), Value::Object(map)) = (acronyms.get(&lap.driver_number), &mut value) {
                map.insert("driver".into(), json!(acronym));
            }
            Ok(value)
        })
        .collect()
}

pub struct GetTelemetry;

#[async_trait]
impl Tool for GetTelemetry {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_telemetry",
            description: "Car telemetry (speed, RPM, gear, throttle, brake, DRS) of a driver",
            input_schema: session_schema(
                &[
                    (
                        "driver",
                        json!({
                            "type": ["string", "integer"],
                            "description": "Driver acronym, name or number"
                        }),
                    ),
                    (
                        "lap",
                        json!({
                            "type": "integer",
                            "description": "Restrict to one lap (optional)"
                        }),
                    ),
                ],
                &["driver"],
            ),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let session_args = SessionArgs::parse(&args)?;
        let driver = args.require_str("driver")?;
        let lap = args.opt_u32("lap")?;

        let loaded = session_args.load(ctx).await?;
        let key = loaded.session.session_key;
        let entry = resolve_driver(ctx, key, &driver).await?;

        let window = match lap {
            Some(lap_number) => {
                let laps = ctx.openf1.laps(key, Some(entry.driver_number)).await?;
                let found = laps
                    .iter()
                    .find(|l| l.lap_number == lap_number)
                    .ok_or_else(|| {
                        ToolError::not_found(format!("Lap {lap_number} not found for driver {driver}"))
                    })?;
                Some(lap_window(found).ok_or_else(|| {
                    ToolError::not_found(format!(
                        "Lap {lap_number} has no timing data for driver {driver}"
                    ))
                })?)
            }
            None => None,
        };

        let samples = ctx.openf1.car_data(key, entry.driver_number).await?;
        let telemetry = match window {
            Some((start, end)) => within_window(samples, start, end),
            None => samples,
        };
        let channels = telemetry_channels(&telemetry);

        Ok(json!({
            "driver": driver,
            "lap": lap,
            "telemetry": telemetry,
            "telemetry_channels": channels,
        }))
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text).ok()
}

/// `[start, start + duration)` of a timed lap.
fn lap_window(lap: &Lap) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let start = parse_timestamp(lap.date_start.as_deref()?)?;
    let duration = lap.lap_duration.filter(|d| d.is_finite() && *d > 0.0)?;
    let length = Duration::try_milliseconds((duration * 1000.0).round() as i64)?;
    let end = start.checked_add_signed(length)?;
    Some((start, end))
}

fn within_window(
    samples: Vec<Value>,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<Value> {
    samples
        .into_iter()
        .filter(|sample| {
            sample
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .is_some_and(|t| t >= start && t < end)
        })
        .collect()
}

fn telemetry_channels(samples: &[Value]) -> Vec<String> {
    let channels: BTreeSet<&String> = samples
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|obj| obj.keys())
        .collect();
    channels.into_iter().cloned().collect()
}
