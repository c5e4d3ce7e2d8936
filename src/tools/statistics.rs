use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::session::{find_driver, load_session, resolve_driver};
use super::{Arguments, Tool, ToolContext, ToolDescriptor};
use crate::error::ToolError;
use crate::upstream::openf1::{build_schedule, find_session, GrandPrix, Lap};

/// Lap-time summary of one driver over one race or a whole season.
#[derive(Debug, Clone, Serialize)]
pub struct DriverStatistics {
    pub driver: String,
    pub year: i64,
    pub gp: Option<String>,
    pub races: usize,
    pub total_laps: usize,
    pub timed_laps: usize,
    /// Seconds.
    pub best_lap_time: Option<f64>,
    pub average_lap_time: Option<f64>,
    pub lap_time_std_dev: Option<f64>,
    pub fastest_lap: Option<Lap>,
    pub pit_stops: usize,
}

/// Mean and sample standard deviation. The deviation needs two samples.
fn mean_and_std_dev(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (Some(mean), None);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (Some(mean), Some(variance.sqrt()))
}

fn summarize(driver: &str, year: i64, gp: Option<String>, races: usize, laps: Vec<Lap>) -> DriverStatistics {
    let durations: Vec<f64> = laps
        .iter()
        .filter_map(|l| l.lap_duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .collect();
    let (average_lap_time, lap_time_std_dev) = mean_and_std_dev(&durations);

    let fastest_lap = laps
        .iter()
        .filter(|l| l.lap_duration.is_some_and(|d| d.is_finite() && d > 0.0))
        .min_by(|a, b| {
            let (a, b) = (a.lap_duration.unwrap_or(f64::MAX), b.lap_duration.unwrap_or(f64::MAX));
            a.total_cmp(&b)
        })
        .cloned();

    DriverStatistics {
        driver: driver.to_string(),
        year,
        gp,
        races,
        total_laps: laps.len(),
        timed_laps: durations.len(),
        best_lap_time: fastest_lap.as_ref().and_then(|l| l.lap_duration),
        average_lap_time,
        lap_time_std_dev,
        fastest_lap,
        pit_stops: laps.iter().filter(|l| l.is_pit_out_lap == Some(true)).count(),
    }
}

/// Race laps of `driver` in one Grand Prix.
async fn race_laps(ctx: &ToolContext, year: i64, gp: &GrandPrix, driver: &str) -> Result<Vec<Lap>, ToolError> {
    let loaded = load_session(ctx, year, gp, "R").await?;
    let key = loaded.session.session_key;
    let entry = resolve_driver(ctx, key, driver).await?;
    Ok(ctx.openf1.laps(key, Some(entry.driver_number)).await?)
}

/// Race laps of `driver` across the season. Races that cannot be loaded,
/// or that the driver did not enter, are skipped.
async fn season_laps(ctx: &ToolContext, year: i64, driver: &str) -> Result<(usize, Vec<Lap>), ToolError> {
    let meetings = ctx.openf1.meetings(year).await?;
    let schedule = build_schedule(meetings, false);

    let mut races = 0;
    let mut laps = Vec::new();
    for event in schedule {
        match event_race_laps(ctx, event.meeting_key, driver).await {
            Ok(Some(event_laps)) => {
                races += 1;
                laps.extend(event_laps);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(round = event.round_number, error = %e, "skipping race");
            }
        }
    }
    Ok((races, laps))
}

async fn event_race_laps(ctx: &ToolContext, meeting_key: i64, driver: &str) -> Result<Option<Vec<Lap>>, ToolError> {
    let sessions = ctx.openf1.sessions(meeting_key).await?;
    let Some(race) = find_session(&sessions, "R") else {
        return Ok(None);
    };
    let drivers = ctx.openf1.drivers(race.session_key).await?;
    let Some(entry) = find_driver(&drivers, driver) else {
        return Ok(None);
    };
    Ok(Some(ctx.openf1.laps(race.session_key, Some(entry.driver_number)).await?))
}

pub(crate) async fn driver_statistics(
    ctx: &ToolContext,
    year: i64,
    driver: &str,
    gp: Option<String>,
) -> Result<DriverStatistics, ToolError> {
    let (races, laps) = match gp.as_deref() {
        Some(raw) => (1, race_laps(ctx, year, &GrandPrix::parse(raw), driver).await?),
        None => season_laps(ctx, year, driver).await?,
    };

    if laps.is_empty() {
        return Err(ToolError::not_found(format!("No data found for driver {driver}")));
    }

    Ok(summarize(driver, year, gp, races, laps))
}

pub struct CalculateDriverStatistics;

#[async_trait]
impl Tool for CalculateDriverStatistics {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "calculate_driver_statistics",
            description: "Lap-time statistics of a driver for one race or a whole season",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Season year"
                    },
                    "driver": {
                        "type": ["string", "integer"],
                        "description": "Driver acronym, name or number"
                    },
                    "gp": {
                        "type": ["string", "integer"],
                        "description": "Grand Prix name or round number (optional, whole season if omitted)"
                    }
                },
                "required": ["year", "driver"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let driver = args.require_str("driver")?;
        let gp = args.opt_str("gp")?;

        let stats = driver_statistics(ctx, year, &driver, gp).await?;
        Ok(serde_json::to_value(stats)?)
    }
}

pub struct CompareDrivers;

#[async_trait]
impl Tool for CompareDrivers {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "compare_drivers",
            description: "Compare the lap-time statistics of two drivers",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Season year"
                    },
                    "driver1": {
                        "type": ["string", "integer"],
                        "description": "First driver acronym, name or number"
                    },
                    "driver2": {
                        "type": ["string", "integer"],
                        "description": "Second driver acronym, name or number"
                    },
                    "gp": {
                        "type": ["string", "integer"],
                        "description": "Grand Prix name or round number (optional)"
                    }
                },
                "required": ["year", "driver1", "driver2"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let driver1 = args.require_str("driver1")?;
        let driver2 = args.require_str("driver2")?;
        let gp = args.opt_str("gp")?;

        let stats1 = driver_statistics(ctx, year, &driver1, gp.clone()).await?;
        let stats2 = driver_statistics(ctx, year, &driver2, gp.clone()).await?;

        Ok(comparison(year, gp, stats1, stats2))
    }
}

fn comparison(year: i64, gp: Option<String>, stats1: DriverStatistics, stats2: DriverStatistics) -> Value {
    let lap_time_difference = match (stats1.average_lap_time, stats2.average_lap_time) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    };
    let total_laps_difference = stats1.total_laps as i64 - stats2.total_laps as i64;

    json!({
        "year": year,
        "gp": gp,
        "driver1": stats1,
        "driver2": stats2,
        "lap_time_difference": lap_time_difference,
        "total_laps_difference": total_laps_difference,
    })
}
