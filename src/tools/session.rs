//! Session-scoped tools backed by OpenF1, plus the session and driver
//! resolution shared with the timing and statistics tools.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{current_year, Arguments, Tool, ToolContext, ToolDescriptor};
use crate::error::ToolError;
use crate::upstream::openf1::{
    build_schedule, find_meeting, find_session, GrandPrix, Meeting, RaceControlMessage, Session,
    SessionDriver,
};

/// A resolved `(year, gp, session)` triple.
#[derive(Debug, Clone)]
pub(crate) struct LoadedSession {
    pub meeting: Meeting,
    pub session: Session,
}

pub(crate) async fn load_session(
    ctx: &ToolContext,
    year: i64,
    gp: &GrandPrix,
    session: &str,
) -> Result<LoadedSession, ToolError> {
    let meetings = ctx.openf1.meetings(year).await?;
    let meeting = find_meeting(&meetings, gp)
        .cloned()
        .ok_or_else(|| ToolError::not_found(format!("Grand Prix {gp} not found in {year}")))?;

    let sessions = ctx.openf1.sessions(meeting.meeting_key).await?;
    let session = find_session(&sessions, session).cloned().ok_or_else(|| {
        let event = meeting.meeting_name.as_deref().unwrap_or("event");
        ToolError::not_found(format!("Session {session} not found for {event} {year}"))
    })?;

    tracing::debug!(
        meeting_key = meeting.meeting_key,
        session_key = session.session_key,
        "resolved session"
    );
    Ok(LoadedSession { meeting, session })
}

pub(crate) fn find_driver<'a>(drivers: &'a [SessionDriver], needle: &str) -> Option<&'a SessionDriver> {
    drivers.iter().find(|d| d.matches(needle))
}

pub(crate) async fn resolve_driver(
    ctx: &ToolContext,
    session_key: i64,
    needle: &str,
) -> Result<SessionDriver, ToolError> {
    let drivers = ctx.openf1.drivers(session_key).await?;
    find_driver(&drivers, needle)
        .cloned()
        .ok_or_else(|| ToolError::not_found(format!("Driver {needle} not found")))
}

/// Arguments shared by every tool addressing a single session.
pub(crate) struct SessionArgs {
    pub year: i64,
    pub gp: GrandPrix,
    pub session: String,
}

impl SessionArgs {
    pub fn parse(args: &Arguments) -> Result<Self, ToolError> {
        Ok(Self {
            year: args.require_i64("year")?,
            gp: GrandPrix::parse(&args.require_str("gp")?),
            session: args.require_str("session")?,
        })
    }

    pub async fn load(&self, ctx: &ToolContext) -> Result<LoadedSession, ToolError> {
        load_session(ctx, self.year, &self.gp, &self.session).await
    }
}

pub(crate) fn session_schema(extra: &[(&str, Value)], extra_required: &[&str]) -> Value {
    let mut properties = json!({
        "year": {
            "type": "integer",
            "description": "Season year"
        },
        "gp": {
            "type": ["string", "integer"],
            "description": "Grand Prix name or round number"
        },
        "session": {
            "type": "string",
            "description": "Session identifier (FP1, FP2, FP3, Q, SQ, Sprint, R)"
        }
    });
    if let Value::Object(map) = &mut properties {
        for (name, schema) in extra {
            map.insert((*name).to_string(), schema.clone());
        }
    }

    let mut required = vec!["year", "gp", "session"];
    required.extend_from_slice(extra_required);

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub struct GetEventSchedule;

#[async_trait]
impl Tool for GetEventSchedule {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_event_schedule",
            description: "Season calendar with round numbers and event dates",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Season year, defaults to the current year"
                    },
                    "include_testing": {
                        "type": "boolean",
                        "description": "Include pre-season testing, defaults to false"
                    }
                }
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.opt_i64("year")?.unwrap_or_else(current_year);
        let include_testing = args.opt_bool("include_testing")?.unwrap_or(false);

        let meetings = ctx.openf1.meetings(year).await?;
        let events = build_schedule(meetings, include_testing);

        Ok(json!({
            "year": year,
            "total_events": events.len(),
            "events": events,
        }))
    }
}

pub struct GetSession;

#[async_trait]
impl Tool for GetSession {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_session",
            description: "Session details and participating driver numbers",
            input_schema: session_schema(&[], &[]),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let loaded = SessionArgs::parse(&args)?.load(ctx).await?;
        let drivers = ctx.openf1.drivers(loaded.session.session_key).await?;
        let numbers: Vec<String> = drivers.iter().map(|d| d.driver_number.to_string()).collect();

        Ok(json!({
            "session_info": {
                "name": loaded.session.session_name,
                "type": loaded.session.session_type,
                "date": loaded.session.date_start,
                "circuit": loaded.meeting.meeting_name,
                "country": loaded.meeting.country_name,
                "location": loaded.meeting.location,
                "session_key": loaded.session.session_key,
                "meeting_key": loaded.meeting.meeting_key,
            },
            "total_drivers": numbers.len(),
            "drivers": numbers,
        }))
    }
}

pub struct GetSessionResults;

#[async_trait]
impl Tool for GetSessionResults {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_session_results",
            description: "Classified results of a session",
            input_schema: session_schema(&[], &[]),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let session_args = SessionArgs::parse(&args)?;
        let loaded = session_args.load(ctx).await?;
        let key = loaded.session.session_key;

        let rows = ctx.openf1.session_result(key).await?;
        let drivers = ctx.openf1.drivers(key).await?;
        let results = merge_driver_details(rows, &drivers);

        Ok(json!({
            "session": session_args.session,
            "total_results": results.len(),
            "results": results,
        }))
    }
}

/// Attach acronym, name and team to result rows and order them by
/// position, unclassified rows last.
fn merge_driver_details(rows: Vec<Value>, drivers: &[SessionDriver]) -> Vec<Value> {
    let by_number: HashMap<u32, &SessionDriver> =
        drivers.iter().map(|d| (d.driver_number, d)).collect();

    let mut results: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            let number = row
                .get("driver_number")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            if let (Some(driver), Value::Object(map)) =
                (number.and_then(|n| by_number.get(&n)), &mut row)
            {
                map.insert("name_acronym".into(), json!(driver.name_acronym));
                map.insert("full_name".into(), json!(driver.full_name));
                map.insert("team_name".into(), json!(driver.team_name));
            }
            row
        })
        .collect();

    results.sort_by_key(|row| row.get("position").and_then(Value::as_u64).unwrap_or(u64::MAX));
    results
}

pub struct GetWeatherData;

#[async_trait]
impl Tool for GetWeatherData {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_weather_data",
            description: "Weather readings recorded during a session",
            input_schema: session_schema(&[], &[]),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let session_args = SessionArgs::parse(&args)?;
        let loaded = session_args.load(ctx).await?;
        let weather = ctx.openf1.weather(loaded.session.session_key).await?;

        Ok(json!({
            "session": session_args.session,
            "total_readings": weather.len(),
            "weather_data": weather,
        }))
    }
}

pub struct GetTrackStatus;

/// A change of track status, coded like the live-timing feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TrackStatusChange {
    pub time: Option<String>,
    pub status: &'static str,
    pub label: &'static str,
    pub message: Option<String>,
    pub lap_number: Option<u32>,
}

#[async_trait]
impl Tool for GetTrackStatus {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_track_status",
            description: "Track status changes (flags, safety car) during a session",
            input_schema: session_schema(&[], &[]),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let session_args = SessionArgs::parse(&args)?;
        let loaded = session_args.load(ctx).await?;
        let messages = ctx.openf1.race_control(loaded.session.session_key).await?;
        let changes = track_status_changes(&messages);

        Ok(json!({
            "session": session_args.session,
            "total_changes": changes.len(),
            "track_status": changes,
        }))
    }
}

/// Status code and label for a race-control message that changes the
/// track status.
fn classify(msg: &RaceControlMessage) -> Option<(&'static str, &'static str)> {
    let upper = |s: &Option<String>| s.as_deref().unwrap_or_default().to_ascii_uppercase();
    let category = upper(&msg.category);
    let text = upper(&msg.message);

    match category.as_str() {
        "SAFETYCAR" => {
            if text.contains("VIRTUAL SAFETY CAR ENDING") {
                Some(("7", "VSCEnding"))
            } else if text.contains("VIRTUAL SAFETY CAR DEPLOYED") {
                Some(("6", "VSCDeployed"))
            } else if text.contains("SAFETY CAR DEPLOYED") {
                Some(("4", "SCDeployed"))
            } else {
                None
            }
        }
        "FLAG" => {
            let scope = upper(&msg.scope);
            match (upper(&msg.flag).as_str(), scope.as_str()) {
                ("GREEN" | "CLEAR", "TRACK") => Some(("1", "AllClear")),
                ("RED", _) => Some(("5", "Red")),
                ("YELLOW" | "DOUBLE YELLOW", "TRACK" | "SECTOR") => Some(("2", "Yellow")),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Track status transitions in message order; repeats of the current
/// status are dropped.
pub(crate) fn track_status_changes(messages: &[RaceControlMessage]) -> Vec<TrackStatusChange> {
    let mut changes: Vec<TrackStatusChange> = Vec::new();
    for msg in messages {
        let Some((status, label)) = classify(msg) else {
            continue;
        };
        if changes.last().is_some_and(|last| last.status == status) {
            continue;
        }
        changes.push(TrackStatusChange {
            time: msg.date.clone(),
            status,
            label,
            message: msg.message.clone(),
            lap_number: msg.lap_number,
        });
    }
    changes
}

/// Drivers entered in the season opener.
async fn opening_race_drivers(ctx: &ToolContext, year: i64) -> Result<Vec<SessionDriver>, ToolError> {
    let loaded = load_session(ctx, year, &GrandPrix::Round(1), "R").await?;
    Ok(ctx.openf1.drivers(loaded.session.session_key).await?)
}

pub struct GetDriverInfo;

#[async_trait]
impl Tool for GetDriverInfo {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_driver_info",
            description: "Driver details (number, acronym, team) for a season",
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
                    }
                },
                "required": ["year", "driver"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let driver = args.require_str("driver")?;

        let drivers = opening_race_drivers(ctx, year).await?;
        let info = find_driver(&drivers, &driver)
            .ok_or_else(|| ToolError::not_found(format!("Driver {driver} not found")))?;

        Ok(json!({
            "driver_info": info,
            "year": year,
        }))
    }
}

pub struct GetTeamInfo;

#[async_trait]
impl Tool for GetTeamInfo {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_team_info",
            description: "Team line-up for a season",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Season year"
                    },
                    "team": {
                        "type": "string",
                        "description": "Team name or part of it"
                    }
                },
                "required": ["year", "team"]
            }),
        }
    }

    async fn call(&self, ctx: &ToolContext, args: Arguments) -> Result<Value, ToolError> {
        let year = args.require_i64("year")?;
        let team = args.require_str("team")?;
        let needle = team.to_lowercase();

        let drivers = opening_race_drivers(ctx, year).await?;
        let team_drivers: Vec<&SessionDriver> = drivers
            .iter()
            .filter(|d| {
                d.team_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .collect();

        Ok(json!({
            "team_name": team,
            "drivers": team_drivers,
            "year": year,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(category: &str, flag: Option<&str>, scope: Option<&str>, text: &str) -> RaceControlMessage {
        serde_json::from_value(json!({
            "date": "2024-03-02T15:10:00+00:00",
            "category": category,
            "flag": flag,
            "scope": scope,
            "message": text,
        }))
        .unwrap()
    }

    #[test]
    fn race_control_maps_to_status_codes() {
        let messages = vec![
            message("Flag", Some("GREEN"), Some("Track"), "GREEN LIGHT - PIT EXIT OPEN"),
            message("Flag", Some("YELLOW"), Some("Sector"), "YELLOW IN TRACK SECTOR 4"),
            message("Flag", Some("YELLOW"), Some("Sector"), "DOUBLE YELLOW IN TRACK SECTOR 5"),
            message("SafetyCar", None, None, "VIRTUAL SAFETY CAR DEPLOYED"),
            message("SafetyCar", None, None, "VIRTUAL SAFETY CAR ENDING"),
            message("Other", None, None, "CAR 1 TIME DELETED"),
            message("Flag", Some("CLEAR"), Some("Track"), "TRACK CLEAR"),
            message("SafetyCar", None, None, "SAFETY CAR DEPLOYED"),
            message("Flag", Some("RED"), Some("Track"), "RED FLAG"),
        ];

        let codes: Vec<&str> = track_status_changes(&messages).iter().map(|c| c.status).collect();
        assert_eq!(codes, vec!["1", "2", "6", "7", "1", "4", "5"]);
    }

    #[test]
    fn results_are_merged_and_ordered() {
        let drivers: Vec<SessionDriver> = serde_json::from_value(json!([
            {"driver_number": 1, "name_acronym": "VER", "full_name": "Max VERSTAPPEN", "team_name": "Red Bull Racing"},
            {"driver_number": 16, "name_acronym": "LEC", "full_name": "Charles LECLERC", "team_name": "Ferrari"},
        ]))
        .unwrap();
        let rows = vec![
            json!({"driver_number": 16, "position": 2}),
            json!({"driver_number": 99, "position": null}),
            json!({"driver_number": 1, "position": 1}),
        ];

        let merged = merge_driver_details(rows, &drivers);
        assert_eq!(merged[0]["name_acronym"], "VER");
        assert_eq!(merged[1]["team_name"], "Ferrari");
        assert_eq!(merged[2]["driver_number"], 99);
        assert!(merged[2].get("name_acronym").is_none());
    }

    #[test]
    fn session_schema_extends_required() {
        let schema = session_schema(&[("driver", json!({"type": "string"}))], &["driver"]);
        assert_eq!(schema["required"], json!(["year", "gp", "session", "driver"]));
        assert_eq!(schema["properties"]["driver"]["type"], "string");
    }
}
