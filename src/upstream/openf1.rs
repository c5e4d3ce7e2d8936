//! OpenF1 REST client: meetings, sessions, drivers, laps, car data,
//! weather, race control, and classified results.
//!
//! Endpoints return flat JSON arrays. Records keep every upstream field;
//! the typed fields are only the ones the tools compute with.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::http::HttpFetcher;
use crate::error::UpstreamError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_key: i64,
    #[serde(default)]
    pub meeting_name: Option<String>,
    #[serde(default)]
    pub meeting_official_name: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub circuit_short_name: Option<String>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meeting {
    pub fn is_testing(&self) -> bool {
        self.meeting_name
            .as_deref()
            .is_some_and(|name| name.to_ascii_lowercase().contains("testing"))
    }

    fn matches_name(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            &self.meeting_name,
            &self.meeting_official_name,
            &self.country_name,
            &self.location,
            &self.circuit_short_name,
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_key: i64,
    pub meeting_key: i64,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDriver {
    pub driver_number: u32,
    #[serde(default)]
    pub name_acronym: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionDriver {
    /// Match by number, acronym, full name, or last name (case-insensitive).
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        if needle.parse::<u32>().ok() == Some(self.driver_number) {
            return true;
        }
        [&self.name_acronym, &self.full_name, &self.last_name]
            .into_iter()
            .flatten()
            .any(|field| field.eq_ignore_ascii_case(needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lap {
    pub driver_number: u32,
    pub lap_number: u32,
    #[serde(default)]
    pub lap_duration: Option<f64>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub is_pit_out_lap: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceControlMessage {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub lap_number: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A meeting placed on the season calendar. Testing meetings carry round 0.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEvent {
    pub round_number: u32,
    pub event_name: Option<String>,
    pub official_event_name: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,
    pub circuit: Option<String>,
    pub event_date: Option<String>,
    pub meeting_key: i64,
    pub is_testing: bool,
}

/// How a grand prix was referred to: by championship round or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrandPrix {
    Round(u32),
    Name(String),
}

impl GrandPrix {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(round) => Self::Round(round),
            Err(_) => Self::Name(raw.trim().to_string()),
        }
    }
}

impl std::fmt::Display for GrandPrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Round(round) => write!(f, "round {round}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenF1Client {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl OpenF1Client {
    pub fn new(http: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn meetings(&self, year: i64) -> Result<Vec<Meeting>, UpstreamError> {
        self.fetch("meetings", &[("year", year.to_string())]).await
    }

    pub async fn sessions(&self, meeting_key: i64) -> Result<Vec<Session>, UpstreamError> {
        self.fetch("sessions", &[("meeting_key", meeting_key.to_string())])
            .await
    }

    pub async fn drivers(&self, session_key: i64) -> Result<Vec<SessionDriver>, UpstreamError> {
        self.fetch("drivers", &[("session_key", session_key.to_string())])
            .await
    }

    pub async fn laps(&self, session_key: i64, driver_number: Option<u32>) -> Result<Vec<Lap>, UpstreamError> {
        let mut query = vec![("session_key", session_key.to_string())];
        if let Some(number) = driver_number {
            query.push(("driver_number", number.to_string()));
        }
        let mut laps: Vec<Lap> = self.fetch("laps", &query).await?;
        laps.sort_by_key(|lap| (lap.driver_number, lap.lap_number));
        Ok(laps)
    }

    pub async fn car_data(&self, session_key: i64, driver_number: u32) -> Result<Vec<Value>, UpstreamError> {
        self.fetch(
            "car_data",
            &[
                ("session_key", session_key.to_string()),
                ("driver_number", driver_number.to_string()),
            ],
        )
        .await
    }

    pub async fn weather(&self, session_key: i64) -> Result<Vec<Value>, UpstreamError> {
        self.fetch("weather", &[("session_key", session_key.to_string())])
            .await
    }

    pub async fn race_control(&self, session_key: i64) -> Result<Vec<RaceControlMessage>, UpstreamError> {
        self.fetch("race_control", &[("session_key", session_key.to_string())])
            .await
    }

    pub async fn session_result(&self, session_key: i64) -> Result<Vec<Value>, UpstreamError> {
        self.fetch("session_result", &[("session_key", session_key.to_string())])
            .await
    }

    /// OpenF1 answers 404 when a filter matches nothing; that is an empty
    /// result, not a failure.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = match self.http.get_json(&url, query).await {
            Ok(body) => body,
            Err(UpstreamError::Status { status: 404, .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        match body {
            Value::Array(_) => serde_json::from_value(body)
                .map_err(|source| UpstreamError::Decode { url, source }),
            _ => Err(UpstreamError::MissingField {
                url,
                field: "array body",
            }),
        }
    }
}

/// Order meetings by start date and number the championship rounds.
pub fn build_schedule(mut meetings: Vec<Meeting>, include_testing: bool) -> Vec<ScheduledEvent> {
    meetings.sort_by(|a, b| a.date_start.cmp(&b.date_start));

    let mut round = 0u32;
    let mut events = Vec::with_capacity(meetings.len());
    for meeting in meetings {
        let is_testing = meeting.is_testing();
        let round_number = if is_testing {
            0
        } else {
            round += 1;
            round
        };
        if is_testing && !include_testing {
            continue;
        }
        events.push(ScheduledEvent {
            round_number,
            event_name: meeting.meeting_name,
            official_event_name: meeting.meeting_official_name,
            country: meeting.country_name,
            location: meeting.location,
            circuit: meeting.circuit_short_name,
            event_date: meeting.date_start,
            meeting_key: meeting.meeting_key,
            is_testing,
        });
    }
    events
}

/// Find the meeting a grand prix reference points at.
pub fn find_meeting<'a>(meetings: &'a [Meeting], gp: &GrandPrix) -> Option<&'a Meeting> {
    match gp {
        GrandPrix::Round(round) => {
            let mut ordered: Vec<&Meeting> = meetings.iter().filter(|m| !m.is_testing()).collect();
            ordered.sort_by(|a, b| a.date_start.cmp(&b.date_start));
            let index = usize::try_from(*round).ok()?.checked_sub(1)?;
            ordered.get(index).copied()
        }
        GrandPrix::Name(name) => {
            // Prefer a race weekend over a test held at the same venue.
            meetings
                .iter()
                .filter(|m| m.matches_name(name))
                .min_by_key(|m| m.is_testing())
        }
    }
}

/// Canonical session name for the usual short identifiers.
pub fn canonical_session_name(identifier: &str) -> String {
    match identifier.trim().to_ascii_uppercase().as_str() {
        "FP1" => "Practice 1".into(),
        "FP2" => "Practice 2".into(),
        "FP3" => "Practice 3".into(),
        "Q" => "Qualifying".into(),
        "SQ" | "SS" => "Sprint Qualifying".into(),
        "S" | "SPRINT" => "Sprint".into(),
        "R" => "Race".into(),
        _ => identifier.trim().to_string(),
    }
}

pub fn find_session<'a>(sessions: &'a [Session], identifier: &str) -> Option<&'a Session> {
    let wanted = canonical_session_name(identifier);
    let by_name = |name: &str| {
        sessions.iter().find(|s| {
            s.session_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    };

    by_name(&wanted).or_else(|| {
        // Sprint qualifying ran as "Sprint Shootout" in 2023.
        if wanted == "Sprint Qualifying" {
            by_name("Sprint Shootout")
        } else {
            None
        }
    })
}
