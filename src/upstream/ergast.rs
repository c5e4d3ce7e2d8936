//! Ergast-compatible REST client (Jolpica mirror).
//!
//! Every response is wrapped in an `MRData` object carrying string-typed
//! `limit`/`offset`/`total` pagination fields and one `*Table` payload.

use std::sync::Arc;

use serde_json::Value;

use super::http::HttpFetcher;
use crate::error::UpstreamError;

/// Largest page the API serves.
pub const PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct ErgastClient {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl ErgastClient {
    pub fn new(http: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn drivers(&self, year: i64) -> Result<Vec<Value>, UpstreamError> {
        let page = self.page(&format!("{year}/drivers"), 0).await?;
        page.table_list("DriverTable", "Drivers")
    }

    /// Every race result of a driver in a season, ordered by round.
    pub async fn driver_results(&self, driver_id: &str, year: i64) -> Result<Vec<Value>, UpstreamError> {
        let mut races = self
            .races_paginated(&format!("{year}/drivers/{driver_id}/results"))
            .await?;
        races.sort_by_key(round_of);
        Ok(races)
    }

    /// The season calendar.
    pub async fn races(&self, year: i64) -> Result<Vec<Value>, UpstreamError> {
        let page = self.page(&format!("{year}/races"), 0).await?;
        page.table_list("RaceTable", "Races")
    }

    /// Race results for a whole season or a single round.
    pub async fn race_results(&self, year: i64, round: Option<u32>) -> Result<Vec<Value>, UpstreamError> {
        let path = match round {
            Some(round) => format!("{year}/{round}/results"),
            None => format!("{year}/results"),
        };
        self.races_paginated(&path).await
    }

    pub async fn driver_standings(&self, year: i64, round: Option<u32>) -> Result<Vec<Value>, UpstreamError> {
        self.standings(year, round, "driverStandings").await
    }

    pub async fn constructor_standings(
        &self,
        year: i64,
        round: Option<u32>,
    ) -> Result<Vec<Value>, UpstreamError> {
        self.standings(year, round, "constructorStandings").await
    }

    pub async fn circuit(&self, circuit_id: &str) -> Result<Option<Value>, UpstreamError> {
        let page = self.page(&format!("circuits/{circuit_id}"), 0).await?;
        Ok(page.table_list("CircuitTable", "Circuits")?.into_iter().next())
    }

    /// Each race held at a circuit, carrying only the result that set the
    /// race's fastest lap.
    pub async fn circuit_fastest_laps(&self, circuit_id: &str) -> Result<Vec<Value>, UpstreamError> {
        self.races_paginated(&format!("circuits/{circuit_id}/fastest/1/results"))
            .await
    }

    async fn standings(
        &self,
        year: i64,
        round: Option<u32>,
        kind: &str,
    ) -> Result<Vec<Value>, UpstreamError> {
        let path = match round {
            Some(round) => format!("{year}/{round}/{kind}"),
            None => format!("{year}/{kind}"),
        };
        let page = self.page(&path, 0).await?;
        page.table_list("StandingsTable", "StandingsLists")
    }

    /// Walk every page of a `RaceTable` endpoint. Pages are counted in result
    /// rows, so a race split across two pages is merged back together.
    async fn races_paginated(&self, path: &str) -> Result<Vec<Value>, UpstreamError> {
        let mut races: Vec<Value> = Vec::new();
        let mut offset = 0u64;

        loop {
            let page = self.page(path, offset).await?;
            let total = page.total();
            let batch = page.table_list("RaceTable", "Races")?;
            let rows: usize = batch.iter().map(result_rows).sum();

            for race in batch {
                merge_race(&mut races, race);
            }

            offset += PAGE_LIMIT;
            if rows == 0 || offset >= total {
                break;
            }
        }

        Ok(races)
    }

    async fn page(&self, path: &str, offset: u64) -> Result<Page, UpstreamError> {
        let url = format!("{}/{}.json", self.base_url, path);
        let mut query = vec![("limit", PAGE_LIMIT.to_string())];
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }
        let body = self.http.get_json(&url, &query).await?;
        Ok(Page { url, body })
    }
}

struct Page {
    url: String,
    body: Value,
}

impl Page {
    fn mrdata(&self) -> Result<&Value, UpstreamError> {
        self.body.get("MRData").ok_or_else(|| UpstreamError::MissingField {
            url: self.url.clone(),
            field: "MRData",
        })
    }

    fn total(&self) -> u64 {
        self.mrdata()
            .ok()
            .and_then(|m| m.get("total"))
            .and_then(value_as_u64)
            .unwrap_or(0)
    }

    fn table_list(&self, table: &'static str, list: &'static str) -> Result<Vec<Value>, UpstreamError> {
        let table_value = self.mrdata()?.get(table).ok_or_else(|| UpstreamError::MissingField {
            url: self.url.clone(),
            field: table,
        })?;
        match table_value.get(list) {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(UpstreamError::MissingField {
                url: self.url.clone(),
                field: list,
            }),
        }
    }
}

fn merge_race(races: &mut Vec<Value>, race: Value) {
    if let Some(last) = races.last_mut() {
        if same_race(last, &race) {
            if let (Some(Value::Array(into)), Some(Value::Array(from))) =
                (last.get_mut("Results"), race.get("Results"))
            {
                into.extend(from.iter().cloned());
                return;
            }
        }
    }
    races.push(race);
}

fn same_race(a: &Value, b: &Value) -> bool {
    a.get("season") == b.get("season") && a.get("round") == b.get("round")
}

fn result_rows(race: &Value) -> usize {
    race.get("Results")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

pub fn round_of(race: &Value) -> u32 {
    race.get("round")
        .and_then(value_as_u64)
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(0)
}

/// Ergast encodes numbers as strings; accept either form.
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_joins_split_race_rows() {
        let mut races = Vec::new();
        merge_race(&mut races, json!({"season": "2024", "round": "1", "Results": [{"position": "1"}]}));
        merge_race(&mut races, json!({"season": "2024", "round": "1", "Results": [{"position": "2"}]}));
        merge_race(&mut races, json!({"season": "2024", "round": "2", "Results": [{"position": "1"}]}));

        assert_eq!(races.len(), 2);
        assert_eq!(result_rows(&races[0]), 2);
        assert_eq!(result_rows(&races[1]), 1);
    }

    #[test]
    fn string_numbers_parse() {
        assert_eq!(value_as_u64(&json!("24")), Some(24));
        assert_eq!(value_as_u64(&json!(7)), Some(7));
        assert_eq!(value_as_u64(&json!("R")), None);
        assert_eq!(value_as_f64(&json!("12.5")), Some(12.5));
        assert_eq!(round_of(&json!({"round": "11"})), 11);
        assert_eq!(round_of(&json!({})), 0);
    }
}
