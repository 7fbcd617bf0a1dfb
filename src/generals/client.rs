use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::provider::MatchProvider;
use crate::state::models::{Mode, Replay, Standing, StandingsByMode};

/// Upstream API failure. Every variant is transient from the poll loop's
/// point of view and retried on a later iteration.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed {endpoint} response: {detail}")]
    Malformed {
        endpoint: &'static str,
        detail: String,
    },
}

/// Client for the generals.io public API.
#[derive(Clone)]
pub struct GeneralsClient {
    http: Client,
    /// Base URL, overridable in tests.
    base_url: String,
}

impl GeneralsClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(GeneralsClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, query);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("{} request failed", endpoint))?;
        if !resp.status().is_success() {
            return Err(ApiError::Status {
                endpoint,
                status: resp.status(),
            }
            .into());
        }
        Ok(resp)
    }
}

#[async_trait]
impl MatchProvider for GeneralsClient {
    fn name(&self) -> &str {
        "generals.io"
    }

    async fn latest_match(&self, username: &str) -> Result<Option<Replay>> {
        let resp = self
            .get(
                "replaysForUsername",
                &[("u", username), ("offset", "0"), ("count", "1")],
            )
            .await?;
        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse replaysForUsername response")?;
        parse_latest_replay(&raw)
    }

    async fn standings(&self, username: &str) -> Result<StandingsByMode> {
        let resp = self.get("starsAndRanks", &[("u", username)]).await?;
        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse starsAndRanks response")?;
        Ok(parse_standings(&raw))
    }

    async fn player_exists(&self, username: &str) -> Result<bool> {
        let resp = self.get("validateUsername", &[("u", username)]).await?;
        let body = resp
            .text()
            .await
            .context("Failed to read validateUsername response")?;
        Ok(body.trim() == "true")
    }
}

fn parse_latest_replay(raw: &serde_json::Value) -> Result<Option<Replay>> {
    let entries = raw.as_array().ok_or_else(|| ApiError::Malformed {
        endpoint: "replaysForUsername",
        detail: "expected a JSON array".into(),
    })?;
    let Some(entry) = entries.first() else {
        return Ok(None);
    };

    let id = entry["id"]
        .as_str()
        .ok_or_else(|| ApiError::Malformed {
            endpoint: "replaysForUsername",
            detail: "replay entry without id".into(),
        })?
        .to_string();
    let started_at = entry["started"].as_i64().ok_or_else(|| ApiError::Malformed {
        endpoint: "replaysForUsername",
        detail: format!("replay {} without started timestamp", id),
    })?;
    let mode = Mode::from_replay_type(entry["type"].as_str().unwrap_or("custom"));
    let turns = entry["turns"].as_u64().unwrap_or(0) as u32;
    let participants = entry["ranking"]
        .as_array()
        .map(|ranking| {
            ranking
                .iter()
                .filter_map(|p| p["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(Replay {
        id,
        started_at,
        mode,
        turns,
        participants,
    }))
}

/// The rating endpoint reports values as JSON numbers, numeric strings, or
/// null depending on the mode's play history; null and missing mean zero.
fn parse_standings(raw: &serde_json::Value) -> StandingsByMode {
    let mut standings = StandingsByMode::default();
    for mode in [Mode::Ffa, Mode::TwoVTwo, Mode::OneVOne] {
        let Some(key) = mode.standings_key() else {
            continue;
        };
        standings.set(
            mode,
            Standing {
                // One decimal, matching how the game site displays stars.
                rating: (lenient_f64(&raw["stars"][key]) * 10.0).round() / 10.0,
                rank: lenient_i64(&raw["ranks"][key]),
            },
        );
    }
    standings
}

fn lenient_f64(value: &serde_json::Value) -> f64 {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0.0)
}

fn lenient_i64(value: &serde_json::Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_parse_latest_replay() {
        let raw = json!([{
            "type": "2v2",
            "id": "rkRY5zZ9h",
            "started": 1_677_590_586_940i64,
            "turns": 412,
            "ranking": [
                {"name": "alice", "stars": 40},
                {"name": "bob", "stars": 12},
                {"name": "stranger", "stars": 3}
            ]
        }]);
        let replay = parse_latest_replay(&raw).unwrap().unwrap();
        assert_eq!(replay.id, "rkRY5zZ9h");
        assert_eq!(replay.started_at, 1_677_590_586_940);
        assert_eq!(replay.mode, Mode::TwoVTwo);
        assert_eq!(replay.turns, 412);
        assert_eq!(replay.participants, vec!["alice", "bob", "stranger"]);
    }

    #[test]
    fn test_parse_latest_replay_empty_history() {
        assert_eq!(parse_latest_replay(&json!([])).unwrap(), None);
    }

    #[test]
    fn test_parse_latest_replay_rejects_non_array() {
        assert!(parse_latest_replay(&json!({"error": "nope"})).is_err());
    }

    #[test]
    fn test_parse_standings_mixed_value_types() {
        let raw = json!({
            "stars": {"duel": "42.03", "2v2": null, "ffa": 17.5},
            "ranks": {"duel": 3, "2v2": null, "ffa": "120"}
        });
        let standings = parse_standings(&raw);
        let duel = standings.get(Mode::OneVOne).unwrap();
        assert_relative_eq!(duel.rating, 42.0);
        assert_eq!(duel.rank, 3);
        let two = standings.get(Mode::TwoVTwo).unwrap();
        assert_relative_eq!(two.rating, 0.0);
        assert_eq!(two.rank, 0);
        let ffa = standings.get(Mode::Ffa).unwrap();
        assert_relative_eq!(ffa.rating, 17.5);
        assert_eq!(ffa.rank, 120);
    }

    #[test]
    fn test_lenient_numbers() {
        assert_relative_eq!(lenient_f64(&json!("12.75")), 12.75);
        assert_relative_eq!(lenient_f64(&json!(null)), 0.0);
        assert_eq!(lenient_i64(&json!("8")), 8);
        assert_eq!(lenient_i64(&json!(false)), 0);
    }
}
