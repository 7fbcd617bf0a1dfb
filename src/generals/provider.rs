use anyhow::Result;
use async_trait::async_trait;

use crate::state::models::{Replay, StandingsByMode};

/// Narrow pull interface over the upstream game service.
#[async_trait]
pub trait MatchProvider: Send + Sync {
    /// The player's most recent finished match, if any.
    async fn latest_match(&self, username: &str) -> Result<Option<Replay>>;

    /// Current rating and rank for every ranked mode.
    async fn standings(&self, username: &str) -> Result<StandingsByMode>;

    /// Whether the username exists upstream.
    async fn player_exists(&self, username: &str) -> Result<bool>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
