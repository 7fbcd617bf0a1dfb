use clap::Parser;

/// generals.io follow-notification bot
#[derive(Parser, Debug, Clone)]
#[command(name = "generals-watch-bot", version, about)]
pub struct Config {
    /// Listen address for the chat-gateway webhook
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: String,

    /// Base URL of the chat gateway's HTTP send API
    #[arg(long, env = "GATEWAY_URL", default_value = "http://127.0.0.1:5700")]
    pub gateway_url: String,

    /// generals.io API base URL
    #[arg(long, env = "GENERALS_API_URL", default_value = "https://generals.io/api")]
    pub api_url: String,

    /// Primary state snapshot path
    #[arg(long, env = "STATE_PATH", default_value = "data.json")]
    pub state_path: String,

    /// Backup state snapshot path
    #[arg(long, env = "BACKUP_STATE_PATH", default_value = "data.json.bak")]
    pub backup_state_path: String,

    /// Per-player poll interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "10")]
    pub poll_interval_secs: u64,

    /// State snapshot interval in seconds
    #[arg(long, env = "PERSIST_INTERVAL_SECS", default_value = "5")]
    pub persist_interval_secs: u64,

    /// How long notified match ids are remembered, in seconds
    #[arg(long, env = "DEDUP_TTL_SECS", default_value = "900")]
    pub dedup_ttl_secs: u64,

    /// Upper bound on the fetch-failure retry delay, in seconds
    #[arg(long, env = "MAX_BACKOFF_SECS", default_value = "120")]
    pub max_backoff_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.persist_interval_secs == 0 {
            anyhow::bail!("persist_interval_secs must be positive");
        }
        if self.dedup_ttl_secs < self.poll_interval_secs * 2 {
            anyhow::bail!("dedup_ttl_secs must be at least twice poll_interval_secs");
        }
        if self.state_path == self.backup_state_path {
            anyhow::bail!("state_path and backup_state_path must differ");
        }
        Ok(())
    }
}
