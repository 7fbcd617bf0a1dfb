pub mod onebot;

use anyhow::Result;
use async_trait::async_trait;

pub use onebot::OneBotClient;

/// Outbound side of the chat transport.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Deliver `text` to a single channel.
    async fn send_to_channel(&self, channel: &str, text: &str) -> Result<()>;
}
