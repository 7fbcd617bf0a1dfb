//! OneBot-style HTTP transport glue: the chat gateway POSTs group-message
//! events to this process, and outbound messages go to the gateway's
//! `send_group_msg` endpoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use reqwest::Client;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use super::Broadcaster;
use crate::commands::{CommandRouter, InboundCommand, SenderRole};

/// HTTP client for the gateway's send API.
#[derive(Clone)]
pub struct OneBotClient {
    http: Client,
    gateway_url: String,
}

impl OneBotClient {
    pub fn new(gateway_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(OneBotClient {
            http,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Broadcaster for OneBotClient {
    async fn send_to_channel(&self, channel: &str, text: &str) -> Result<()> {
        let url = format!("{}/send_group_msg", self.gateway_url);
        // Gateways expect a numeric group id; fall back to the raw string for
        // transports with opaque identifiers.
        let group_id = channel
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::from(channel));
        let body = serde_json::json!({ "group_id": group_id, "message": text });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("send_group_msg request failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("send_group_msg error: {}", resp.status());
        }
        Ok(())
    }
}

/// Wire shape of an inbound gateway event. Non-message events deserialize
/// with defaults and are ignored by the handler.
#[derive(Debug, Deserialize)]
struct MessageEvent {
    #[serde(default)]
    post_type: String,
    #[serde(default)]
    message_type: String,
    group_id: Option<i64>,
    user_id: Option<i64>,
    #[serde(default)]
    raw_message: String,
    #[serde(default)]
    sender: Sender,
}

#[derive(Debug, Default, Deserialize)]
struct Sender {
    role: Option<String>,
}

#[derive(Clone)]
pub struct TransportState {
    pub router: Arc<CommandRouter>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

/// Build the axum router receiving gateway callbacks.
pub fn router(state: TransportState) -> Router {
    Router::new()
        .route("/", post(event_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn event_handler(
    State(state): State<TransportState>,
    Json(event): Json<MessageEvent>,
) -> StatusCode {
    if event.post_type != "message" || event.message_type != "group" {
        return StatusCode::NO_CONTENT;
    }
    let (Some(group_id), Some(user_id)) = (event.group_id, event.user_id) else {
        return StatusCode::NO_CONTENT;
    };

    let command = InboundCommand {
        channel: group_id.to_string(),
        sender: user_id.to_string(),
        role: SenderRole::from_label(event.sender.role.as_deref().unwrap_or("")),
        text: event.raw_message,
    };
    debug!(
        "Inbound message from {} in {}: {:?}",
        command.sender, command.channel, command.text
    );

    if let Some(reply) = state.router.handle(&command).await {
        if let Err(e) = state
            .broadcaster
            .send_to_channel(&command.channel, &reply)
            .await
        {
            warn!("Reply to channel {} failed: {}", command.channel, e);
        }
    }
    StatusCode::NO_CONTENT
}
