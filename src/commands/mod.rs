//! Chat command parsing and routing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::generals::MatchProvider;
use crate::state::models::FollowedPlayer;
use crate::state::StateStore;
use crate::watch::PollSupervisor;

/// Sender role as reported by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderRole {
    Owner,
    Admin,
    Member,
    Unknown,
}

impl SenderRole {
    pub fn from_label(label: &str) -> SenderRole {
        match label {
            "owner" => SenderRole::Owner,
            "admin" => SenderRole::Admin,
            "member" => SenderRole::Member,
            _ => SenderRole::Unknown,
        }
    }

    fn is_privileged(self) -> bool {
        matches!(self, SenderRole::Owner | SenderRole::Admin)
    }
}

/// A single inbound chat message, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub channel: String,
    pub sender: String,
    pub role: SenderRole,
    pub text: String,
}

/// Closed set of supported commands, resolved by exact leading keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Follow(String),
    Unfollow(String),
    List,
    Enable,
    Disable,
}

impl Command {
    /// The remainder of the line after the keyword is the argument verbatim,
    /// so usernames containing spaces survive parsing.
    pub fn parse(text: &str) -> Option<Command> {
        let trimmed = text.trim();
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let keyword = parts.next()?;
        let rest = parts.next().map(str::trim).unwrap_or("");
        match keyword {
            "follow" if !rest.is_empty() => Some(Command::Follow(rest.to_string())),
            "unfollow" if !rest.is_empty() => Some(Command::Unfollow(rest.to_string())),
            "list" if rest.is_empty() => Some(Command::List),
            "enable" if rest.is_empty() => Some(Command::Enable),
            "disable" if rest.is_empty() => Some(Command::Disable),
            _ => None,
        }
    }
}

/// Maps commands to state/supervisor mutations and user-facing replies.
pub struct CommandRouter {
    store: StateStore,
    supervisor: Arc<PollSupervisor>,
    provider: Arc<dyn MatchProvider>,
}

impl CommandRouter {
    pub fn new(
        store: StateStore,
        supervisor: Arc<PollSupervisor>,
        provider: Arc<dyn MatchProvider>,
    ) -> Self {
        CommandRouter {
            store,
            supervisor,
            provider,
        }
    }

    /// Handle one inbound message; the return value is the reply for the
    /// invoking channel, if any.
    pub async fn handle(&self, msg: &InboundCommand) -> Option<String> {
        let command = Command::parse(&msg.text)?;
        if !self.store.is_channel_enabled(&msg.channel) {
            // Bootstrap path: a channel outside the enabled set accepts
            // nothing but `enable`.
            return match command {
                Command::Enable => self.handle_enable(msg),
                _ => None,
            };
        }
        match command {
            Command::Follow(name) => Some(self.handle_follow(&name).await),
            Command::Unfollow(name) => Some(self.handle_unfollow(&name)),
            Command::List => Some(self.handle_list()),
            Command::Enable => self.handle_enable(msg),
            Command::Disable => self.handle_disable(msg),
        }
    }

    fn is_privileged(&self, msg: &InboundCommand) -> bool {
        msg.role.is_privileged() || self.store.is_operator(&msg.sender)
    }

    async fn handle_follow(&self, name: &str) -> String {
        if self.store.get(name).is_some() {
            self.store.set_player_enabled(name, true);
            self.supervisor.start(name);
            return format!("Now following {}", name);
        }

        match self.provider.player_exists(name).await {
            Ok(true) => {}
            Ok(false) => return format!("No such player: {}", name),
            Err(e) => {
                warn!("Existence check for {} failed: {}", name, e);
                return "Could not reach the game service, try again later".to_string();
            }
        }
        match self.provider.latest_match(name).await {
            Ok(Some(_)) => {
                self.store.upsert_player(FollowedPlayer::new(name));
                self.supervisor.start(name);
                info!("Following new player {}", name);
                format!("Now following {}", name)
            }
            Ok(None) => format!("{} has no finished matches yet", name),
            Err(e) => {
                warn!("Match-history check for {} failed: {}", name, e);
                "Could not reach the game service, try again later".to_string()
            }
        }
    }

    /// Disables the player and signals its poll task, which exits at the
    /// next iteration boundary; in-flight fetches complete first.
    fn handle_unfollow(&self, name: &str) -> String {
        if self.store.set_player_enabled(name, false) {
            self.supervisor.stop(name);
            format!("Stopped following {}", name)
        } else {
            format!("Not following {}", name)
        }
    }

    fn handle_list(&self) -> String {
        let mut names = self.store.list_enabled_players();
        names.sort();
        if names.is_empty() {
            "Not following anyone yet".to_string()
        } else {
            format!("Currently followed players:\n{}", names.join("\n"))
        }
    }

    /// Unprivileged senders are ignored without a reply, so the operator
    /// list cannot be probed from chat.
    fn handle_enable(&self, msg: &InboundCommand) -> Option<String> {
        if !self.is_privileged(msg) {
            return None;
        }
        self.store.set_channel_enabled(&msg.channel, true);
        info!("Channel {} enabled by {}", msg.channel, msg.sender);
        Some("Notifications enabled for this channel".to_string())
    }

    fn handle_disable(&self, msg: &InboundCommand) -> Option<String> {
        if !self.is_privileged(msg) {
            return None;
        }
        self.store.set_channel_enabled(&msg.channel, false);
        info!("Channel {} disabled by {}", msg.channel, msg.sender);
        Some("Notifications disabled for this channel".to_string())
    }
}
