use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Match mode as reported by the replay listing. `Custom` games carry no
/// rating and are announced without standings lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Ffa,
    TwoVTwo,
    OneVOne,
    Custom,
}

impl Mode {
    /// Map the replay `type` field onto a mode. Unrecognized types are
    /// treated as custom games so a new upstream mode never kills a poll task.
    pub fn from_replay_type(replay_type: &str) -> Mode {
        match replay_type {
            "classic" => Mode::Ffa,
            "2v2" => Mode::TwoVTwo,
            "1v1" => Mode::OneVOne,
            _ => Mode::Custom,
        }
    }

    /// Key used by the stars-and-ranks endpoint ("duel" for 1v1 games).
    pub fn standings_key(self) -> Option<&'static str> {
        match self {
            Mode::Ffa => Some("ffa"),
            Mode::TwoVTwo => Some("2v2"),
            Mode::OneVOne => Some("duel"),
            Mode::Custom => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Ffa => "FFA",
            Mode::TwoVTwo => "2v2",
            Mode::OneVOne => "1v1",
            Mode::Custom => "custom",
        }
    }

    pub fn is_ranked(self) -> bool {
        !matches!(self, Mode::Custom)
    }
}

/// Per-mode value table for the three ranked modes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeTable<T> {
    pub ffa: T,
    #[serde(rename = "2v2")]
    pub two_v_two: T,
    #[serde(rename = "1v1")]
    pub one_v_one: T,
}

impl<T: Clone> ModeTable<T> {
    /// `None` for the custom mode, which has no tracked value.
    pub fn get(&self, mode: Mode) -> Option<T> {
        match mode {
            Mode::Ffa => Some(self.ffa.clone()),
            Mode::TwoVTwo => Some(self.two_v_two.clone()),
            Mode::OneVOne => Some(self.one_v_one.clone()),
            Mode::Custom => None,
        }
    }

    /// Setting a custom-mode value is a no-op: unranked games never mutate
    /// stored standings.
    pub fn set(&mut self, mode: Mode, value: T) {
        match mode {
            Mode::Ffa => self.ffa = value,
            Mode::TwoVTwo => self.two_v_two = value,
            Mode::OneVOne => self.one_v_one = value,
            Mode::Custom => {}
        }
    }
}

/// A watched game account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowedPlayer {
    pub id: String,
    /// Whether the player is actively polled. Unfollow disables rather than
    /// deletes, preserving rank history for a later re-follow.
    pub enabled: bool,
    /// Start timestamp (ms) of the most recent match observed for this
    /// player. Only ever moves forward.
    pub last_seen_match_start: i64,
    pub rank: ModeTable<i64>,
    pub rating: ModeTable<f64>,
}

impl FollowedPlayer {
    pub fn new(id: &str) -> Self {
        FollowedPlayer {
            id: id.to_string(),
            enabled: true,
            last_seen_match_start: 0,
            rank: ModeTable::default(),
            rating: ModeTable::default(),
        }
    }
}

/// A broadcast destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub id: String,
    pub enabled: bool,
}

/// Complete persisted view of the bot's durable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub channels: Vec<ChannelEntry>,
    pub followed_players: Vec<FollowedPlayer>,
    pub operators: Vec<String>,
}

/// Most recent replay summary as fetched from the upstream API. Transient,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub id: String,
    /// Match start timestamp (ms).
    pub started_at: i64,
    pub mode: Mode,
    pub turns: u32,
    pub participants: Vec<String>,
}

impl Replay {
    /// Elapsed game time. One game turn is half a second.
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.turns as i64 * 500)
    }

    pub fn permalink(&self) -> String {
        format!("https://generals.io/replays/{}", self.id)
    }
}

/// One mode's standing as reported by the rating endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Standing {
    pub rating: f64,
    pub rank: i64,
}

/// Fresh rating/rank for every ranked mode.
pub type StandingsByMode = ModeTable<Standing>;
