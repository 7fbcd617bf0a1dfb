use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

pub mod models;
pub mod persist;

use models::{ChannelEntry, FollowedPlayer, Mode, Standing, StateSnapshot};

/// Shared follow/channel/operator state behind a single lock.
///
/// Every method acquires and releases the lock internally, so a caller can
/// never hold it across an await point and mutations are linearized. Reads
/// return owned copies.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<StateInner>>,
}

#[derive(Default)]
struct StateInner {
    channels: HashMap<String, bool>,
    players: HashMap<String, FollowedPlayer>,
    /// Loaded once at startup; commands cannot mutate the operator list.
    operators: HashSet<String>,
}

impl StateStore {
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let inner = StateInner {
            channels: snapshot
                .channels
                .into_iter()
                .map(|c| (c.id, c.enabled))
                .collect(),
            players: snapshot
                .followed_players
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            operators: snapshot.operators.into_iter().collect(),
        };
        StateStore {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    // ── Players ──────────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<FollowedPlayer> {
        self.inner.read().unwrap().players.get(id).cloned()
    }

    pub fn upsert_player(&self, player: FollowedPlayer) {
        let mut inner = self.inner.write().unwrap();
        inner.players.insert(player.id.clone(), player);
    }

    pub fn is_player_enabled(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .players
            .get(id)
            .is_some_and(|p| p.enabled)
    }

    /// Returns false when the player is unknown.
    pub fn set_player_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.players.get_mut(id) {
            Some(player) => {
                player.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn list_enabled_players(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .players
            .values()
            .filter(|p| p.enabled)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Move the player's last-seen match start forward. A timestamp at or
    /// below the stored one leaves it untouched, keeping the value
    /// monotonically non-decreasing. Returns whether it moved.
    pub fn advance_last_seen(&self, id: &str, started_at: i64) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.players.get_mut(id) {
            Some(player) if started_at > player.last_seen_match_start => {
                player.last_seen_match_start = started_at;
                true
            }
            _ => false,
        }
    }

    /// Stored standing for a player and mode; zero until first observation.
    pub fn standing(&self, id: &str, mode: Mode) -> Standing {
        let inner = self.inner.read().unwrap();
        inner
            .players
            .get(id)
            .map(|p| Standing {
                rating: p.rating.get(mode).unwrap_or(0.0),
                rank: p.rank.get(mode).unwrap_or(0),
            })
            .unwrap_or_default()
    }

    /// Overwrite the stored standing with a freshly fetched one. No-op for
    /// the custom mode and for unknown players.
    pub fn apply_standings(&self, id: &str, mode: Mode, standing: Standing) {
        let mut inner = self.inner.write().unwrap();
        if let Some(player) = inner.players.get_mut(id) {
            player.rating.set(mode, standing.rating);
            player.rank.set(mode, standing.rank);
        }
    }

    // ── Channels ─────────────────────────────────────────────────────────────

    pub fn is_channel_enabled(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .channels
            .get(id)
            .copied()
            .unwrap_or(false)
    }

    /// Creates the channel entry when it does not exist yet.
    pub fn set_channel_enabled(&self, id: &str, enabled: bool) {
        let mut inner = self.inner.write().unwrap();
        inner.channels.insert(id.to_string(), enabled);
    }

    pub fn list_enabled_channels(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .channels
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ── Operators ────────────────────────────────────────────────────────────

    pub fn is_operator(&self, id: &str) -> bool {
        self.inner.read().unwrap().operators.contains(id)
    }

    // ── Snapshot ─────────────────────────────────────────────────────────────

    /// Complete, self-consistent copy for persistence. Entries are sorted so
    /// successive snapshots of the same state are byte-identical.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read().unwrap();
        let mut channels: Vec<ChannelEntry> = inner
            .channels
            .iter()
            .map(|(id, enabled)| ChannelEntry {
                id: id.clone(),
                enabled: *enabled,
            })
            .collect();
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        let mut followed_players: Vec<FollowedPlayer> = inner.players.values().cloned().collect();
        followed_players.sort_by(|a, b| a.id.cmp(&b.id));
        let mut operators: Vec<String> = inner.operators.iter().cloned().collect();
        operators.sort();
        StateSnapshot {
            channels,
            followed_players,
            operators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn store_with(player: FollowedPlayer) -> StateStore {
        let store = StateStore::from_snapshot(StateSnapshot::default());
        store.upsert_player(player);
        store
    }

    #[test]
    fn test_default_state_is_empty() {
        let store = StateStore::from_snapshot(StateSnapshot::default());
        assert!(store.list_enabled_players().is_empty());
        assert!(store.list_enabled_channels().is_empty());
        assert!(!store.is_operator("42"));
    }

    #[test]
    fn test_refollow_reenables() {
        let store = store_with(FollowedPlayer::new("alice"));
        assert!(store.set_player_enabled("alice", false));
        assert!(!store.is_player_enabled("alice"));
        assert!(store.set_player_enabled("alice", true));
        assert!(store.is_player_enabled("alice"));
        assert!(!store.set_player_enabled("nobody", false));
    }

    #[test]
    fn test_advance_last_seen_is_monotonic() {
        let store = store_with(FollowedPlayer::new("alice"));
        assert!(store.advance_last_seen("alice", 1_000));
        assert!(!store.advance_last_seen("alice", 500));
        assert!(!store.advance_last_seen("alice", 1_000));
        assert_eq!(store.get("alice").unwrap().last_seen_match_start, 1_000);
        assert!(store.advance_last_seen("alice", 2_000));
        assert_eq!(store.get("alice").unwrap().last_seen_match_start, 2_000);
    }

    #[test]
    fn test_apply_standings_skips_custom_mode() {
        let store = store_with(FollowedPlayer::new("alice"));
        let fresh = Standing {
            rating: 42.0,
            rank: 3,
        };
        store.apply_standings("alice", Mode::OneVOne, fresh);
        let stored = store.standing("alice", Mode::OneVOne);
        assert_relative_eq!(stored.rating, 42.0);
        assert_eq!(stored.rank, 3);

        store.apply_standings("alice", Mode::Custom, Standing { rating: 9.9, rank: 1 });
        assert_eq!(store.get("alice").unwrap().rating.get(Mode::Custom), None);
        // Ranked tables untouched by the custom-mode call.
        assert_relative_eq!(store.standing("alice", Mode::OneVOne).rating, 42.0);
    }

    #[test]
    fn test_channel_enable_creates_entry() {
        let store = StateStore::from_snapshot(StateSnapshot::default());
        assert!(!store.is_channel_enabled("701924646"));
        store.set_channel_enabled("701924646", true);
        assert!(store.is_channel_enabled("701924646"));
        assert_eq!(store.list_enabled_channels(), vec!["701924646".to_string()]);
        store.set_channel_enabled("701924646", false);
        assert!(store.list_enabled_channels().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = StateStore::from_snapshot(StateSnapshot {
            channels: vec![ChannelEntry {
                id: "865047476".into(),
                enabled: true,
            }],
            followed_players: vec![FollowedPlayer::new("alice"), FollowedPlayer::new("bob")],
            operators: vec!["1259435707".into()],
        });
        store.set_player_enabled("bob", false);

        let snapshot = store.snapshot();
        let restored = StateStore::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.list_enabled_players(), vec!["alice".to_string()]);
        assert!(restored.is_operator("1259435707"));
        assert!(restored.get("bob").is_some());
        assert!(!restored.is_player_enabled("bob"));
    }
}
