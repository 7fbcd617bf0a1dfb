//! Per-player polling: one long-lived task per followed player, a shared
//! dedup cache so a team match is announced once, and the fan-out to all
//! enabled channels.

pub mod dedup;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::generals::MatchProvider;
use crate::notify::{self, ParticipantLine, StandingDelta};
use crate::state::models::Replay;
use crate::state::StateStore;
use crate::transport::Broadcaster;
use dedup::DedupCache;

/// Everything a poll task needs, shared across all tasks.
#[derive(Clone)]
pub struct WatchContext {
    pub store: StateStore,
    pub provider: Arc<dyn MatchProvider>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub dedup: Arc<DedupCache>,
    pub poll_interval: Duration,
    pub max_backoff: Duration,
}

struct PollTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Registry of live poll tasks, at most one per followed player.
pub struct PollSupervisor {
    ctx: WatchContext,
    tasks: Mutex<HashMap<String, PollTask>>,
}

impl PollSupervisor {
    pub fn new(ctx: WatchContext) -> Arc<Self> {
        Arc::new(PollSupervisor {
            ctx,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Launch a poll task for `player` unless one is already live. Entries
    /// whose task has exited are reaped and replaced, so re-following a
    /// previously unfollowed player restarts cleanly.
    pub fn start(&self, player: &str) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(existing) = tasks.get(player) {
            if !existing.handle.is_finished() {
                debug!("Poll task for {} already running", player);
                return;
            }
            tasks.remove(player);
        }
        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(poll_loop(
            self.ctx.clone(),
            player.to_string(),
            Arc::clone(&stop),
        ));
        tasks.insert(player.to_string(), PollTask { stop, handle });
        info!("Started poll task for {}", player);
    }

    /// Signal the player's task to exit at its next iteration boundary.
    /// In-flight network calls are allowed to complete. Idempotent.
    pub fn stop(&self, player: &str) {
        if let Some(task) = self.tasks.lock().unwrap().remove(player) {
            task.stop.store(true, Ordering::Relaxed);
            info!("Stopping poll task for {}", player);
        }
    }

    pub fn is_running(&self, player: &str) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(player)
            .is_some_and(|t| !t.handle.is_finished())
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }
}

/// One player's indefinitely repeating poll loop.
///
/// Fetch failures are logged and retried with bounded exponential backoff;
/// the loop only exits when the player is disabled or the supervisor signals
/// a stop. Iterations for one player never overlap.
async fn poll_loop(ctx: WatchContext, player: String, stop: Arc<AtomicBool>) {
    let mut failures: u32 = 0;
    while !stop.load(Ordering::Relaxed) && ctx.store.is_player_enabled(&player) {
        match ctx.provider.latest_match(&player).await {
            Ok(Some(replay)) => {
                failures = 0;
                process_replay(&ctx, &player, &replay).await;
            }
            Ok(None) => {
                failures = 0;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = backoff_delay(ctx.poll_interval, failures, ctx.max_backoff);
                warn!(
                    "Fetch for {} failed ({} consecutive): {}; retrying in {:?}",
                    player, failures, e, delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        }
        tokio::time::sleep(with_jitter(ctx.poll_interval)).await;
    }
    debug!("Poll task for {} exited", player);
}

/// Handle the player's most recent match, broadcasting if it is new.
///
/// The last-seen timestamp advances before the dedup/broadcast decision: a
/// crash past that point drops the announcement rather than repeating it
/// after restart (at-most-once delivery).
async fn process_replay(ctx: &WatchContext, player: &str, replay: &Replay) {
    let last_seen = ctx
        .store
        .get(player)
        .map(|p| p.last_seen_match_start)
        .unwrap_or(0);
    if replay.started_at == last_seen {
        return;
    }
    ctx.store.advance_last_seen(player, replay.started_at);

    if !ctx.dedup.first_seen(&replay.id) {
        debug!("Match {} already notified, skipping", replay.id);
        return;
    }
    info!("New match {} detected via {}", replay.id, player);

    let mut followed: Vec<String> = replay
        .participants
        .iter()
        .filter(|name| ctx.store.is_player_enabled(name))
        .cloned()
        .collect();
    if followed.is_empty() {
        // Replay listings without a ranking section still name the polled player.
        followed.push(player.to_string());
    }

    let lines = build_participant_lines(ctx, replay, &followed).await;
    let message = notify::render_notification(replay, &lines);
    broadcast_to_enabled(ctx, &message).await;
}

/// Fetch fresh standings for every followed participant concurrently,
/// compute trends against the stored values, and persist the fresh values —
/// exactly once per notification, and never for unranked games.
async fn build_participant_lines(
    ctx: &WatchContext,
    replay: &Replay,
    followed: &[String],
) -> Vec<ParticipantLine> {
    if !replay.mode.is_ranked() {
        return followed
            .iter()
            .map(|name| ParticipantLine {
                name: name.clone(),
                delta: None,
            })
            .collect();
    }

    let fetches = followed.iter().map(|name| {
        let provider = Arc::clone(&ctx.provider);
        let name = name.clone();
        async move {
            let result = provider.standings(&name).await;
            (name, result)
        }
    });

    let mut lines = Vec::with_capacity(followed.len());
    for (name, result) in join_all(fetches).await {
        match result {
            Ok(standings) => {
                let Some(fresh) = standings.get(replay.mode) else {
                    continue;
                };
                let stored = ctx.store.standing(&name, replay.mode);
                let delta = StandingDelta::new(fresh, stored);
                ctx.store.apply_standings(&name, replay.mode, fresh);
                lines.push(ParticipantLine {
                    name,
                    delta: Some(delta),
                });
            }
            Err(e) => {
                warn!("Standings fetch for {} failed: {}", name, e);
                lines.push(ParticipantLine { name, delta: None });
            }
        }
    }
    lines
}

/// Fan a message out to every enabled channel. Per-channel failures are
/// logged and never block delivery to the rest.
pub async fn broadcast_to_enabled(ctx: &WatchContext, message: &str) {
    let channels = ctx.store.list_enabled_channels();
    let sends = channels.into_iter().map(|channel| {
        let broadcaster = Arc::clone(&ctx.broadcaster);
        async move {
            let result = broadcaster.send_to_channel(&channel, message).await;
            (channel, result)
        }
    });
    for (channel, result) in join_all(sends).await {
        if let Err(e) = result {
            warn!("Broadcast to channel {} failed: {}", channel, e);
        }
    }
}

fn backoff_delay(base: Duration, failures: u32, max: Duration) -> Duration {
    let exp = failures.saturating_sub(1).min(4);
    (base * 2u32.pow(exp)).min(max)
}

/// Spread tasks out so a large follow list does not hit the API in lockstep.
fn with_jitter(interval: Duration) -> Duration {
    let spread = (interval.as_millis() as u64 / 10).max(1);
    interval + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
}
