//! Periodic state snapshots, written to a primary and a backup location so a
//! crash mid-write to either file leaves one intact copy.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::models::StateSnapshot;
use super::StateStore;

/// Load the snapshot from the primary path, falling back to the backup copy,
/// then to an empty default. Never fails: a corrupt or missing state file
/// must not keep the process from starting.
pub fn load_snapshot(primary: &Path, backup: &Path) -> StateSnapshot {
    for path in [primary, backup] {
        match read_snapshot(path) {
            Ok(Some(snapshot)) => {
                info!("Loaded state from {}", path.display());
                return snapshot;
            }
            Ok(None) => {}
            Err(e) => warn!("Unusable state file {}: {}", path.display(), e),
        }
    }
    info!("No usable state file found, starting empty");
    StateSnapshot::default()
}

fn read_snapshot(path: &Path) -> Result<Option<StateSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    let snapshot = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse state file {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Write the snapshot to both locations. Each location is attempted
/// independently; a failure is logged and retried on the next cycle rather
/// than propagated.
pub async fn write_snapshot(snapshot: &StateSnapshot, primary: &Path, backup: &Path) {
    let json = match serde_json::to_vec_pretty(snapshot) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize state snapshot: {}", e);
            return;
        }
    };
    for path in [primary, backup] {
        if let Err(e) = tokio::fs::write(path, &json).await {
            warn!("Failed to write state file {}: {}", path.display(), e);
        }
    }
}

/// Spawn the background task that flushes the store every `interval`.
pub fn spawn_snapshot_loop(
    store: StateStore,
    primary: PathBuf,
    backup: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            write_snapshot(&store.snapshot(), &primary, &backup).await;
        }
    })
}
