//! # Rollback State Store
//!
//! Single-slot persistence for the most recent [`RollbackSnapshot`].
//!
//! Persistence problems never abort a sync: a failed save is logged and the
//! put carries on without rollback coverage. A snapshot that cannot be parsed
//! or has outlived its TTL reads as "no history".

use super::RollbackSnapshot;
use crate::constants::SNAPSHOT_FILE_NAME;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub trait RollbackStateStore: Send + Sync {
    /// Replace the stored snapshot; failures are logged, never raised
    fn save(&self, snapshot: &RollbackSnapshot);

    /// Load the stored snapshot
    ///
    /// Returns `None` when there is none, when it cannot be read, or when it
    /// has expired (an expired snapshot is cleared as a side effect).
    fn load(&self) -> Option<RollbackSnapshot>;

    /// Remove the stored snapshot; a no-op when nothing is stored
    fn clear(&self);

    fn exists(&self) -> bool;
}

/// JSON file under the state directory, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileRollbackStore {
    path: PathBuf,
    ttl: chrono::Duration,
}

impl FileRollbackStore {
    #[must_use]
    pub fn new(state_dir: impl AsRef<Path>, ttl: chrono::Duration) -> Self {
        Self {
            path: state_dir.as_ref().join(SNAPSHOT_FILE_NAME),
            ttl,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_save(&self, snapshot: &RollbackSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize rollback snapshot")?;

        // Write then rename so a crash never leaves a truncated snapshot behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move snapshot into {}", self.path.display()))?;

        Ok(())
    }

    fn try_load(&self) -> Result<Option<RollbackSnapshot>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse rollback snapshot {}", self.path.display()))?;
        Ok(Some(snapshot))
    }
}

impl RollbackStateStore for FileRollbackStore {
    fn save(&self, snapshot: &RollbackSnapshot) {
        match self.try_save(snapshot) {
            Ok(()) => debug!(
                path = %self.path.display(),
                entries = snapshot.entries.len(),
                "Saved rollback snapshot"
            ),
            Err(e) => warn!("Rollback snapshot not saved, this put cannot be rolled back: {:#}", e),
        }
    }

    fn load(&self) -> Option<RollbackSnapshot> {
        let snapshot = match self.try_load() {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                warn!("Ignoring unreadable rollback snapshot: {:#}", e);
                return None;
            }
        };

        if snapshot.is_expired(Utc::now(), self.ttl) {
            info!(
                captured_at = %snapshot.captured_at,
                "Rollback snapshot is older than {} days, discarding",
                self.ttl.num_days()
            );
            self.clear();
            return None;
        }

        Some(snapshot)
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Cleared rollback snapshot"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove rollback snapshot {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}
