//! # Rollback Executor
//!
//! Reverts the most recent put from its snapshot:
//!
//! - `Created` entries are deleted (already gone counts as reverted)
//! - `Updated` entries are overwritten with their prior value, type,
//!   description and key, and their prior tag set is restored
//!
//! The snapshot is cleared only when every entry reverted. After a partial
//! failure it stays in place and the rollback can be run again; replaying is
//! safe because both kinds of revert are idempotent.

use super::{RollbackSnapshot, RollbackStateStore, SnapshotAction, SnapshotEntry};
use crate::config::SyncConfig;
use crate::controller::confirm::ConfirmationProvider;
use crate::error::{StoreError, SyncError};
use crate::parameter::display_value;
use crate::provider::{write_parameter, ParameterStore};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

/// Outcome of a rollback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    /// The operator declined; nothing was touched
    pub cancelled: bool,
}

impl RollbackResult {
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

pub struct RollbackExecutor<'a> {
    store: &'a dyn ParameterStore,
    state: &'a dyn RollbackStateStore,
    confirm: &'a dyn ConfirmationProvider,
    config: &'a SyncConfig,
    region: &'a str,
}

impl std::fmt::Debug for RollbackExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackExecutor")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl<'a> RollbackExecutor<'a> {
    /// `region` is the region `store` writes to; it must match the snapshot's
    pub fn new(
        store: &'a dyn ParameterStore,
        state: &'a dyn RollbackStateStore,
        confirm: &'a dyn ConfirmationProvider,
        config: &'a SyncConfig,
        region: &'a str,
    ) -> Self {
        Self {
            store,
            state,
            confirm,
            config,
            region,
        }
    }

    /// Revert the most recent put
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoRollbackHistory`] when there is no usable snapshot
    /// - [`SyncError::RegionMismatch`] when the snapshot targets another region
    /// - [`SyncError::Confirmation`] when the prompt cannot be shown
    ///
    /// Per-entry failures are reported in the result, not as an error.
    pub async fn rollback(&self) -> Result<RollbackResult, SyncError> {
        let snapshot = self.state.load().ok_or(SyncError::NoRollbackHistory)?;

        if snapshot.region != self.region {
            return Err(SyncError::RegionMismatch {
                snapshot: snapshot.region.clone(),
                target: self.region.to_string(),
            });
        }

        if snapshot.is_empty() {
            info!("Rollback snapshot has no entries, nothing to revert");
            self.state.clear();
            return Ok(RollbackResult::default());
        }

        log_preview(&snapshot);

        let prompt = format!(
            "Roll back {} parameter(s) in {} ({} delete, {} restore)?",
            snapshot.entries.len(),
            snapshot.region,
            snapshot.created_count(),
            snapshot.updated_count()
        );
        let answer = self.confirm.confirm(&prompt).await?;
        if !answer.is_accepted() {
            info!("Rollback cancelled ({:?}), no changes applied", answer);
            return Ok(RollbackResult::cancelled());
        }

        let mut result = RollbackResult::default();
        for batch in snapshot.entries.chunks(self.config.batch_size()) {
            let outcomes = join_all(batch.iter().map(|entry| async move {
                (entry, self.revert(entry).await)
            }))
            .await;

            for (entry, outcome) in outcomes {
                match outcome {
                    Ok(()) => result.success += 1,
                    Err(e) => {
                        error!(parameter = entry.name.as_str(), "Rollback failed: {}", e);
                        result.failed += 1;
                        result
                            .errors
                            .push(format!("Failed to roll back {}: {}", entry.name, e));
                    }
                }
            }
        }

        if result.failed == 0 {
            self.state.clear();
            info!("Rolled back {} parameter(s)", result.success);
        } else {
            warn!(
                "Rollback incomplete: {} reverted, {} failed; snapshot kept so it can be retried",
                result.success, result.failed
            );
        }

        Ok(result)
    }

    async fn revert(&self, entry: &SnapshotEntry) -> Result<(), StoreError> {
        match entry.action {
            SnapshotAction::Created => match self.store.delete(&entry.name).await {
                Ok(()) => {
                    debug!(parameter = entry.name.as_str(), "Deleted created parameter");
                    Ok(())
                }
                Err(StoreError::NotFound(_)) => {
                    debug!(parameter = entry.name.as_str(), "Already absent");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            SnapshotAction::Updated => {
                let prior = entry.prior_parameter().ok_or_else(|| {
                    StoreError::Validation("snapshot entry has no prior value".to_string())
                })?;
                if entry.prior_tags.is_some() {
                    write_parameter(self.store, &prior, true).await?;
                } else {
                    self.store.put(&prior, true).await?;
                }
                debug!(parameter = entry.name.as_str(), "Restored prior state");
                Ok(())
            }
        }
    }
}

fn log_preview(snapshot: &RollbackSnapshot) {
    info!(
        captured_at = %snapshot.captured_at,
        region = snapshot.region.as_str(),
        "Rollback will delete {} and restore {} parameter(s)",
        snapshot.created_count(),
        snapshot.updated_count()
    );
    for entry in &snapshot.entries {
        match (&entry.action, entry.prior_value.as_deref()) {
            (SnapshotAction::Created, _) => info!("  - delete  {}", entry.name),
            (SnapshotAction::Updated, Some(value)) => info!(
                "  ~ restore {} = {}",
                entry.name,
                display_value(value, entry.prior_type.unwrap_or_default())
            ),
            (SnapshotAction::Updated, None) => info!("  ~ restore {}", entry.name),
        }
    }
}
