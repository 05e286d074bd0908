//! # Sync Executor
//!
//! Applies a change list to the remote store in fixed-size batches.
//!
//! Within a batch every write is issued concurrently; the next batch starts
//! only once the current one has fully completed. With the default batch size
//! of one, writes are strictly sequential.

use super::checks::check_change;
use super::types::SyncResult;
use crate::config::{StoreTarget, SyncConfig};
use crate::controller::confirm::ConfirmationProvider;
use crate::controller::diff::{compute_diff, Change, ChangeKind, DiffReport};
use crate::controller::rollback::{RollbackSnapshot, RollbackStateStore};
use crate::error::SyncError;
use crate::parameter::{tags_equal, Parameter};
use crate::provider::ParameterStore;
use crate::validation::validate_parameter;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Sync executor
///
/// Holds borrowed collaborators only; build one per invocation.
pub struct Reconciler<'a> {
    store: &'a dyn ParameterStore,
    state: &'a dyn RollbackStateStore,
    confirm: &'a dyn ConfirmationProvider,
    config: &'a SyncConfig,
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("batch_size", &self.config.batch_size())
            .field("read_concurrency", &self.config.read_concurrency)
            .finish_non_exhaustive()
    }
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn ParameterStore,
        state: &'a dyn RollbackStateStore,
        confirm: &'a dyn ConfirmationProvider,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            store,
            state,
            confirm,
            config,
        }
    }

    /// Classify `desired` against the remote store without writing anything
    pub async fn diff(&self, desired: &[Parameter]) -> DiffReport {
        compute_diff(self.store, desired, self.config.read_concurrency).await
    }

    /// Bring the remote store in line with `desired`
    ///
    /// `desired` is expected to be validated already; each parameter is still
    /// re-validated right before it is written.
    ///
    /// # Errors
    ///
    /// Only fails when the confirmation prompt cannot be shown. Everything
    /// else is reported through the returned [`SyncResult`].
    pub async fn sync(
        &self,
        desired: &[Parameter],
        target: &StoreTarget,
        dry_run: bool,
    ) -> Result<SyncResult, SyncError> {
        let report = self.diff(desired).await;
        log_plan(&report);

        let mut result = SyncResult {
            skipped: report.summary.skip,
            dry_run,
            ..SyncResult::default()
        };

        if !report.has_changes() {
            info!("Everything is up to date, nothing to do");
            return Ok(result);
        }

        let pending: Vec<&Change> = report.pending().collect();

        if dry_run {
            info!("Dry run: checking {} change(s), no writes", pending.len());
            self.run_batches(&pending, &mut result, |change| async move {
                check_change(self.store, change)
                    .await
                    .map_err(WriteFailure::Rejected)
            })
            .await;
            return Ok(result);
        }

        let prompt = format!(
            "Apply {} create(s) and {} update(s) to {}?",
            report.summary.create, report.summary.update, target.region
        );
        let answer = self.confirm.confirm(&prompt).await?;
        if !answer.is_accepted() {
            info!("Operation cancelled ({:?}), no changes applied", answer);
            return Ok(SyncResult::cancelled());
        }

        let mut snapshot = RollbackSnapshot::capture(pending.iter().copied(), target);
        self.state.save(&snapshot);

        let touched = self
            .run_batches(&pending, &mut result, |change| async move {
                self.apply(change).await
            })
            .await;

        if result.failed > 0 {
            snapshot.retain_names(&touched);
            if snapshot.is_empty() {
                self.state.clear();
            } else {
                self.state.save(&snapshot);
            }
        }

        if result.has_failures() {
            warn!(
                "Sync finished with failures: {} succeeded ({} updated), {} skipped, {} failed",
                result.success, result.updated, result.skipped, result.failed
            );
        } else {
            info!(
                "Sync complete: {} created, {} updated, {} skipped",
                result.created(),
                result.updated,
                result.skipped
            );
        }

        Ok(result)
    }

    /// Run `operation` over `changes` batch by batch, recording each outcome
    ///
    /// Returns the names whose remote state may have changed: every success
    /// plus every failure that happened after the value was written.
    async fn run_batches<'c, F, Fut>(
        &self,
        changes: &[&'c Change],
        result: &mut SyncResult,
        operation: F,
    ) -> HashSet<&'c str>
    where
        F: Fn(&'c Change) -> Fut,
        Fut: std::future::Future<Output = Result<(), WriteFailure>>,
    {
        let mut touched = HashSet::new();

        for (index, batch) in changes.chunks(self.config.batch_size()).enumerate() {
            debug!(batch = index + 1, size = batch.len(), "Starting batch");
            let outcomes = join_all(batch.iter().map(|change| {
                let fut = operation(*change);
                async move { (*change, fut.await) }
            }))
            .await;

            for (change, outcome) in outcomes {
                let name = change.desired.name.as_str();
                match &outcome {
                    Ok(()) => {
                        info!(parameter = name, "{} ok", change.kind.as_str());
                        touched.insert(name);
                    }
                    Err(failure) => {
                        error!(parameter = name, "{} failed: {}", change.kind.as_str(), failure);
                        if failure.touched_remote() {
                            touched.insert(name);
                        }
                    }
                }
                result.record(
                    name,
                    change.kind.as_str(),
                    change.kind == ChangeKind::Update,
                    outcome.map_err(|failure| failure.to_string()),
                );
            }
        }

        touched
    }

    async fn apply(&self, change: &Change) -> Result<(), WriteFailure> {
        let problems = validate_parameter(&change.desired);
        if !problems.is_empty() {
            return Err(WriteFailure::Rejected(problems.join("; ")));
        }

        let desired = &change.desired;
        match change.kind {
            ChangeKind::Create => self
                .store
                .put(desired, false)
                .await
                .map_err(|e| WriteFailure::Rejected(e.to_string())),
            ChangeKind::Update => {
                self.store
                    .put(desired, true)
                    .await
                    .map_err(|e| WriteFailure::Rejected(e.to_string()))?;

                let tags_changed = change
                    .existing
                    .as_ref()
                    .map_or(true, |existing| !tags_equal(&desired.tags, &existing.parameter.tags));
                if tags_changed {
                    self.store
                        .set_tags(&desired.name, &desired.tags)
                        .await
                        .map_err(|e| {
                            WriteFailure::AfterWrite(format!("value written, tags not updated: {e}"))
                        })?;
                }
                Ok(())
            }
            ChangeKind::Skip => Ok(()),
        }
    }
}

/// Why a single change did not complete
#[derive(Debug)]
enum WriteFailure {
    /// Nothing reached the remote store
    Rejected(String),
    /// The value was overwritten but a follow-up call failed
    AfterWrite(String),
}

impl WriteFailure {
    fn touched_remote(&self) -> bool {
        matches!(self, WriteFailure::AfterWrite(_))
    }
}

impl std::fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteFailure::Rejected(message) | WriteFailure::AfterWrite(message) => {
                f.write_str(message)
            }
        }
    }
}

fn log_plan(report: &DiffReport) {
    info!(
        "Plan: {} to create, {} to update, {} unchanged",
        report.summary.create, report.summary.update, report.summary.skip
    );
    for change in &report.changes {
        if change.is_pending() {
            info!("  {}", change.summary_line());
        } else {
            debug!("  {}", change.summary_line());
        }
    }
}
