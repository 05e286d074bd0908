//! # Reconciler Types
//!
//! Result of a sync run.

/// Outcome of a sync or dry run
///
/// `success` counts every successful write (or passing check in a dry run);
/// `updated` is the subset of those that overwrote an existing parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub success: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    /// The operator declined or the prompt timed out; nothing was written
    pub cancelled: bool,
    pub dry_run: bool,
}

impl SyncResult {
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    /// Number of created parameters
    #[must_use]
    pub fn created(&self) -> usize {
        self.success - self.updated
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub(crate) fn record(&mut self, name: &str, verb: &str, is_update: bool, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => {
                self.success += 1;
                if is_update {
                    self.updated += 1;
                }
            }
            Err(e) => {
                self.failed += 1;
                self.errors.push(format!("Failed to {verb} {name}: {e}"));
            }
        }
    }
}
