//! # Reconciler
//!
//! Drives a diff to completion against the remote store.
//!
//! ## Sync Flow
//!
//! 1. Compute the change list (see [`crate::controller::diff`])
//! 2. Stop early when every parameter is `Skip`
//! 3. Dry run: read-only checks per pending change, then stop
//! 4. Ask the operator to confirm
//! 5. Save the rollback snapshot
//! 6. Apply `Create`/`Update` changes in fixed-size batches
//! 7. Trim the snapshot down to the parameters whose value was written
//!
//! Per-parameter failures are collected into [`SyncResult::errors`]; they never
//! stop the remaining changes from being applied.

pub mod checks;
pub mod sync;
pub mod types;

pub use sync::Reconciler;
pub use types::SyncResult;
