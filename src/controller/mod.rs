//! # Controller
//!
//! Core sync logic.
//!
//! - `confirm`: operator confirmation before any write
//! - `diff`: classifies desired parameters as create/update/skip
//! - `export`: reads a path prefix back into parameters
//! - `reconciler`: applies a diff in batches and captures rollback state
//! - `rollback`: single-step undo of the last put

pub mod confirm;
pub mod diff;
pub mod export;
pub mod reconciler;
pub mod rollback;
