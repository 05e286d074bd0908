//! # param-sync
//!
//! Synchronizes configuration parameters between a CSV file and AWS Systems
//! Manager Parameter Store.
//!
//! ## Overview
//!
//! 1. **Read desired state** - parse and validate a CSV parameter file
//! 2. **Diff** - classify each parameter as create, update or skip against the live store
//! 3. **Sync** - apply creates and updates in bounded batches, retrying throttled writes
//! 4. **Rollback** - undo the most recent put from a locally saved snapshot
//!
//! Export, validation and template generation round out the command-line tool.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod observability;
pub mod parameter;
pub mod parameter_file;
pub mod provider;
pub mod validation;
