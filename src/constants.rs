//! # Constants
//!
//! Shared constants used throughout the tool.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default number of concurrent writes per batch
/// Parameter Store enforces a strict per-second write quota, so writes are sequential by default
pub const DEFAULT_WRITE_CONCURRENCY: usize = 1;

/// Default number of concurrent reads for bulk operations (diff lookups, export)
pub const DEFAULT_READ_CONCURRENCY: usize = 3;

/// Maximum attempts for a throttled write (including the first attempt)
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 10;

/// Exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1500;

/// Exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;

/// Upper bound of the random jitter added to every backoff wait (milliseconds)
pub const DEFAULT_BACKOFF_JITTER_MS: u64 = 200;

/// How long the operator has to answer a confirmation prompt (seconds)
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

/// Age after which a rollback snapshot is discarded (days)
pub const SNAPSHOT_TTL_DAYS: i64 = 7;

/// Directory under the user's home holding local state
pub const STATE_DIR_NAME: &str = ".param-sync";

/// File name of the single rollback slot
pub const SNAPSHOT_FILE_NAME: &str = "last-operation.json";

/// Maximum number of data rows accepted from one CSV file
pub const MAX_CSV_ROWS: usize = 500;

/// Maximum parameter name length
pub const MAX_NAME_LENGTH: usize = 500;

/// Maximum parameter description length
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Maximum tag key length
pub const MAX_TAG_KEY_LENGTH: usize = 128;

/// Maximum tag value length
pub const MAX_TAG_VALUE_LENGTH: usize = 128;
