//! # Provider Modules
//!
//! The remote parameter store seam and its implementations.
//!
//! - `aws`: AWS Systems Manager Parameter Store
//! - `memory`: in-process store used by tests and local experiments
//! - `retry`: throttling retry decorator shared by every write path

use crate::error::StoreError;
use crate::parameter::{Parameter, RemoteParameter, Tag};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod aws;
pub mod memory;
pub mod retry;

pub use retry::{RetryPolicy, RetryingStore, Sleeper, TokioSleeper};

/// Read/write access to a remote key-value parameter store
///
/// Implementations report errors as [`StoreError`]; a missing key is
/// `StoreError::NotFound`, which callers treat as an ordinary outcome.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch the full current state of a parameter, including description,
    /// encryption key and tags
    async fn get(&self, name: &str) -> Result<RemoteParameter, StoreError>;

    /// Write a parameter
    ///
    /// With `overwrite = false` the store itself rejects an existing name
    /// (`StoreError::AlreadyExists`) and the parameter's tags are attached in
    /// the same call. With `overwrite = true` tags are left untouched because
    /// the underlying write API does not accept them on update; use
    /// [`ParameterStore::set_tags`] (or [`write_parameter`]) for that.
    async fn put(&self, parameter: &Parameter, overwrite: bool) -> Result<(), StoreError>;

    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Lazily list parameters under a path prefix, fetching pages on demand
    ///
    /// The stream is not restartable; calling again starts from the first page.
    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<RemoteParameter, StoreError>>;

    /// Best-effort tag read; any failure yields an empty set
    async fn get_tags(&self, name: &str) -> Vec<Tag>;

    /// Replace the tag set of an existing parameter
    async fn set_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError>;
}

/// Write a parameter including its tag set
///
/// Creation attaches tags in the write itself; an overwrite is followed by a
/// separate tagging call.
pub async fn write_parameter(
    store: &dyn ParameterStore,
    parameter: &Parameter,
    overwrite: bool,
) -> Result<(), StoreError> {
    store.put(parameter, overwrite).await?;
    if overwrite {
        store.set_tags(&parameter.name, &parameter.tags).await?;
    }
    Ok(())
}
