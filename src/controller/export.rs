//! # Export
//!
//! Reads every parameter under a path prefix back into [`Parameter`] values.
//!
//! The listing only carries name, value and type, so each listed name is
//! re-read in full (description, key, tags) with bounded concurrency.

use crate::error::StoreError;
use crate::parameter::Parameter;
use crate::provider::ParameterStore;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::info;

/// Fetch all parameters under `prefix`, in listing order
///
/// # Errors
///
/// Fails on the first listing or read error.
pub async fn export_parameters(
    store: &dyn ParameterStore,
    prefix: &str,
    recursive: bool,
    read_concurrency: usize,
) -> Result<Vec<Parameter>, StoreError> {
    let names: Vec<String> = store
        .list_by_prefix(prefix, recursive)
        .map_ok(|remote| remote.parameter.name)
        .try_collect()
        .await?;

    info!("Found {} parameter(s) under {}", names.len(), prefix);

    let parameters: Vec<Parameter> = stream::iter(names)
        .map(|name| async move { store.get(&name).await.map(|remote| remote.parameter) })
        .buffered(read_concurrency.max(1))
        .try_collect()
        .await?;

    Ok(parameters)
}
