//! # In-Memory Parameter Store
//!
//! Process-local implementation of [`ParameterStore`] that mirrors the
//! Parameter Store semantics this tool depends on: create-only writes,
//! store-assigned versions, tags only attached on creation, and best-effort
//! tag reads.
//!
//! Failures can be scripted per operation and parameter name, which is how
//! throttling, permission errors and partial batch failures are exercised in
//! tests without a network.

use crate::error::StoreError;
use crate::parameter::{Parameter, RemoteParameter, Tag};
use crate::provider::ParameterStore;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store operation, used to target scripted failures and call counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Put,
    Delete,
    List,
    GetTags,
    SetTags,
}

#[derive(Debug, Default)]
struct MemoryState {
    parameters: BTreeMap<String, RemoteParameter>,
    failures: HashMap<(Operation, String), VecDeque<StoreError>>,
    calls: HashMap<(Operation, String), usize>,
}

impl MemoryState {
    /// Count the call and pop a scripted failure, if any
    fn enter(&mut self, operation: Operation, name: &str) -> Result<(), StoreError> {
        let key = (operation, name.to_string());
        *self.calls.entry(key.clone()).or_insert(0) += 1;
        match self.failures.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    state: Mutex<MemoryState>,
}

impl InMemoryParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing parameters (version 1 each)
    #[must_use]
    pub fn with_parameters(parameters: impl IntoIterator<Item = Parameter>) -> Self {
        let store = Self::new();
        for parameter in parameters {
            store.insert(parameter);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a parameter directly, bypassing create-only checks
    /// and failure scripts
    pub fn insert(&self, parameter: Parameter) {
        let mut state = self.lock();
        let version = state
            .parameters
            .get(&parameter.name)
            .map_or(1, |existing| existing.version + 1);
        state.parameters.insert(
            parameter.name.clone(),
            RemoteParameter {
                parameter,
                version,
                last_modified_date: Some(Utc::now()),
                last_modified_user: Some("seed".to_string()),
            },
        );
    }

    /// Make the next `times` calls of `operation` on `name` fail with `error`
    pub fn fail_next(&self, operation: Operation, name: &str, error: StoreError, times: usize) {
        let mut state = self.lock();
        let queue = state
            .failures
            .entry((operation, name.to_string()))
            .or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Number of calls made for `operation` on `name`, failed ones included
    #[must_use]
    pub fn calls(&self, operation: Operation, name: &str) -> usize {
        self.lock()
            .calls
            .get(&(operation, name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of calls made for `operation` across all names
    #[must_use]
    pub fn total_calls(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|((op, _), _)| *op == operation)
            .map(|(_, count)| count)
            .sum()
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<Parameter> {
        self.lock()
            .parameters
            .get(name)
            .map(|remote| remote.parameter.clone())
    }

    #[must_use]
    pub fn version(&self, name: &str) -> Option<i64> {
        self.lock().parameters.get(name).map(|remote| remote.version)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().parameters.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().parameters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().parameters.is_empty()
    }
}

/// Match `name` against a path prefix the way `GetParametersByPath` does
fn under_prefix(name: &str, prefix: &str, recursive: bool) -> bool {
    let base = if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };

    match name.strip_prefix(base.as_str()) {
        Some(rest) if !rest.is_empty() => recursive || !rest.contains('/'),
        _ => false,
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get(&self, name: &str) -> Result<RemoteParameter, StoreError> {
        let mut state = self.lock();
        state.enter(Operation::Get, name)?;
        state
            .parameters
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn put(&self, parameter: &Parameter, overwrite: bool) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(Operation::Put, &parameter.name)?;

        let now = Some(Utc::now());
        match state.parameters.get_mut(&parameter.name) {
            Some(_) if !overwrite => Err(StoreError::AlreadyExists(parameter.name.clone())),
            Some(existing) => {
                let tags = std::mem::take(&mut existing.parameter.tags);
                existing.parameter = Parameter {
                    tags,
                    ..parameter.clone()
                };
                existing.version += 1;
                existing.last_modified_date = now;
                existing.last_modified_user = Some("param-sync".to_string());
                Ok(())
            }
            None => {
                state.parameters.insert(
                    parameter.name.clone(),
                    RemoteParameter {
                        parameter: parameter.clone(),
                        version: 1,
                        last_modified_date: now,
                        last_modified_user: Some("param-sync".to_string()),
                    },
                );
                Ok(())
            }
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(Operation::Delete, name)?;
        state
            .parameters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<RemoteParameter, StoreError>> {
        let mut state = self.lock();
        if let Err(e) = state.enter(Operation::List, prefix) {
            return Box::pin(stream::iter(vec![Err(e)]));
        }

        let matches: Vec<Result<RemoteParameter, StoreError>> = state
            .parameters
            .values()
            .filter(|remote| under_prefix(remote.name(), prefix, recursive))
            .cloned()
            .map(Ok)
            .collect();
        Box::pin(stream::iter(matches))
    }

    async fn get_tags(&self, name: &str) -> Vec<Tag> {
        let mut state = self.lock();
        if state.enter(Operation::GetTags, name).is_err() {
            return Vec::new();
        }
        state
            .parameters
            .get(name)
            .map(|remote| remote.parameter.tags.clone())
            .unwrap_or_default()
    }

    async fn set_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(Operation::SetTags, name)?;
        let existing = state
            .parameters
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        existing.parameter.tags = tags.to_vec();
        Ok(())
    }
}
