//! Common test utilities for the sync and rollback integration tests
//!
//! Provides a scripted confirmation provider, a sleeper that records waits
//! instead of sleeping, and helpers wiring a reconciler and rollback executor
//! onto an in-memory store and a temporary state directory.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use async_trait::async_trait;
use param_sync::config::{StoreTarget, SyncConfig};
use param_sync::controller::confirm::{Confirmation, ConfirmationProvider};
use param_sync::controller::reconciler::{Reconciler, SyncResult};
use futures::stream::BoxStream;
use param_sync::controller::rollback::{
    FileRollbackStore, RollbackExecutor, RollbackResult, RollbackSnapshot, RollbackStateStore,
};
use param_sync::error::{StoreError, SyncError};
use param_sync::parameter::{Parameter, RemoteParameter, Tag};
use param_sync::provider::memory::InMemoryParameterStore;
use param_sync::provider::{ParameterStore, Sleeper};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const REGION: &str = "us-east-1";

/// Answers prompts from a fixed script, accepting once the script runs out
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    answers: Mutex<VecDeque<Confirmation>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn new(answers: impl IntoIterator<Item = Confirmation>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmationProvider for ScriptedConfirmation {
    async fn confirm(&self, prompt: &str) -> std::io::Result<Confirmation> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Confirmation::Accepted))
    }
}

/// Records every requested wait and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutEvent {
    Started(String),
    Finished(String),
}

/// In-memory store whose puts take a little while and record their timing
#[derive(Debug, Default)]
pub struct TrackingStore {
    pub inner: InMemoryParameterStore,
    events: Mutex<Vec<PutEvent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    puts_started: Arc<AtomicUsize>,
}

impl TrackingStore {
    pub fn new(inner: InMemoryParameterStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<PutEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Position of the event in the recorded order
    pub fn position(&self, event: &PutEvent) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{event:?} not recorded"))
    }
}

#[async_trait]
impl ParameterStore for TrackingStore {
    async fn get(&self, name: &str) -> Result<RemoteParameter, StoreError> {
        self.inner.get(name).await
    }

    async fn put(&self, parameter: &Parameter, overwrite: bool) -> Result<(), StoreError> {
        self.puts_started.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(PutEvent::Started(parameter.name.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = self.inner.put(parameter, overwrite).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(PutEvent::Finished(parameter.name.clone()));
        result
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.inner.delete(name).await
    }

    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<RemoteParameter, StoreError>> {
        self.inner.list_by_prefix(prefix, recursive)
    }

    async fn get_tags(&self, name: &str) -> Vec<Tag> {
        self.inner.get_tags(name).await
    }

    async fn set_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        self.inner.set_tags(name, tags).await
    }
}

/// Keeps the snapshot in memory and notes how many puts had started at each save
#[derive(Debug)]
pub struct SnapshotSpy {
    puts_started: Arc<AtomicUsize>,
    puts_at_save: Mutex<Vec<usize>>,
    saved: Mutex<Vec<RollbackSnapshot>>,
}

impl SnapshotSpy {
    pub fn watching(store: &TrackingStore) -> Self {
        Self {
            puts_started: Arc::clone(&store.puts_started),
            puts_at_save: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn puts_at_save(&self) -> Vec<usize> {
        self.puts_at_save.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<RollbackSnapshot> {
        self.saved.lock().unwrap().clone()
    }
}

impl RollbackStateStore for SnapshotSpy {
    fn save(&self, snapshot: &RollbackSnapshot) {
        self.puts_at_save
            .lock()
            .unwrap()
            .push(self.puts_started.load(Ordering::SeqCst));
        self.saved.lock().unwrap().push(snapshot.clone());
    }

    fn load(&self) -> Option<RollbackSnapshot> {
        self.saved.lock().unwrap().last().cloned()
    }

    fn clear(&self) {
        self.saved.lock().unwrap().clear();
    }

    fn exists(&self) -> bool {
        !self.saved.lock().unwrap().is_empty()
    }
}

/// Temporary state directory plus the config pointing at it
pub struct Harness {
    pub dir: TempDir,
    pub config: SyncConfig,
    pub state: FileRollbackStore,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig {
            region: Some(REGION.to_string()),
            state_dir: dir.path().to_path_buf(),
            ..SyncConfig::default()
        };
        let state = FileRollbackStore::new(&config.state_dir, config.snapshot_ttl);
        Self { dir, config, state }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.write_concurrency = batch_size;
        self
    }

    pub fn target(&self) -> StoreTarget {
        StoreTarget {
            region: REGION.to_string(),
            profile: None,
        }
    }

    pub async fn sync(
        &self,
        store: &dyn ParameterStore,
        confirm: &dyn ConfirmationProvider,
        desired: &[Parameter],
        dry_run: bool,
    ) -> Result<SyncResult, SyncError> {
        Reconciler::new(store, &self.state, confirm, &self.config)
            .sync(desired, &self.target(), dry_run)
            .await
    }

    pub async fn put(&self, store: &dyn ParameterStore, desired: &[Parameter]) -> SyncResult {
        self.sync(store, &ScriptedConfirmation::accepting(), desired, false)
            .await
            .unwrap()
    }

    pub async fn rollback_with(
        &self,
        store: &dyn ParameterStore,
        confirm: &dyn ConfirmationProvider,
    ) -> Result<RollbackResult, SyncError> {
        RollbackExecutor::new(store, &self.state, confirm, &self.config, REGION)
            .rollback()
            .await
    }

    pub async fn rollback(&self, store: &dyn ParameterStore) -> Result<RollbackResult, SyncError> {
        self.rollback_with(store, &ScriptedConfirmation::accepting())
            .await
    }
}
