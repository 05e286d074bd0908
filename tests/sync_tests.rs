//! # Sync Integration Tests
//!
//! Drives the reconciler end to end against the in-memory store:
//! - create / skip / update scenarios
//! - idempotence of a repeated put
//! - dry runs never writing
//! - declined confirmation writing nothing
//! - partial batch failure and snapshot pruning
//! - batch concurrency and ordering, snapshot saved before the first write

mod common;

use common::{Harness, PutEvent, ScriptedConfirmation, SnapshotSpy, TrackingStore};
use param_sync::controller::confirm::Confirmation;
use param_sync::controller::reconciler::Reconciler;
use param_sync::controller::rollback::{RollbackStateStore, SnapshotAction};
use param_sync::error::StoreError;
use param_sync::parameter::{Parameter, ParameterType, Tag};
use param_sync::provider::memory::{InMemoryParameterStore, Operation};
use param_sync::provider::ParameterStore;

#[tokio::test]
async fn test_new_parameter_is_created() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::new();
    let desired = vec![Parameter::new("/app/x", "v1")];

    let report = param_sync::controller::diff::compute_diff(&store, &desired, 3).await;
    assert_eq!(report.summary.create, 1);

    let result = harness.put(&store, &desired).await;

    assert_eq!(result.success, 1);
    assert_eq!(result.updated, 0);
    assert_eq!(result.failed, 0);
    assert_eq!(store.get("/app/x").await.unwrap().parameter.value, "v1");
}

#[tokio::test]
async fn test_identical_parameter_is_skipped() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/x", "v1")]);
    let confirm = ScriptedConfirmation::accepting();

    let result = harness
        .sync(&store, &confirm, &[Parameter::new("/app/x", "v1")], false)
        .await
        .unwrap();

    assert_eq!(
        (result.success, result.updated, result.skipped, result.failed),
        (0, 0, 1, 0)
    );
    // Nothing to apply: no prompt, no write, no snapshot
    assert!(confirm.prompts().is_empty());
    assert_eq!(store.total_calls(Operation::Put), 0);
    assert!(!harness.state.exists());
}

#[tokio::test]
async fn test_value_change_is_updated_and_snapshotted() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/x", "v1")]);

    let result = harness.put(&store, &[Parameter::new("/app/x", "v2")]).await;

    assert_eq!(result.success, 1);
    assert_eq!(result.updated, 1);
    assert_eq!(store.parameter("/app/x").unwrap().value, "v2");
    assert_eq!(store.version("/app/x"), Some(2));

    let snapshot = harness.state.load().unwrap();
    assert_eq!(snapshot.region, common::REGION);
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].action, SnapshotAction::Updated);
    assert_eq!(snapshot.entries[0].prior_value.as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_second_put_is_all_skip() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/b", "old")]);
    let desired = vec![
        Parameter::new("/app/a", "1").with_tag("env", "dev"),
        Parameter::new("/app/b", "new").with_description("second"),
        Parameter::new("/app/c", "x,y").with_type(ParameterType::List),
        Parameter::new("/app/d", "secret")
            .with_type(ParameterType::Encrypted)
            .with_key_id("alias/app"),
    ];

    let first = harness.put(&store, &desired).await;
    assert_eq!(first.success, 4);

    let second = harness.put(&store, &desired).await;
    assert_eq!(
        (second.success, second.updated, second.skipped, second.failed),
        (0, 0, 4, 0)
    );
}

#[tokio::test]
async fn test_tags_replaced_on_update() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/x", "v1")
        .with_tag("env", "dev")
        .with_tag("owner", "old-team")]);

    let desired = Parameter::new("/app/x", "v1")
        .with_tag("env", "prod")
        .with_tag("team", "core");
    let result = harness.put(&store, &[desired]).await;

    assert_eq!(result.updated, 1);
    let mut tags = store.parameter("/app/x").unwrap().tags;
    tags.sort();
    assert_eq!(tags, vec![Tag::new("env", "prod"), Tag::new("team", "core")]);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/x", "v1")]);
    let confirm = ScriptedConfirmation::accepting();
    let desired = vec![Parameter::new("/app/x", "v2"), Parameter::new("/app/y", "new")];

    let result = harness.sync(&store, &confirm, &desired, true).await.unwrap();

    assert!(result.dry_run);
    assert_eq!(result.success, 2);
    assert_eq!(result.failed, 0);
    assert!(confirm.prompts().is_empty());
    assert_eq!(store.total_calls(Operation::Put), 0);
    assert_eq!(store.parameter("/app/x").unwrap().value, "v1");
    assert!(!store.contains("/app/y"));
    assert!(!harness.state.exists());
}

#[tokio::test]
async fn test_dry_run_reports_problems() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::new();
    store.fail_next(
        Operation::Get,
        "/app/denied",
        StoreError::AccessDenied("ssm:GetParameter".to_string()),
        2,
    );
    let desired = vec![
        Parameter::new("/app/ok", "v1"),
        Parameter::new("/app/denied", "v1"),
    ];

    let result = harness
        .sync(&store, &ScriptedConfirmation::accepting(), &desired, true)
        .await
        .unwrap();

    assert_eq!(result.success, 1);
    assert_eq!(result.failed, 1);
    assert!(result.errors[0].starts_with("Failed to create /app/denied"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_declined_confirmation_applies_nothing() {
    for answer in [
        Confirmation::Declined,
        Confirmation::TimedOut,
        Confirmation::Interrupted,
    ] {
        let harness = Harness::new();
        let store = InMemoryParameterStore::new();
        let confirm = ScriptedConfirmation::new([answer]);

        let result = harness
            .sync(&store, &confirm, &[Parameter::new("/app/x", "v1")], false)
            .await
            .unwrap();

        assert!(result.cancelled, "{answer:?}");
        assert_eq!(result.success + result.failed, 0);
        assert!(store.is_empty());
        assert!(!harness.state.exists());
    }
}

#[tokio::test]
async fn test_partial_failure_continues_and_prunes_snapshot() {
    let harness = Harness::new().with_batch_size(2);
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/b", "old")]);
    store.fail_next(
        Operation::Put,
        "/app/a",
        StoreError::AccessDenied("ssm:PutParameter".to_string()),
        1,
    );
    let desired = vec![
        Parameter::new("/app/a", "1"),
        Parameter::new("/app/b", "new"),
        Parameter::new("/app/c", "3"),
    ];

    let result = harness.put(&store, &desired).await;

    assert_eq!(result.success, 2);
    assert_eq!(result.updated, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to create /app/a:"));
    assert!(!store.contains("/app/a"));
    assert!(store.contains("/app/c"));

    // Only writes that happened are left to undo
    let snapshot = harness.state.load().unwrap();
    let names: Vec<&str> = snapshot.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["/app/b", "/app/c"]);
}

#[tokio::test]
async fn test_all_writes_failing_clears_snapshot() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::new();
    store.fail_next(
        Operation::Put,
        "/app/x",
        StoreError::AccessDenied("ssm:PutParameter".to_string()),
        1,
    );

    let result = harness.put(&store, &[Parameter::new("/app/x", "v1")]).await;

    assert_eq!(result.failed, 1);
    assert!(!harness.state.exists());
}

#[tokio::test]
async fn test_invalid_parameter_fails_without_write() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::new();
    let desired = vec![Parameter::new("/app/x", "v1").with_tag("env", "dev#1")];

    let result = harness.put(&store, &desired).await;

    assert_eq!(result.failed, 1);
    assert_eq!(store.total_calls(Operation::Put), 0);
}

#[tokio::test]
async fn test_lookup_failure_surfaces_at_write_time() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([Parameter::new("/app/x", "v0")]);
    store.fail_next(
        Operation::Get,
        "/app/x",
        StoreError::AccessDenied("ssm:GetParameter".to_string()),
        1,
    );

    let result = harness.put(&store, &[Parameter::new("/app/x", "v1")]).await;

    // Classified as create, then rejected by the create-only write
    assert_eq!(result.failed, 1);
    assert!(result.errors[0].contains("already exists"), "{:?}", result.errors);
    assert_eq!(store.parameter("/app/x").unwrap().value, "v0");
}

#[tokio::test]
async fn test_tag_failure_after_overwrite_keeps_rollback_entry() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([
        Parameter::new("/app/x", "v1").with_tag("env", "dev")
    ]);
    store.fail_next(
        Operation::SetTags,
        "/app/x",
        StoreError::AccessDenied("ssm:AddTagsToResource".to_string()),
        1,
    );

    let result = harness
        .put(&store, &[Parameter::new("/app/x", "v2").with_tag("env", "prod")])
        .await;

    assert_eq!(result.failed, 1);
    assert!(result.errors[0].contains("tags not updated"), "{:?}", result.errors);
    assert_eq!(store.parameter("/app/x").unwrap().value, "v2");

    // The value was overwritten, so the prior state must stay recoverable
    let snapshot = harness.state.load().unwrap();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].prior_value.as_deref(), Some("v1"));

    harness.rollback(&store).await.unwrap();
    assert_eq!(
        store.parameter("/app/x"),
        Some(Parameter::new("/app/x", "v1").with_tag("env", "dev"))
    );
}

#[tokio::test]
async fn test_cleared_description_is_idempotent() {
    let harness = Harness::new();
    let store = InMemoryParameterStore::with_parameters([
        Parameter::new("/app/x", "v1").with_description("old text")
    ]);
    let desired = vec![Parameter::new("/app/x", "v1")];

    let first = harness.put(&store, &desired).await;
    assert_eq!(first.updated, 1);
    assert_eq!(store.parameter("/app/x").unwrap().description, "");

    let second = harness.put(&store, &desired).await;
    assert_eq!((second.success, second.skipped), (0, 1));
}

fn numbered(count: usize) -> Vec<Parameter> {
    (1..=count)
        .map(|i| Parameter::new(format!("/app/p{i}"), "v"))
        .collect()
}

#[tokio::test]
async fn test_batches_run_concurrently_and_in_order() {
    let harness = Harness::new().with_batch_size(2);
    let store = TrackingStore::new(InMemoryParameterStore::new());
    let desired = numbered(5);

    let result = harness.put(&store, &desired).await;

    assert_eq!(result.success, 5);
    assert_eq!(store.max_in_flight(), 2);

    let started = |p: &Parameter| store.position(&PutEvent::Started(p.name.clone()));
    let finished = |p: &Parameter| store.position(&PutEvent::Finished(p.name.clone()));
    let batches: Vec<&[Parameter]> = desired.chunks(2).collect();

    for batch in &batches {
        // Every write of a batch is issued before any of them completes
        let last_start = batch.iter().map(started).max().unwrap();
        let first_finish = batch.iter().map(finished).min().unwrap();
        assert!(last_start < first_finish, "{:?}", store.events());
    }
    for pair in batches.windows(2) {
        let previous_done = pair[0].iter().map(finished).max().unwrap();
        let next_start = pair[1].iter().map(started).min().unwrap();
        assert!(previous_done < next_start, "{:?}", store.events());
    }
}

#[tokio::test]
async fn test_default_batch_size_writes_sequentially() {
    let harness = Harness::new();
    let store = TrackingStore::new(InMemoryParameterStore::new());

    let result = harness.put(&store, &numbered(3)).await;

    assert_eq!(result.success, 3);
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test]
async fn test_snapshot_saved_before_first_write() {
    let harness = Harness::new().with_batch_size(3);
    let store = TrackingStore::new(InMemoryParameterStore::with_parameters([
        Parameter::new("/app/p1", "old"),
    ]));
    let spy = SnapshotSpy::watching(&store);
    let confirm = ScriptedConfirmation::accepting();

    let result = Reconciler::new(&store, &spy, &confirm, &harness.config)
        .sync(&numbered(3), &harness.target(), false)
        .await
        .unwrap();

    assert_eq!(result.success, 3);
    assert_eq!(spy.puts_at_save(), vec![0]);
    let snapshot = &spy.saved()[0];
    assert_eq!(snapshot.entries.len(), 3);
    assert_eq!(snapshot.updated_count(), 1);
    assert_eq!(snapshot.created_count(), 2);
}
