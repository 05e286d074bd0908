//! # Rollback
//!
//! Single-step undo of the most recent `put`.
//!
//! - `store`: durable single-slot persistence of the snapshot
//! - `executor`: replays a snapshot against the remote store
//!
//! A snapshot is captured before the first write of a put batch. `Created`
//! entries only carry the name (rollback deletes them); `Updated` entries carry
//! everything needed to rewrite the previous state.

use crate::config::StoreTarget;
use crate::controller::diff::{Change, ChangeKind};
use crate::parameter::{Parameter, ParameterType, Tag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod executor;
pub mod store;

pub use executor::{RollbackExecutor, RollbackResult};
pub use store::{FileRollbackStore, RollbackStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub name: String,
    pub action: SnapshotAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_type: Option<ParameterType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_tags: Option<Vec<Tag>>,
}

impl SnapshotEntry {
    #[must_use]
    pub fn created(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: SnapshotAction::Created,
            prior_value: None,
            prior_type: None,
            prior_description: None,
            prior_key_id: None,
            prior_tags: None,
        }
    }

    #[must_use]
    pub fn updated(prior: &Parameter) -> Self {
        Self {
            name: prior.name.clone(),
            action: SnapshotAction::Updated,
            prior_value: Some(prior.value.clone()),
            prior_type: Some(prior.parameter_type),
            prior_description: Some(prior.description.clone()).filter(|d| !d.is_empty()),
            prior_key_id: prior.key_id.clone().filter(|k| !k.is_empty()),
            prior_tags: Some(prior.tags.clone()),
        }
    }

    /// Rebuild the parameter as it was before the put
    ///
    /// Returns `None` for `Created` entries and for `Updated` entries missing a
    /// prior value.
    #[must_use]
    pub fn prior_parameter(&self) -> Option<Parameter> {
        if self.action != SnapshotAction::Updated {
            return None;
        }
        Some(Parameter {
            name: self.name.clone(),
            value: self.prior_value.clone()?,
            parameter_type: self.prior_type.unwrap_or_default(),
            description: self.prior_description.clone().unwrap_or_default(),
            key_id: self.prior_key_id.clone(),
            tags: self.prior_tags.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackSnapshot {
    pub captured_at: DateTime<Utc>,
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    pub entries: Vec<SnapshotEntry>,
}

impl RollbackSnapshot {
    /// Capture the pre-write state of every `Create`/`Update` change
    pub fn capture<'a>(changes: impl IntoIterator<Item = &'a Change>, target: &StoreTarget) -> Self {
        let entries = changes
            .into_iter()
            .filter_map(|change| match (change.kind, &change.existing) {
                (ChangeKind::Create, _) => Some(SnapshotEntry::created(&change.desired.name)),
                (ChangeKind::Update, Some(existing)) => {
                    Some(SnapshotEntry::updated(&existing.parameter))
                }
                _ => None,
            })
            .collect();

        Self {
            captured_at: Utc::now(),
            region: target.region.clone(),
            profile: target.profile.clone(),
            entries,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that will be deleted on rollback
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.action == SnapshotAction::Created)
            .count()
    }

    /// Entries that will be restored on rollback
    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.action == SnapshotAction::Updated)
            .count()
    }

    /// Keep only entries whose name is in `names`
    pub fn retain_names(&mut self, names: &HashSet<&str>) {
        self.entries.retain(|entry| names.contains(entry.name.as_str()));
    }

    /// Whether the snapshot is older than `ttl` at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.captured_at) > ttl
    }
}
