//! # Diff Engine
//!
//! Classifies each desired parameter as `Create`, `Update` or `Skip` by
//! comparing it field by field with what the remote store holds.
//!
//! Compared fields: value (exact), type (exact), description (empty and unset
//! are equal), encryption key (empty and unset are equal) and the tag set
//! (order-independent).
//!
//! Changes come back in input order regardless of lookup completion order.

use crate::error::StoreError;
use crate::parameter::{normalize_optional, tags_equal, Parameter, ParameterType, RemoteParameter};
use crate::provider::ParameterStore;
use futures::{stream, StreamExt};
use tracing::{debug, warn};

/// Key Parameter Store reports for SecureStrings written without an explicit key
const DEFAULT_SSM_KEY_ALIAS: &str = "alias/aws/ssm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Skip,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Skip => "skip",
        }
    }
}

/// One classified desired parameter
#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeKind,
    pub desired: Parameter,
    pub existing: Option<RemoteParameter>,
    pub reason: String,
}

impl Change {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.kind != ChangeKind::Skip
    }

    /// One-line plan entry, e.g. `~ /app/db/password = ab****yz (value changed)`
    ///
    /// SecureString values are always masked.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let marker = match self.kind {
            ChangeKind::Create => '+',
            ChangeKind::Update => '~',
            ChangeKind::Skip => '=',
        };
        format!(
            "{marker} {} = {} ({})",
            self.desired.name,
            self.desired.display_value(),
            self.reason
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub create: usize,
    pub update: usize,
    pub skip: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub changes: Vec<Change>,
    pub summary: DiffSummary,
}

impl DiffReport {
    #[must_use]
    pub fn from_changes(changes: Vec<Change>) -> Self {
        let mut summary = DiffSummary::default();
        for change in &changes {
            match change.kind {
                ChangeKind::Create => summary.create += 1,
                ChangeKind::Update => summary.update += 1,
                ChangeKind::Skip => summary.skip += 1,
            }
        }
        Self { changes, summary }
    }

    /// True when at least one `Create` or `Update` exists
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.summary.create + self.summary.update > 0
    }

    /// `Create` and `Update` changes, in input order
    pub fn pending(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|change| change.is_pending())
    }
}

fn normalized_key_id(parameter: &Parameter) -> &str {
    let key_id = normalize_optional(parameter.key_id.as_deref());
    if parameter.parameter_type == ParameterType::Encrypted && key_id == DEFAULT_SSM_KEY_ALIAS {
        ""
    } else {
        key_id
    }
}

/// Names of the fields that differ between desired and existing state
#[must_use]
pub fn differing_fields(desired: &Parameter, existing: &Parameter) -> Vec<&'static str> {
    let mut fields = Vec::new();

    if desired.value != existing.value {
        fields.push("value");
    }
    if desired.parameter_type != existing.parameter_type {
        fields.push("type");
    }
    if desired.description.trim() != existing.description.trim() {
        fields.push("description");
    }
    if normalized_key_id(desired) != normalized_key_id(existing) {
        fields.push("encryption key");
    }
    if !tags_equal(&desired.tags, &existing.tags) {
        fields.push("tags");
    }

    fields
}

/// Classify a desired parameter given the outcome of its remote lookup
#[must_use]
pub fn classify(desired: &Parameter, lookup: Result<RemoteParameter, StoreError>) -> Change {
    match lookup {
        Ok(existing) => {
            let fields = differing_fields(desired, &existing.parameter);
            let (kind, reason) = if fields.is_empty() {
                (ChangeKind::Skip, "unchanged".to_string())
            } else {
                (ChangeKind::Update, format!("{} changed", fields.join(", ")))
            };
            Change {
                kind,
                desired: desired.clone(),
                existing: Some(existing),
                reason,
            }
        }
        Err(StoreError::NotFound(_)) => Change {
            kind: ChangeKind::Create,
            desired: desired.clone(),
            existing: None,
            reason: "does not exist".to_string(),
        },
        Err(e) => assume_create_on_lookup_failure(desired, &e),
    }
}

/// A lookup that fails for any reason other than "not found" is classified
/// as `Create`
///
/// A permission problem therefore surfaces when the create-only write is
/// rejected, not during the diff.
#[must_use]
pub fn assume_create_on_lookup_failure(desired: &Parameter, error: &StoreError) -> Change {
    warn!(
        parameter = desired.name.as_str(),
        "Lookup failed, treating parameter as new: {}",
        error
    );
    Change {
        kind: ChangeKind::Create,
        desired: desired.clone(),
        existing: None,
        reason: format!("lookup failed ({error}), assuming it does not exist"),
    }
}

/// Compute the change list for `desired` against `store`
///
/// Lookups run with up to `read_concurrency` in flight; the result keeps
/// input order.
pub async fn compute_diff(
    store: &dyn ParameterStore,
    desired: &[Parameter],
    read_concurrency: usize,
) -> DiffReport {
    let changes: Vec<Change> = stream::iter(desired)
        .map(|parameter| async move {
            let change = classify(parameter, store.get(&parameter.name).await);
            debug!(
                parameter = parameter.name.as_str(),
                kind = change.kind.as_str(),
                reason = change.reason.as_str(),
                "Classified parameter"
            );
            change
        })
        .buffered(read_concurrency.max(1))
        .collect()
        .await;

    DiffReport::from_changes(changes)
}
