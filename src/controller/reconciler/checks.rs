//! # Dry-Run Checks
//!
//! Read-only verification of a would-be write. Nothing here mutates the
//! remote store.
//!
//! The encryption key check is shape-only; the key is not resolved against
//! the key service.

use crate::controller::diff::{Change, ChangeKind};
use crate::error::StoreError;
use crate::provider::ParameterStore;
use crate::validation::validate_parameter;

/// Check that `change` would succeed if applied
///
/// # Errors
///
/// Returns every problem found, joined into one message.
pub async fn check_change(store: &dyn ParameterStore, change: &Change) -> Result<(), String> {
    let mut problems = validate_parameter(&change.desired);

    let lookup = store.get(&change.desired.name).await;
    match (change.kind, lookup) {
        (ChangeKind::Create, Err(StoreError::NotFound(_)))
        | (ChangeKind::Update, Ok(_))
        | (ChangeKind::Skip, _) => {}
        (ChangeKind::Create, Ok(_)) => {
            problems.push("parameter already exists, create-only write would be rejected".to_string());
        }
        (ChangeKind::Update, Err(StoreError::NotFound(_))) => {
            problems.push("parameter no longer exists".to_string());
        }
        (_, Err(e)) => problems.push(format!("cannot read parameter: {e}")),
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}
