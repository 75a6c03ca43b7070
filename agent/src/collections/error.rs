//! Error taxonomy for collection derivation and reconciliation
//!
//! None of these abort a run. Missing attributes are counted and the item is
//! left out of that rule's groups, ambiguous names are reported as warnings on
//! the reconcile plan, and collaborator failures are attached to the single
//! operation that failed.

use thiserror::Error;

use super::item::ItemId;
use super::rules::RuleId;

/// An item lacks a field the rule groups by
#[derive(Debug, Clone, PartialEq, Error)]
#[error("item {item_id} has no {attribute} for rule {rule}")]
pub struct MissingAttribute {
    pub item_id: ItemId,
    pub rule: RuleId,
    pub attribute: &'static str,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectionError {
    #[error(transparent)]
    MissingAttribute(#[from] MissingAttribute),

    /// Two rules produced a candidate with the same collection name
    #[error("collection name '{name}' is produced by both {kept} and {dropped}; keeping {kept}")]
    AmbiguousCollectionName {
        name: String,
        kept: RuleId,
        dropped: RuleId,
    },

    /// The media server failed or could not be reached for one operation
    #[error("media server unavailable during {operation}: {message}")]
    CollaboratorUnavailable { operation: String, message: String },
}

impl CollectionError {
    /// Wrap a client error for the operation it was raised by
    pub fn unavailable(operation: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::CollaboratorUnavailable {
            operation: operation.into(),
            message: format!("{:#}", err),
        }
    }
}
