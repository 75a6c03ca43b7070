//! Reconciler
//!
//! Diffs candidate groups against the collections already on the server and
//! emits the operations needed to bring them in line. Nothing is executed
//! here; see [executor](super::executor).
//!
//! Collections on the server without a matching candidate are never touched.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use super::builder::CandidateGroup;
use super::error::CollectionError;
use super::item::ItemId;
use super::rules::RuleId;

/// Server-side identifier of a collection
pub type CollectionId = String;

/// A collection as it currently exists on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCollection {
    pub id: CollectionId,
    pub name: String,
    pub items: BTreeSet<ItemId>,
}

/// One proposed mutation. Item lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOp {
    Create {
        name: String,
        items: Vec<ItemId>,
    },
    AddItems {
        collection_id: CollectionId,
        name: String,
        items: Vec<ItemId>,
    },
    RemoveItems {
        collection_id: CollectionId,
        name: String,
        items: Vec<ItemId>,
    },
    NoOp {
        name: String,
    },
}

impl ReconcileOp {
    /// Collection name the op targets
    pub fn name(&self) -> &str {
        match self {
            ReconcileOp::Create { name, .. }
            | ReconcileOp::AddItems { name, .. }
            | ReconcileOp::RemoveItems { name, .. }
            | ReconcileOp::NoOp { name } => name,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, ReconcileOp::NoOp { .. })
    }
}

impl std::fmt::Display for ReconcileOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileOp::Create { name, items } => {
                write!(f, "create '{}' with {} items", name, items.len())
            }
            ReconcileOp::AddItems { name, items, .. } => {
                write!(f, "add {} items to '{}'", items.len(), name)
            }
            ReconcileOp::RemoveItems { name, items, .. } => {
                write!(f, "remove {} items from '{}'", items.len(), name)
            }
            ReconcileOp::NoOp { name } => write!(f, "leave '{}' unchanged", name),
        }
    }
}

/// Ordered operations plus any warnings raised while planning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub ops: Vec<ReconcileOp>,
    pub warnings: Vec<CollectionError>,
}

impl ReconcilePlan {
    /// True when the server already matches every candidate
    pub fn is_settled(&self) -> bool {
        self.ops.iter().all(ReconcileOp::is_noop)
    }
}

/// Compare candidates with existing collections by name.
///
/// Candidates are processed in the order given; when two candidates from
/// different rules share a name, the first one wins and an
/// [`CollectionError::AmbiguousCollectionName`] warning is recorded.
pub fn reconcile(candidates: &[CandidateGroup], existing: &[RemoteCollection]) -> ReconcilePlan {
    let mut lookup: HashMap<&str, &RemoteCollection> = HashMap::with_capacity(existing.len());
    for collection in existing {
        if lookup.contains_key(collection.name.as_str()) {
            warn!(
                name = %collection.name,
                collection_id = %collection.id,
                "Duplicate collection name on server; using the first one listed"
            );
            continue;
        }
        lookup.insert(collection.name.as_str(), collection);
    }

    let mut plan = ReconcilePlan::default();
    let mut claimed: HashMap<&str, RuleId> = HashMap::new();

    for candidate in candidates {
        if let Some(&kept) = claimed.get(candidate.name.as_str()) {
            if kept != candidate.rule {
                let warning = CollectionError::AmbiguousCollectionName {
                    name: candidate.name.clone(),
                    kept,
                    dropped: candidate.rule,
                };
                warn!(warning = %warning, "Ambiguous collection name");
                plan.warnings.push(warning);
            } else {
                debug!(name = %candidate.name, "Skipping repeated candidate");
            }
            continue;
        }
        claimed.insert(candidate.name.as_str(), candidate.rule);

        let Some(remote) = lookup.get(candidate.name.as_str()) else {
            plan.ops.push(ReconcileOp::Create {
                name: candidate.name.clone(),
                items: candidate.items.iter().cloned().collect(),
            });
            continue;
        };

        let to_add: Vec<ItemId> = candidate.items.difference(&remote.items).cloned().collect();
        let to_remove: Vec<ItemId> = remote.items.difference(&candidate.items).cloned().collect();

        if to_add.is_empty() && to_remove.is_empty() {
            plan.ops.push(ReconcileOp::NoOp {
                name: candidate.name.clone(),
            });
            continue;
        }
        if !to_add.is_empty() {
            plan.ops.push(ReconcileOp::AddItems {
                collection_id: remote.id.clone(),
                name: candidate.name.clone(),
                items: to_add,
            });
        }
        if !to_remove.is_empty() {
            plan.ops.push(ReconcileOp::RemoveItems {
                collection_id: remote.id.clone(),
                name: candidate.name.clone(),
                items: to_remove,
            });
        }
    }

    plan
}
