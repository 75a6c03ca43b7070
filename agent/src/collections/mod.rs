//! Collection derivation and reconciliation
//!
//! Flow for one library:
//!
//! 1. [rules] map each [Item] to zero or more group keys
//! 2. [builder] aggregates items per collection name and drops undersized groups
//! 3. [reconciler] diffs the candidates against the server's collections
//! 4. [executor] applies the resulting ops in order
//!
//! Steps 1-3 are pure and synchronous. Only the executor touches the server.

pub mod builder;
pub mod error;
pub mod executor;
pub mod item;
pub mod reconciler;
pub mod report;
pub mod rules;

pub use builder::{CandidateGroup, CandidateSet, build, build_candidates};
pub use error::{CollectionError, MissingAttribute};
pub use executor::{Applied, OpOutcome, execute};
pub use item::{Item, ItemId, MediaKind};
pub use reconciler::{CollectionId, ReconcileOp, ReconcilePlan, RemoteCollection, reconcile};
pub use report::{MaintenanceReport, RunSummary};
pub use rules::{GroupKey, Rule, RuleId, RuleSet};
