//! Per-run summary of what the collection engine did

use std::collections::BTreeSet;

use serde::Serialize;

use super::builder::CandidateSet;
use super::executor::{Applied, OpOutcome};
use super::reconciler::{ReconcileOp, ReconcilePlan};

/// Counts and warnings for one library
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub library: String,
    pub dry_run: bool,
    pub candidates: usize,
    pub created: usize,
    /// Distinct collections that had items added or removed
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Item exclusions due to missing attributes, summed over rules
    pub skipped_items: usize,
    pub warnings: Vec<String>,
    /// Set when the library could not be processed at all
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(library: impl Into<String>, dry_run: bool) -> Self {
        Self {
            library: library.into(),
            dry_run,
            ..Default::default()
        }
    }

    /// Mark the library as not processed at all
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Record candidate statistics and planning warnings
    pub fn record_plan(&mut self, candidates: &CandidateSet, plan: &ReconcilePlan) {
        self.candidates = candidates.groups.len();
        self.skipped_items = candidates.skipped_total();
        self.warnings
            .extend(plan.warnings.iter().map(|w| w.to_string()));
    }

    /// Count ops as if they had all succeeded
    pub fn record_planned(&mut self, ops: &[ReconcileOp]) {
        let mut updated: BTreeSet<&str> = BTreeSet::new();
        for op in ops {
            match op {
                ReconcileOp::Create { .. } => self.created += 1,
                ReconcileOp::AddItems { name, .. } | ReconcileOp::RemoveItems { name, .. } => {
                    updated.insert(name.as_str());
                }
                ReconcileOp::NoOp { .. } => self.unchanged += 1,
            }
        }
        self.updated += updated.len();
    }

    /// Count executed ops
    pub fn record_outcomes(&mut self, outcomes: &[OpOutcome]) {
        let mut updated: BTreeSet<&str> = BTreeSet::new();
        for outcome in outcomes {
            match &outcome.result {
                Ok(Applied::Created(_)) => self.created += 1,
                Ok(Applied::Updated) => {
                    updated.insert(outcome.op.name());
                }
                Ok(Applied::Unchanged) => self.unchanged += 1,
                Err(e) => {
                    self.failed += 1;
                    self.warnings.push(e.to_string());
                }
            }
        }
        self.updated += updated.len();
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(error) = &self.error {
            return write!(
                f,
                "{}{}: failed ({})",
                self.library,
                if self.dry_run { " (dry run)" } else { "" },
                error
            );
        }
        write!(
            f,
            "{}{}: {} created, {} updated, {} unchanged, {} failed, {} skipped items, {} warnings",
            self.library,
            if self.dry_run { " (dry run)" } else { "" },
            self.created,
            self.updated,
            self.unchanged,
            self.failed,
            self.skipped_items,
            self.warnings.len()
        )
    }
}

/// Summaries for every library touched by one maintenance run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub libraries: Vec<RunSummary>,
    /// Problems not tied to a single library
    pub errors: Vec<String>,
}

impl MaintenanceReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.libraries.iter().all(RunSummary::is_success)
    }

    pub fn total_created(&self) -> usize {
        self.libraries.iter().map(|l| l.created).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.libraries.iter().map(|l| l.updated).sum()
    }

    pub fn total_unchanged(&self) -> usize {
        self.libraries.iter().map(|l| l.unchanged).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.libraries.iter().map(|l| l.failed).sum()
    }
}
