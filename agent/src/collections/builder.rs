//! Candidate builder
//!
//! Runs every rule over a library's items, accumulates items per collection
//! name, drops groups below the rule's minimum size and returns the
//! survivors sorted by name.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::item::{Item, ItemId};
use super::rules::{Rule, RuleId};

/// A proposed collection, computed locally and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateGroup {
    pub name: String,
    pub items: BTreeSet<ItemId>,
    pub rule: RuleId,
}

/// Candidates for one library plus what was left out along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    /// Sorted by name; equal names keep build order
    pub groups: Vec<CandidateGroup>,
    /// Items excluded from a rule because they lacked its attribute
    pub skipped: BTreeMap<RuleId, usize>,
    /// Groups dropped for being below the rule's minimum size
    pub undersized: usize,
}

impl CandidateSet {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Build candidate groups for the given rules
pub fn build(items: &[Item], rules: &[Rule]) -> Vec<CandidateGroup> {
    build_candidates(items, rules).groups
}

/// Build candidate groups and keep per-rule statistics
pub fn build_candidates(items: &[Item], rules: &[Rule]) -> CandidateSet {
    let mut set = CandidateSet::default();

    for rule in rules {
        // Keyed by final name so two keys that render to the same name merge
        let mut by_name: BTreeMap<String, BTreeSet<ItemId>> = BTreeMap::new();

        for item in items {
            match rule.keys(item) {
                Ok(keys) => {
                    for key in keys {
                        by_name
                            .entry(rule.group_name(&key))
                            .or_default()
                            .insert(item.id.clone());
                    }
                }
                Err(missing) => {
                    debug!(
                        rule = %rule.id,
                        item_id = %item.id,
                        title = %item.title,
                        attribute = missing.attribute,
                        "Item excluded from rule"
                    );
                    *set.skipped.entry(rule.id).or_default() += 1;
                }
            }
        }

        for (name, members) in by_name {
            if name.is_empty() {
                continue;
            }
            if members.len() < rule.minimum_group_size {
                debug!(
                    rule = %rule.id,
                    name = %name,
                    size = members.len(),
                    minimum = rule.minimum_group_size,
                    "Dropping undersized group"
                );
                set.undersized += 1;
                continue;
            }
            set.groups.push(CandidateGroup {
                name,
                items: members,
                rule: rule.id,
            });
        }
    }

    // Stable: a name shared by two rules keeps the earlier rule first
    set.groups.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(
        groups = set.groups.len(),
        skipped = set.skipped_total(),
        undersized = set.undersized,
        "Built candidate groups"
    );
    set
}
