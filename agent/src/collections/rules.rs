//! Grouping rules
//!
//! Each rule maps an item to the set of group keys it belongs to. Rules are
//! independent of each other: the same item can land in a decade group, two
//! genre groups and the highly rated group in one run.
//!
//! | Rule           | Applies to | Key                         | Default name          |
//! |----------------|------------|-----------------------------|-----------------------|
//! | `decade`       | movies     | `floor(year / 10) * 10`     | `{decade}s Movies`    |
//! | `movie_genre`  | movies     | each genre (fan-out)        | `{genre} Movies`      |
//! | `show_genre`   | shows      | each genre (fan-out)        | `{genre} TV Shows`    |
//! | `studio`       | shows      | studio/network verbatim     | `{studio} Shows`      |
//! | `highly_rated` | movies     | fixed, `rating >= 8.0`      | `Highly Rated Movies` |

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::MissingAttribute;
use super::item::{Item, MediaKind};

/// Default rating threshold for the highly rated rule
pub const DEFAULT_RATING_THRESHOLD: f64 = 8.0;

/// Key under which the highly rated rule groups every qualifying item
const HIGHLY_RATED_KEY: &str = "highly rated";

/// Identifies a rule and, through it, the rule type and media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    Decade,
    MovieGenre,
    ShowGenre,
    Studio,
    HighlyRated,
}

impl RuleId {
    /// Canonical build order
    pub const ALL: [RuleId; 5] = [
        RuleId::Decade,
        RuleId::MovieGenre,
        RuleId::ShowGenre,
        RuleId::Studio,
        RuleId::HighlyRated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::Decade => "decade",
            RuleId::MovieGenre => "movie_genre",
            RuleId::ShowGenre => "show_genre",
            RuleId::Studio => "studio",
            RuleId::HighlyRated => "highly_rated",
        }
    }

    /// Kind of item this rule looks at; other kinds are ignored
    pub fn media_kind(&self) -> MediaKind {
        match self {
            RuleId::Decade | RuleId::MovieGenre | RuleId::HighlyRated => MediaKind::Movie,
            RuleId::ShowGenre | RuleId::Studio => MediaKind::Show,
        }
    }

    /// Rule-specific template placeholder, usable instead of `{key}`
    fn placeholder(&self) -> Option<&'static str> {
        match self {
            RuleId::Decade => Some("{decade}"),
            RuleId::MovieGenre | RuleId::ShowGenre => Some("{genre}"),
            RuleId::Studio => Some("{studio}"),
            RuleId::HighlyRated => None,
        }
    }

    pub fn default_minimum_group_size(&self) -> usize {
        match self {
            RuleId::Decade => 5,
            RuleId::MovieGenre => 10,
            RuleId::ShowGenre => 5,
            RuleId::Studio => 3,
            RuleId::HighlyRated => 5,
        }
    }

    pub fn default_naming_template(&self) -> &'static str {
        match self {
            RuleId::Decade => "{decade}s Movies",
            RuleId::MovieGenre => "{genre} Movies",
            RuleId::ShowGenre => "{genre} TV Shows",
            RuleId::Studio => "{studio} Shows",
            RuleId::HighlyRated => "Highly Rated Movies",
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown collection rule '{}'", s))
    }
}

/// Group key produced by a rule (decade number, genre, studio, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub String);

impl GroupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A configured rule: what to group by, how many items a group needs, and
/// how the resulting collection is named.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: RuleId,
    pub minimum_group_size: usize,
    pub naming_template: String,
    /// Only used by the highly rated rule
    pub rating_threshold: f64,
}

impl Rule {
    /// Rule with the built-in minimum and template
    pub fn with_defaults(id: RuleId) -> Self {
        Self {
            id,
            minimum_group_size: id.default_minimum_group_size(),
            naming_template: id.default_naming_template().to_string(),
            rating_threshold: DEFAULT_RATING_THRESHOLD,
        }
    }

    pub fn with_minimum(mut self, minimum_group_size: usize) -> Self {
        self.minimum_group_size = minimum_group_size;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.naming_template = template.into();
        self
    }

    /// Group keys for an item.
    ///
    /// Items of the wrong kind and movies rated below the threshold yield an
    /// empty set. Items lacking the attribute the rule needs yield
    /// [`MissingAttribute`] so the caller can count them.
    pub fn keys(&self, item: &Item) -> Result<BTreeSet<GroupKey>, MissingAttribute> {
        if item.kind != self.id.media_kind() {
            return Ok(BTreeSet::new());
        }

        let missing = |attribute| MissingAttribute {
            item_id: item.id.clone(),
            rule: self.id,
            attribute,
        };

        match self.id {
            RuleId::Decade => {
                let year = item.year.ok_or_else(|| missing("year"))?;
                Ok(BTreeSet::from([GroupKey(decade_of(year).to_string())]))
            }
            RuleId::MovieGenre | RuleId::ShowGenre => {
                let keys: BTreeSet<GroupKey> = item
                    .usable_genres()
                    .map(|genre| GroupKey(genre.to_string()))
                    .collect();
                if keys.is_empty() {
                    return Err(missing("genres"));
                }
                Ok(keys)
            }
            RuleId::Studio => {
                let studio = item.usable_studio().ok_or_else(|| missing("studio"))?;
                Ok(BTreeSet::from([GroupKey(studio.to_string())]))
            }
            RuleId::HighlyRated => {
                let rating = item.usable_rating().ok_or_else(|| missing("rating"))?;
                if is_highly_rated(rating, self.rating_threshold) {
                    Ok(BTreeSet::from([GroupKey(HIGHLY_RATED_KEY.to_string())]))
                } else {
                    Ok(BTreeSet::new())
                }
            }
        }
    }

    /// Collection name for a key, substituting `{key}` and the rule's own
    /// placeholder
    pub fn group_name(&self, key: &GroupKey) -> String {
        let mut name = self.naming_template.replace("{key}", key.as_str());
        if let Some(placeholder) = self.id.placeholder() {
            name = name.replace(placeholder, key.as_str());
        }
        name.trim().to_string()
    }
}

/// Decade a year falls in, rounding toward negative infinity
pub fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

/// Inclusive threshold check
pub fn is_highly_rated(rating: f64, threshold: f64) -> bool {
    rating >= threshold
}

/// The enabled rules for one run, in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: RuleId::ALL.into_iter().map(Rule::with_defaults).collect(),
        }
    }
}

impl RuleSet {
    /// Build from any rules, re-ordered canonically. A later rule with the
    /// same id replaces an earlier one.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut by_id: Vec<Rule> = Vec::new();
        for rule in rules {
            match by_id.iter_mut().find(|r| r.id == rule.id) {
                Some(existing) => *existing = rule,
                None => by_id.push(rule),
            }
        }
        by_id.sort_by_key(|r| r.id);
        Self { rules: by_id }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules that apply to a library of the given kind
    pub fn for_kind(&self, kind: MediaKind) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|r| r.id.media_kind() == kind)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}
