//! Collection rule configuration file (`pmm_config.yml`)
//!
//! ```yaml
//! libraries: ["Movies", "TV Shows"]
//! collections:
//!   decade: { minimum_group_size: 8 }
//!   show_genre: { enabled: false }
//!   highly_rated: { threshold: 8.5, naming_template: "Critics' Picks" }
//! ```
//!
//! Every field is optional. Rules left out keep their built-in settings.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::collections::{Rule, RuleId, RuleSet};

/// Per-rule settings, each overriding the built-in default when present
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    pub enabled: Option<bool>,
    pub minimum_group_size: Option<usize>,
    pub naming_template: Option<String>,
    /// Rating threshold, highly rated rule only
    pub threshold: Option<f64>,
}

/// Parsed rule configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    /// Restrict maintenance to these library titles; absent means all
    #[serde(default)]
    pub libraries: Option<Vec<String>>,

    #[serde(default)]
    pub collections: BTreeMap<RuleId, RuleOverride>,
}

impl RulesFile {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No rule configuration file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file = Self::parse(&contents)
            .with_context(|| format!("Invalid rule configuration in {}", path.display()))?;

        debug!(path = %path.display(), rules = file.collections.len(), "Loaded rule configuration");
        Ok(file)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: RulesFile = serde_yaml::from_str(contents)?;
        file.check()?;
        Ok(file)
    }

    fn check(&self) -> Result<()> {
        for (id, settings) in &self.collections {
            if let Some(template) = &settings.naming_template
                && template.trim().is_empty()
            {
                anyhow::bail!("naming_template for {} must not be empty", id);
            }
            if let Some(threshold) = settings.threshold {
                if *id != RuleId::HighlyRated {
                    anyhow::bail!("threshold is only valid for {}", RuleId::HighlyRated);
                }
                if !(0.0..=10.0).contains(&threshold) {
                    anyhow::bail!("threshold {} is outside the 0-10 rating scale", threshold);
                }
            }
        }
        Ok(())
    }

    /// Enabled rules with overrides applied
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(RuleId::ALL.into_iter().filter_map(|id| {
            let settings = self.collections.get(&id).cloned().unwrap_or_default();
            if !settings.enabled.unwrap_or(true) {
                return None;
            }

            let mut rule = Rule::with_defaults(id);
            if let Some(minimum) = settings.minimum_group_size {
                rule.minimum_group_size = minimum;
            }
            if let Some(template) = settings.naming_template {
                rule.naming_template = template;
            }
            if let Some(threshold) = settings.threshold {
                rule.rating_threshold = threshold;
            }
            Some(rule)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = RulesFile::parse("").unwrap();
        assert_eq!(file.rule_set(), RuleSet::default());
        assert_eq!(file.libraries, None);
    }

    #[test]
    fn test_partial_overrides() {
        let file = RulesFile::parse(
            r#"
libraries: ["Movies"]
collections:
  decade:
    minimum_group_size: 8
  show_genre:
    enabled: false
  highly_rated:
    threshold: 8.5
    naming_template: "Critics' Picks"
"#,
        )
        .unwrap();

        let rules = file.rule_set();
        assert_eq!(file.libraries, Some(vec!["Movies".to_string()]));
        assert_eq!(rules.get(RuleId::Decade).unwrap().minimum_group_size, 8);
        assert_eq!(rules.get(RuleId::Decade).unwrap().naming_template, "{decade}s Movies");
        assert!(rules.get(RuleId::ShowGenre).is_none());
        assert_eq!(rules.get(RuleId::HighlyRated).unwrap().rating_threshold, 8.5);
        assert_eq!(rules.get(RuleId::HighlyRated).unwrap().naming_template, "Critics' Picks");
        assert_eq!(rules.get(RuleId::MovieGenre).unwrap().minimum_group_size, 10);
    }

    #[test]
    fn test_unknown_rule_is_rejected() {
        assert!(RulesFile::parse("collections:\n  resolution: { enabled: true }\n").is_err());
    }

    #[test]
    fn test_unknown_setting_is_rejected() {
        assert!(RulesFile::parse("collections:\n  decade: { minimum: 3 }\n").is_err());
    }

    #[test]
    fn test_threshold_only_for_highly_rated() {
        assert!(RulesFile::parse("collections:\n  decade: { threshold: 5.0 }\n").is_err());
        assert!(RulesFile::parse("collections:\n  highly_rated: { threshold: 11.0 }\n").is_err());
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = RulesFile::load(&dir.path().join("pmm_config.yml")).unwrap();
        assert_eq!(file, RulesFile::default());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmm_config.yml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "collections:\n  studio:\n    minimum_group_size: 2").unwrap();

        let file = RulesFile::load(&path).unwrap();
        assert_eq!(file.rule_set().get(RuleId::Studio).unwrap().minimum_group_size, 2);
    }
}
