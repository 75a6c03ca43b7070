//! Application configuration management

pub mod rules;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub use rules::{RuleOverride, RulesFile};

/// Placeholder token shipped in the example `.env`
const PLACEHOLDER_TOKEN: &str = "your_plex_token_here";

/// Rule configuration file name inside [Config::config_path]
pub const RULES_FILE_NAME: &str = "pmm_config.yml";

/// Log file written next to the process unless `PMM_LOG_FILE` says otherwise
pub const DEFAULT_LOG_FILE: &str = "pmm.log";

/// Output format for the console log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Media server base URL
    pub plex_url: String,

    /// Media server API token
    pub plex_token: Option<String>,

    /// Directory holding the rule configuration file
    pub config_path: PathBuf,

    /// Default log level (DEBUG, INFO, WARNING, ERROR)
    pub log_level: String,

    pub log_format: LogFormat,

    /// File the log is also written to; `None` logs to stdout only
    pub log_file: Option<PathBuf>,

    /// Run on a schedule instead of once
    pub auto_run: bool,

    /// Daily `HH:MM` or a six-field cron expression
    pub run_schedule: String,

    /// Plan collection changes without applying them
    pub dry_run: bool,

    /// HTTP timeout for media server requests
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let flag = |key: &str| {
            get(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };

        let log_format = match get("PMM_LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        // Empty or "none" turns the file sink off
        let log_file = match get("PMM_LOG_FILE") {
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
            Some(path) if path.trim().is_empty() || path.trim().eq_ignore_ascii_case("none") => None,
            Some(path) => Some(PathBuf::from(path.trim())),
        };

        Ok(Self {
            plex_url: get("PLEX_URL").unwrap_or_else(|| "http://localhost:32400".to_string()),

            plex_token: get("PLEX_TOKEN").filter(|t| !t.trim().is_empty()),

            config_path: PathBuf::from(
                get("PMM_CONFIG_PATH").unwrap_or_else(|| "./config".to_string()),
            ),

            log_level: get("PMM_LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),

            log_format,

            log_file,

            auto_run: flag("AUTO_RUN_ENABLED"),

            run_schedule: get("RUN_SCHEDULE").unwrap_or_else(|| "06:00".to_string()),

            dry_run: flag("COLLECTIONS_DRY_RUN"),

            request_timeout: Duration::from_secs(
                get("PLEX_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .context("Invalid PLEX_TIMEOUT_SECS")?,
            ),
        })
    }

    /// Check that everything needed to reach the server is present
    pub fn validate(&self) -> Result<()> {
        if self.plex_url.trim().is_empty() {
            anyhow::bail!("PLEX_URL not configured");
        }
        self.token()?;
        Ok(())
    }

    /// The API token, rejecting the example placeholder
    pub fn token(&self) -> Result<&str> {
        match self.plex_token.as_deref() {
            Some(PLACEHOLDER_TOKEN) | None => anyhow::bail!("PLEX_TOKEN not configured"),
            Some(token) => Ok(token),
        }
    }

    /// Path of the rule configuration file
    pub fn rules_path(&self) -> PathBuf {
        self.config_path.join(RULES_FILE_NAME)
    }
}
