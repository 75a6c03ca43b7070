//! Health check: is the agent configured and can it reach the server?

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use super::plex::PlexClient;
use crate::config::{Config, RulesFile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthReport {
    pub checks: Vec<CheckResult>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Environment variables needed to reach the server
pub fn check_environment(config: &Config) -> CheckResult {
    match config.validate() {
        Ok(()) => CheckResult::pass("environment", "Environment variables configured"),
        Err(e) => CheckResult::fail("environment", e.to_string()),
    }
}

/// Rule configuration file parses (a missing file is fine)
pub fn check_rules_file(config: &Config) -> CheckResult {
    let path = config.rules_path();
    match RulesFile::load(&path) {
        Ok(file) => {
            let enabled = file.rule_set().rules().len();
            let libraries = file
                .libraries
                .map(|l| format!("{} libraries", l.len()))
                .unwrap_or_else(|| "all libraries".to_string());
            CheckResult::pass(
                "configuration",
                format!("Configuration valid ({} rules enabled, {})", enabled, libraries),
            )
        }
        Err(e) => CheckResult::fail("configuration", format!("{:#}", e)),
    }
}

async fn check_connection(config: &Config) -> CheckResult {
    let token = match config.token() {
        Ok(token) => token,
        Err(e) => return CheckResult::fail("connection", format!("Skipped: {}", e)),
    };

    let client = match PlexClient::new(&config.plex_url, token, Duration::from_secs(10)) {
        Ok(client) => client,
        Err(e) => return CheckResult::fail("connection", format!("{:#}", e)),
    };

    match client.ping().await {
        Ok(machine_id) => CheckResult::pass(
            "connection",
            format!("Media server reachable at {} ({})", config.plex_url, machine_id),
        ),
        Err(e) => CheckResult::fail("connection", format!("{:#}", e)),
    }
}

/// Run every check and log the results
pub async fn run_health_check(config: &Config) -> HealthReport {
    let report = HealthReport {
        checks: vec![
            check_environment(config),
            check_rules_file(config),
            check_connection(config).await,
        ],
    };

    for check in &report.checks {
        if check.passed {
            info!(check = check.name, "✓ {}", check.detail);
        } else {
            error!(check = check.name, "✗ {}", check.detail);
        }
    }

    if report.is_healthy() {
        info!("All health checks passed");
    } else {
        error!("Some health checks failed");
    }
    report
}
