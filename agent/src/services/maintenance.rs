//! Routine maintenance: status, library scans and collection upkeep
//!
//! One call to [MaintenanceService::run] is one self-contained pass. Nothing
//! is carried over between runs; every pass takes a fresh snapshot of items
//! and collections, so a pass that was interrupted half way is simply
//! finished by the next one.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::media_server::{Library, MediaServer};
use crate::collections::{
    MaintenanceReport, RuleSet, RunSummary, build_candidates, execute, reconcile,
};

/// What a maintenance pass should do
#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    /// Only plan collection changes
    pub dry_run: bool,
    /// Ask the server to rescan each library before grouping
    pub scan_libraries: bool,
    /// Library titles to process; `None` processes every library
    pub library_filter: Option<Vec<String>>,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            scan_libraries: true,
            library_filter: None,
        }
    }
}

pub struct MaintenanceService {
    server: Arc<dyn MediaServer>,
    rules: RuleSet,
    options: MaintenanceOptions,
}

impl MaintenanceService {
    pub fn new(server: Arc<dyn MediaServer>, rules: RuleSet, options: MaintenanceOptions) -> Self {
        Self {
            server,
            rules,
            options,
        }
    }

    /// Confirm the server is reachable and log what it holds, without
    /// touching any collection
    pub async fn check_server(&self) -> Result<()> {
        self.log_server_status()
            .await
            .context("Error getting server status")?;
        self.list_libraries()
            .await
            .context("Error getting libraries")?;
        Ok(())
    }

    async fn log_server_status(&self) -> Result<()> {
        let status = self.server.server_status().await?;
        info!(
            server_name = %status.server_name,
            version = %status.version,
            platform = %status.platform,
            platform_version = %status.platform_version,
            libraries = status.libraries,
            "Server status"
        );
        Ok(())
    }

    async fn list_libraries(&self) -> Result<Vec<Library>> {
        let libraries = self.server.list_libraries().await?;
        info!(count = libraries.len(), "Found libraries");
        for library in &libraries {
            info!("  - {} ({})", library.title, library.section_type);
        }
        Ok(libraries)
    }

    /// Run one maintenance pass and return what happened
    pub async fn run(&self) -> MaintenanceReport {
        info!(dry_run = self.options.dry_run, "Starting routine maintenance");
        let mut report = MaintenanceReport::default();

        if let Err(e) = self.log_server_status().await {
            warn!(error = %format!("{:#}", e), "Error getting server status");
        }

        let libraries = match self.list_libraries().await {
            Ok(libraries) => libraries,
            Err(e) => {
                let message = format!("Error getting libraries: {:#}", e);
                error!("{}", message);
                report.errors.push(message);
                return report;
            }
        };

        let selected = self.select_libraries(&libraries, &mut report);

        if self.options.scan_libraries {
            for library in &selected {
                info!(library = %library.title, "Scanning library");
                if let Err(e) = self.server.scan_library(&library.id).await {
                    warn!(library = %library.title, error = %format!("{:#}", e), "Error scanning library");
                }
            }
        }

        for library in &selected {
            let summary = self.maintain_collections(library).await;
            if summary.is_success() {
                info!("{}", summary);
            } else {
                warn!("{}", summary);
            }
            for warning in &summary.warnings {
                warn!(library = %library.title, "{}", warning);
            }
            report.libraries.push(summary);
        }

        info!(
            created = report.total_created(),
            updated = report.total_updated(),
            unchanged = report.total_unchanged(),
            failed = report.total_failed(),
            "Routine maintenance completed"
        );
        report
    }

    /// Apply the library filter, reporting names that match nothing
    fn select_libraries<'a>(
        &self,
        libraries: &'a [Library],
        report: &mut MaintenanceReport,
    ) -> Vec<&'a Library> {
        let Some(filter) = &self.options.library_filter else {
            return libraries.iter().collect();
        };
        if filter.is_empty() {
            warn!("No libraries configured, nothing to maintain");
            return Vec::new();
        }

        for name in filter {
            if !libraries.iter().any(|l| l.title.eq_ignore_ascii_case(name)) {
                let message = format!("Library '{}' not found", name);
                error!("{}", message);
                report.errors.push(message);
            }
        }

        libraries
            .iter()
            .filter(|l| filter.iter().any(|name| l.title.eq_ignore_ascii_case(name)))
            .collect()
    }

    /// Build, reconcile and apply collections for one library
    pub async fn maintain_collections(&self, library: &Library) -> RunSummary {
        let mut summary = RunSummary::new(&library.title, self.options.dry_run);

        let Some(kind) = library.kind() else {
            info!(
                library = %library.title,
                section_type = %library.section_type,
                "No collection rules for this library type"
            );
            return summary;
        };
        let rules = self.rules.for_kind(kind);
        if rules.is_empty() {
            return summary;
        }

        let items = match self.server.list_items(library).await {
            Ok(items) => items,
            Err(e) => return summary.with_error(format!("Error listing items: {:#}", e)),
        };
        let existing = match self.server.list_collections(&library.id).await {
            Ok(existing) => existing,
            Err(e) => {
                return summary.with_error(format!("Error listing collections: {:#}", e));
            }
        };

        let candidates = build_candidates(&items, &rules);
        let plan = reconcile(&candidates.groups, &existing);
        info!(
            library = %library.title,
            items = items.len(),
            candidates = candidates.groups.len(),
            existing = existing.len(),
            ops = plan.ops.len(),
            "Planned collection changes"
        );
        summary.record_plan(&candidates, &plan);

        if self.options.dry_run {
            for op in plan.ops.iter().filter(|op| !op.is_noop()) {
                info!(library = %library.title, op = %op, "Would apply");
            }
            summary.record_planned(&plan.ops);
        } else {
            let outcomes = execute(self.server.as_ref(), library, &plan.ops).await;
            summary.record_outcomes(&outcomes);
        }

        summary
    }
}
