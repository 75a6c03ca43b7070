//! Maintenance job

use anyhow::Result;

use crate::services::MaintenanceService;

/// Run one maintenance pass; errors if any library or operation failed
pub async fn run_maintenance(service: &MaintenanceService) -> Result<()> {
    let report = service.run().await;
    tracing::debug!(report = %serde_json::to_string(&report)?, "Maintenance report");

    if !report.is_success() {
        anyhow::bail!(
            "Maintenance finished with {} failed operations and {} errors",
            report.total_failed(),
            report.errors.len()
                + report.libraries.iter().filter(|l| l.error.is_some()).count()
        );
    }

    tracing::info!("Maintenance completed");
    Ok(())
}
