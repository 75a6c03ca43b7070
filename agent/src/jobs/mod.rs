//! Scheduled maintenance

pub mod maintenance;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::services::MaintenanceService;

/// Turn a `HH:MM` daily time or a cron expression into the six-field
/// (seconds first) form the scheduler expects
pub fn cron_expression(schedule: &str) -> Result<String> {
    let schedule = schedule.trim();

    if let Some((hour, minute)) = schedule.split_once(':') {
        let hour: u32 = hour.parse().context("Invalid hour in RUN_SCHEDULE")?;
        let minute: u32 = minute.parse().context("Invalid minute in RUN_SCHEDULE")?;
        if hour > 23 || minute > 59 {
            anyhow::bail!("RUN_SCHEDULE {} is not a valid time of day", schedule);
        }
        return Ok(format!("0 {} {} * * *", minute, hour));
    }

    match schedule.split_whitespace().count() {
        5 => Ok(format!("0 {}", schedule)),
        6 | 7 => Ok(schedule.to_string()),
        _ => anyhow::bail!("RUN_SCHEDULE must be HH:MM or a cron expression, got '{}'", schedule),
    }
}

/// Initialize and start the job scheduler.
///
/// Ticks that fire while the previous pass is still running are skipped.
pub async fn start_scheduler(
    service: Arc<MaintenanceService>,
    schedule: &str,
) -> Result<JobScheduler> {
    let expression = cron_expression(schedule)?;
    let scheduler = JobScheduler::new().await?;
    let running = Arc::new(Mutex::new(()));

    let maintenance_job = Job::new_async(expression.as_str(), move |_uuid, _l| {
        let service = service.clone();
        let running = running.clone();
        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                warn!("Previous maintenance run still in progress, skipping this one");
                return;
            };
            if let Err(e) = maintenance::run_maintenance(&service).await {
                tracing::error!("Maintenance error: {:#}", e);
            }
        })
    })?;
    scheduler.add(maintenance_job).await?;

    scheduler.start().await?;

    info!(schedule = %schedule, cron = %expression, "Scheduled automatic maintenance (UTC)");
    Ok(scheduler)
}
