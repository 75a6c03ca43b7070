//! Curator - Plex maintenance agent
//!
//! Runs one maintenance pass and exits, runs on a daily schedule, or checks
//! its own configuration, depending on `AUTO_RUN_ENABLED` and CLI flags.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;

use curator::app_mode::RunMode;
use curator::cli::CliOptions;
use curator::config::{Config, RulesFile};
use curator::jobs;
use curator::services::{
    MaintenanceOptions, MaintenanceService, PlexClient, logging, run_health_check,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load configuration first (before tracing, the log level lives there)
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let _log_guard =
        logging::init_tracing(&config.log_level, config.log_format, config.log_file.as_deref())?;

    let cli = CliOptions::from_args();
    let mode = cli
        .run_mode_override
        .unwrap_or_else(|| RunMode::from_config(config.auto_run));

    tracing::info!(mode = ?mode, "Starting Curator");

    if mode == RunMode::HealthCheck {
        let report = run_health_check(&config).await;
        return Ok(if report.is_healthy() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    config.validate()?;
    let rules_file = RulesFile::load(&config.rules_path())?;
    let rules = rules_file.rule_set();
    tracing::info!(rules = rules.rules().len(), "Collection rules loaded");

    let library_filter = if cli.libraries.is_empty() {
        rules_file.libraries.clone()
    } else {
        Some(cli.libraries.clone())
    };
    let options = MaintenanceOptions {
        dry_run: config.dry_run || cli.dry_run,
        scan_libraries: !cli.skip_scan,
        library_filter,
    };

    let client = PlexClient::new(&config.plex_url, config.token()?, config.request_timeout)?;
    tracing::info!(url = %config.plex_url, "Media server client initialized");

    let service = Arc::new(MaintenanceService::new(Arc::new(client), rules, options));

    match mode {
        RunMode::Scheduled => {
            // Surface a bad URL or token now rather than at the first tick
            if let Err(e) = service.check_server().await {
                tracing::error!("{:#}", e);
            }
            let mut scheduler = jobs::start_scheduler(service.clone(), &config.run_schedule).await?;

            // Keep the process alive until interrupted
            tokio::signal::ctrl_c().await?;
            tracing::info!("Curator stopped by user");
            scheduler.shutdown().await?;
            Ok(ExitCode::SUCCESS)
        }
        _ => match jobs::maintenance::run_maintenance(&service).await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(e) => {
                tracing::error!("{:#}", e);
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
