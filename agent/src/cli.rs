//! Minimal CLI parsing for run mode and library overrides.

use crate::app_mode::RunMode;

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    pub run_mode_override: Option<RunMode>,
    /// `--library NAME`, repeatable
    pub libraries: Vec<String>,
    pub dry_run: bool,
    pub skip_scan: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => options.run_mode_override = Some(RunMode::Once),
                "--schedule" => options.run_mode_override = Some(RunMode::Scheduled),
                "--health-check" => options.run_mode_override = Some(RunMode::HealthCheck),
                "--dry-run" => options.dry_run = true,
                "--no-scan" => options.skip_scan = true,
                "--run-mode" => {
                    if let Some(value) = args.next() {
                        options.run_mode_override = RunMode::from_arg(&value);
                    }
                }
                "--library" => {
                    if let Some(value) = args.next() {
                        options.libraries.push(value);
                    }
                }
                _ if arg.starts_with("--run-mode=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.run_mode_override = RunMode::from_arg(value);
                    }
                }
                _ if arg.starts_with("--library=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.libraries.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        options
    }
}
