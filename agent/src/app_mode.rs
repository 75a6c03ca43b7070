//! How the agent runs: one pass and exit, or on a schedule.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Scheduled,
    HealthCheck,
}

impl RunMode {
    /// Mode implied by configuration alone (`AUTO_RUN_ENABLED`)
    pub fn from_config(auto_run: bool) -> Self {
        if auto_run {
            RunMode::Scheduled
        } else {
            RunMode::Once
        }
    }

    pub fn from_arg(value: &str) -> Option<Self> {
        match value {
            "once" => Some(RunMode::Once),
            "schedule" | "scheduled" => Some(RunMode::Scheduled),
            "health" | "health-check" => Some(RunMode::HealthCheck),
            _ => None,
        }
    }
}
