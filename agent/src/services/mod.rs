//! External service integrations

pub mod health;
pub mod logging;
pub mod maintenance;
pub mod media_server;
pub mod plex;
pub mod rate_limiter;

pub use health::{HealthReport, run_health_check};
pub use maintenance::{MaintenanceOptions, MaintenanceService};
pub use media_server::{Library, LibraryId, MediaServer, ServerStatus};
pub use plex::PlexClient;
