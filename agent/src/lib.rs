//! Curator - scheduled maintenance agent for a Plex media server
//!
//! Scans libraries and keeps rule-derived collections (decades, genres,
//! networks, highly rated) in line with library contents.

pub mod app_mode;
pub mod cli;
pub mod collections;
pub mod config;
pub mod jobs;
pub mod services;
