//! Subcommand implementations.

pub mod ask;
pub mod doctor;
pub mod serve;

use scholarag_config::AppConfig;

/// Load configuration, turning the error into a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
