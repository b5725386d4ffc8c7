/// Game content catalogs (personality tests, Pokémon, compliments)
pub mod content;

/// Application settings from config.toml
pub mod settings;

pub use content::{GameContent, load_content};
pub use settings::{AppConfig, load_config};

use crate::errors::Result;
use std::env;
use tracing::{error, info};

/// Loads the settings named by `ROCKET_CONFIG` (default `config.toml`).
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = env::var("ROCKET_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = load_config(&path).inspect_err(|e| error!("Failed to load {}: {}", path, e))?;
    info!(
        prefix = %config.prefix,
        data_dir = ?config.data_dir,
        elevated = config.elevated_users.len(),
        "Application configuration loaded"
    );
    Ok(config)
}
