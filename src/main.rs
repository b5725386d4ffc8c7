use dotenvy::dotenv;
use rocket_bot::{
    bot::{self, BotData},
    config,
    errors::{Error, Result},
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings and game content
    let app_config = config::load_app_configuration()?;
    let content = config::load_content(&app_config.data_dir)
        .inspect_err(|e| error!("Failed to load game content: {}", e))?;

    // 4. Run the bot
    // DISCORD_TOKEN is read here, directly before use, not stored in AppConfig
    let token = env::var("DISCORD_TOKEN")
        .inspect_err(|e| error!("DISCORD_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    bot::run_bot(token, BotData::new(app_config, content)).await
}
