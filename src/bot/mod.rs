//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for RocketBot: the prefix and
//! slash commands, the button and reaction handlers, and the shared
//! [`BotData`] every handler reads the game services from.

/// Discord command implementations (dating, campfire, personality, drawing, pokemon, myday)
pub mod commands;
/// Discord event handlers (buttons, reactions, guild joins)
pub mod handlers;

use crate::{
    config::{AppConfig, GameContent},
    core::{
        campfire::Campfire,
        dating::Ledger,
        drawing::Drawing,
        ids::{ChannelId, GuildId, MessageId, UserId},
        myday::MyDay,
        personality::Personality,
        pokemon::PokemonGame,
        restriction,
    },
    errors::{Error, Result},
    store::{JsonStore, ThreadRestrictions},
};
use chrono::{Local, NaiveDate};
use poise::serenity_prelude as serenity;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};

/// Shared data available to all bot commands and event handlers.
pub struct BotData {
    /// Settings loaded at start-up
    pub config: Arc<AppConfig>,
    /// JSON document store
    pub store: JsonStore,
    pub ledger: Ledger,
    pub campfire: Campfire,
    pub personality: Personality,
    pub drawing: Drawing,
    pub pokemon: PokemonGame,
    pub myday: MyDay,
}

impl BotData {
    /// Wires every game service to the store in `config.data_dir`.
    #[must_use]
    pub fn new(config: AppConfig, content: GameContent) -> Self {
        let store = JsonStore::open(config.data_dir.clone());
        let timeouts = config.timeouts;
        Self {
            ledger: Ledger::new(store.clone(), config.dating),
            campfire: Campfire::new(store.clone(), config.campfire_settings()),
            personality: Personality::new(
                content.personality_tests,
                Duration::from_secs(timeouts.personality_step_secs),
            ),
            drawing: Drawing::new(
                content.compliments,
                Duration::from_secs(timeouts.drawing_turn_secs),
            ),
            pokemon: PokemonGame::new(store.clone(), content.pokemon),
            myday: MyDay::new(store.clone(), config.myday.picks),
            store,
            config: Arc::new(config),
        }
    }
}

/// Calendar day used for quotas and daily games.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[must_use]
pub fn user_id(id: serenity::UserId) -> UserId {
    UserId::new(id.get())
}

#[must_use]
pub fn guild_id(id: serenity::GuildId) -> GuildId {
    GuildId::new(id.get())
}

#[must_use]
pub fn channel_id(id: serenity::ChannelId) -> ChannelId {
    ChannelId::new(id.get())
}

#[must_use]
pub fn message_id(id: serenity::MessageId) -> MessageId {
    MessageId::new(id.get())
}

/// Guild of the invocation, or [`Error::GuildOnly`] in DMs.
pub fn guild_of(ctx: poise::Context<'_, BotData, Error>) -> Result<GuildId> {
    ctx.guild_id().map(guild_id).ok_or(Error::GuildOnly)
}

/// Whether channels of `kind` are threads.
#[must_use]
pub const fn is_thread(kind: serenity::ChannelType) -> bool {
    matches!(
        kind,
        serenity::ChannelType::PublicThread
            | serenity::ChannelType::PrivateThread
            | serenity::ChannelType::NewsThread
    )
}

/// Whether the command was invoked inside a thread.
pub async fn in_thread(ctx: poise::Context<'_, BotData, Error>) -> bool {
    ctx.guild_channel()
        .await
        .is_some_and(|channel| is_thread(channel.kind))
}

/// Sends a direct message to `user`.
///
/// # Errors
/// Returns [`Error::DeliveryFailed`] when Discord refuses the message, usually
/// because the user closed their DMs.
pub async fn send_dm(http: &serenity::Http, user: UserId, content: impl Into<String>) -> Result<()> {
    serenity::UserId::new(user.get())
        .direct_message(http, serenity::CreateMessage::new().content(content))
        .await
        .map(drop)
        .map_err(|e| {
            debug!(%user, "direct message failed: {e}");
            Error::DeliveryFailed { user }
        })
}

/// Best-effort [`send_dm`]; failures are logged and swallowed.
pub async fn notify(http: &serenity::Http, user: UserId, content: impl Into<String>) {
    if let Err(e) = send_dm(http, user, content).await {
        warn!("{e}");
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let reply = if error.is_user_facing() {
                format!("❌ {error}")
            } else {
                error!("Error in command `{}`: {:?}", ctx.command().qualified_name, error);
                "⚠️ Something went wrong on my side. Please try again later.".to_string()
            };
            if let Err(e) = ctx.say(reply).await {
                error!("Failed to send error message: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Error while handling `{}`: {:?}", event.snake_case_name(), error);
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Refuses commands that the channel's allow-list does not name.
async fn thread_check(ctx: poise::Context<'_, BotData, Error>) -> Result<bool> {
    let restrictions: ThreadRestrictions = ctx.data().store.load().await?;
    let channel = channel_id(ctx.channel_id());
    let root = ctx
        .command()
        .qualified_name
        .split_whitespace()
        .next()
        .unwrap_or_default();

    if restriction::is_allowed(&restrictions, channel, root) {
        return Ok(true);
    }
    let allowed = restriction::allowed_in(&restrictions, channel)
        .iter()
        .map(|name| format!("`{}{name}`", ctx.prefix()))
        .collect::<Vec<_>>()
        .join(", ");
    ctx.say(format!("🚫 Only these commands can be used here: {allowed}"))
        .await?;
    Ok(false)
}

/// Connects to Discord and serves commands until the gateway closes.
#[instrument(skip(token, data))]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let prefix = data.config.prefix.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            command_check: Some(|ctx| Box::pin(thread_check(ctx))),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    client.start().await?;
    Ok(())
}
