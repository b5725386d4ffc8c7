//! Discord event handlers
//!
//! This module routes gateway events that are not commands: button clicks,
//! reactions on campfire confessions, and joining a new server.

/// Button clicks of the personality test and the drawing date
pub mod components;
/// Reactions on campfire confessions
pub mod reactions;

use crate::{
    bot::BotData,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

fn greeting(prefix: &str) -> String {
    format!(
        "🚀 **Hey Rocket Players!**\n\
         Thanks for letting me land. I promise I won't crash your channel... at least not on purpose! 😎\n\
         Type `{prefix}tr help` to see every game."
    )
}

/// Framework event handler.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => components::handle(ctx, component, data).await,
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            reactions::handle(ctx, add_reaction, data).await
        }
        serenity::FullEvent::GuildCreate { guild, is_new } if *is_new == Some(true) => {
            info!(guild = %guild.id, "joined a new server");
            if let Some(channel) = guild.system_channel_id {
                if let Err(e) = channel.say(ctx, greeting(&data.config.prefix)).await {
                    warn!(guild = %guild.id, "could not send greeting: {e}");
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
