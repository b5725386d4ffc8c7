//! Reactions on posted campfire confessions.

use crate::{
    bot::{BotData, commands::campfire::summary, message_id, user_id},
    core::campfire::ReactionOutcome,
    errors::Result,
};
use poise::serenity_prelude as serenity;
use tracing::debug;

/// Records a camper's reaction; posts the summary once every camper reacted.
pub async fn handle(ctx: &serenity::Context, reaction: &serenity::Reaction, data: &BotData) -> Result<()> {
    let Some(user) = reaction.user_id else {
        return Ok(());
    };
    if user == ctx.cache.current_user().id {
        return Ok(());
    }

    let outcome = data
        .campfire
        .react(
            message_id(reaction.message_id),
            user_id(user),
            &reaction.emoji.to_string(),
        )
        .await?;
    match outcome {
        ReactionOutcome::Ignored => {}
        ReactionOutcome::Recorded => debug!(%user, "campfire reaction recorded"),
        ReactionOutcome::Closed(record) => {
            reaction.channel_id.say(ctx, summary(&record)).await?;
        }
    }
    Ok(())
}
