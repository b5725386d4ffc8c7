//! Drawing date command - `dd`.
//!
//! Two players take turns drawing each other; each turn ends with a button
//! click (see [`crate::bot::handlers::components`]).

use crate::{
    bot::handlers::components::drawing_button_id,
    core::{
        drawing::Drawing,
        ids::{MessageId, UserId},
    },
    errors::Result,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::warn;

/// Posts the turn awaited in the drawing date `key` and arms its timer.
pub(crate) async fn announce_turn(
    http: Arc<serenity::Http>,
    drawing: &Drawing,
    channel: serenity::ChannelId,
    key: MessageId,
) -> Result<()> {
    let Some((step, artist, subject)) = drawing.current_turn(key).await else {
        return Ok(());
    };
    let label = if step == 0 { "I'm done ❤️" } else { "I'm done too 💖" };
    let button = serenity::CreateButton::new(drawing_button_id(key, step))
        .label(label)
        .style(serenity::ButtonStyle::Success);

    channel
        .send_message(
            &*http,
            serenity::CreateMessage::new()
                .content(format!(
                    "🎨 <@{artist}>, it's your turn to draw <@{subject}>! Press the button when you're done."
                ))
                .components(vec![serenity::CreateActionRow::Buttons(vec![button])]),
        )
        .await?;

    drawing
        .arm_turn_timeout(key, step, move |_| async move {
            if let Err(e) = channel
                .say(&http, "⏰ The drawing date ran out of time. Maybe next time!")
                .await
            {
                warn!("could not announce drawing timeout: {e}");
            }
        })
        .await;
    Ok(())
}

/// One compliment per artist for a finished date.
pub(crate) fn compliments(drawing: &Drawing, artists: &[UserId]) -> String {
    let mut rng = rand::thread_rng();
    let lines: Vec<String> = artists
        .iter()
        .map(|artist| format!("🖼️ <@{artist}>: {}", drawing.compliment(&mut rng)))
        .collect();
    format!("💞 **Drawing date complete!**\n{}", lines.join("\n"))
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::announce_turn;
    use crate::{
        bot::{BotData, guild_of, user_id},
        core::ids::MessageId,
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude::{self as serenity, Mentionable};
    use std::sync::Arc;

    /// Starts a drawing date with someone.
    #[poise::command(prefix_command, slash_command)]
    pub async fn dd(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Who to draw with"] partner: serenity::User,
    ) -> Result<()> {
        let guild = guild_of(ctx)?;
        let author = user_id(ctx.author().id);
        let key = MessageId::new(ctx.id());
        let privilege = ctx.data().config.privilege_of(author);
        let drawing = &ctx.data().drawing;

        drawing.start(key, guild, author, user_id(partner.id), privilege, Utc::now())?;
        ctx.say(format!(
            "🎨 Drawing date between {} and {}! Grab your pencils.",
            ctx.author().mention(),
            partner.mention()
        ))
        .await?;
        announce_turn(
            Arc::clone(&ctx.serenity_context().http),
            drawing,
            ctx.channel_id(),
            key,
        )
        .await
    }
}

// Re-export all commands
pub use inner::*;
