//! Campfire commands - the `cc` group.
//!
//! A campfire is lit in a server, campers join until it is full, the fire
//! picks one camper who confesses by DM, and the other campers react to the
//! posted confession.

use crate::store::{CampfireRecord, Visibility};
use poise::serenity_prelude as serenity;

/// `yes` reveals the confessor, `no` keeps them anonymous.
pub(crate) fn parse_visibility(answer: &str) -> Option<Visibility> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "public" => Some(Visibility::Public),
        "no" | "n" | "anonymous" => Some(Visibility::Anonymous),
        _ => None,
    }
}

/// Channel the campfire talks in: its thread, or the channel it was lit in.
pub(crate) fn campfire_channel(record: &CampfireRecord) -> Option<serenity::ChannelId> {
    record
        .thread_id
        .or(record.starter_camper_channel_id)
        .map(|channel| serenity::ChannelId::new(channel.get()))
}

/// The confession as posted to the campers.
pub(crate) fn confession_text(record: &CampfireRecord) -> String {
    let message = record.confession_message.as_deref().unwrap_or_default();
    match (record.visibility, record.confessor) {
        (Some(Visibility::Public), Some(confessor)) => {
            format!("🔥 <@{confessor}> confessed:\n> {message}\n\nCampers, react to this message!")
        }
        _ => format!("🔥 Someone confessed:\n> {message}\n\nCampers, react to this message!"),
    }
}

/// Closing summary with every camper's reaction.
pub(crate) fn summary(record: &CampfireRecord) -> String {
    let mut lines = vec!["🌙 **The campfire is over**".to_string()];
    if let Some(message) = &record.confession_message {
        lines.push(format!("Confession: {message}"));
    }
    if record.reactions.is_empty() {
        lines.push("Nobody reacted.".to_string());
    }
    lines.extend(
        record
            .reactions
            .iter()
            .map(|reaction| format!("<@{}> reacted {}", reaction.user_id, reaction.emoji)),
    );
    lines.join("\n")
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{campfire_channel, confession_text, parse_visibility, summary};
    use crate::{
        bot::{BotData, channel_id, guild_of, in_thread, message_id, notify, today, user_id},
        core::{campfire::CampfireJoin, session::Rejected},
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;
    use std::sync::Arc;
    use tracing::warn;

    /// Campfire confession game.
    #[poise::command(
        prefix_command,
        slash_command,
        subcommands("cc_lit", "cc_join", "cc_confess", "cc_history", "cc_reset")
    )]
    pub async fn cc(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say(format!(
            "🔥 Campfire commands: `{p}cc lit`, `{p}cc join`, `{p}cc confess yes|no <message>` (DM), \
             `{p}cc history`, `{p}cc reset`",
            p = ctx.prefix()
        ))
        .await?;
        Ok(())
    }

    /// Lights today's campfire.
    #[poise::command(prefix_command, slash_command, rename = "lit")]
    pub async fn cc_lit(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let campfire = &ctx.data().campfire;
        campfire
            .lit(
                guild,
                user_id(ctx.author().id),
                channel_id(ctx.channel_id()),
                today(),
                Utc::now(),
            )
            .await?;

        let here = ctx.channel_id();
        let thread = if in_thread(ctx).await {
            Some(here)
        } else {
            let builder = serenity::CreateThread::new("🔥 Campfire").kind(serenity::ChannelType::PublicThread);
            match here.create_thread(ctx.http(), builder).await {
                Ok(thread) => Some(thread.id),
                Err(e) => {
                    warn!("could not open a campfire thread: {e}");
                    None
                }
            }
        };
        if let Some(thread) = thread {
            campfire.set_thread(guild, channel_id(thread)).await?;
        }
        let announce = thread.unwrap_or(here);

        announce
            .say(
                ctx.http(),
                format!(
                    "🔥 {} lit a campfire! Join with `{}cc join`.",
                    ctx.author().name,
                    ctx.prefix()
                ),
            )
            .await?;
        if announce != here {
            ctx.say(format!("🔥 The campfire is burning in <#{announce}>")).await?;
        }
        Ok(())
    }

    /// Sits down at the campfire.
    #[poise::command(prefix_command, slash_command, rename = "join")]
    pub async fn cc_join(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let campfire = &ctx.data().campfire;
        let joined = campfire.join(guild, user_id(ctx.author().id), Utc::now()).await?;

        match joined {
            CampfireJoin::Waiting { joined, capacity } => {
                ctx.say(format!("🪵 {} joined the campfire ({joined}/{capacity}).", ctx.author().name))
                    .await?;
            }
            CampfireJoin::Full { chosen } => {
                ctx.say(format!(
                    "🔥 The campfire is full! The flames chose <@{chosen}>... check your DMs!"
                ))
                .await?;
                notify(
                    ctx.http(),
                    chosen,
                    format!(
                        "🔥 The campfire chose you! Confess here with `{}cc confess yes <message>` to \
                         show your name, or `no` to stay anonymous.",
                        ctx.prefix()
                    ),
                )
                .await;

                let http = Arc::clone(&ctx.serenity_context().http);
                let fallback = ctx.channel_id();
                campfire
                    .arm_confession_timeout(guild, move |record| async move {
                        let channel = campfire_channel(&record).unwrap_or(fallback);
                        let text = format!("🌑 <@{chosen}> didn't confess in time. The campfire went out.");
                        if let Err(e) = channel.say(&http, text).await {
                            warn!("could not announce campfire timeout: {e}");
                        }
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// Confesses by DM once the campfire chose you.
    #[poise::command(prefix_command, slash_command, rename = "confess")]
    pub async fn cc_confess(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Show your name? yes or no"] public: String,
        #[description = "Your confession"]
        #[rest]
        message: String,
    ) -> Result<()> {
        if ctx.guild_id().is_some() {
            return Err(Error::DirectMessageOnly);
        }
        let visibility = parse_visibility(&public).ok_or(Rejected::InvalidChoice)?;
        let campfire = &ctx.data().campfire;
        let confessed = campfire
            .confess(user_id(ctx.author().id), visibility, &message, Utc::now())
            .await?;

        let channel = campfire_channel(&confessed.record).ok_or(Rejected::SessionNotFound)?;
        let posted = channel
            .say(ctx.http(), confession_text(&confessed.record))
            .await?;
        let key = message_id(posted.id);
        campfire.open_reactions(confessed.guild, key).await?;

        let http = Arc::clone(&ctx.serenity_context().http);
        campfire.arm_reaction_timeout(key, move |record| async move {
            if let Err(e) = channel.say(&http, summary(&record)).await {
                warn!("could not post campfire summary: {e}");
            }
        });

        ctx.say("🔥 Your confession was delivered to the campfire.").await?;
        Ok(())
    }

    /// Shows today's confession.
    #[poise::command(prefix_command, slash_command, rename = "history")]
    pub async fn cc_history(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        match ctx.data().campfire.history(guild, today()).await? {
            Some(record) => ctx.say(summary(&record)).await?,
            None => ctx.say("📭 No confession around the campfire today.").await?,
        };
        Ok(())
    }

    /// Puts out the campfire so it can be lit again.
    #[poise::command(prefix_command, slash_command, rename = "reset")]
    pub async fn cc_reset(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        ctx.data()
            .campfire
            .reset(guild, channel_id(ctx.channel_id()), today())
            .await?;
        ctx.say("♻️ The campfire has been reset.").await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
