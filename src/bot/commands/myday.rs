//! MyDay commands - the `myday` group.
//!
//! Moderators start the daily round in a server; the chosen contestants send
//! their entry to the bot by DM with `.myday <message> [public|private]`.

use crate::{
    core::ids::UserId,
    store::{MyDayRound, Privacy},
};
use chrono::NaiveDate;

/// Today's round: who was chosen and what they shared.
pub(crate) fn format_round(today: NaiveDate, round: &MyDayRound) -> String {
    let lines = round.chosen.iter().map(|user| match round.entries.get(user) {
        Some(entry) if entry.privacy == Privacy::Public => format!("📝 <@{user}>: {}", entry.message),
        Some(_) => format!("🙈 <@{user}> kept their entry private."),
        None => format!("⏳ <@{user}> hasn't shared yet."),
    });
    std::iter::once(format!("🌞 **MyDay for {today}**"))
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) const fn privacy_label(privacy: Privacy) -> &'static str {
    match privacy {
        Privacy::Public => "public",
        Privacy::Private => "private",
    }
}

pub(crate) fn invitation(prefix: &str) -> String {
    format!(
        "🌞 You've been chosen for today's MyDay! Reply here with `{prefix}myday <message> public` \
         to share it in the server, or `{prefix}myday <message> private` to keep it secret."
    )
}

pub(crate) fn mentions(users: &[UserId]) -> String {
    users
        .iter()
        .map(|user| format!("<@{user}>"))
        .collect::<Vec<_>>()
        .join(", ")
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{format_round, invitation, mentions, privacy_label};
    use crate::{
        bot::{BotData, guild_of, notify, today, user_id},
        errors::{Error, Result},
        store::Privacy,
    };
    use poise::serenity_prelude as serenity;
    use rand::{SeedableRng, rngs::StdRng};
    use tracing::warn;

    /// Daily MyDay. In DMs, `myday <message> [public|private]` submits your entry.
    #[poise::command(
        prefix_command,
        subcommands("myday_start", "myday_reset", "myday_history")
    )]
    pub async fn myday(
        ctx: poise::Context<'_, BotData, Error>,
        #[rest] entry: Option<String>,
    ) -> Result<()> {
        let Some(entry) = entry.filter(|text| !text.trim().is_empty()) else {
            ctx.say(format!(
                "🌞 MyDay commands: `{p}myday start`, `{p}myday reset`, `{p}myday history`. \
                 Chosen players DM `{p}myday <message> [public|private]`.",
                p = ctx.prefix()
            ))
            .await?;
            return Ok(());
        };
        if ctx.guild_id().is_some() {
            return Err(Error::DirectMessageOnly);
        }

        let day = today();
        let author = ctx.author();
        let submission = ctx.data().myday.submit(user_id(author.id), &entry, day).await?;
        ctx.say(format!(
            "✅ Your MyDay entry for {day} has been saved as **{}**.",
            privacy_label(submission.privacy)
        ))
        .await?;

        if submission.privacy == Privacy::Public {
            let guild = serenity::GuildId::new(submission.guild.get());
            let channel = match guild.to_partial_guild(ctx.http()).await {
                Ok(guild) => guild.system_channel_id,
                Err(e) => {
                    warn!(%guild, "could not look up guild for MyDay announcement: {e}");
                    None
                }
            };
            match channel {
                Some(channel) => {
                    let text = format!("🌟 MyDay from **{}**: {}", author.name, submission.message);
                    if let Err(e) = channel.say(ctx.http(), text).await {
                        warn!(%guild, "could not announce MyDay entry: {e}");
                    }
                }
                None => warn!(%guild, "no system channel to announce MyDay entry"),
            }
        }
        Ok(())
    }

    /// Picks today's MyDay contestants and invites them by DM.
    #[poise::command(prefix_command, rename = "start")]
    pub async fn myday_start(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let day = today();
        let chosen = ctx
            .data()
            .myday
            .start(guild, day, &mut StdRng::from_entropy())
            .await?;

        ctx.say(format!(
            "🌞 MyDay started! Chosen for **{day}**: {}",
            mentions(&chosen)
        ))
        .await?;
        let text = invitation(ctx.prefix());
        for user in chosen {
            notify(ctx.http(), user, text.clone()).await;
        }
        Ok(())
    }

    /// Cancels today's MyDay.
    #[poise::command(prefix_command, rename = "reset")]
    pub async fn myday_reset(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        ctx.data().myday.reset(guild, today()).await?;
        ctx.say("♻️ MyDay has been reset for today.").await?;
        Ok(())
    }

    /// Shows today's MyDay entries.
    #[poise::command(prefix_command, rename = "history")]
    pub async fn myday_history(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let day = today();
        let round = ctx.data().myday.history(guild, day).await?;
        ctx.say(format_round(day, &round)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
