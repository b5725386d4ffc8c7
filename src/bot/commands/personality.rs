//! Personality test commands - the `pt` group.
//!
//! Each test runs in its own thread; questions are posted with one button per
//! choice and answered by clicking (see [`crate::bot::handlers::components`]).

use crate::{
    bot::handlers::components::personality_button_id,
    core::{
        ids::ChannelId,
        personality::{Personality, PersonalityResult},
    },
    errors::Result,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::warn;

/// Discord allows five buttons per row and five rows per message.
const BUTTONS_PER_ROW: usize = 5;
const MAX_BUTTONS: usize = 25;

/// Result announcement of a finished or timed out test.
pub(crate) fn describe_result(result: &PersonalityResult) -> String {
    match (&result.personality, &result.description) {
        (Some(personality), Some(description)) => {
            format!("🧠 **{}**\nYou are **{personality}**!\n{description}", result.title)
        }
        (Some(personality), None) => format!("🧠 **{}**\nYou are **{personality}**!", result.title),
        (None, _) => format!("🧠 **{}**\nNo answers, no personality... yet!", result.title),
    }
}

/// Posts the step awaited in `thread` and arms its timer.
pub(crate) async fn ask_step(
    http: Arc<serenity::Http>,
    personality: &Personality,
    thread: ChannelId,
) -> Result<()> {
    let Some((test, owner, step)) = personality.current(thread).await else {
        return Ok(());
    };
    let Some(question) = test.steps.get(step) else {
        return Ok(());
    };

    let buttons: Vec<serenity::CreateButton> = question
        .choices
        .iter()
        .take(MAX_BUTTONS)
        .enumerate()
        .map(|(choice, option)| {
            serenity::CreateButton::new(personality_button_id(thread, step, choice))
                .label(option.label.clone())
                .style(serenity::ButtonStyle::Primary)
        })
        .collect();
    let rows = buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|row| serenity::CreateActionRow::Buttons(row.to_vec()))
        .collect();

    let channel = serenity::ChannelId::new(thread.get());
    channel
        .send_message(
            &*http,
            serenity::CreateMessage::new()
                .content(format!(
                    "<@{owner}> **Question {}/{}**\n{}",
                    step + 1,
                    test.steps.len(),
                    question.text
                ))
                .components(rows),
        )
        .await?;

    personality
        .arm_step_timeout(thread, step, move |result| async move {
            let text = format!("⏰ Time's up!\n{}", describe_result(&result));
            if let Err(e) = channel.say(&http, text).await {
                warn!("could not announce personality timeout: {e}");
            }
        })
        .await;
    Ok(())
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::ask_step;
    use crate::{
        bot::{BotData, channel_id, guild_of, in_thread, user_id},
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;
    use std::sync::Arc;
    use tracing::warn;

    /// Personality tests.
    #[poise::command(prefix_command, slash_command, subcommands("pt_start"))]
    pub async fn pt(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say(format!("🧠 Start a personality test with `{}pt start`.", ctx.prefix()))
            .await?;
        Ok(())
    }

    /// Starts a random personality test in a thread.
    #[poise::command(prefix_command, slash_command, rename = "start")]
    pub async fn pt_start(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let user = user_id(ctx.author().id);
        let personality = &ctx.data().personality;
        let here = ctx.channel_id();
        personality.ensure_free(channel_id(here), guild, user)?;
        let picked = personality.pick(user, &mut rand::thread_rng())?;

        let in_thread = in_thread(ctx).await;
        let thread = if in_thread {
            here
        } else {
            let builder = serenity::CreateThread::new(format!(
                "🧠 {} | {}",
                picked.test.title,
                ctx.author().name
            ))
            .kind(serenity::ChannelType::PublicThread);
            here.create_thread(ctx.http(), builder).await?.id
        };

        if let Err(e) = personality.start(channel_id(thread), guild, user, &picked, Utc::now()) {
            if !in_thread {
                if let Err(delete) = thread.delete(ctx.http()).await {
                    warn!(%thread, "could not delete unused test thread: {delete}");
                }
            }
            return Err(e);
        }

        let mut intro = format!("🧠 **{}**\n{}", picked.test.title, picked.test.description);
        if picked.cycled {
            intro.push_str("\n_You've taken every test, so they start over!_");
        }
        thread.say(ctx.http(), intro).await?;
        ask_step(
            Arc::clone(&ctx.serenity_context().http),
            personality,
            channel_id(thread),
        )
        .await?;

        if !in_thread {
            ctx.say(format!("🧠 Your test is waiting in <#{thread}>")).await?;
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
