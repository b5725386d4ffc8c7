//! Button interactions of the personality test and the drawing date.
//!
//! Custom ids carry everything needed to route a click without extra state:
//! `pt:{thread}:{step}:{choice}` and `dd:{key}:{step}`. The step lets a late
//! or repeated click be recognised as stale.

use crate::{
    bot::{
        BotData,
        commands::{
            drawing::{announce_turn, compliments},
            personality::{ask_step, describe_result},
        },
        user_id,
    },
    core::{
        ids::{ChannelId, MessageId, UserId},
        session::Progress,
    },
    errors::Result,
};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::debug;

/// A decoded button click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Answer `choice` to `step` of the test running in `thread`.
    Personality {
        thread: ChannelId,
        step: usize,
        choice: usize,
    },
    /// The artist of `step` finished drawing in the date `key`.
    Drawing { key: MessageId, step: usize },
}

#[must_use]
pub fn personality_button_id(thread: ChannelId, step: usize, choice: usize) -> String {
    format!("pt:{thread}:{step}:{choice}")
}

#[must_use]
pub fn drawing_button_id(key: MessageId, step: usize) -> String {
    format!("dd:{key}:{step}")
}

/// Decodes a custom id; ids of other features yield `None`.
#[must_use]
pub fn parse_custom_id(id: &str) -> Option<ButtonAction> {
    let mut parts = id.split(':');
    let action = match parts.next()? {
        "pt" => ButtonAction::Personality {
            thread: parts.next()?.parse().ok()?,
            step: parts.next()?.parse().ok()?,
            choice: parts.next()?.parse().ok()?,
        },
        "dd" => ButtonAction::Drawing {
            key: parts.next()?.parse().ok()?,
            step: parts.next()?.parse().ok()?,
        },
        _ => return None,
    };
    parts.next().is_none().then_some(action)
}

/// Routes a button click to its game.
pub async fn handle(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &BotData,
) -> Result<()> {
    let Some(action) = parse_custom_id(&component.data.custom_id) else {
        debug!(custom_id = %component.data.custom_id, "ignoring unknown button");
        return Ok(());
    };
    let user = user_id(component.user.id);

    let result = match action {
        ButtonAction::Personality {
            thread,
            step,
            choice,
        } => answer_personality(ctx, component, data, user, thread, step, choice).await,
        ButtonAction::Drawing { key, step } => finish_drawing(ctx, component, data, user, key, step).await,
    };

    match result {
        Err(e) if e.is_user_facing() => {
            let reply = serenity::CreateInteractionResponseMessage::new()
                .content(format!("❌ {e}"))
                .ephemeral(true);
            component
                .create_response(ctx, serenity::CreateInteractionResponse::Message(reply))
                .await?;
            Ok(())
        }
        other => other,
    }
}

/// Removes the buttons from the clicked message.
async fn close_buttons(ctx: &serenity::Context, component: &serenity::ComponentInteraction) -> Result<()> {
    let update = serenity::CreateInteractionResponseMessage::new().components(Vec::new());
    component
        .create_response(ctx, serenity::CreateInteractionResponse::UpdateMessage(update))
        .await?;
    Ok(())
}

async fn answer_personality(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &BotData,
    user: UserId,
    thread: ChannelId,
    step: usize,
    choice: usize,
) -> Result<()> {
    let progress = data
        .personality
        .choose(thread, user, step, choice, Utc::now())
        .await?;
    close_buttons(ctx, component).await?;

    match progress {
        Progress::Next { .. } => ask_step(Arc::clone(&ctx.http), &data.personality, thread).await,
        Progress::Completed(result) => {
            component
                .channel_id
                .say(ctx, describe_result(&result))
                .await?;
            Ok(())
        }
    }
}

async fn finish_drawing(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &BotData,
    user: UserId,
    key: MessageId,
    step: usize,
) -> Result<()> {
    let progress = data.drawing.finish_turn(key, user, step, Utc::now()).await?;
    close_buttons(ctx, component).await?;

    match progress {
        Progress::Next { .. } => {
            announce_turn(Arc::clone(&ctx.http), &data.drawing, component.channel_id, key).await
        }
        Progress::Completed(artists) => {
            let text = compliments(&data.drawing, &artists);
            component.channel_id.say(ctx, text).await?;
            Ok(())
        }
    }
}
