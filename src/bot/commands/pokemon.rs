//! Pokémon pet commands - the `poke` group.

use crate::core::pokemon::{MAX_LEVEL, PetView};
use poise::serenity_prelude as serenity;

/// Card of a pet; remote assets are shown as the embed image.
pub(crate) fn pet_embed(view: &PetView) -> serenity::CreateEmbed {
    let pet = &view.pet;
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("{} (Lv. {}/{MAX_LEVEL})", view.display_name(), pet.level))
        .description(format!("Species: **{}**", view.species.name))
        .field("Walks", pet.walks.to_string(), true)
        .field("Feeds", pet.feeds.to_string(), true)
        .field(
            "Battles",
            format!("{}W / {}L", pet.battle.win, pet.battle.loss),
            true,
        )
        .color(0x00E3_350D);
    let asset = view.current_asset();
    if asset.starts_with("http") {
        embed = embed.image(asset);
    }
    embed
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::pet_embed;
    use crate::{
        bot::{BotData, user_id},
        core::pokemon::BattleResult,
        errors::{Error, Result},
    };
    use rand::{SeedableRng, rngs::StdRng};

    /// Team Rocket Pokémon pets.
    #[poise::command(
        prefix_command,
        slash_command,
        subcommands(
            "poke_catch",
            "poke_name",
            "poke_show",
            "poke_walk",
            "poke_feed",
            "poke_battle"
        )
    )]
    pub async fn poke(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say(format!(
            "🐾 Pokémon commands: `{p}poke catch`, `{p}poke name <nickname>`, `{p}poke show`, \
             `{p}poke walk`, `{p}poke feed`, `{p}poke battle`",
            p = ctx.prefix()
        ))
        .await?;
        Ok(())
    }

    /// Catches a random Pokémon.
    #[poise::command(prefix_command, slash_command, rename = "catch")]
    pub async fn poke_catch(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let view = ctx
            .data()
            .pokemon
            .catch(user_id(ctx.author().id), &mut StdRng::from_entropy())
            .await?;
        ctx.send(
            poise::CreateReply::default()
                .content(format!("🎉 You caught a **{}**!", view.species.name))
                .embed(pet_embed(&view)),
        )
        .await?;
        Ok(())
    }

    /// Gives your Pokémon a nickname.
    #[poise::command(prefix_command, slash_command, rename = "name")]
    pub async fn poke_name(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "New nickname"]
        #[rest]
        nickname: String,
    ) -> Result<()> {
        ctx.data()
            .pokemon
            .rename(user_id(ctx.author().id), &nickname)
            .await?;
        ctx.say(format!("✏️ Your Pokémon is now called **{}**.", nickname.trim()))
            .await?;
        Ok(())
    }

    /// Shows your Pokémon.
    #[poise::command(prefix_command, slash_command, rename = "show")]
    pub async fn poke_show(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let view = ctx.data().pokemon.show(user_id(ctx.author().id)).await?;
        ctx.send(poise::CreateReply::default().embed(pet_embed(&view)))
            .await?;
        Ok(())
    }

    /// Takes your Pokémon for a walk.
    #[poise::command(prefix_command, slash_command, rename = "walk")]
    pub async fn poke_walk(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let view = ctx.data().pokemon.walk(user_id(ctx.author().id)).await?;
        ctx.say(format!(
            "🚶 You took **{}** for a walk! (walks: {})",
            view.display_name(),
            view.pet.walks
        ))
        .await?;
        Ok(())
    }

    /// Feeds your Pokémon.
    #[poise::command(prefix_command, slash_command, rename = "feed")]
    pub async fn poke_feed(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let view = ctx.data().pokemon.feed(user_id(ctx.author().id)).await?;
        ctx.say(format!(
            "🍖 **{}** enjoyed the meal! (feeds: {})",
            view.display_name(),
            view.pet.feeds
        ))
        .await?;
        Ok(())
    }

    /// Sends your Pokémon into a battle.
    #[poise::command(prefix_command, slash_command, rename = "battle")]
    pub async fn poke_battle(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (view, result) = ctx
            .data()
            .pokemon
            .battle(user_id(ctx.author().id), &mut StdRng::from_entropy())
            .await?;
        let text = match result {
            BattleResult::Win => format!("⚔️ **{}** won the battle!", view.display_name()),
            BattleResult::Loss => format!("💫 **{}** lost... Team Rocket is blasting off again!", view.display_name()),
        };
        ctx.say(text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
