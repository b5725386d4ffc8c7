//! General Discord commands - ping and the help text shared by `tr help`.

/// Overview of every game, shown by `tr help` and by the `tr` group itself.
pub const HELP_TEXT: &str = "🚀 **RocketBot Help**\n\n\
**Dating**\n\
• `.tr reg` - Register as a contestant in this server.\n\
• `.tr list` - List the contestants.\n\
• `.tr date @user` - Ask someone out.\n\
• `.tr dateyes @user` / `.tr dateno @user [reason]` - Answer a request.\n\
• `.tr leaderboard` / `.tr history [@user]` - Scores and past dates.\n\n\
**Campfire**\n\
• `.cc lit`, `.cc join`, `.cc history`, `.cc reset`\n\
• `.cc confess yes|no <message>` - In DMs, when the fire picked you.\n\n\
**Other games**\n\
• `.pt start` - Take a personality test.\n\
• `.dd @user` - Start a drawing date.\n\
• `.poke catch|name|show|walk|feed|battle` - Raise a Pokémon.\n\
• `.myday start|reset|history` - Daily MyDay; chosen players DM `.myday <message> [public|private]`.";

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
