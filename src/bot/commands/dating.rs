//! Dating ledger commands - the `tr` group.
//!
//! Registration, date requests and their answers, the leaderboard and the
//! per-user history. Every command runs inside a server.

use crate::{
    core::ids::UserId,
    store::{Contestant, HistoryRecord},
};

/// Entries per listing page.
pub(crate) const PAGE_SIZE: usize = 10;

/// Splits `lines` into pages of [`PAGE_SIZE`], each starting with `header`.
fn paginate_lines(header: &str, lines: &[String]) -> Vec<String> {
    lines
        .chunks(PAGE_SIZE)
        .map(|chunk| format!("{header}\n{}", chunk.join("\n")))
        .collect()
}

/// The leaderboard, ten ranks per page.
pub(crate) fn leaderboard_pages(ranking: &[(UserId, u32)]) -> Vec<String> {
    if ranking.is_empty() {
        return vec!["🏆 No dates yet. Be the first!".to_string()];
    }
    let lines: Vec<String> = ranking
        .iter()
        .enumerate()
        .map(|(rank, (user, score))| {
            let medal = match rank {
                0 => "🥇",
                1 => "🥈",
                2 => "🥉",
                _ => "▫️",
            };
            format!("{medal} `{}.` <@{user}> - {score}", rank + 1)
        })
        .collect();
    paginate_lines("🏆 **Rocket Leaderboard**", &lines)
}

/// Date history of `user`, oldest first.
pub(crate) fn history_pages(user: UserId, records: &[HistoryRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec![format!("📜 <@{user}> has no dates yet.")];
    }
    let lines: Vec<String> = records
        .iter()
        .map(|record| match (record.matched, record.reason.as_deref()) {
            (true, _) => format!("💘 Matched with <@{}>", record.other),
            (false, Some(reason)) => format!("💔 <@{}> - {reason}", record.other),
            (false, None) => format!("💔 <@{}>", record.other),
        })
        .collect();
    paginate_lines(&format!("📜 **Date history of <@{user}>**"), &lines)
}

/// Registered contestants, numbered in id order.
pub(crate) fn contestant_pages(contestants: &[(UserId, Contestant)]) -> Vec<String> {
    let lines: Vec<String> = contestants
        .iter()
        .enumerate()
        .map(|(i, (_, contestant))| format!("`{}.` {}", i + 1, contestant.name))
        .collect();
    paginate_lines("🚀 **Contestants**", &lines)
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{contestant_pages, history_pages, leaderboard_pages};
    use crate::{
        bot::{BotData, commands::general::HELP_TEXT, guild_of, notify, today, user_id},
        errors::{Error, Result},
    };
    use poise::serenity_prelude::{self as serenity, Mentionable};

    /// Sends one page as a plain message, more with page buttons.
    async fn send_pages(ctx: poise::Context<'_, BotData, Error>, pages: &[String]) -> Result<()> {
        match pages {
            [page] => {
                ctx.say(page.as_str()).await?;
            }
            _ => {
                let pages: Vec<&str> = pages.iter().map(String::as_str).collect();
                poise::builtins::paginate(ctx, &pages).await?;
            }
        }
        Ok(())
    }

    const DEFAULT_REASON: &str = "No reason provided";

    /// Team Rocket e-dating game.
    #[poise::command(
        prefix_command,
        slash_command,
        subcommands(
            "tr_reg",
            "tr_list",
            "tr_date",
            "tr_dateyes",
            "tr_dateno",
            "tr_leaderboard",
            "tr_history",
            "tr_help"
        )
    )]
    pub async fn tr(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say(HELP_TEXT).await?;
        Ok(())
    }

    /// Registers you as a contestant in this server.
    #[poise::command(prefix_command, slash_command, rename = "reg")]
    pub async fn tr_reg(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let author = ctx.author();
        let name = author.global_name.clone().unwrap_or_else(|| author.name.clone());

        ctx.data()
            .ledger
            .register(guild, user_id(author.id), &name, today())
            .await?;
        ctx.say(format!("✅ {} registered for Team Rocket E-Date!", author.mention()))
            .await?;
        Ok(())
    }

    /// Lists the registered contestants.
    #[poise::command(prefix_command, slash_command, rename = "list")]
    pub async fn tr_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let contestants = ctx.data().ledger.contestants(guild).await?;
        if contestants.is_empty() {
            ctx.say("🧨 No contestants yet!").await?;
            return Ok(());
        }

        send_pages(ctx, &contestant_pages(&contestants)).await
    }

    /// Asks a contestant out.
    #[poise::command(prefix_command, slash_command, rename = "date")]
    pub async fn tr_date(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Who to ask out"] user: serenity::User,
    ) -> Result<()> {
        let guild = guild_of(ctx)?;
        let sender = user_id(ctx.author().id);
        let receiver = user_id(user.id);
        let privilege = ctx.data().config.privilege_of(sender);

        ctx.data()
            .ledger
            .request_date(sender, receiver, guild, today(), privilege)
            .await?;
        ctx.say(format!(
            "💘 {} asked {} out! Reply with `{p}tr dateyes @user` or `{p}tr dateno @user <reason>`.",
            ctx.author().mention(),
            user.mention(),
            p = ctx.prefix()
        ))
        .await?;
        notify(
            ctx.http(),
            receiver,
            format!("💌 {} asked you out on a date! Answer in the server.", ctx.author().name),
        )
        .await;
        Ok(())
    }

    /// Accepts a date request.
    #[poise::command(prefix_command, slash_command, rename = "dateyes")]
    pub async fn tr_dateyes(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Who asked you out"] user: serenity::User,
    ) -> Result<()> {
        let guild = guild_of(ctx)?;
        let accepter = user_id(ctx.author().id);
        let requester = user_id(user.id);

        ctx.data().ledger.accept_date(accepter, requester, guild).await?;
        ctx.say(format!(
            "💘 {} said YES to {}! It's a match! 🧨",
            ctx.author().mention(),
            user.mention()
        ))
        .await?;
        notify(
            ctx.http(),
            requester,
            format!("💘 {} accepted your date!", ctx.author().name),
        )
        .await;
        Ok(())
    }

    /// Turns a date request down.
    #[poise::command(prefix_command, slash_command, rename = "dateno")]
    pub async fn tr_dateno(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Who asked you out"] user: serenity::User,
        #[description = "Why not?"]
        #[rest]
        reason: Option<String>,
    ) -> Result<()> {
        let guild = guild_of(ctx)?;
        let rejecter = user_id(ctx.author().id);
        let requester = user_id(user.id);
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REASON.to_string());

        ctx.data()
            .ledger
            .reject_date(rejecter, requester, guild, &reason)
            .await?;
        ctx.say(format!("✅ Rejection recorded for {} 💔", user.mention()))
            .await?;
        notify(
            ctx.http(),
            requester,
            format!("💔 {} turned your date down: {reason}", ctx.author().name),
        )
        .await;
        Ok(())
    }

    /// Shows the date leaderboard.
    #[poise::command(prefix_command, slash_command, rename = "leaderboard")]
    pub async fn tr_leaderboard(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_of(ctx)?;
        let ranking = ctx.data().ledger.leaderboard(guild).await?;
        send_pages(ctx, &leaderboard_pages(&ranking)).await
    }

    /// Shows someone's date history (yours by default).
    #[poise::command(prefix_command, slash_command, rename = "history")]
    pub async fn tr_history(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Whose history"] user: Option<serenity::User>,
    ) -> Result<()> {
        let guild = guild_of(ctx)?;
        let target = user_id(user.as_ref().map_or(ctx.author().id, |u| u.id));
        let records = ctx.data().ledger.history(guild, target).await?;
        send_pages(ctx, &history_pages(target, &records)).await
    }

    /// Shows every RocketBot command.
    #[poise::command(prefix_command, slash_command, rename = "help")]
    pub async fn tr_help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say(HELP_TEXT).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rejection(other: u64) -> HistoryRecord {
        HistoryRecord {
            other: UserId::new(other),
            matched: false,
            reason: Some("washing my Meowth".to_string()),
        }
    }

    #[test]
    fn test_leaderboard_pages_keep_ranks() {
        let ranking: Vec<(UserId, u32)> = (1..=12u32).rev().map(|n| (UserId::new(u64::from(n)), n)).collect();
        let pages = leaderboard_pages(&ranking);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("🥇 `1.` <@12> - 12"));
        assert!(pages[0].contains("`10.` <@3> - 3"));
        assert!(!pages[0].contains("<@2>"));
        assert!(pages[1].starts_with("🏆 **Rocket Leaderboard**"));
        assert!(pages[1].contains("`12.` <@1> - 1"));
    }

    #[test]
    fn test_history_lines() {
        let records = vec![
            HistoryRecord {
                other: UserId::new(2),
                matched: true,
                reason: None,
            },
            HistoryRecord {
                other: UserId::new(3),
                matched: false,
                reason: Some("busy".to_string()),
            },
        ];
        let pages = history_pages(UserId::new(1), &records);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("💘 Matched with <@2>"));
        assert!(pages[0].contains("💔 <@3> - busy"));
        assert!(history_pages(UserId::new(1), &[])[0].contains("no dates yet"));
    }

    #[test]
    fn test_long_history_fits_discord_messages() {
        let records: Vec<HistoryRecord> = (0..60).map(|n| rejection(688_898_170_276_675_000 + n)).collect();
        let pages = history_pages(UserId::new(409_049_845_240_692_736), &records);
        assert_eq!(pages.len(), 6);
        for page in &pages {
            assert!(page.chars().count() <= 2000, "page too long: {}", page.len());
            assert_eq!(page.lines().count(), PAGE_SIZE + 1);
        }
    }

    #[test]
    fn test_contestants_are_paged() {
        let contestants: Vec<(UserId, Contestant)> = (1..=25u64)
            .map(|n| {
                let contestant = Contestant {
                    name: format!("Grunt {n}"),
                    gender: "?".to_string(),
                    registered_at: NaiveDate::from_ymd_opt(2024, 1, 1),
                };
                (UserId::new(n), contestant)
            })
            .collect();
        let pages = contestant_pages(&contestants);
        assert_eq!(pages.len(), 3);
        assert!(pages[2].contains("`21.` Grunt 21"));
    }
}
