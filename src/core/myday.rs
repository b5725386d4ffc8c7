//! MyDay - a few random contestants are invited each day to share their day.
//!
//! Invited users answer by DM; a trailing `public` or `private` decides whether
//! the entry is announced in the server.

use crate::{
    core::ids::{GuildId, UserId},
    errors::{Error, Result},
    store::{Contestants, JsonStore, MyDayEntry, MyDayRound, MyDays, Privacy},
};
use chrono::NaiveDate;
use rand::{Rng, seq::SliceRandom};
use tracing::{info, instrument};

/// Splits a trailing privacy keyword off `text`. Entries are public by default.
#[must_use]
pub fn parse_entry(text: &str) -> (String, Privacy) {
    let text = text.trim();
    for (suffix, privacy) in [(" private", Privacy::Private), (" public", Privacy::Public)] {
        let split = text.len().saturating_sub(suffix.len());
        let matches = text.get(split..).is_some_and(|tail| tail.eq_ignore_ascii_case(suffix));
        if let (true, Some(head)) = (matches, text.get(..split)) {
            return (head.trim().to_string(), privacy);
        }
    }
    (text.to_string(), Privacy::Public)
}

/// A saved MyDay entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub guild: GuildId,
    pub message: String,
    pub privacy: Privacy,
}

/// MyDay service.
#[derive(Debug, Clone)]
pub struct MyDay {
    store: JsonStore,
    picks: usize,
}

impl MyDay {
    #[must_use]
    pub const fn new(store: JsonStore, picks: usize) -> Self {
        Self { store, picks }
    }

    /// Picks today's contestants of `guild`.
    #[instrument(skip(self, rng))]
    pub async fn start(&self, guild: GuildId, today: NaiveDate, rng: &mut (impl Rng + Send)) -> Result<Vec<UserId>> {
        let contestants: Contestants = self.store.load().await?;
        let pool: Vec<UserId> = contestants.of_guild(guild).map(|(user, _)| user).collect();
        let picks = self.picks;

        let chosen = self
            .store
            .update::<MyDays, _, _>(|days| {
                let rounds = days.0.entry(guild).or_default();
                if rounds.contains_key(&today) {
                    return Err(Error::MyDayAlreadyStarted);
                }
                if pool.len() < picks {
                    return Err(Error::NotEnoughContestants { needed: picks });
                }
                let chosen: Vec<UserId> = pool.choose_multiple(rng, picks).copied().collect();
                rounds.insert(
                    today,
                    MyDayRound {
                        chosen: chosen.clone(),
                        ..MyDayRound::default()
                    },
                );
                Ok(chosen)
            })
            .await?;
        info!(count = chosen.len(), "myday started");
        Ok(chosen)
    }

    /// Drops today's round of `guild`.
    pub async fn reset(&self, guild: GuildId, today: NaiveDate) -> Result<()> {
        self.store
            .update::<MyDays, _, _>(|days| {
                days.0
                    .get_mut(&guild)
                    .and_then(|rounds| rounds.shift_remove(&today))
                    .map(drop)
                    .ok_or(Error::MyDayNotStarted)
            })
            .await
    }

    /// Today's round of `guild`.
    pub async fn history(&self, guild: GuildId, today: NaiveDate) -> Result<MyDayRound> {
        let days: MyDays = self.store.load().await?;
        days.round(guild, today).cloned().ok_or(Error::MyDayNotStarted)
    }

    /// Saves the DM entry of `user` in the first guild that chose them today.
    #[instrument(skip(self, text))]
    pub async fn submit(&self, user: UserId, text: &str, today: NaiveDate) -> Result<Submission> {
        let (message, privacy) = parse_entry(text);
        if message.is_empty() {
            return Err(Error::NoContent {
                what: "MyDay message".to_string(),
            });
        }

        self.store
            .update::<MyDays, _, _>(|days| {
                let (guild, round) = days
                    .0
                    .iter_mut()
                    .find_map(|(&guild, rounds)| {
                        rounds
                            .get_mut(&today)
                            .filter(|round| round.chosen.contains(&user))
                            .map(|round| (guild, round))
                    })
                    .ok_or(Error::NotChosen)?;
                round.entries.insert(
                    user,
                    MyDayEntry {
                        message: message.clone(),
                        privacy,
                    },
                );
                Ok(Submission {
                    guild,
                    message,
                    privacy,
                })
            })
            .await
    }
}
