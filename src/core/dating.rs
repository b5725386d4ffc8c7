//! Dating ledger - registrations, date requests, leaderboard and history.
//!
//! The free functions implement the rules on in-memory documents and leave
//! them untouched when they fail. [`Ledger`] runs them against the store: a
//! single gate serialises ledger mutations and every successful mutation
//! saves the documents it changed. Answering a request touches three files;
//! the request is removed last and a failed save rolls the others back, so a
//! failed answer can be retried.

use crate::{
    core::ids::{GuildId, UserId},
    errors::{Error, Result},
    store::{Contestant, Contestants, DateRequests, Document, History, HistoryRecord, JsonStore, Leaderboard},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Privilege level of the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Standard,
    /// May date themselves and send more requests per day.
    Elevated,
}

impl Privilege {
    #[must_use]
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Elevated)
    }
}

/// Daily request quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DailyLimits {
    pub daily_limit: usize,
    pub elevated_daily_limit: usize,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            daily_limit: 5,
            elevated_daily_limit: 10,
        }
    }
}

impl DailyLimits {
    #[must_use]
    pub const fn for_privilege(self, privilege: Privilege) -> usize {
        match privilege {
            Privilege::Standard => self.daily_limit,
            Privilege::Elevated => self.elevated_daily_limit,
        }
    }
}

/// Registers `user` in `guild` under `name`.
pub fn register(
    contestants: &mut Contestants,
    guild: GuildId,
    user: UserId,
    name: &str,
    today: NaiveDate,
) -> Result<()> {
    let users = contestants.0.entry(guild).or_default();
    if users.contains_key(&user) {
        return Err(Error::AlreadyRegistered);
    }
    users.insert(
        user,
        Contestant {
            name: name.to_string(),
            gender: "?".to_string(),
            registered_at: Some(today),
        },
    );
    Ok(())
}

/// Records a date request from `sender` to `receiver` for `today`.
#[allow(clippy::too_many_arguments)]
pub fn request_date(
    contestants: &Contestants,
    requests: &mut DateRequests,
    sender: UserId,
    receiver: UserId,
    guild: GuildId,
    today: NaiveDate,
    privilege: Privilege,
    limits: DailyLimits,
) -> Result<()> {
    if sender == receiver && !privilege.is_elevated() {
        return Err(Error::SelfDateDenied);
    }
    for user in [sender, receiver] {
        if !contestants.is_registered(guild, user) {
            return Err(Error::NotRegistered { user });
        }
    }

    let sent = requests.sent(guild, sender);
    if sent.iter().any(|&(to, day)| to == receiver && day == today) {
        return Err(Error::DuplicateRequest);
    }
    let limit = limits.for_privilege(privilege);
    let sent_today = sent.iter().filter(|&&(_, day)| day == today).count();
    if sent_today >= limit {
        return Err(Error::QuotaExceeded { limit });
    }

    requests.sent_mut(guild, sender).push((receiver, today));
    Ok(())
}

/// Removes every pending request from `requester` to `target`.
fn take_request(
    requests: &mut DateRequests,
    guild: GuildId,
    requester: UserId,
    target: UserId,
) -> Result<()> {
    if !requests.sent(guild, requester).iter().any(|&(to, _)| to == target) {
        return Err(Error::NoMatchingRequest { requester });
    }
    requests
        .sent_mut(guild, requester)
        .retain(|&(to, _)| to != target);
    Ok(())
}

/// `accepter` says yes to the pending request of `requester`.
pub fn accept_date(
    requests: &mut DateRequests,
    board: &mut Leaderboard,
    history: &mut History,
    accepter: UserId,
    requester: UserId,
    guild: GuildId,
) -> Result<()> {
    take_request(requests, guild, requester, accepter)?;

    *board.score_mut(guild, accepter) += 1;
    *board.score_mut(guild, requester) += 1;

    for (user, other) in [(accepter, requester), (requester, accepter)] {
        history.push(
            guild,
            user,
            HistoryRecord {
                other,
                matched: true,
                reason: None,
            },
        );
    }
    Ok(())
}

/// `rejecter` turns down the pending request of `requester`.
///
/// Only the rejecter scores; both parties keep the reason in their history.
pub fn reject_date(
    requests: &mut DateRequests,
    board: &mut Leaderboard,
    history: &mut History,
    rejecter: UserId,
    requester: UserId,
    guild: GuildId,
    reason: &str,
) -> Result<()> {
    take_request(requests, guild, requester, rejecter)?;

    *board.score_mut(guild, rejecter) += 1;

    for (user, other) in [(rejecter, requester), (requester, rejecter)] {
        history.push(
            guild,
            user,
            HistoryRecord {
                other,
                matched: false,
                reason: Some(reason.to_string()),
            },
        );
    }
    Ok(())
}

/// Scores of `guild`, highest first. Equal scores keep their stored order.
#[must_use]
pub fn ranking(board: &Leaderboard, guild: GuildId) -> Vec<(UserId, u32)> {
    let mut entries: Vec<(UserId, u32)> = board
        .0
        .get(&guild)
        .map(|scores| scores.iter().map(|(&user, &score)| (user, score)).collect())
        .unwrap_or_default();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

/// Requests, leaderboard and history, loaded together.
type Books = (DateRequests, Leaderboard, History);

/// Dating ledger backed by the JSON store.
#[derive(Debug)]
pub struct Ledger {
    store: JsonStore,
    limits: DailyLimits,
    gate: Mutex<()>,
}

impl Ledger {
    #[must_use]
    pub fn new(store: JsonStore, limits: DailyLimits) -> Self {
        Self {
            store,
            limits,
            gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn limits(&self) -> DailyLimits {
        self.limits
    }

    #[instrument(skip(self, name))]
    pub async fn register(&self, guild: GuildId, user: UserId, name: &str, today: NaiveDate) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.store
            .update::<Contestants, _, _>(|contestants| register(contestants, guild, user, name, today))
            .await?;
        info!("contestant registered");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn request_date(
        &self,
        sender: UserId,
        receiver: UserId,
        guild: GuildId,
        today: NaiveDate,
        privilege: Privilege,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;
        let contestants: Contestants = self.store.load().await?;
        let limits = self.limits;
        self.store
            .update::<DateRequests, _, _>(|requests| {
                request_date(&contestants, requests, sender, receiver, guild, today, privilege, limits)
            })
            .await?;
        info!("date requested");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn accept_date(&self, accepter: UserId, requester: UserId, guild: GuildId) -> Result<()> {
        let _gate = self.gate.lock().await;
        let before = self.load_books().await?;
        let (mut requests, mut board, mut history) = before.clone();
        accept_date(&mut requests, &mut board, &mut history, accepter, requester, guild)?;
        self.save_books(&before, &(requests, board, history)).await?;
        info!("date accepted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn reject_date(
        &self,
        rejecter: UserId,
        requester: UserId,
        guild: GuildId,
        reason: &str,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;
        let before = self.load_books().await?;
        let (mut requests, mut board, mut history) = before.clone();
        reject_date(&mut requests, &mut board, &mut history, rejecter, requester, guild, reason)?;
        self.save_books(&before, &(requests, board, history)).await?;
        info!("date rejected");
        Ok(())
    }

    pub async fn leaderboard(&self, guild: GuildId) -> Result<Vec<(UserId, u32)>> {
        let board: Leaderboard = self.store.load().await?;
        Ok(ranking(&board, guild))
    }

    pub async fn history(&self, guild: GuildId, user: UserId) -> Result<Vec<HistoryRecord>> {
        let history: History = self.store.load().await?;
        Ok(history.records(guild, user).to_vec())
    }

    /// Registered contestants of `guild`, sorted by id.
    pub async fn contestants(&self, guild: GuildId) -> Result<Vec<(UserId, Contestant)>> {
        let contestants: Contestants = self.store.load().await?;
        let mut list: Vec<(UserId, Contestant)> = contestants
            .of_guild(guild)
            .map(|(user, c)| (user, c.clone()))
            .collect();
        list.sort_by_key(|(user, _)| *user);
        Ok(list)
    }

    async fn load_books(&self) -> Result<Books> {
        Ok((
            self.store.load().await?,
            self.store.load().await?,
            self.store.load().await?,
        ))
    }

    /// Writes `after`; on failure the documents already written get their
    /// `before` contents back.
    async fn save_books(&self, before: &Books, after: &Books) -> Result<()> {
        self.store.save(&after.1).await?;
        if let Err(e) = self.store.save(&after.2).await {
            self.restore(&before.1).await;
            return Err(e);
        }
        if let Err(e) = self.store.save(&after.0).await {
            self.restore(&before.1).await;
            self.restore(&before.2).await;
            return Err(e);
        }
        Ok(())
    }

    async fn restore<D: Document>(&self, document: &D) {
        if let Err(e) = self.store.save(document).await {
            error!(file = D::FILE, "could not roll back ledger document: {e}");
        }
    }
}
