//! Campfire confession game.
//!
//! One campfire per guild per day. Campers gather around it; once it is full a
//! random camper is chosen to confess by DM, anonymously or publicly. After the
//! confession is posted the campers react to it, and the campfire closes when
//! everyone reacted or the reaction window times out.
//!
//! The live flow is a [`Session`] keyed by guild with a single confession step.
//! The durable [`CampfireRecord`] mirrors it so that history survives restarts.

use crate::{
    core::{
        ids::{ChannelId, GuildId, MessageId, UserId},
        registry::SessionRegistry,
        session::{Joined, Progress, Rejected, Session, TurnPlan},
        timer::{self, TimerSlot},
    },
    errors::{Error, Result},
    store::{CampfireReaction, CampfireRecord, Campfires, JsonStore, Visibility},
};
use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{error, info, instrument};

/// A confession delivered by the chosen camper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confession {
    pub message: String,
    pub visibility: Visibility,
}

/// Single-step plan: the chosen camper confesses.
#[derive(Debug, Default)]
pub struct ConfessionPlan {
    chosen: Option<UserId>,
    confession: Option<Confession>,
}

impl ConfessionPlan {
    /// Camper picked to confess, once the campfire is full.
    #[must_use]
    pub const fn chosen(&self) -> Option<UserId> {
        self.chosen
    }
}

impl TurnPlan for ConfessionPlan {
    type Input = Confession;
    type Outcome = Option<Confession>;

    fn total_steps(&self) -> usize {
        1
    }

    fn actor_for(&self, _step: usize, _participants: &[UserId]) -> Option<UserId> {
        self.chosen
    }

    fn record(&mut self, _step: usize, _actor: UserId, input: Confession) -> std::result::Result<(), Rejected> {
        if input.message.trim().is_empty() {
            return Err(Rejected::InvalidChoice);
        }
        self.confession = Some(input);
        Ok(())
    }

    fn outcome(&self) -> Option<Confession> {
        self.confession.clone()
    }

    fn on_start(&mut self, participants: &[UserId]) {
        self.chosen = participants.choose(&mut rand::thread_rng()).copied();
    }
}

/// Result of joining a campfire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampfireJoin {
    /// Still waiting for campers.
    Waiting { joined: usize, capacity: usize },
    /// The campfire is full and `chosen` must confess.
    Full { chosen: UserId },
}

/// A posted confession, with the record as saved.
#[derive(Debug, Clone)]
pub struct Confessed {
    pub guild: GuildId,
    pub record: CampfireRecord,
}

/// Result of a reaction on a confession message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Not a campfire reaction, or a camper reacting twice.
    Ignored,
    Recorded,
    /// Every camper reacted; the record is final.
    Closed(CampfireRecord),
}

/// Timing and size of campfires.
#[derive(Debug, Clone, Copy)]
pub struct CampfireSettings {
    pub max_campers: usize,
    pub confession_timeout: Duration,
    pub reaction_timeout: Duration,
}

#[derive(Debug)]
struct ReactionWindow {
    guild: GuildId,
    campers: Vec<UserId>,
    reactions: Vec<CampfireReaction>,
    timer: TimerSlot,
}

type Windows = Arc<StdMutex<HashMap<MessageId, ReactionWindow>>>;

/// Campfire game service.
#[derive(Clone)]
pub struct Campfire {
    store: JsonStore,
    sessions: SessionRegistry<GuildId, ConfessionPlan>,
    windows: Windows,
    settings: CampfireSettings,
}

impl Campfire {
    #[must_use]
    pub fn new(store: JsonStore, settings: CampfireSettings) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            windows: Arc::default(),
            settings,
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<MessageId, ReactionWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn record(&self, guild: GuildId) -> Result<Option<CampfireRecord>> {
        let campfires: Campfires = self.store.load().await?;
        Ok(campfires.0.get(&guild).cloned())
    }

    async fn update_record<R: Send>(
        &self,
        guild: GuildId,
        mutate: impl FnOnce(&mut CampfireRecord) -> R + Send,
    ) -> Result<R> {
        update_record(&self.store, guild, mutate).await
    }

    /// Lights today's campfire in `guild`.
    #[instrument(skip(self))]
    pub async fn lit(
        &self,
        guild: GuildId,
        starter: UserId,
        channel: ChannelId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let live = self
            .sessions
            .inspect(&guild, |session| !session.state().is_terminal())
            .await
            .unwrap_or(false);
        if live {
            return Err(Rejected::SessionAlreadyActive.into());
        }
        if self.record(guild).await?.is_some_and(|r| r.confessed_on(today)) {
            return Err(Error::CampfireEnded);
        }

        let session = Session::new(guild, self.settings.max_campers, ConfessionPlan::default(), now);
        self.sessions.try_create(guild, session)?;

        let written = self
            .update_record(guild, |record| {
                *record = CampfireRecord {
                    starter_camper: Some(starter),
                    active: true,
                    starter_camper_channel_id: Some(channel),
                    last_reset: Some(today),
                    ..CampfireRecord::default()
                };
            })
            .await;
        if let Err(e) = written {
            self.sessions.remove(&guild);
            return Err(e);
        }
        info!("campfire lit");
        Ok(())
    }

    /// Remembers the thread the campfire talks in.
    pub async fn set_thread(&self, guild: GuildId, thread: ChannelId) -> Result<()> {
        self.update_record(guild, |record| record.thread_id = Some(thread))
            .await
    }

    /// Adds `user` to the campfire of `guild`.
    #[instrument(skip(self))]
    pub async fn join(&self, guild: GuildId, user: UserId, now: DateTime<Utc>) -> Result<CampfireJoin> {
        let joined = self.sessions.join(&guild, user, now).await?;
        let (campers, chosen) = self
            .sessions
            .inspect(&guild, |session| {
                (session.participants().to_vec(), session.plan().chosen())
            })
            .await
            .ok_or(Rejected::SessionNotFound)?;

        self.update_record(guild, |record| {
            record.campers = campers;
            record.chosen_camper = chosen;
        })
        .await?;

        Ok(match joined {
            Joined::Waiting { joined, capacity } => CampfireJoin::Waiting { joined, capacity },
            Joined::Started { actor } => {
                info!(chosen = %actor, "campfire full");
                CampfireJoin::Full { chosen: actor }
            }
        })
    }

    /// Arms the confession timer of `guild`.
    ///
    /// On expiry the record is closed and `on_expire` receives it.
    pub async fn arm_confession_timeout<F, Fut>(&self, guild: GuildId, on_expire: F)
    where
        F: FnOnce(CampfireRecord) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let store = self.store.clone();
        self.sessions
            .schedule_timeout(guild, 0, self.settings.confession_timeout, move |_| async move {
                let closed = update_record(&store, guild, |record| {
                    record.active = false;
                    record.chosen_camper = None;
                    record.clone()
                })
                .await;
                match closed {
                    Ok(record) => {
                        info!(%guild, "campfire confession timed out");
                        on_expire(record).await;
                    }
                    Err(e) => error!(%guild, "failed to close timed out campfire: {e}"),
                }
            })
            .await;
    }

    /// Finds the campfire where `user` is the chosen camper.
    async fn campfire_of_chosen(&self, user: UserId) -> Option<GuildId> {
        for guild in self.sessions.keys_for(user) {
            let chosen = self
                .sessions
                .inspect(&guild, |session| session.current_actor() == Some(user))
                .await;
            if chosen == Some(true) {
                return Some(guild);
            }
        }
        None
    }

    /// Delivers the confession of `user`.
    #[instrument(skip(self, message))]
    pub async fn confess(
        &self,
        user: UserId,
        visibility: Visibility,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Confessed> {
        let guild = self
            .campfire_of_chosen(user)
            .await
            .ok_or(Rejected::SessionNotFound)?;

        let confession = Confession {
            message: message.trim().to_string(),
            visibility,
        };
        let progress = self.sessions.respond(&guild, user, 0, confession, now).await?;
        let Progress::Completed(Some(confession)) = progress else {
            return Err(Rejected::Inactive.into());
        };

        let record = self
            .update_record(guild, |record| {
                record.confession_message = Some(confession.message);
                record.visibility = Some(confession.visibility);
                record.confessor = Some(user);
                record.active = false;
                record.chosen_camper = None;
                record.reactions.clear();
                record.clone()
            })
            .await?;
        info!(%guild, "confession recorded");
        Ok(Confessed { guild, record })
    }

    /// Opens the reaction round on the posted confession `message`.
    pub async fn open_reactions(&self, guild: GuildId, message: MessageId) -> Result<()> {
        let record = self
            .update_record(guild, |record| {
                record.confession_msg_id = Some(message);
                record.clone()
            })
            .await?;
        self.windows().insert(
            message,
            ReactionWindow {
                guild,
                campers: record.campers,
                reactions: Vec::new(),
                timer: TimerSlot::default(),
            },
        );
        Ok(())
    }

    /// Arms the reaction timer of `message`; `on_close` receives the final record.
    pub fn arm_reaction_timeout<F, Fut>(&self, message: MessageId, on_close: F)
    where
        F: FnOnce(CampfireRecord) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let campfire = self.clone();
        let handle = timer::schedule(self.settings.reaction_timeout, async move {
            let Some(window) = campfire.take_window(message, false) else {
                return;
            };
            // A reaction still being saved is in the window already.
            let guild = window.guild;
            let closed = campfire
                .update_record(guild, |record| {
                    merge_reactions(record, window.reactions);
                    record.clone()
                })
                .await;
            match closed {
                Ok(record) => on_close(record).await,
                Err(e) => error!(%guild, "failed to save campfire for summary: {e}"),
            }
        });

        match self.windows().get_mut(&message) {
            Some(window) => window.timer.arm(handle),
            None => handle.cancel(),
        }
    }

    fn take_window(&self, message: MessageId, cancel_timer: bool) -> Option<ReactionWindow> {
        let mut window = self.windows().remove(&message)?;
        if cancel_timer {
            window.timer.cancel();
        } else {
            window.timer.disarm();
        }
        Some(window)
    }

    /// Records the reaction of `user` on `message`.
    pub async fn react(&self, message: MessageId, user: UserId, emoji: &str) -> Result<ReactionOutcome> {
        let (guild, snapshot, complete) = {
            let mut windows = self.windows();
            let Some(window) = windows.get_mut(&message) else {
                return Ok(ReactionOutcome::Ignored);
            };
            if !window.campers.contains(&user) || window.reactions.iter().any(|r| r.user_id == user) {
                return Ok(ReactionOutcome::Ignored);
            }
            window.reactions.push(CampfireReaction {
                user_id: user,
                emoji: emoji.to_string(),
            });
            let complete = window.reactions.len() >= window.campers.len();
            (window.guild, window.reactions.clone(), complete)
        };
        if complete {
            self.take_window(message, true);
        }

        let record = self
            .update_record(guild, |record| {
                merge_reactions(record, snapshot);
                record.clone()
            })
            .await?;

        Ok(if complete {
            ReactionOutcome::Closed(record)
        } else {
            ReactionOutcome::Recorded
        })
    }

    /// Today's campfire record of `guild`, when it holds a confession.
    pub async fn history(&self, guild: GuildId, today: NaiveDate) -> Result<Option<CampfireRecord>> {
        Ok(self.record(guild).await?.filter(|r| r.confessed_on(today)))
    }

    /// Ends any running campfire of `guild` and starts today over.
    #[instrument(skip(self))]
    pub async fn reset(&self, guild: GuildId, channel: ChannelId, today: NaiveDate) -> Result<()> {
        match self.sessions.reset(&guild).await {
            Ok(()) | Err(Rejected::SessionNotFound | Rejected::Inactive) => {}
            Err(e) => return Err(e.into()),
        }
        let stale: Vec<MessageId> = self
            .windows()
            .iter()
            .filter(|(_, window)| window.guild == guild)
            .map(|(&message, _)| message)
            .collect();
        for message in stale {
            self.take_window(message, true);
        }

        self.update_record(guild, |record| {
            *record = CampfireRecord {
                starter_camper_channel_id: Some(channel),
                last_reset: Some(today),
                ..CampfireRecord::default()
            };
        })
        .await?;
        info!("campfire reset");
        Ok(())
    }

    /// Whether a campfire session is live in `guild`.
    #[must_use]
    pub fn is_live(&self, guild: GuildId) -> bool {
        self.sessions.contains(&guild)
    }
}

/// Adds the reactions of campers not yet in `record`.
fn merge_reactions(record: &mut CampfireRecord, reactions: Vec<CampfireReaction>) {
    for reaction in reactions {
        if !record.reactions.iter().any(|r| r.user_id == reaction.user_id) {
            record.reactions.push(reaction);
        }
    }
}

async fn update_record<R: Send>(
    store: &JsonStore,
    guild: GuildId,
    mutate: impl FnOnce(&mut CampfireRecord) -> R + Send,
) -> Result<R> {
    store
        .update::<Campfires, _, _>(|campfires| Ok(mutate(campfires.0.entry(guild).or_default())))
        .await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{day, temp_store};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GUILD: GuildId = GuildId::new(7);
    const CHANNEL: ChannelId = ChannelId::new(70);
    const A: UserId = UserId::new(1);
    const B: UserId = UserId::new(2);
    const C: UserId = UserId::new(3);

    fn settings() -> CampfireSettings {
        CampfireSettings {
            max_campers: 2,
            confession_timeout: Duration::from_secs(300),
            reaction_timeout: Duration::from_secs(300),
        }
    }

    async fn full_campfire(campfire: &Campfire) -> UserId {
        campfire.lit(GUILD, A, CHANNEL, day(1), Utc::now()).await.unwrap();
        campfire.join(GUILD, A, Utc::now()).await.unwrap();
        match campfire.join(GUILD, B, Utc::now()).await.unwrap() {
            CampfireJoin::Full { chosen } => chosen,
            other => panic!("campfire should be full, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lit_twice_is_rejected() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        campfire.lit(GUILD, A, CHANNEL, day(1), Utc::now()).await?;

        let again = campfire.lit(GUILD, B, CHANNEL, day(1), Utc::now()).await;
        assert!(matches!(again, Err(Error::Rejected(Rejected::SessionAlreadyActive))));
        Ok(())
    }

    #[tokio::test]
    async fn test_lit_inside_thread_keeps_that_thread() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let thread = ChannelId::new(71);
        campfire.lit(GUILD, A, thread, day(1), Utc::now()).await?;
        campfire.set_thread(GUILD, thread).await?;

        let record = campfire.record(GUILD).await?.unwrap();
        assert_eq!(record.thread_id, Some(thread));
        assert_eq!(record.starter_camper_channel_id, Some(thread));
        Ok(())
    }

    #[tokio::test]
    async fn test_join_fills_and_picks_a_camper() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        campfire.lit(GUILD, A, CHANNEL, day(1), Utc::now()).await?;

        let first = campfire.join(GUILD, A, Utc::now()).await?;
        assert_eq!(first, CampfireJoin::Waiting { joined: 1, capacity: 2 });
        let twice = campfire.join(GUILD, A, Utc::now()).await;
        assert!(matches!(twice, Err(Error::Rejected(Rejected::AlreadyJoined))));

        let CampfireJoin::Full { chosen } = campfire.join(GUILD, B, Utc::now()).await? else {
            panic!("expected a full campfire");
        };
        assert!([A, B].contains(&chosen));

        let full = campfire.join(GUILD, C, Utc::now()).await;
        assert!(matches!(full, Err(Error::Rejected(Rejected::SessionFull))));

        let record = campfire.record(GUILD).await?.unwrap();
        assert_eq!(record.campers, vec![A, B]);
        assert_eq!(record.chosen_camper, Some(chosen));
        Ok(())
    }

    #[tokio::test]
    async fn test_join_without_campfire() {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let result = campfire.join(GUILD, A, Utc::now()).await;
        assert!(matches!(result, Err(Error::Rejected(Rejected::SessionNotFound))));
    }

    #[tokio::test]
    async fn test_only_chosen_camper_confesses() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let chosen = full_campfire(&campfire).await;
        let other = if chosen == A { B } else { A };

        let wrong = campfire.confess(other, Visibility::Public, "hi", Utc::now()).await;
        assert!(matches!(wrong, Err(Error::Rejected(Rejected::SessionNotFound))));

        let confessed = campfire.confess(chosen, Visibility::Anonymous, "I ate the cake", Utc::now()).await?;
        assert_eq!(confessed.guild, GUILD);
        assert_eq!(confessed.record.confession_message.as_deref(), Some("I ate the cake"));
        assert_eq!(confessed.record.visibility, Some(Visibility::Anonymous));
        assert!(!confessed.record.active);
        assert_eq!(confessed.record.chosen_camper, None);
        assert!(!campfire.is_live(GUILD));

        // Today's campfire is over.
        let relit = campfire.lit(GUILD, A, CHANNEL, day(1), Utc::now()).await;
        assert!(matches!(relit, Err(Error::CampfireEnded)));
        assert!(campfire.history(GUILD, day(1)).await?.is_some());
        assert!(campfire.history(GUILD, day(2)).await?.is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_confession_timeout_closes_record_once() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let chosen = full_campfire(&campfire).await;
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        campfire
            .arm_confession_timeout(GUILD, move |record| async move {
                assert!(!record.active);
                assert_eq!(record.chosen_camper, None);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!campfire.is_live(GUILD));

        let late = campfire.confess(chosen, Visibility::Public, "too late", Utc::now()).await;
        assert!(late.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_reactions_close_when_all_campers_reacted() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let chosen = full_campfire(&campfire).await;
        campfire.confess(chosen, Visibility::Public, "secret", Utc::now()).await?;

        let message = MessageId::new(900);
        campfire.open_reactions(GUILD, message).await?;

        assert_eq!(campfire.react(message, C, "😳").await?, ReactionOutcome::Ignored);
        assert_eq!(campfire.react(message, A, "🔥").await?, ReactionOutcome::Recorded);
        assert_eq!(campfire.react(message, A, "💥").await?, ReactionOutcome::Ignored);

        let ReactionOutcome::Closed(record) = campfire.react(message, B, "😳").await? else {
            panic!("window should close");
        };
        assert_eq!(record.reactions.len(), 2);
        assert_eq!(record.confession_msg_id, Some(message));
        assert_eq!(campfire.react(message, B, "😳").await?, ReactionOutcome::Ignored);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_window_times_out() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let chosen = full_campfire(&campfire).await;
        campfire.confess(chosen, Visibility::Public, "secret", Utc::now()).await?;

        let message = MessageId::new(901);
        campfire.open_reactions(GUILD, message).await?;
        campfire.react(message, A, "🔥").await?;

        let summaries = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&summaries);
        campfire.arm_reaction_timeout(message, move |record| async move {
            assert_eq!(record.reactions.len(), 1);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(summaries.load(Ordering::SeqCst), 1);
        assert_eq!(campfire.react(message, B, "😳").await?, ReactionOutcome::Ignored);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_summary_includes_unsaved_reaction() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        let chosen = full_campfire(&campfire).await;
        campfire.confess(chosen, Visibility::Anonymous, "secret", Utc::now()).await?;

        let message = MessageId::new(902);
        campfire.open_reactions(GUILD, message).await?;
        campfire.react(message, A, "🔥").await?;
        // Accepted by the window, its record write not done yet.
        campfire
            .windows()
            .get_mut(&message)
            .unwrap()
            .reactions
            .push(CampfireReaction {
                user_id: B,
                emoji: "😳".to_string(),
            });

        let summaries = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&summaries);
        campfire.arm_reaction_timeout(message, move |record| async move {
            assert_eq!(record.reactions.len(), 2);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(summaries.load(Ordering::SeqCst), 1);
        let record = campfire.record(GUILD).await?.unwrap();
        assert_eq!(record.reactions.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_ends_live_campfire() -> Result<()> {
        let (_dir, store) = temp_store();
        let campfire = Campfire::new(store, settings());
        full_campfire(&campfire).await;

        campfire.reset(GUILD, CHANNEL, day(1)).await?;
        assert!(!campfire.is_live(GUILD));
        let record = campfire.record(GUILD).await?.unwrap();
        assert!(record.campers.is_empty());
        assert!(!record.active);

        campfire.lit(GUILD, B, CHANNEL, day(1), Utc::now()).await?;
        Ok(())
    }
}
