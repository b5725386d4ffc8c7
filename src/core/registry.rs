//! Session registry - maps a session key to at most one live session.
//!
//! Each feature owns one registry (campfires keyed by guild, personality tests
//! keyed by thread, drawing dates keyed by the invoking message). The registry
//! also indexes participants per guild so that nobody takes part in two live
//! sessions of the same feature in the same guild.
//!
//! The map itself sits behind a short-lived `std::sync::Mutex` that is never
//! held across an await, which makes create-if-absent atomic. Each session
//! sits behind its own `tokio::sync::Mutex`, so transitions of one session are
//! serialised while different sessions proceed independently.

use crate::core::{
    ids::{GuildId, UserId},
    session::{Joined, Progress, Rejected, Session, TurnPlan},
    timer,
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::debug;

/// A session shared between the registry and in-flight handlers.
pub type SharedSession<P> = Arc<Mutex<Session<P>>>;

struct Slot<P> {
    guild: GuildId,
    session: SharedSession<P>,
}

struct Inner<K, P> {
    sessions: HashMap<K, Slot<P>>,
    members: HashMap<(GuildId, UserId), K>,
}

impl<K: Eq + Hash + Clone, P> Inner<K, P> {
    fn evict(&mut self, key: &K) -> Option<Slot<P>> {
        let slot = self.sessions.remove(key)?;
        self.members.retain(|_, member_of| member_of != key);
        Some(slot)
    }

    fn busy_elsewhere(&self, key: &K, guild: GuildId, user: UserId) -> bool {
        self.members
            .get(&(guild, user))
            .is_some_and(|member_of| member_of != key)
    }
}

/// Registry of live sessions of one feature.
pub struct SessionRegistry<K, P> {
    inner: Arc<StdMutex<Inner<K, P>>>,
}

impl<K, P> Clone for SessionRegistry<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash + Clone, P> Default for SessionRegistry<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, P> SessionRegistry<K, P> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StdMutex::new(Inner {
                sessions: HashMap::new(),
                members: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, P>> {
        // The map is always left consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the session stored at `key`, live or not yet evicted.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<SharedSession<P>> {
        self.lock()
            .sessions
            .get(key)
            .map(|slot| Arc::clone(&slot.session))
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.lock().sessions.contains_key(key)
    }

    /// Removes the session at `key` and frees its participants.
    pub fn remove(&self, key: &K) -> Option<SharedSession<P>> {
        self.lock().evict(key).map(|slot| slot.session)
    }

    /// Removes the session at `key` only if it is still `session`.
    fn remove_if_same(&self, key: &K, session: &SharedSession<P>) {
        let mut inner = self.lock();
        let same = inner
            .sessions
            .get(key)
            .is_some_and(|slot| Arc::ptr_eq(&slot.session, session));
        if same {
            inner.evict(key);
        }
    }

    /// Keys of the live sessions `user` takes part in, across guilds.
    #[must_use]
    pub fn keys_for(&self, user: UserId) -> Vec<K> {
        self.lock()
            .members
            .iter()
            .filter(|((_, member), _)| *member == user)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Whether `user` takes part in a live session in `guild`.
    #[must_use]
    pub fn is_busy(&self, guild: GuildId, user: UserId) -> bool {
        self.lock().members.contains_key(&(guild, user))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers `user` as a participant of `key`. Returns whether it was new.
    fn enlist(&self, key: &K, guild: GuildId, user: UserId) -> Result<bool, Rejected> {
        let mut inner = self.lock();
        if inner.busy_elsewhere(key, guild, user) {
            return Err(Rejected::ParticipantBusy { user });
        }
        Ok(inner.members.insert((guild, user), key.clone()).is_none())
    }

    fn delist(&self, key: &K, guild: GuildId, user: UserId) {
        let mut inner = self.lock();
        if inner.members.get(&(guild, user)) == Some(key) {
            inner.members.remove(&(guild, user));
        }
    }
}

impl<K, P> SessionRegistry<K, P>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    P: TurnPlan + Send + 'static,
    P::Outcome: Send,
{
    /// Stores `session` at `key` unless a live session already occupies it.
    ///
    /// A terminal session left at `key` is replaced. Participants already in
    /// another live session of this registry in the same guild are refused.
    pub fn try_create(&self, key: K, session: Session<P>) -> Result<SharedSession<P>, Rejected> {
        let mut inner = self.lock();

        let occupied = inner.sessions.get(&key).map(|slot| {
            // A session locked by a handler is mid-transition, hence live.
            slot.session
                .try_lock()
                .map_or(true, |existing| !existing.state().is_terminal())
        });
        match occupied {
            Some(true) => return Err(Rejected::SessionAlreadyActive),
            Some(false) => {
                inner.evict(&key);
            }
            None => {}
        }

        let guild = session.guild();
        if let Some(&user) = session
            .participants()
            .iter()
            .find(|&&user| inner.busy_elsewhere(&key, guild, user))
        {
            return Err(Rejected::ParticipantBusy { user });
        }
        for &user in session.participants() {
            inner.members.insert((guild, user), key.clone());
        }

        let shared = Arc::new(Mutex::new(session));
        inner.sessions.insert(
            key,
            Slot {
                guild,
                session: Arc::clone(&shared),
            },
        );
        Ok(shared)
    }

    /// Adds `user` to the forming session at `key`.
    pub async fn join(&self, key: &K, user: UserId, now: DateTime<Utc>) -> Result<Joined, Rejected> {
        let shared = self.get(key).ok_or(Rejected::SessionNotFound)?;
        let mut session = shared.lock().await;
        let guild = session.guild();

        let newly_enlisted = self.enlist(key, guild, user)?;
        session.join(user, now).inspect_err(|_| {
            if newly_enlisted {
                self.delist(key, guild, user);
            }
        })
    }

    /// Delivers the answer of `actor` for `step`. Completed sessions leave
    /// the registry.
    pub async fn respond(
        &self,
        key: &K,
        actor: UserId,
        step: usize,
        input: P::Input,
        now: DateTime<Utc>,
    ) -> Result<Progress<P::Outcome>, Rejected> {
        let shared = self.get(key).ok_or(Rejected::SessionNotFound)?;
        let progress = shared.lock().await.respond(actor, step, input, now)?;
        if matches!(progress, Progress::Completed(_)) {
            self.remove_if_same(key, &shared);
        }
        Ok(progress)
    }

    /// Times out the session at `key` if it still awaits `step`.
    pub async fn expire(&self, key: &K, step: usize) -> Result<P::Outcome, Rejected> {
        let shared = self.get(key).ok_or(Rejected::SessionNotFound)?;
        self.expire_shared(key, &shared, step).await
    }

    async fn expire_shared(
        &self,
        key: &K,
        shared: &SharedSession<P>,
        step: usize,
    ) -> Result<P::Outcome, Rejected> {
        let outcome = shared.lock().await.expire(step)?;
        self.remove_if_same(key, shared);
        Ok(outcome)
    }

    /// Resets and removes the session at `key`.
    pub async fn reset(&self, key: &K) -> Result<(), Rejected> {
        let shared = self.get(key).ok_or(Rejected::SessionNotFound)?;
        let result = shared.lock().await.reset();
        self.remove_if_same(key, &shared);
        result
    }

    /// Reads the session at `key` under its lock.
    pub async fn inspect<R>(&self, key: &K, f: impl FnOnce(&Session<P>) -> R) -> Option<R> {
        let shared = self.get(key)?;
        let session = shared.lock().await;
        Some(f(&session))
    }

    /// Arms the inactivity timer of `step` for the session at `key`.
    ///
    /// When the timer fires while that exact session still awaits `step`, the
    /// session times out, leaves the registry, and `on_expire` receives the
    /// partial outcome. Any earlier timer of the session is cancelled.
    pub async fn schedule_timeout<F, Fut>(&self, key: K, step: usize, delay: Duration, on_expire: F)
    where
        F: FnOnce(P::Outcome) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(shared) = self.get(&key) else {
            return;
        };
        // Hold the session while arming so the timer cannot fire before it is installed.
        let mut session = shared.lock().await;

        let registry = self.clone();
        let target: Weak<Mutex<Session<P>>> = Arc::downgrade(&shared);
        let handle = timer::schedule(delay, async move {
            let Some(shared) = target.upgrade() else {
                return;
            };
            match registry.expire_shared(&key, &shared, step).await {
                Ok(outcome) => on_expire(outcome).await,
                Err(reason) => debug!(%reason, step, "inactivity timer found the session already moved on"),
            }
        });
        session.arm_timer(step, handle);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::session::{SessionState, tests::{Tally, tally}};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GUILD: GuildId = GuildId::new(100);
    const ALICE: UserId = UserId::new(1);
    const BOB: UserId = UserId::new(2);
    const CAROL: UserId = UserId::new(3);

    fn solo(user: UserId, steps: usize) -> Session<Tally> {
        let now = Utc::now();
        let mut session = Session::new(GUILD, 1, tally(steps), now);
        session.join(user, now).unwrap();
        session
    }

    #[test]
    fn test_one_session_per_key() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        registry.try_create(7, solo(ALICE, 2)).unwrap();

        let second = registry.try_create(7, solo(BOB, 2));
        assert_eq!(second.err(), Some(Rejected::SessionAlreadyActive));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_one_winner() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        let users = [ALICE, BOB, CAROL, UserId::new(4), UserId::new(5)];

        let mut tasks = Vec::new();
        for user in users {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.try_create(9, solo(user, 2)).is_ok()
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_participant_busy_in_same_guild() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        registry.try_create(1, solo(ALICE, 2)).unwrap();

        let again = registry.try_create(2, solo(ALICE, 2));
        assert_eq!(again.err(), Some(Rejected::ParticipantBusy { user: ALICE }));

        // Another guild is fine.
        let now = Utc::now();
        let mut elsewhere = Session::new(GuildId::new(200), 1, tally(2), now);
        elsewhere.join(ALICE, now).unwrap();
        assert!(registry.try_create(3, elsewhere).is_ok());
        assert_eq!(registry.keys_for(ALICE).len(), 2);
    }

    #[tokio::test]
    async fn test_join_checks_busy_and_rolls_back() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        registry.try_create(1, solo(ALICE, 2)).unwrap();
        registry
            .try_create(2, Session::new(GUILD, 2, tally(1), Utc::now()))
            .unwrap();

        let busy = registry.join(&2, ALICE, Utc::now()).await;
        assert_eq!(busy, Err(Rejected::ParticipantBusy { user: ALICE }));

        registry.join(&2, BOB, Utc::now()).await.unwrap();
        registry.join(&2, CAROL, Utc::now()).await.unwrap();
        let full = registry.join(&2, UserId::new(4), Utc::now()).await;
        assert_eq!(full, Err(Rejected::SessionFull));
        assert!(!registry.is_busy(GUILD, UserId::new(4)));
    }

    #[tokio::test]
    async fn test_completion_removes_session() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        registry.try_create(1, solo(ALICE, 2)).unwrap();

        registry.respond(&1, ALICE, 0, 1, Utc::now()).await.unwrap();
        assert!(registry.contains(&1));
        let done = registry.respond(&1, ALICE, 1, 1, Utc::now()).await.unwrap();
        assert_eq!(done, Progress::Completed(2));
        assert!(!registry.contains(&1));
        assert!(!registry.is_busy(GUILD, ALICE));

        let late = registry.respond(&1, ALICE, 1, 1, Utc::now()).await;
        assert_eq!(late, Err(Rejected::SessionNotFound));
    }

    #[tokio::test]
    async fn test_terminal_session_is_replaced() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        let shared = registry.try_create(1, solo(ALICE, 2)).unwrap();
        shared.lock().await.reset().unwrap();

        assert!(registry.try_create(1, solo(ALICE, 2)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once_and_removes() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        let shared = registry.try_create(1, solo(ALICE, 3)).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        registry
            .schedule_timeout(1, 0, Duration::from_secs(60), move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(shared.lock().await.state(), SessionState::TimedOut);
        assert!(!registry.contains(&1));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_before_timeout_cancels_it() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        registry.try_create(1, solo(ALICE, 3)).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        registry
            .schedule_timeout(1, 0, Duration::from_secs(60), move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        registry.respond(&1, ALICE, 0, 1, Utc::now()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(registry.contains(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_touch_new_session() {
        let registry: SessionRegistry<u64, Tally> = SessionRegistry::new();
        registry.try_create(1, solo(ALICE, 3)).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        registry
            .schedule_timeout(1, 0, Duration::from_secs(60), move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        // The session disappears without a reset and a new one takes the key.
        registry.remove(&1);
        let fresh = registry.try_create(1, solo(BOB, 3)).unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(fresh.lock().await.state(), SessionState::AwaitingInput);
    }
}
