//! Personality tests.
//!
//! A test is a list of multiple-choice steps; every choice carries points per
//! personality category. One user takes a test inside a thread, answering one
//! step at a time. The category with the most points wins.

use crate::{
    core::{
        ids::{ChannelId, GuildId, UserId},
        registry::SessionRegistry,
        session::{Progress, Rejected, Session, TurnPlan},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub label: String,
    #[serde(default)]
    pub points: IndexMap<String, i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Step {
    pub text: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// One test of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersonalityTest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
    /// Description of each personality category.
    #[serde(default)]
    pub final_result: IndexMap<String, String>,
}

/// Result of a finished or abandoned test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalityResult {
    pub title: String,
    /// Winning category; `None` when no points were scored.
    pub personality: Option<String>,
    pub description: Option<String>,
}

/// Category with the highest score. Ties go to the category scored first.
#[must_use]
pub fn top_category(points: &IndexMap<String, i32>) -> Option<&str> {
    let mut best: Option<(&str, i32)> = None;
    for (category, &score) in points {
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((category, score));
        }
    }
    best.map(|(category, _)| category)
}

/// Running state of one test.
#[derive(Debug)]
pub struct PersonalityPlan {
    test: Arc<PersonalityTest>,
    points: IndexMap<String, i32>,
}

impl PersonalityPlan {
    #[must_use]
    pub fn new(test: Arc<PersonalityTest>) -> Self {
        Self {
            test,
            points: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn test(&self) -> &PersonalityTest {
        &self.test
    }

    #[must_use]
    pub const fn points(&self) -> &IndexMap<String, i32> {
        &self.points
    }
}

impl TurnPlan for PersonalityPlan {
    /// Index of the chosen option.
    type Input = usize;
    type Outcome = PersonalityResult;

    fn total_steps(&self) -> usize {
        self.test.steps.len()
    }

    fn actor_for(&self, _step: usize, participants: &[UserId]) -> Option<UserId> {
        participants.first().copied()
    }

    fn record(&mut self, step: usize, _actor: UserId, choice: usize) -> std::result::Result<(), Rejected> {
        let choice = self
            .test
            .steps
            .get(step)
            .and_then(|s| s.choices.get(choice))
            .ok_or(Rejected::InvalidChoice)?;
        for (category, &amount) in &choice.points {
            *self.points.entry(category.clone()).or_default() += amount;
        }
        Ok(())
    }

    fn outcome(&self) -> PersonalityResult {
        let personality = top_category(&self.points).map(str::to_string);
        let description = personality
            .as_ref()
            .and_then(|p| self.test.final_result.get(p).cloned());
        PersonalityResult {
            title: self.test.title.clone(),
            personality,
            description,
        }
    }
}

/// A test drawn for a user.
#[derive(Debug, Clone)]
pub struct Picked {
    pub test: Arc<PersonalityTest>,
    /// The user had taken every test; their history starts over.
    pub cycled: bool,
}

/// Personality test service. Progress lives in memory only.
#[derive(Clone)]
pub struct Personality {
    catalog: Arc<Vec<Arc<PersonalityTest>>>,
    sessions: SessionRegistry<ChannelId, PersonalityPlan>,
    completed: Arc<StdMutex<HashMap<UserId, HashSet<String>>>>,
    step_timeout: Duration,
}

impl Personality {
    #[must_use]
    pub fn new(catalog: Vec<PersonalityTest>, step_timeout: Duration) -> Self {
        Self {
            catalog: Arc::new(
                catalog
                    .into_iter()
                    .filter(|test| !test.steps.is_empty())
                    .map(Arc::new)
                    .collect(),
            ),
            sessions: SessionRegistry::new(),
            completed: Arc::default(),
            step_timeout,
        }
    }

    fn completed(&self) -> MutexGuard<'_, HashMap<UserId, HashSet<String>>> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Draws a test `user` has not taken yet. Nothing is recorded until the
    /// test is started.
    pub fn pick(&self, user: UserId, rng: &mut impl Rng) -> Result<Picked> {
        let completed = self.completed();
        let taken = completed.get(&user);
        let mut available: Vec<&Arc<PersonalityTest>> = self
            .catalog
            .iter()
            .filter(|test| taken.is_none_or(|taken| !taken.contains(&test.title)))
            .collect();
        let cycled = available.is_empty() && !self.catalog.is_empty();
        if cycled {
            available = self.catalog.iter().collect();
        }

        let test = Arc::clone(available.choose(rng).ok_or_else(|| Error::NoContent {
            what: "personality test".to_string(),
        })?);
        Ok(Picked { test, cycled })
    }

    /// Fails when `thread` already runs a test or `user` is taking one in `guild`.
    pub fn ensure_free(&self, thread: ChannelId, guild: GuildId, user: UserId) -> Result<()> {
        if self.sessions.contains(&thread) {
            return Err(Rejected::SessionAlreadyActive.into());
        }
        if self.sessions.is_busy(guild, user) {
            return Err(Rejected::ParticipantBusy { user }.into());
        }
        Ok(())
    }

    /// Starts the picked test for `user` in `thread`. The first step is
    /// awaited at once and the test counts as taken.
    #[instrument(skip(self, picked), fields(title = %picked.test.title))]
    pub fn start(
        &self,
        thread: ChannelId,
        guild: GuildId,
        user: UserId,
        picked: &Picked,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut session = Session::new(guild, 1, PersonalityPlan::new(Arc::clone(&picked.test)), now);
        session.join(user, now)?;
        self.sessions.try_create(thread, session)?;

        let mut completed = self.completed();
        let taken = completed.entry(user).or_default();
        if picked.cycled {
            taken.clear();
        }
        taken.insert(picked.test.title.clone());
        info!("personality test started");
        Ok(())
    }

    /// Applies the answer of `user` to `step` of the test in `thread`.
    pub async fn choose(
        &self,
        thread: ChannelId,
        user: UserId,
        step: usize,
        choice: usize,
        now: DateTime<Utc>,
    ) -> Result<Progress<PersonalityResult>> {
        let progress = self.sessions.respond(&thread, user, step, choice, now).await?;
        debug!(%thread, step, choice, "personality answer accepted");
        Ok(progress)
    }

    /// Test running in `thread`, with the owner and the step awaited.
    pub async fn current(&self, thread: ChannelId) -> Option<(Arc<PersonalityTest>, UserId, usize)> {
        self.sessions
            .inspect(&thread, |session| {
                let owner = session.participants().first().copied()?;
                Some((Arc::clone(&session.plan().test), owner, session.step_index()))
            })
            .await
            .flatten()
    }

    /// Arms the inactivity timer of `step`; `on_expire` gets the partial result.
    pub async fn arm_step_timeout<F, Fut>(&self, thread: ChannelId, step: usize, on_expire: F)
    where
        F: FnOnce(PersonalityResult) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.sessions
            .schedule_timeout(thread, step, self.step_timeout, on_expire)
            .await;
    }

    /// Whether a test is running in `thread`.
    #[must_use]
    pub fn is_running(&self, thread: ChannelId) -> bool {
        self.sessions.contains(&thread)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::sample_personality_test;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GUILD: GuildId = GuildId::new(5);
    const THREAD: ChannelId = ChannelId::new(50);
    const OWNER: UserId = UserId::new(1);
    const OTHER: UserId = UserId::new(2);

    fn service() -> Personality {
        Personality::new(vec![sample_personality_test("Rocket")], Duration::from_secs(60))
    }

    fn started() -> Personality {
        let personality = service();
        let picked = personality.pick(OWNER, &mut StdRng::seed_from_u64(1)).unwrap();
        personality.start(THREAD, GUILD, OWNER, &picked, Utc::now()).unwrap();
        personality
    }

    #[test]
    fn test_top_category_prefers_first_maximum() {
        let mut points = IndexMap::new();
        points.insert("Jessie".to_string(), 3);
        points.insert("James".to_string(), 5);
        points.insert("Meowth".to_string(), 5);
        assert_eq!(top_category(&points), Some("James"));
        assert_eq!(top_category(&IndexMap::new()), None);
    }

    #[tokio::test]
    async fn test_full_run_yields_result() -> Result<()> {
        let personality = started();

        let next = personality.choose(THREAD, OWNER, 0, 1, Utc::now()).await?;
        assert_eq!(next, Progress::Next { step: 1, actor: OWNER });

        let Progress::Completed(result) = personality.choose(THREAD, OWNER, 1, 1, Utc::now()).await? else {
            panic!("two steps should complete the test");
        };
        assert_eq!(result.personality.as_deref(), Some("James"));
        assert_eq!(result.description.as_deref(), Some("Dramatic and proud."));
        assert!(!personality.is_running(THREAD));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_user_cannot_answer() -> Result<()> {
        let personality = started();
        let result = personality.choose(THREAD, OTHER, 0, 0, Utc::now()).await;
        assert!(matches!(result, Err(Error::Rejected(Rejected::NotAuthorizedActor))));

        let (_, owner, step) = personality.current(THREAD).await.unwrap();
        assert_eq!(owner, OWNER);
        assert_eq!(step, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_double_click_is_noop() -> Result<()> {
        let personality = started();
        personality.choose(THREAD, OWNER, 0, 0, Utc::now()).await?;
        let again = personality.choose(THREAD, OWNER, 0, 0, Utc::now()).await;
        assert!(matches!(again, Err(Error::Rejected(Rejected::StaleStep))));
        Ok(())
    }

    #[tokio::test]
    async fn test_one_test_per_thread_and_per_user() -> Result<()> {
        let personality = started();
        let picked = personality.pick(OTHER, &mut StdRng::seed_from_u64(2))?;

        let same_thread = personality.start(THREAD, GUILD, OTHER, &picked, Utc::now());
        assert!(matches!(same_thread, Err(Error::Rejected(Rejected::SessionAlreadyActive))));
        assert!(matches!(
            personality.ensure_free(THREAD, GUILD, OTHER),
            Err(Error::Rejected(Rejected::SessionAlreadyActive))
        ));

        let busy = personality.start(ChannelId::new(51), GUILD, OWNER, &picked, Utc::now());
        assert!(matches!(busy, Err(Error::Rejected(Rejected::ParticipantBusy { .. }))));
        assert!(matches!(
            personality.ensure_free(ChannelId::new(51), GUILD, OWNER),
            Err(Error::Rejected(Rejected::ParticipantBusy { user })) if user == OWNER
        ));
        personality.ensure_free(ChannelId::new(51), GUILD, OTHER)?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_reports_partial_result() -> Result<()> {
        let personality = started();
        personality.choose(THREAD, OWNER, 0, 0, Utc::now()).await?;

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        personality
            .arm_step_timeout(THREAD, 1, move |result| async move {
                assert_eq!(result.personality.as_deref(), Some("Jessie"));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!personality.is_running(THREAD));
        Ok(())
    }

    #[test]
    fn test_pick_cycles_after_all_taken() -> Result<()> {
        let personality = Personality::new(
            vec![sample_personality_test("One"), sample_personality_test("Two")],
            Duration::from_secs(60),
        );
        let mut rng = StdRng::seed_from_u64(7);

        let first = personality.pick(OWNER, &mut rng)?;
        personality.start(ChannelId::new(61), GuildId::new(61), OWNER, &first, Utc::now())?;
        let second = personality.pick(OWNER, &mut rng)?;
        assert_ne!(first.test.title, second.test.title);
        assert!(!second.cycled);
        personality.start(ChannelId::new(62), GuildId::new(62), OWNER, &second, Utc::now())?;

        let third = personality.pick(OWNER, &mut rng)?;
        assert!(third.cycled);
        Ok(())
    }

    #[test]
    fn test_rejected_start_keeps_test_in_rotation() -> Result<()> {
        let personality = Personality::new(
            vec![sample_personality_test("One"), sample_personality_test("Two")],
            Duration::from_secs(60),
        );
        let mut rng = StdRng::seed_from_u64(3);
        let first = personality.pick(OWNER, &mut rng)?;
        personality.start(THREAD, GUILD, OWNER, &first, Utc::now())?;

        let second = personality.pick(OWNER, &mut rng)?;
        let busy = personality.start(ChannelId::new(51), GUILD, OWNER, &second, Utc::now());
        assert!(matches!(busy, Err(Error::Rejected(Rejected::ParticipantBusy { .. }))));

        // Only the started test was taken, so the other one is still offered.
        let again = personality.pick(OWNER, &mut rng)?;
        assert!(!again.cycled);
        assert_eq!(again.test.title, second.test.title);
        assert_ne!(again.test.title, first.test.title);
        Ok(())
    }

    #[test]
    fn test_empty_catalog() {
        let personality = Personality::new(Vec::new(), Duration::from_secs(60));
        let result = personality.pick(OWNER, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(Error::NoContent { .. })));
    }
}
