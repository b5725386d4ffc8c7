//! Drawing dates.
//!
//! Two players take one turn each: the author draws their date, then the date
//! draws the author. Each turn ends when the artist presses their button. A
//! player can be in one drawing date per guild at a time.

use crate::{
    core::{
        dating::Privilege,
        ids::{GuildId, MessageId, UserId},
        registry::SessionRegistry,
        session::{Progress, Rejected, Session, TurnPlan},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{info, instrument};

const FALLBACK_COMPLIMENT: &str = "You look amazing together! 💖";

/// Turn order of a drawing date.
#[derive(Debug)]
pub struct DrawingPlan {
    artists: [UserId; 2],
    finished: Vec<UserId>,
}

impl DrawingPlan {
    #[must_use]
    pub const fn new(author: UserId, partner: UserId) -> Self {
        Self {
            artists: [author, partner],
            finished: Vec::new(),
        }
    }

    /// Artist of `step` and the person they draw.
    #[must_use]
    pub fn turn(&self, step: usize) -> Option<(UserId, UserId)> {
        let artist = *self.artists.get(step)?;
        let subject = self.artists[1 - step.min(1)];
        Some((artist, subject))
    }
}

impl TurnPlan for DrawingPlan {
    type Input = ();
    /// Artists who finished their drawing, in turn order.
    type Outcome = Vec<UserId>;

    fn total_steps(&self) -> usize {
        self.artists.len()
    }

    fn actor_for(&self, step: usize, _participants: &[UserId]) -> Option<UserId> {
        self.artists.get(step).copied()
    }

    fn record(&mut self, _step: usize, actor: UserId, _input: ()) -> std::result::Result<(), Rejected> {
        self.finished.push(actor);
        Ok(())
    }

    fn outcome(&self) -> Vec<UserId> {
        self.finished.clone()
    }
}

/// Drawing date service.
#[derive(Clone)]
pub struct Drawing {
    sessions: SessionRegistry<MessageId, DrawingPlan>,
    compliments: Arc<Vec<String>>,
    turn_timeout: Duration,
}

impl Drawing {
    #[must_use]
    pub fn new(compliments: Vec<String>, turn_timeout: Duration) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            compliments: Arc::new(compliments),
            turn_timeout,
        }
    }

    /// Starts a drawing date keyed by the invoking message.
    #[instrument(skip(self))]
    pub fn start(
        &self,
        key: MessageId,
        guild: GuildId,
        author: UserId,
        partner: UserId,
        privilege: Privilege,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if author == partner && !privilege.is_elevated() {
            return Err(Error::SelfDateDenied);
        }
        let capacity = if author == partner { 1 } else { 2 };
        let mut session = Session::new(guild, capacity, DrawingPlan::new(author, partner), now);
        session.join(author, now)?;
        if author != partner {
            session.join(partner, now)?;
        }
        self.sessions.try_create(key, session)?;
        info!("drawing date started");
        Ok(())
    }

    /// `user` finished the drawing of `step`.
    pub async fn finish_turn(
        &self,
        key: MessageId,
        user: UserId,
        step: usize,
        now: DateTime<Utc>,
    ) -> Result<Progress<Vec<UserId>>> {
        Ok(self.sessions.respond(&key, user, step, (), now).await?)
    }

    /// Artist and subject of the step awaited in `key`.
    pub async fn current_turn(&self, key: MessageId) -> Option<(usize, UserId, UserId)> {
        self.sessions
            .inspect(&key, |session| {
                let step = session.step_index();
                let (artist, subject) = session.plan().turn(step)?;
                Some((step, artist, subject))
            })
            .await
            .flatten()
    }

    /// Arms the timer of `step`; on expiry the players are released.
    pub async fn arm_turn_timeout<F, Fut>(&self, key: MessageId, step: usize, on_expire: F)
    where
        F: FnOnce(Vec<UserId>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.sessions
            .schedule_timeout(key, step, self.turn_timeout, on_expire)
            .await;
    }

    /// A random compliment for a finished drawing.
    #[must_use]
    pub fn compliment(&self, rng: &mut impl Rng) -> String {
        self.compliments
            .choose(rng)
            .map_or_else(|| FALLBACK_COMPLIMENT.to_string(), Clone::clone)
    }

    /// Whether `user` is in a drawing date in `guild`.
    #[must_use]
    pub fn is_busy(&self, guild: GuildId, user: UserId) -> bool {
        self.sessions.is_busy(guild, user)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GUILD: GuildId = GuildId::new(3);
    const KEY: MessageId = MessageId::new(30);
    const AUTHOR: UserId = UserId::new(1);
    const PARTNER: UserId = UserId::new(2);

    fn service() -> Drawing {
        Drawing::new(vec!["Picasso vibes".to_string()], Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_turns_run_in_order() -> Result<()> {
        let drawing = service();
        drawing.start(KEY, GUILD, AUTHOR, PARTNER, Privilege::Standard, Utc::now())?;
        assert_eq!(drawing.current_turn(KEY).await, Some((0, AUTHOR, PARTNER)));

        let early = drawing.finish_turn(KEY, PARTNER, 0, Utc::now()).await;
        assert!(matches!(early, Err(Error::Rejected(Rejected::NotAuthorizedActor))));

        let next = drawing.finish_turn(KEY, AUTHOR, 0, Utc::now()).await?;
        assert_eq!(next, Progress::Next { step: 1, actor: PARTNER });
        assert_eq!(drawing.current_turn(KEY).await, Some((1, PARTNER, AUTHOR)));

        let done = drawing.finish_turn(KEY, PARTNER, 1, Utc::now()).await?;
        assert_eq!(done, Progress::Completed(vec![AUTHOR, PARTNER]));
        assert!(!drawing.is_busy(GUILD, AUTHOR));
        Ok(())
    }

    #[test]
    fn test_self_date_needs_privilege() {
        let drawing = service();
        let denied = drawing.start(KEY, GUILD, AUTHOR, AUTHOR, Privilege::Standard, Utc::now());
        assert!(matches!(denied, Err(Error::SelfDateDenied)));
        assert!(drawing.start(KEY, GUILD, AUTHOR, AUTHOR, Privilege::Elevated, Utc::now()).is_ok());
    }

    #[test]
    fn test_players_are_busy_until_done() {
        let drawing = service();
        drawing.start(KEY, GUILD, AUTHOR, PARTNER, Privilege::Standard, Utc::now()).unwrap();

        let busy = drawing.start(MessageId::new(31), GUILD, UserId::new(9), PARTNER, Privilege::Standard, Utc::now());
        assert!(matches!(busy, Err(Error::Rejected(Rejected::ParticipantBusy { user })) if user == PARTNER));

        // Another guild is unaffected.
        let elsewhere = drawing.start(MessageId::new(32), GuildId::new(4), AUTHOR, PARTNER, Privilege::Standard, Utc::now());
        assert!(elsewhere.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_timeout_releases_players() -> Result<()> {
        let drawing = service();
        drawing.start(KEY, GUILD, AUTHOR, PARTNER, Privilege::Standard, Utc::now())?;
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        drawing
            .arm_turn_timeout(KEY, 0, move |finished| async move {
                assert!(finished.is_empty());
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!drawing.is_busy(GUILD, AUTHOR));
        assert!(!drawing.is_busy(GUILD, PARTNER));
        Ok(())
    }

    #[test]
    fn test_compliment_falls_back_when_catalog_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(service().compliment(&mut rng), "Picasso vibes");
        let empty = Drawing::new(Vec::new(), Duration::from_secs(60));
        assert_eq!(empty.compliment(&mut rng), FALLBACK_COMPLIMENT);
    }
}
