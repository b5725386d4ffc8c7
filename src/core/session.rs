//! Turn-based session state machine.
//!
//! The campfire confession, the personality test and the drawing date all follow
//! the same shape: participants gather, then a fixed number of steps run one
//! after another, each answered by exactly one authorized participant, with an
//! inactivity timeout that ends the session early. [`Session`] implements that
//! shape once; each feature plugs in its own [`TurnPlan`].
//!
//! Transitions are plain functions taking the session, the acting user and the
//! input. A refused transition returns [`Rejected`] and leaves the session
//! untouched.

use crate::core::{
    ids::{GuildId, UserId},
    timer::{TimerHandle, TimerSlot},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for participants to join.
    Forming,
    /// Between steps; never observed from outside a transition.
    InProgress,
    /// Waiting for the authorized actor of the current step.
    AwaitingInput,
    /// All steps answered.
    Completed,
    /// The inactivity window elapsed while awaiting input.
    TimedOut,
    /// Ended by an explicit reset.
    Reset,
}

impl SessionState {
    /// Whether the session reached an end state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Reset)
    }
}

/// Reasons a session transition is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    /// A live session already occupies the key.
    #[error("A session is already running here!")]
    SessionAlreadyActive,
    /// No live session at the key.
    #[error("There is no active session here.")]
    SessionNotFound,
    /// The actor is not the participant whose turn it is.
    #[error("It's not your turn!")]
    NotAuthorizedActor,
    /// The session is not accepting this transition in its current state.
    #[error("This session is no longer active.")]
    Inactive,
    /// The input targets a step that was already answered.
    #[error("That step was already answered.")]
    StaleStep,
    /// The actor already joined.
    #[error("You already joined.")]
    AlreadyJoined,
    /// The session has all the participants it needs.
    #[error("This session is full.")]
    SessionFull,
    /// The user already takes part in another session of the same kind.
    #[error("<@{user}> is already in an ongoing session! Finish it first.")]
    ParticipantBusy {
        /// The busy participant.
        user: UserId,
    },
    /// The input does not match any option of the current step.
    #[error("That choice is not available.")]
    InvalidChoice,
}

/// Feature-specific rules plugged into a [`Session`].
pub trait TurnPlan {
    /// Input delivered by the actor of a step.
    type Input;
    /// Final (or partial, on timeout) result.
    type Outcome;

    /// Number of steps; the session completes once the cursor reaches it.
    fn total_steps(&self) -> usize;

    /// The participant allowed to answer `step`.
    fn actor_for(&self, step: usize, participants: &[UserId]) -> Option<UserId>;

    /// Records the input for `step`. Must leave the plan untouched on error.
    fn record(&mut self, step: usize, actor: UserId, input: Self::Input) -> Result<(), Rejected>;

    /// Result accumulated so far.
    fn outcome(&self) -> Self::Outcome;

    /// Called once when the last participant joins, before step 0 begins.
    fn on_start(&mut self, _participants: &[UserId]) {}
}

/// Result of a successful [`Session::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Joined {
    /// More participants are needed.
    Waiting {
        /// Participants so far.
        joined: usize,
        /// Participants required.
        capacity: usize,
    },
    /// The session is full and step 0 awaits `actor`.
    Started {
        /// Authorized actor of step 0.
        actor: UserId,
    },
}

/// Result of an accepted [`Session::respond`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<O> {
    /// The next step awaits `actor`.
    Next {
        /// Index of the step now awaited.
        step: usize,
        /// Authorized actor of that step.
        actor: UserId,
    },
    /// Every step was answered.
    Completed(O),
}

/// One running multi-step game instance.
#[derive(Debug)]
pub struct Session<P> {
    guild: GuildId,
    participants: Vec<UserId>,
    capacity: usize,
    step_index: usize,
    state: SessionState,
    plan: P,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    timer: TimerSlot,
}

impl<P: TurnPlan> Session<P> {
    /// Creates a session in [`SessionState::Forming`] that starts once
    /// `capacity` participants joined.
    pub fn new(guild: GuildId, capacity: usize, plan: P, now: DateTime<Utc>) -> Self {
        Self {
            guild,
            participants: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            step_index: 0,
            state: SessionState::Forming,
            plan,
            created_at: now,
            last_activity_at: now,
            timer: TimerSlot::default(),
        }
    }

    /// Adds a participant. The session starts when the last seat is taken.
    pub fn join(&mut self, user: UserId, now: DateTime<Utc>) -> Result<Joined, Rejected> {
        match self.state {
            SessionState::Forming => {}
            state if state.is_terminal() => return Err(Rejected::Inactive),
            _ => return Err(Rejected::SessionFull),
        }
        if self.participants.contains(&user) {
            return Err(Rejected::AlreadyJoined);
        }
        self.participants.push(user);
        self.last_activity_at = now;

        if self.participants.len() < self.capacity {
            return Ok(Joined::Waiting {
                joined: self.participants.len(),
                capacity: self.capacity,
            });
        }

        self.state = SessionState::InProgress;
        self.plan.on_start(&self.participants);
        match self.enter_step() {
            Some(actor) => Ok(Joined::Started { actor }),
            // A plan without steps completes on start.
            None => Err(Rejected::Inactive),
        }
    }

    /// Applies the answer of `actor` to `step`.
    pub fn respond(
        &mut self,
        actor: UserId,
        step: usize,
        input: P::Input,
        now: DateTime<Utc>,
    ) -> Result<Progress<P::Outcome>, Rejected> {
        if self.state != SessionState::AwaitingInput {
            return Err(Rejected::Inactive);
        }
        if step != self.step_index {
            return Err(Rejected::StaleStep);
        }
        if self.current_actor() != Some(actor) {
            return Err(Rejected::NotAuthorizedActor);
        }
        self.plan.record(step, actor, input)?;

        self.timer.cancel();
        self.state = SessionState::InProgress;
        self.step_index += 1;
        self.last_activity_at = now;

        match self.enter_step() {
            Some(actor) => Ok(Progress::Next {
                step: self.step_index,
                actor,
            }),
            None => Ok(Progress::Completed(self.plan.outcome())),
        }
    }

    /// Ends the session because `step` went unanswered.
    ///
    /// Only the timer of the step still being awaited can expire the session,
    /// so a late timer from an earlier step is refused.
    pub fn expire(&mut self, step: usize) -> Result<P::Outcome, Rejected> {
        if self.state != SessionState::AwaitingInput {
            return Err(Rejected::Inactive);
        }
        if step != self.step_index {
            return Err(Rejected::StaleStep);
        }
        self.timer.disarm();
        self.state = SessionState::TimedOut;
        Ok(self.plan.outcome())
    }

    /// Ends the session on request.
    pub fn reset(&mut self) -> Result<(), Rejected> {
        if self.state.is_terminal() {
            return Err(Rejected::Inactive);
        }
        self.timer.cancel();
        self.state = SessionState::Reset;
        Ok(())
    }

    /// Installs the inactivity timer of `step`.
    ///
    /// A handle for a step that is no longer awaited is cancelled on the spot.
    pub fn arm_timer(&mut self, step: usize, handle: TimerHandle) {
        if self.state == SessionState::AwaitingInput && step == self.step_index {
            self.timer.arm(handle);
        } else {
            handle.cancel();
        }
    }

    fn enter_step(&mut self) -> Option<UserId> {
        if self.step_index >= self.plan.total_steps() {
            self.state = SessionState::Completed;
            return None;
        }
        self.state = SessionState::AwaitingInput;
        self.current_actor()
    }

    /// Authorized actor of the step being awaited.
    #[must_use]
    pub fn current_actor(&self) -> Option<UserId> {
        if self.state != SessionState::AwaitingInput {
            return None;
        }
        self.plan.actor_for(self.step_index, &self.participants)
    }

    #[must_use]
    pub const fn guild(&self) -> GuildId {
        self.guild
    }

    #[must_use]
    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn step_index(&self) -> usize {
        self.step_index
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn plan(&self) -> &P {
        &self.plan
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    #[must_use]
    pub const fn has_timer(&self) -> bool {
        self.timer.is_armed()
    }
}
