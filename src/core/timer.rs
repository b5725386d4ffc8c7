//! Cancellable delayed actions.
//!
//! Every interactive session waits for input with exactly one timer armed. The
//! timer is a spawned tokio task; cancelling aborts it. Aborting a task that
//! already finished (or was already aborted) is a no-op, which makes
//! [`TimerHandle::cancel`] safe to call at any point.

use std::{future::Future, time::Duration};
use tokio::task::AbortHandle;

/// Handle to a scheduled delayed action.
#[derive(Debug)]
pub struct TimerHandle {
    handle: AbortHandle,
}

impl TimerHandle {
    /// Cancels the action if it has not run yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the action ran to completion or was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Runs `action` after `delay` unless the returned handle is cancelled first.
///
/// Must be called from within a tokio runtime.
pub fn schedule<F>(delay: Duration, action: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        action.await;
    });
    TimerHandle {
        handle: task.abort_handle(),
    }
}

/// Holder for the single outstanding timer of a session.
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: Option<TimerHandle>,
}

impl TimerSlot {
    /// Installs `handle`, cancelling whatever was armed before.
    pub fn arm(&mut self, handle: TimerHandle) {
        if let Some(stale) = self.current.replace(handle) {
            stale.cancel();
        }
    }

    /// Cancels and forgets the armed timer, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.cancel();
        }
    }

    /// Forgets the armed timer without aborting it.
    ///
    /// Used from inside the firing timer, where aborting would cancel the
    /// caller's own task at its next await point.
    pub fn disarm(&mut self) {
        self.current = None;
    }

    /// Whether a timer is currently held.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.current.is_some()
    }
}
