//! Scheduled-callback abstraction used by the controller.
//!
//! The controller never sleeps. It asks a [`Timer`] to arm a single deadline
//! identified by a [`TimerTicket`], and whoever drives the timer calls
//! [`RetryController::on_timeout`](crate::RetryController::on_timeout) with
//! that ticket once the deadline passes.

use std::time::Duration;

use crate::session::Generation;

/// Identifies one armed wait: the session generation plus the attempt the
/// wait follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTicket {
    generation: Generation,
    attempt: u32,
}

impl TimerTicket {
    /// Create a ticket.
    pub fn new(generation: Generation, attempt: u32) -> Self {
        Self {
            generation,
            attempt,
        }
    }

    /// Session generation this ticket was armed for.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Attempt number the wait follows (0 = initial send).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Arms and disarms the controller's single pending callback.
///
/// Implementations hold at most one deadline. Arming replaces any previous
/// deadline; disarming with a ticket that is not the current one does nothing.
pub trait Timer {
    /// Schedule `ticket` to fire after `delay`.
    fn arm(&mut self, delay: Duration, ticket: TimerTicket);

    /// Cancel `ticket` if it is still pending.
    fn disarm(&mut self, ticket: TimerTicket);
}

impl<T: Timer + ?Sized> Timer for Box<T> {
    fn arm(&mut self, delay: Duration, ticket: TimerTicket) {
        (**self).arm(delay, ticket)
    }

    fn disarm(&mut self, ticket: TimerTicket) {
        (**self).disarm(ticket)
    }
}

/// A timer that stores its deadline for a tokio event loop to await.
///
/// Used by the [`runtime`](crate::runtime) actor: the actor polls
/// [`DeadlineTimer::deadline`] on every turn of its loop, so clearing the
/// deadline here cancels the wait synchronously.
#[cfg(feature = "async")]
#[derive(Debug, Default)]
pub struct DeadlineTimer {
    pending: Option<(tokio::time::Instant, TimerTicket)>,
}

#[cfg(feature = "async")]
impl DeadlineTimer {
    /// Deadline used when `now + delay` does not fit in an [`Instant`](tokio::time::Instant).
    pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

    /// Create a timer with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The armed deadline and its ticket.
    pub fn deadline(&self) -> Option<(tokio::time::Instant, TimerTicket)> {
        self.pending
    }

    /// Wait for the armed deadline, or forever if nothing is armed.
    pub async fn expired(
        deadline: Option<(tokio::time::Instant, TimerTicket)>,
    ) -> TimerTicket {
        match deadline {
            Some((at, ticket)) => {
                tokio::time::sleep_until(at).await;
                ticket
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(feature = "async")]
impl Timer for DeadlineTimer {
    fn arm(&mut self, delay: Duration, ticket: TimerTicket) {
        let now = tokio::time::Instant::now();
        let at = now
            .checked_add(delay)
            .unwrap_or_else(|| now + Self::FAR_FUTURE);
        self.pending = Some((at, ticket));
    }

    fn disarm(&mut self, ticket: TimerTicket) {
        if matches!(self.pending, Some((_, current)) if current == ticket) {
            self.pending = None;
        }
    }
}
