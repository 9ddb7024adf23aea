//! Retry session state.
//!
//! A [`RetrySession`] exists only while a retry cycle is in progress; the
//! controller stores it as `Option<RetrySession>`, so "idle" is simply `None`.

use std::fmt;
use std::time::{Duration, Instant};

use crate::retry::RetryPolicy;
use crate::timer::TimerTicket;

/// Identity of one session within a controller.
///
/// Generations increase monotonically. A timer ticket carries the generation
/// it was armed for, so a tick that outlives its session can be told apart
/// from a tick belonging to the session that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any session has started.
    pub const ZERO: Generation = Generation(0);

    /// The generation that follows this one.
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One armed retry cycle, from the initial send to its terminal resolution.
#[derive(Debug, Clone)]
pub struct RetrySession {
    generation: Generation,
    last_message: String,
    attempt: u32,
    policy: RetryPolicy,
    pending_timer: Option<TimerTicket>,
    started_at: Instant,
}

impl RetrySession {
    pub(crate) fn new(generation: Generation, message: String, policy: RetryPolicy) -> Self {
        Self {
            generation,
            last_message: message,
            attempt: 0,
            policy,
            pending_timer: None,
            started_at: Instant::now(),
        }
    }

    /// Generation this session was created with.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Message sent at start and resent on every attempt.
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Number of resends issued so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Policy captured when the session started.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Ticket of the timer this session is waiting on, if any.
    pub fn pending_timer(&self) -> Option<TimerTicket> {
        self.pending_timer
    }

    /// Time since the initial send.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Ticket for the wait that follows the current attempt.
    pub(crate) fn next_ticket(&self) -> TimerTicket {
        TimerTicket::new(self.generation, self.attempt)
    }

    pub(crate) fn set_pending(&mut self, ticket: Option<TimerTicket>) {
        self.pending_timer = ticket;
    }

    pub(crate) fn take_pending(&mut self) -> Option<TimerTicket> {
        self.pending_timer.take()
    }

    /// Whether `ticket` is the one this session is waiting on.
    pub(crate) fn owns(&self, ticket: TimerTicket) -> bool {
        self.pending_timer == Some(ticket)
    }

    pub(crate) fn bump_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }
}

/// Point-in-time view of a controller's session, detached from the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// Whether a retry cycle is in progress.
    pub active: bool,
    /// Resends issued so far; 0 when idle.
    pub attempt: u32,
    /// Resend budget of the active session, or of the configured policy when idle.
    pub max_retries: u32,
    /// Generation of the active session.
    pub generation: Option<Generation>,
    /// Message being resent.
    pub last_message: Option<String>,
    /// Whether a timer is armed.
    pub timer_armed: bool,
}

impl SessionSnapshot {
    pub(crate) fn capture(session: Option<&RetrySession>, policy: RetryPolicy) -> Self {
        match session {
            Some(s) => Self {
                active: true,
                attempt: s.attempt,
                max_retries: s.policy.max_retries(),
                generation: Some(s.generation),
                last_message: Some(s.last_message.clone()),
                timer_armed: s.pending_timer.is_some(),
            },
            None => Self {
                max_retries: policy.max_retries(),
                ..Self::default()
            },
        }
    }

    /// True when no session is active.
    pub fn is_idle(&self) -> bool {
        !self.active
    }
}
