//! The retry state machine.
//!
//! [`RetryController`] arms on send, disarms on a detected response or a
//! manual cancel, and gives up once the resend budget is spent. It is
//! synchronous and owns its collaborators: a [`Sender`], a [`Notifier`] and a
//! [`Timer`]. Whoever drives the timer feeds fired tickets back through
//! [`RetryController::on_timeout`].
//!
//! # Example
//!
//! ```rust
//! use reinforced_send::{RetryController, RetryPolicy, Transition};
//! use reinforced_send::testing::{ManualTimer, RecordingNotifier, RecordingSender};
//! use std::time::Duration;
//!
//! let sender = RecordingSender::new();
//! let timer = ManualTimer::new();
//! let mut controller = RetryController::new(
//!     sender.clone(),
//!     RecordingNotifier::new(),
//!     timer.clone(),
//!     RetryPolicy::fixed(Duration::from_secs(1)).with_max_retries(3),
//! );
//!
//! assert!(matches!(controller.start("hi"), Transition::Started { .. }));
//! assert_eq!(sender.sends(), vec!["hi".to_string()]);
//!
//! // No response within the delay: the message goes out again
//! let ticket = timer.fire().unwrap();
//! assert_eq!(controller.on_timeout(ticket), Transition::Retried { attempt: 1 });
//! assert_eq!(sender.resends().len(), 1);
//!
//! // The host rendered a reply
//! assert_eq!(controller.on_response_detected(), Transition::Succeeded { attempts: 1 });
//! assert!(!controller.is_active());
//! ```

use crate::host::{ButtonState, Notice, Notifier, Sender};
use crate::retry::{RetryExhausted, RetryPolicy, StartError};
use crate::session::{Generation, RetrySession, SessionSnapshot};
use crate::timer::{Timer, TimerTicket};

/// Outcome of one controller entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A session started and the initial send went out.
    Started {
        /// Generation of the new session.
        generation: Generation,
    },
    /// The start request was turned away; the controller stays idle.
    Rejected(StartError),
    /// A resend went out and the timer was re-armed.
    Retried {
        /// Resend number, 1-indexed.
        attempt: u32,
    },
    /// The resend budget ran out; the controller is idle again.
    Exhausted(RetryExhausted),
    /// A response arrived; the controller is idle again.
    Succeeded {
        /// Resends issued before the response.
        attempts: u32,
    },
    /// The user stopped the session; the controller is idle again.
    Cancelled {
        /// Resends issued before the stop.
        attempts: u32,
    },
    /// Nothing to do: no session, or a stale timer.
    Ignored,
}

impl Transition {
    /// Whether this transition ended a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Exhausted(_) | Self::Succeeded { .. } | Self::Cancelled { .. }
        )
    }
}

/// Arms a resend cycle on send and tears it down on response, cancel or
/// exhaustion.
///
/// Every entry point runs to completion, returns a [`Transition`] and never
/// fails: send errors are logged and swallowed, stale timer tickets are
/// ignored.
#[derive(Debug)]
pub struct RetryController<S, N, T> {
    sender: S,
    notifier: N,
    timer: T,
    policy: RetryPolicy,
    generation: Generation,
    session: Option<RetrySession>,
}

impl<S, N, T> RetryController<S, N, T>
where
    S: Sender,
    N: Notifier,
    T: Timer,
{
    /// Create an idle controller.
    pub fn new(sender: S, notifier: N, timer: T, policy: RetryPolicy) -> Self {
        Self {
            sender,
            notifier,
            timer,
            policy,
            generation: Generation::ZERO,
            session: None,
        }
    }

    /// Policy applied to the next session.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Replace the policy. An active session keeps the policy it started with.
    pub fn set_policy(&mut self, policy: RetryPolicy) {
        tracing::debug!(
            delay = ?policy.delay(),
            max_retries = policy.max_retries(),
            "retry policy updated"
        );
        self.policy = policy;
    }

    /// Whether a session is in progress.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The active session.
    pub fn session(&self) -> Option<&RetrySession> {
        self.session.as_ref()
    }

    /// Detached view of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self.session.as_ref(), self.policy)
    }

    /// The timer driving this controller.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Check that a timer is armed exactly when a session is active, and that
    /// the active session is within its resend budget.
    pub fn check_invariant(&self) -> Result<(), &'static str> {
        match &self.session {
            None => Ok(()),
            Some(session) if session.pending_timer().is_none() => {
                Err("active session has no pending timer")
            }
            Some(session) if !session.policy().allows(session.attempt()) => {
                Err("active session exceeded its resend budget")
            }
            Some(session) if session.generation() != self.generation => {
                Err("active session is not the current generation")
            }
            Some(_) => Ok(()),
        }
    }

    /// Handle an activation of the trigger control.
    ///
    /// While idle this sends `message` and arms the retry timer. While a
    /// session is active it acts as [`RetryController::cancel`]. Surrounding
    /// whitespace is trimmed; a blank message is rejected.
    pub fn start(&mut self, message: &str) -> Transition {
        if self.session.is_some() {
            return self.cancel();
        }

        let message = message.trim();
        if message.is_empty() {
            tracing::debug!("start rejected: empty message");
            self.notifier.notify(Notice::EmptyMessage);
            return Transition::Rejected(StartError::EmptyMessage);
        }

        self.generation = self.generation.next();
        let generation = self.generation;
        let session = RetrySession::new(generation, message.to_string(), self.policy);

        tracing::info!(
            %generation,
            delay = ?self.policy.delay(),
            max_retries = self.policy.max_retries(),
            "initial send"
        );
        self.notifier.set_state(ButtonState::Retrying);
        if let Err(error) = self.sender.send(session.last_message()) {
            tracing::warn!(%generation, %error, "initial send failed, waiting for retry");
        }
        self.notifier.notify(Notice::Sent);

        self.session = Some(session);
        self.arm();
        Transition::Started { generation }
    }

    /// Handle a fired timer.
    ///
    /// Only the ticket the active session is waiting on counts; anything else
    /// is a leftover from an earlier wait or session and is ignored.
    pub fn on_timeout(&mut self, ticket: TimerTicket) -> Transition {
        let Some(session) = self.session.as_mut().filter(|s| s.owns(ticket)) else {
            tracing::debug!(
                generation = %ticket.generation(),
                attempt = ticket.attempt(),
                "ignoring stale timer"
            );
            self.timer.disarm(ticket);
            return Transition::Ignored;
        };

        session.set_pending(None);
        self.timer.disarm(ticket);

        let attempt = session.bump_attempt();
        let policy = session.policy();
        let generation = session.generation();

        if !policy.allows(attempt) {
            let exhausted = RetryExhausted::new(policy.max_retries(), session.elapsed());
            tracing::warn!(
                %generation,
                max_retries = policy.max_retries(),
                "max retries reached, giving up"
            );
            self.finish(Notice::MaxRetriesReached {
                max_retries: policy.max_retries(),
            });
            return Transition::Exhausted(exhausted);
        }

        tracing::info!(
            %generation,
            attempt,
            max_retries = policy.max_retries(),
            "no response, resending"
        );
        if let Err(error) = self.sender.resend(session.last_message()) {
            tracing::warn!(%generation, attempt, %error, "resend failed");
        }
        self.notifier.notify(Notice::RetryAttempt {
            attempt,
            max_retries: policy.max_retries(),
        });

        self.arm();
        Transition::Retried { attempt }
    }

    /// Handle the canonical response event. Idempotent.
    pub fn on_response_detected(&mut self) -> Transition {
        let Some(session) = self.session.as_ref() else {
            tracing::trace!("response with no active session");
            return Transition::Ignored;
        };
        let attempts = session.attempt();

        tracing::info!(generation = %session.generation(), attempts, "response received");
        self.finish(Notice::ResponseReceived);
        Transition::Succeeded { attempts }
    }

    /// Stop the active session. Idempotent.
    pub fn cancel(&mut self) -> Transition {
        let Some(session) = self.session.as_ref() else {
            return Transition::Ignored;
        };
        let attempts = session.attempt();

        tracing::info!(generation = %session.generation(), attempts, "stopped manually");
        self.finish(Notice::ManuallyStopped);
        Transition::Cancelled { attempts }
    }

    fn arm(&mut self) {
        if let Some(session) = self.session.as_mut() {
            let ticket = session.next_ticket();
            session.set_pending(Some(ticket));
            self.timer.arm(session.policy().delay(), ticket);
        }
    }

    fn finish(&mut self, notice: Notice) {
        if let Some(ticket) = self.session.take().and_then(|mut s| s.take_pending()) {
            self.timer.disarm(ticket);
        }
        self.notifier.notify(notice);
        self.notifier.set_state(ButtonState::Idle);
    }
}

impl<S, N, T> RetryController<S, N, T> {
    /// Take the collaborators back, dropping any active session without
    /// notifying.
    pub fn into_parts(self) -> (S, N, T) {
        (self.sender, self.notifier, self.timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualTimer, RecordingNotifier, RecordingSender};
    use std::time::Duration;
    use tracing_test::traced_test;

    type TestController = RetryController<RecordingSender, RecordingNotifier, ManualTimer>;

    struct Harness {
        controller: TestController,
        sender: RecordingSender,
        notifier: RecordingNotifier,
        timer: ManualTimer,
    }

    fn harness(max_retries: u32) -> Harness {
        let sender = RecordingSender::new();
        let notifier = RecordingNotifier::new();
        let timer = ManualTimer::new();
        let controller = RetryController::new(
            sender.clone(),
            notifier.clone(),
            timer.clone(),
            RetryPolicy::fixed(Duration::from_secs(1)).with_max_retries(max_retries),
        );
        Harness {
            controller,
            sender,
            notifier,
            timer,
        }
    }

    impl Harness {
        fn tick(&mut self) -> Transition {
            let ticket = self.timer.fire().expect("timer should be armed");
            self.controller.on_timeout(ticket)
        }
    }

    #[test]
    fn test_start_sends_once_and_arms() {
        let mut h = harness(3);

        let transition = h.controller.start("hi");

        assert!(matches!(transition, Transition::Started { .. }));
        assert_eq!(h.sender.sends(), vec!["hi".to_string()]);
        assert!(h.sender.resends().is_empty());
        assert_eq!(h.timer.pending_delay(), Some(Duration::from_secs(1)));
        assert_eq!(h.notifier.last_state(), Some(ButtonState::Retrying));
        assert_eq!(h.notifier.notices(), vec![Notice::Sent]);
        assert!(h.controller.check_invariant().is_ok());
    }

    #[test]
    fn test_start_trims_message() {
        let mut h = harness(3);
        h.controller.start("  hello \n");
        assert_eq!(h.sender.sends(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_blank_message_is_rejected() {
        let mut h = harness(3);

        let transition = h.controller.start("   ");

        assert_eq!(transition, Transition::Rejected(StartError::EmptyMessage));
        assert!(!h.controller.is_active());
        assert!(h.sender.calls().is_empty());
        assert!(h.timer.pending().is_none());
        assert_eq!(h.notifier.notices(), vec![Notice::EmptyMessage]);
        assert!(h.notifier.states().is_empty());
    }

    #[test]
    fn test_full_exhaustion_scenario() {
        let mut h = harness(3);
        h.controller.start("hi");

        assert_eq!(h.tick(), Transition::Retried { attempt: 1 });
        assert_eq!(h.tick(), Transition::Retried { attempt: 2 });
        assert_eq!(h.tick(), Transition::Retried { attempt: 3 });
        assert!(matches!(
            h.tick(),
            Transition::Exhausted(RetryExhausted { max_retries: 3, .. })
        ));

        assert!(!h.controller.is_active());
        assert_eq!(h.sender.sends().len(), 1);
        assert_eq!(h.sender.resends().len(), 3);
        assert!(h.timer.pending().is_none());
        assert_eq!(
            h.notifier.notices().last(),
            Some(&Notice::MaxRetriesReached { max_retries: 3 })
        );
        assert_eq!(h.notifier.last_state(), Some(ButtonState::Idle));
    }

    #[test]
    fn test_retry_notices_count_up() {
        let mut h = harness(2);
        h.controller.start("hi");
        h.tick();
        h.tick();

        assert_eq!(
            h.notifier.notices(),
            vec![
                Notice::Sent,
                Notice::RetryAttempt {
                    attempt: 1,
                    max_retries: 2
                },
                Notice::RetryAttempt {
                    attempt: 2,
                    max_retries: 2
                },
            ]
        );
    }

    #[test]
    fn test_zero_retries_gives_up_after_first_wait() {
        let mut h = harness(0);
        h.controller.start("hi");

        assert!(matches!(h.tick(), Transition::Exhausted(_)));
        assert!(h.sender.resends().is_empty());
    }

    #[test]
    fn test_response_before_first_tick() {
        let mut h = harness(3);
        h.controller.start("hi");

        let transition = h.controller.on_response_detected();

        assert_eq!(transition, Transition::Succeeded { attempts: 0 });
        assert!(h.sender.resends().is_empty());
        assert!(h.timer.pending().is_none());
        assert_eq!(
            h.notifier.notices(),
            vec![Notice::Sent, Notice::ResponseReceived]
        );
    }

    #[test]
    fn test_second_start_cancels() {
        let mut h = harness(3);
        h.controller.start("hi");

        let transition = h.controller.start("hi");

        assert_eq!(transition, Transition::Cancelled { attempts: 0 });
        assert!(!h.controller.is_active());
        assert_eq!(h.sender.sends().len(), 1);
        assert!(h.sender.resends().is_empty());
        assert_eq!(
            h.notifier.notices().last(),
            Some(&Notice::ManuallyStopped)
        );
    }

    #[test]
    fn test_idle_response_and_cancel_are_noops() {
        let mut h = harness(3);

        assert_eq!(h.controller.on_response_detected(), Transition::Ignored);
        assert_eq!(h.controller.cancel(), Transition::Ignored);
        assert!(h.notifier.notices().is_empty());
        assert!(h.notifier.states().is_empty());
    }

    #[test]
    fn test_duplicate_response_events() {
        let mut h = harness(3);
        h.controller.start("hi");

        assert!(h.controller.on_response_detected().is_terminal());
        assert_eq!(h.controller.on_response_detected(), Transition::Ignored);
        assert_eq!(
            h.notifier
                .notices()
                .iter()
                .filter(|n| **n == Notice::ResponseReceived)
                .count(),
            1
        );
    }

    #[test]
    fn test_stale_timer_does_not_touch_new_session() {
        let mut h = harness(3);
        h.controller.start("first");
        let stale = h.timer.pending().unwrap();
        h.controller.cancel();

        h.controller.start("second");
        let transition = h.controller.on_timeout(stale);

        assert_eq!(transition, Transition::Ignored);
        assert_eq!(h.controller.session().unwrap().attempt(), 0);
        assert!(h.sender.resends().is_empty());
        assert!(h.timer.pending().is_some());
        assert!(h.controller.check_invariant().is_ok());
    }

    #[test]
    fn test_earlier_ticket_of_same_session_is_stale() {
        let mut h = harness(3);
        h.controller.start("hi");
        let first = h.timer.pending().unwrap();
        h.tick();

        assert_eq!(h.controller.on_timeout(first), Transition::Ignored);
        assert_eq!(h.controller.session().unwrap().attempt(), 1);
    }

    #[test]
    fn test_resend_failure_keeps_retrying() {
        let mut h = harness(2);
        h.sender.fail_with("host busy");
        h.controller.start("hi");

        assert_eq!(h.tick(), Transition::Retried { attempt: 1 });
        assert_eq!(h.tick(), Transition::Retried { attempt: 2 });
        assert!(matches!(h.tick(), Transition::Exhausted(_)));
        assert_eq!(h.sender.resends().len(), 2);
    }

    #[traced_test]
    #[test]
    fn test_resend_failure_is_logged() {
        let mut h = harness(1);
        h.controller.start("hi");
        h.sender.fail_with("host busy");

        assert_eq!(h.tick(), Transition::Retried { attempt: 1 });
        assert!(logs_contain("resend failed"));
        assert!(logs_contain("host busy"));
    }

    #[traced_test]
    #[test]
    fn test_initial_send_failure_still_arms() {
        let mut h = harness(1);
        h.sender.fail_with("offline");

        assert!(matches!(h.controller.start("hi"), Transition::Started { .. }));
        assert!(h.timer.pending().is_some());
        assert!(logs_contain("initial send failed"));
    }

    #[test]
    fn test_policy_change_applies_to_next_session() {
        let mut h = harness(3);
        h.controller.start("hi");
        h.controller
            .set_policy(RetryPolicy::fixed(Duration::from_secs(5)).with_max_retries(1));

        h.tick();
        h.tick();
        assert_eq!(h.controller.session().unwrap().attempt(), 2);
        assert_eq!(h.timer.pending_delay(), Some(Duration::from_secs(1)));

        h.controller.cancel();
        h.controller.start("again");
        assert_eq!(h.timer.pending_delay(), Some(Duration::from_secs(5)));
        assert_eq!(h.controller.snapshot().max_retries, 1);
    }

    #[test]
    fn test_generations_increase_per_session() {
        let mut h = harness(3);

        let Transition::Started { generation: first } = h.controller.start("a") else {
            panic!("expected start");
        };
        h.controller.cancel();
        let Transition::Started { generation: second } = h.controller.start("b") else {
            panic!("expected start");
        };

        assert!(second > first);
    }

    #[test]
    fn test_snapshot_reflects_session() {
        let mut h = harness(3);
        h.controller.start("hi");
        h.tick();

        let snapshot = h.controller.snapshot();
        assert!(snapshot.active);
        assert_eq!(snapshot.attempt, 1);
        assert_eq!(snapshot.last_message.as_deref(), Some("hi"));
        assert!(snapshot.timer_armed);
    }
}
