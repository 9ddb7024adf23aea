//! Testing utilities for code built on the retry controller
//!
//! This module provides recording collaborators, a hand-cranked timer, an
//! in-memory settings store and assertion macros, so a controller can be
//! driven step by step without a host or a clock.
//!
//! Recorders are cheap to clone and every clone shares the same log: hand one
//! clone to the controller and keep another to inspect.
//!
//! # Examples
//!
//! ```rust
//! use reinforced_send::{assert_active, assert_idle, RetryController, RetryPolicy};
//! use reinforced_send::testing::{ManualTimer, RecordingNotifier, RecordingSender};
//!
//! let timer = ManualTimer::new();
//! let mut controller = RetryController::new(
//!     RecordingSender::new(),
//!     RecordingNotifier::new(),
//!     timer.clone(),
//!     RetryPolicy::default(),
//! );
//!
//! assert_idle!(controller);
//! controller.start("hello");
//! assert_active!(controller, attempt = 0);
//!
//! controller.on_timeout(timer.fire().unwrap());
//! assert_active!(controller, attempt = 1);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::host::{ButtonState, Notice, Notifier, Sender};
use crate::retry::SendError;
use crate::settings::{SettingKey, SettingsStore};
use crate::timer::{Timer, TimerTicket};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One call made to a [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    /// An initial send.
    Send(String),
    /// A resend.
    Resend(String),
}

#[derive(Debug, Default)]
struct SenderLog {
    calls: Vec<SentMessage>,
    failure: Option<String>,
}

/// A sender that records every call and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    log: Arc<Mutex<SenderLog>>,
}

impl RecordingSender {
    /// Create a sender that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `reason`. Calls are still recorded.
    pub fn fail_with(&self, reason: impl Into<String>) {
        lock(&self.log).failure = Some(reason.into());
    }

    /// Make following calls succeed again.
    pub fn recover(&self) {
        lock(&self.log).failure = None;
    }

    /// Every call, in order.
    pub fn calls(&self) -> Vec<SentMessage> {
        lock(&self.log).calls.clone()
    }

    /// Texts of initial sends.
    pub fn sends(&self) -> Vec<String> {
        self.filtered(|m| match m {
            SentMessage::Send(text) => Some(text.clone()),
            SentMessage::Resend(_) => None,
        })
    }

    /// Texts of resends.
    pub fn resends(&self) -> Vec<String> {
        self.filtered(|m| match m {
            SentMessage::Resend(text) => Some(text.clone()),
            SentMessage::Send(_) => None,
        })
    }

    fn filtered(&self, f: impl Fn(&SentMessage) -> Option<String>) -> Vec<String> {
        lock(&self.log).calls.iter().filter_map(f).collect()
    }

    fn record(&self, message: SentMessage) -> Result<(), SendError> {
        let mut log = lock(&self.log);
        log.calls.push(message);
        match &log.failure {
            Some(reason) => Err(SendError::new(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Sender for RecordingSender {
    fn send(&mut self, text: &str) -> Result<(), SendError> {
        self.record(SentMessage::Send(text.to_string()))
    }

    fn resend(&mut self, text: &str) -> Result<(), SendError> {
        self.record(SentMessage::Resend(text.to_string()))
    }
}

#[cfg(feature = "async")]
impl crate::runtime::AsyncSender for RecordingSender {
    fn send(&self, text: String) -> futures::future::BoxFuture<'static, Result<(), SendError>> {
        let result = self.record(SentMessage::Send(text));
        Box::pin(async move { result })
    }

    fn resend(&self, text: String) -> futures::future::BoxFuture<'static, Result<(), SendError>> {
        let result = self.record(SentMessage::Resend(text));
        Box::pin(async move { result })
    }
}

#[derive(Debug, Default)]
struct NotifierLog {
    states: Vec<ButtonState>,
    notices: Vec<Notice>,
}

/// A notifier that records button states and notices.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    log: Arc<Mutex<NotifierLog>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice, in order.
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.log).notices.clone()
    }

    /// Every button state change, in order.
    pub fn states(&self) -> Vec<ButtonState> {
        lock(&self.log).states.clone()
    }

    /// The most recent button state.
    pub fn last_state(&self) -> Option<ButtonState> {
        lock(&self.log).states.last().copied()
    }
}

impl Notifier for RecordingNotifier {
    fn set_state(&mut self, state: ButtonState) {
        lock(&self.log).states.push(state);
    }

    fn notify(&mut self, notice: Notice) {
        lock(&self.log).notices.push(notice);
    }
}

#[derive(Debug, Default)]
struct TimerState {
    pending: Option<(Duration, TimerTicket)>,
    armed: Vec<TimerTicket>,
}

/// A timer that never fires on its own.
///
/// Tests call [`ManualTimer::fire`] to take the armed ticket and pass it to
/// the controller, standing in for the elapsed delay.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<TimerState>>,
}

impl ManualTimer {
    /// Create a timer with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The armed ticket, if any.
    pub fn pending(&self) -> Option<TimerTicket> {
        lock(&self.state).pending.map(|(_, ticket)| ticket)
    }

    /// Delay of the armed ticket, if any.
    pub fn pending_delay(&self) -> Option<Duration> {
        lock(&self.state).pending.map(|(delay, _)| delay)
    }

    /// Take the armed ticket as if its delay had elapsed.
    pub fn fire(&self) -> Option<TimerTicket> {
        lock(&self.state).pending.take().map(|(_, ticket)| ticket)
    }

    /// Every ticket ever armed, in order.
    pub fn armed(&self) -> Vec<TimerTicket> {
        lock(&self.state).armed.clone()
    }
}

impl Timer for ManualTimer {
    fn arm(&mut self, delay: Duration, ticket: TimerTicket) {
        let mut state = lock(&self.state);
        state.pending = Some((delay, ticket));
        state.armed.push(ticket);
    }

    fn disarm(&mut self, ticket: TimerTicket) {
        let mut state = lock(&self.state);
        if matches!(state.pending, Some((_, current)) if current == ticket) {
            state.pending = None;
        }
    }
}

/// An in-memory [`SettingsStore`] that counts save requests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<SettingKey, u64>,
    saves: usize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a value.
    pub fn with(mut self, key: SettingKey, value: u64) -> Self {
        self.values.insert(key, value);
        self
    }

    /// Number of debounced saves requested.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: SettingKey) -> Option<u64> {
        self.values.get(&key).copied()
    }

    fn set(&mut self, key: SettingKey, value: u64) {
        self.values.insert(key, value);
    }

    fn save_debounced(&mut self) {
        self.saves += 1;
    }
}

/// Assert that a controller has no active session.
///
/// # Example
///
/// ```rust
/// use reinforced_send::{assert_idle, RetryController, RetryPolicy};
/// use reinforced_send::testing::{ManualTimer, RecordingNotifier, RecordingSender};
///
/// let controller = RetryController::new(
///     RecordingSender::new(),
///     RecordingNotifier::new(),
///     ManualTimer::new(),
///     RetryPolicy::default(),
/// );
/// assert_idle!(controller);
/// ```
#[macro_export]
macro_rules! assert_idle {
    ($controller:expr) => {{
        let snapshot = $controller.snapshot();
        if snapshot.active {
            panic!("Expected idle controller, got active session: {:?}", snapshot);
        }
    }};
}

/// Assert that a controller has an active session, optionally at a given attempt.
#[macro_export]
macro_rules! assert_active {
    ($controller:expr) => {{
        let snapshot = $controller.snapshot();
        if !snapshot.active {
            panic!("Expected active session, got idle controller");
        }
    }};
    ($controller:expr, attempt = $attempt:expr) => {{
        let snapshot = $controller.snapshot();
        if !snapshot.active {
            panic!("Expected active session, got idle controller");
        }
        assert_eq!(snapshot.attempt, $attempt, "unexpected attempt count");
    }};
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
use crate::settings::Settings;

/// Generates settings that pass [`Settings::validate`].
#[cfg(feature = "proptest")]
impl Arbitrary for Settings {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (1..=Settings::MAX_DELAY_SECS, 0..=Settings::MAX_RETRIES)
            .prop_map(|(retry_delay, max_retries)| Settings {
                retry_delay,
                max_retries,
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Generation;

    #[test]
    fn test_recording_sender_shares_log_between_clones() {
        let sender = RecordingSender::new();
        let mut handle = sender.clone();

        handle.send("a").unwrap();
        handle.resend("a").unwrap();

        assert_eq!(
            sender.calls(),
            vec![
                SentMessage::Send("a".to_string()),
                SentMessage::Resend("a".to_string())
            ]
        );
    }

    #[test]
    fn test_recording_sender_failure_and_recovery() {
        let mut sender = RecordingSender::new();
        sender.fail_with("offline");
        assert_eq!(sender.send("a"), Err(SendError::new("offline")));

        sender.recover();
        assert!(sender.send("b").is_ok());
        assert_eq!(sender.sends().len(), 2);
    }

    #[test]
    fn test_manual_timer_fire_takes_ticket() {
        let mut timer = ManualTimer::new();
        let ticket = TimerTicket::new(Generation::ZERO.next(), 0);
        timer.arm(Duration::from_secs(1), ticket);

        assert_eq!(timer.fire(), Some(ticket));
        assert_eq!(timer.fire(), None);
        assert_eq!(timer.armed(), vec![ticket]);
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let mut store = MemoryStore::new().with(SettingKey::RetryDelay, 4);
        store.save_debounced();
        store.save_debounced();

        assert_eq!(store.get(SettingKey::RetryDelay), Some(4));
        assert_eq!(store.get(SettingKey::MaxRetries), None);
        assert_eq!(store.saves(), 2);
    }

    #[test]
    #[should_panic(expected = "Expected active session")]
    fn test_assert_active_panics_when_idle() {
        let controller = crate::RetryController::new(
            RecordingSender::new(),
            RecordingNotifier::new(),
            ManualTimer::new(),
            crate::RetryPolicy::default(),
        );
        assert_active!(controller);
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use super::*;
        use crate::settings::Settings;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn settings_arbitrary_generates_valid_instances(settings in any::<Settings>()) {
                prop_assert!(settings.validate().is_ok());
                prop_assert_eq!(settings.sanitized(), settings);
            }

            #[test]
            fn settings_arbitrary_maps_onto_policy(settings in any::<Settings>()) {
                let policy = crate::RetryPolicy::from(&settings);

                prop_assert_eq!(policy.max_retries(), settings.max_retries);
                prop_assert_eq!(policy.delay(), Duration::from_secs(settings.retry_delay));
            }

            #[test]
            fn settings_survive_store_round_trip(settings in any::<Settings>()) {
                let mut store = MemoryStore::new()
                    .with(SettingKey::RetryDelay, settings.retry_delay)
                    .with(SettingKey::MaxRetries, u64::from(settings.max_retries));

                prop_assert_eq!(Settings::load(&mut store), settings);
            }
        }
    }
}
