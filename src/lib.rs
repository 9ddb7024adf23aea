//! # Reinforced Send
//!
//! A resend controller for chat hosts: when a message gets no reply within
//! a fixed delay, send it again, up to a retry budget.
//!
//! ## Philosophy
//!
//! The crate keeps a **pure core** and an **imperative shell**:
//! - **Core** = [`RetryController`], a synchronous state machine that owns one
//!   [`RetrySession`] and talks to the host only through traits
//! - **Shell** = the host's send action, its event source, its settings store,
//!   and (with the `async` feature) a tokio task that drives the timer
//!
//! ## Quick Example
//!
//! ```rust
//! use reinforced_send::{Notice, RetryController, RetryPolicy, Transition};
//! use reinforced_send::testing::{ManualTimer, RecordingNotifier, RecordingSender};
//! use std::time::Duration;
//!
//! let notifier = RecordingNotifier::new();
//! let timer = ManualTimer::new();
//! let mut controller = RetryController::new(
//!     RecordingSender::new(),
//!     notifier.clone(),
//!     timer.clone(),
//!     RetryPolicy::fixed(Duration::from_secs(30)).with_max_retries(1),
//! );
//!
//! controller.start("Are you there?");
//!
//! // Two unanswered waits: one resend, then give up
//! controller.on_timeout(timer.fire().unwrap());
//! let outcome = controller.on_timeout(timer.fire().unwrap());
//!
//! assert!(matches!(outcome, Transition::Exhausted(_)));
//! assert_eq!(
//!     notifier.notices().last(),
//!     Some(&Notice::MaxRetriesReached { max_retries: 1 })
//! );
//! ```
//!
//! ## Features
//!
//! - `async`: tokio actor in [`runtime`]
//! - `serde`: (de)serialise [`Settings`]
//! - `proptest`: `Arbitrary` for [`Settings`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod controller;
pub mod events;
pub mod host;
pub mod retry;
#[cfg(feature = "async")]
pub mod runtime;
pub mod session;
pub mod settings;
pub mod testing;
pub mod timer;

// Re-exports
pub use controller::{RetryController, Transition};
pub use events::{EventMap, HostEvent, ResponseRendered};
pub use host::{ButtonState, Notice, NoticeLevel, Notifier, Sender};
pub use retry::{RetryExhausted, RetryPolicy, SendError, StartError};
pub use session::{Generation, RetrySession, SessionSnapshot};
pub use settings::{Settings, SettingsError, SettingsStore};
pub use timer::{Timer, TimerTicket};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::controller::{RetryController, Transition};
    pub use crate::events::{EventMap, HostEvent};
    pub use crate::host::{ButtonState, Notice, Notifier, Sender};
    pub use crate::retry::{RetryPolicy, SendError};
    pub use crate::settings::{Settings, SettingsStore};
    pub use crate::timer::{Timer, TimerTicket};
}
