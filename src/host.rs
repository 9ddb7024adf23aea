//! Host-facing collaborators: the send action and the notification surface.
//!
//! The chat host owns the text box, the send button and the toast area. The
//! controller reaches them only through these traits, so any host can plug in
//! and tests can record every call.

use std::fmt;

use crate::retry::SendError;

/// Triggers the host's send action.
///
/// Both calls are fire-and-forget from the controller's point of view: an
/// `Err` is logged and the session carries on.
pub trait Sender {
    /// Submit `text` as a new user message.
    fn send(&mut self, text: &str) -> Result<(), SendError>;

    /// Submit `text` again after a response went missing.
    ///
    /// Defaults to [`Sender::send`], re-sending the original text verbatim.
    fn resend(&mut self, text: &str) -> Result<(), SendError> {
        self.send(text)
    }
}

impl<S: Sender + ?Sized> Sender for Box<S> {
    fn send(&mut self, text: &str) -> Result<(), SendError> {
        (**self).send(text)
    }

    fn resend(&mut self, text: &str) -> Result<(), SendError> {
        (**self).resend(text)
    }
}

/// Visual state of the trigger control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// No session; a click starts one.
    Idle,
    /// A session is armed; a click cancels it.
    Retrying,
}

impl ButtonState {
    /// Tooltip for the control.
    pub fn title(self) -> &'static str {
        match self {
            Self::Idle => "Reinforced send (resends automatically if no reply)",
            Self::Retrying => "Resending... (click to stop)",
        }
    }

    /// Icon classes for the control.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Idle => "fa-solid fa-shield-halved",
            Self::Retrying => "fa-solid fa-circle-stop stop-icon",
        }
    }
}

/// Severity of a notice, mapped by the host onto its toast styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoticeLevel {
    /// Progress information.
    Info,
    /// The session ended with a response.
    Success,
    /// User-initiated stop or rejected input.
    Warning,
    /// The session gave up.
    Error,
}

/// User-facing message emitted on a session transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Notice {
    /// The initial send went out.
    Sent,
    /// A resend went out.
    RetryAttempt {
        /// Resend number, 1-indexed.
        attempt: u32,
        /// Configured resend budget.
        max_retries: u32,
    },
    /// The host rendered an assistant response.
    ResponseReceived,
    /// The user stopped the session.
    ManuallyStopped,
    /// Every resend went unanswered.
    MaxRetriesReached {
        /// Configured resend budget.
        max_retries: u32,
    },
    /// The trigger fired with nothing to send.
    EmptyMessage,
}

impl Notice {
    /// Heading shown with every notice.
    pub const TITLE: &'static str = "Reinforced Send";

    /// Severity of this notice.
    pub fn level(&self) -> NoticeLevel {
        match self {
            Self::Sent | Self::RetryAttempt { .. } => NoticeLevel::Info,
            Self::ResponseReceived => NoticeLevel::Success,
            Self::ManuallyStopped | Self::EmptyMessage => NoticeLevel::Warning,
            Self::MaxRetriesReached { .. } => NoticeLevel::Error,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "Message sent. Waiting for a response."),
            Self::RetryAttempt {
                attempt,
                max_retries,
            } => write!(
                f,
                "No response yet, sending the message again (attempt {}/{}).",
                attempt, max_retries
            ),
            Self::ResponseReceived => write!(f, "Received a response."),
            Self::ManuallyStopped => write!(f, "Resending stopped manually."),
            Self::MaxRetriesReached { max_retries } => write!(
                f,
                "Reached the maximum of {} retries. Giving up.",
                max_retries
            ),
            Self::EmptyMessage => write!(f, "There is no message to send."),
        }
    }
}

/// Displays session state to the user.
pub trait Notifier {
    /// Switch the trigger control's visual state.
    fn set_state(&mut self, state: ButtonState);

    /// Show a transient message.
    fn notify(&mut self, notice: Notice);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn set_state(&mut self, state: ButtonState) {
        (**self).set_state(state)
    }

    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice)
    }
}
