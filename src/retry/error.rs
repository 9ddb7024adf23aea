//! Error types for reinforced sends.

use std::fmt;
use std::time::Duration;

/// Reason a `start` request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// The message was empty or only whitespace.
    EmptyMessage,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "message is empty"),
        }
    }
}

impl std::error::Error for StartError {}

/// Error reported by a host sender.
///
/// Send failures never stop a session; the controller logs them and keeps
/// its timer armed.
///
/// # Examples
///
/// ```rust
/// use reinforced_send::SendError;
///
/// let err = SendError::new("textarea not found");
/// assert_eq!(err.to_string(), "send failed: textarea not found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError {
    reason: String,
}

impl SendError {
    /// Create a send error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given by the sender.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send failed: {}", self.reason)
    }
}

impl std::error::Error for SendError {}

/// Terminal failure of a session: every resend went unanswered.
///
/// Contains metadata about the exhausted session.
///
/// # Examples
///
/// ```rust
/// use reinforced_send::RetryExhausted;
/// use std::time::Duration;
///
/// let err = RetryExhausted::new(3, Duration::from_secs(120));
/// assert_eq!(err.sends(), 4); // 1 initial + 3 resends
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExhausted {
    /// Configured resend budget, all of which was used.
    pub max_retries: u32,
    /// Time from the initial send until the session gave up.
    pub total_duration: Duration,
}

impl RetryExhausted {
    /// Create a new RetryExhausted error.
    pub fn new(max_retries: u32, total_duration: Duration) -> Self {
        Self {
            max_retries,
            total_duration,
        }
    }

    /// Total number of sends issued (initial + resends).
    pub fn sends(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no response after {} resends ({:?})",
            self.max_retries, self.total_duration
        )
    }
}

impl std::error::Error for RetryExhausted {}
