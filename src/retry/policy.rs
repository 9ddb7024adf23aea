//! Retry policy: how long to wait between sends and how many resends to allow.

use std::time::Duration;

use crate::settings::Settings;

/// A fixed-delay retry policy.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// A session copies the policy when it starts, so later changes only affect
/// the next session.
///
/// # Bounds Behavior
///
/// `max_retries` counts resends only, not the initial send. `max_retries(3)`
/// means up to 4 sends in total (1 initial + 3 resends). Zero is allowed and
/// means "send once, wait one delay, then give up".
///
/// # Examples
///
/// ```rust
/// use reinforced_send::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::fixed(Duration::from_secs(30))
///     .with_max_retries(3);
///
/// assert_eq!(policy.max_retries(), 3);
/// assert_eq!(policy.delay(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    delay: Duration,
    max_retries: u32,
}

impl RetryPolicy {
    /// Default delay between sends, in seconds.
    pub const DEFAULT_DELAY_SECS: u64 = 30;

    /// Default number of resends after the initial send.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Create a policy with a fixed delay and the default retry budget.
    ///
    /// A zero delay is bumped to one millisecond.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reinforced_send::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::fixed(Duration::from_secs(1)).with_max_retries(2);
    ///
    /// assert!(policy.allows(1));
    /// assert!(policy.allows(2));
    /// assert!(!policy.allows(3));
    /// ```
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay: delay.max(Duration::from_millis(1)),
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the maximum number of resends.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Get the delay between sends.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Get the maximum number of resends.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether resend number `attempt` (1-indexed) is still within budget.
    ///
    /// Every send, the last resend included, is followed by one full delay;
    /// the session gives up when the tick after resend `max_retries` arrives.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(Self::DEFAULT_DELAY_SECS))
    }
}

impl From<&Settings> for RetryPolicy {
    fn from(settings: &Settings) -> Self {
        Self::fixed(Duration::from_secs(settings.retry_delay))
            .with_max_retries(settings.max_retries)
    }
}

impl From<Settings> for RetryPolicy {
    fn from(settings: Settings) -> Self {
        Self::from(&settings)
    }
}
