//! User settings: retry delay and retry budget.
//!
//! Settings live in the host's key-value store. [`Settings::load`] merges
//! stored values over the defaults; [`Settings::apply_input`] takes raw form
//! input from the host's settings panel, falls back to defaults for anything
//! unusable and asks the host to persist.
//!
//! # Example
//!
//! ```rust
//! use reinforced_send::settings::{Settings, SettingKey, SettingsStore};
//! use reinforced_send::testing::MemoryStore;
//!
//! let mut store = MemoryStore::new().with(SettingKey::RetryDelay, 10);
//! let settings = Settings::load(&mut store);
//!
//! assert_eq!(settings.retry_delay, 10);
//! assert_eq!(settings.max_retries, Settings::default().max_retries);
//! // Missing keys are written back with their defaults
//! assert_eq!(store.get(SettingKey::MaxRetries), Some(3));
//! ```

use std::fmt;

use crate::retry::RetryPolicy;

/// Key of a persisted setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Seconds to wait for a response before resending.
    RetryDelay,
    /// Resends allowed after the initial send.
    MaxRetries,
}

impl SettingKey {
    /// Name of the key in the host's store.
    pub fn name(self) -> &'static str {
        match self {
            Self::RetryDelay => "retry_delay",
            Self::MaxRetries => "max_retries",
        }
    }
}

/// The host's persisted key-value store.
pub trait SettingsStore {
    /// Read a stored value.
    fn get(&self, key: SettingKey) -> Option<u64>;

    /// Write a value. Persisting is deferred to [`SettingsStore::save_debounced`].
    fn set(&mut self, key: SettingKey, value: u64);

    /// Ask the host to persist soon; repeated calls within the host's
    /// debounce window collapse into one write.
    fn save_debounced(&mut self);
}

/// Invalid setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// The retry delay was zero.
    ZeroDelay,
    /// The retry delay exceeds the allowed maximum.
    DelayTooLong {
        /// Offending value, in seconds.
        secs: u64,
    },
    /// The retry budget exceeds the allowed maximum.
    TooManyRetries {
        /// Offending value.
        count: u32,
    },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDelay => write!(f, "retry delay must be at least 1 second"),
            Self::DelayTooLong { secs } => write!(
                f,
                "retry delay of {}s exceeds the maximum of {}s",
                secs,
                Settings::MAX_DELAY_SECS
            ),
            Self::TooManyRetries { count } => write!(
                f,
                "{} retries exceeds the maximum of {}",
                count,
                Settings::MAX_RETRIES
            ),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Retry configuration as the user sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    /// Seconds to wait for a response before resending.
    pub retry_delay: u64,
    /// Resends allowed after the initial send.
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_delay: RetryPolicy::DEFAULT_DELAY_SECS,
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
        }
    }
}

impl Settings {
    /// Largest accepted retry delay (one hour).
    pub const MAX_DELAY_SECS: u64 = 3600;

    /// Largest accepted retry budget.
    pub const MAX_RETRIES: u32 = 100;

    /// Read settings from `store`, filling gaps with defaults.
    ///
    /// Stored values that fail validation are replaced by their defaults too.
    /// The merged values are written back so the host's settings panel
    /// shows them, but no save is requested.
    pub fn load<S: SettingsStore + ?Sized>(store: &mut S) -> Self {
        let defaults = Self::default();
        let stored = Self {
            retry_delay: store
                .get(SettingKey::RetryDelay)
                .unwrap_or(defaults.retry_delay),
            max_retries: store
                .get(SettingKey::MaxRetries)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_retries),
        };

        let settings = stored.sanitized();
        if settings != stored {
            tracing::warn!(
                stored_delay = stored.retry_delay,
                stored_retries = stored.max_retries,
                "stored settings out of range, using defaults"
            );
        }
        settings.write(store);
        settings
    }

    /// Replace every field that fails validation with its default.
    ///
    /// # Example
    ///
    /// ```rust
    /// use reinforced_send::Settings;
    ///
    /// let settings = Settings { retry_delay: 0, max_retries: 7 }.sanitized();
    ///
    /// assert_eq!(settings, Settings { retry_delay: 30, max_retries: 7 });
    /// assert!(settings.validate().is_ok());
    /// ```
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            retry_delay: Some(self.retry_delay)
                .filter(|secs| check_delay(*secs).is_ok())
                .unwrap_or(defaults.retry_delay),
            max_retries: Some(self.max_retries)
                .filter(|count| check_retries(*count).is_ok())
                .unwrap_or(defaults.max_retries),
        }
    }

    /// Apply raw input from the settings panel and request a debounced save.
    ///
    /// Unparseable or out-of-range values fall back to their defaults. A
    /// delay of zero falls back too; zero retries is accepted.
    ///
    /// # Example
    ///
    /// ```rust
    /// use reinforced_send::settings::Settings;
    /// use reinforced_send::testing::MemoryStore;
    ///
    /// let mut store = MemoryStore::new();
    /// let settings = Settings::apply_input(&mut store, "abc", "0");
    ///
    /// assert_eq!(settings.retry_delay, 30);
    /// assert_eq!(settings.max_retries, 0);
    /// assert_eq!(store.saves(), 1);
    /// ```
    pub fn apply_input<S: SettingsStore + ?Sized>(
        store: &mut S,
        delay_raw: &str,
        retries_raw: &str,
    ) -> Self {
        let defaults = Self::default();

        let retry_delay = delay_raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| check_delay(*secs).is_ok())
            .unwrap_or(defaults.retry_delay);
        let max_retries = retries_raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|count| check_retries(*count).is_ok())
            .unwrap_or(defaults.max_retries);

        let settings = Self {
            retry_delay,
            max_retries,
        };
        settings.write(store);
        store.save_debounced();

        tracing::debug!(
            retry_delay = settings.retry_delay,
            max_retries = settings.max_retries,
            "settings updated"
        );
        settings
    }

    /// Check every field, collecting all errors rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<SettingsError>> {
        let errors: Vec<SettingsError> = [
            check_delay(self.retry_delay),
            check_retries(self.max_retries),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The retry policy described by these settings.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from(self)
    }

    fn write<S: SettingsStore + ?Sized>(&self, store: &mut S) {
        store.set(SettingKey::RetryDelay, self.retry_delay);
        store.set(SettingKey::MaxRetries, u64::from(self.max_retries));
    }
}

fn check_delay(secs: u64) -> Result<(), SettingsError> {
    match secs {
        0 => Err(SettingsError::ZeroDelay),
        s if s > Settings::MAX_DELAY_SECS => Err(SettingsError::DelayTooLong { secs: s }),
        _ => Ok(()),
    }
}

fn check_retries(count: u32) -> Result<(), SettingsError> {
    if count > Settings::MAX_RETRIES {
        Err(SettingsError::TooManyRetries { count })
    } else {
        Ok(())
    }
}
