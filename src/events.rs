//! Host events and their mapping onto the canonical response signal.
//!
//! Hosts emit many event names. Only one matters to the controller: "an
//! assistant response was rendered". [`EventMap`] sits at the boundary and
//! turns host events into [`ResponseRendered`] or drops them.

use std::collections::HashSet;
use std::fmt;

/// An event published by the chat host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostEvent {
    /// An assistant (character) message finished rendering.
    CharacterMessageRendered,
    /// The host started generating a reply for the chat.
    GenerationStarted,
    /// A user message finished rendering.
    UserMessageRendered,
    /// The active chat changed.
    ChatChanged,
    /// Any other host event, by name.
    Other(String),
}

impl HostEvent {
    /// Map a host event name onto a variant.
    pub fn from_name(name: &str) -> Self {
        match name {
            "character_message_rendered" => Self::CharacterMessageRendered,
            "generate_for_chat_start" => Self::GenerationStarted,
            "user_message_rendered" => Self::UserMessageRendered,
            "chat_id_changed" => Self::ChatChanged,
            other => Self::Other(other.to_string()),
        }
    }

    /// Host name of this event.
    pub fn name(&self) -> &str {
        match self {
            Self::CharacterMessageRendered => "character_message_rendered",
            Self::GenerationStarted => "generate_for_chat_start",
            Self::UserMessageRendered => "user_message_rendered",
            Self::ChatChanged => "chat_id_changed",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The canonical "the other party replied" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseRendered;

/// Which host events count as a response.
///
/// # Examples
///
/// ```rust
/// use reinforced_send::{EventMap, HostEvent, ResponseRendered};
///
/// let map = EventMap::default();
/// assert_eq!(map.canonicalize(&HostEvent::CharacterMessageRendered), Some(ResponseRendered));
/// assert_eq!(map.canonicalize(&HostEvent::GenerationStarted), None);
///
/// let eager = EventMap::default().with_generation_start();
/// assert_eq!(eager.canonicalize(&HostEvent::GenerationStarted), Some(ResponseRendered));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMap {
    synonyms: HashSet<HostEvent>,
}

impl EventMap {
    /// A map with no synonyms; nothing counts as a response.
    pub fn empty() -> Self {
        Self {
            synonyms: HashSet::new(),
        }
    }

    /// Treat `event` as a response.
    pub fn with(mut self, event: HostEvent) -> Self {
        self.synonyms.insert(event);
        self
    }

    /// Also treat the start of generation as a response.
    pub fn with_generation_start(self) -> Self {
        self.with(HostEvent::GenerationStarted)
    }

    /// Map a host event onto the canonical signal.
    pub fn canonicalize(&self, event: &HostEvent) -> Option<ResponseRendered> {
        self.synonyms.contains(event).then_some(ResponseRendered)
    }

    /// Whether `event` counts as a response.
    pub fn matches(&self, event: &HostEvent) -> bool {
        self.canonicalize(event).is_some()
    }
}

impl Default for EventMap {
    fn default() -> Self {
        Self::empty().with(HostEvent::CharacterMessageRendered)
    }
}
