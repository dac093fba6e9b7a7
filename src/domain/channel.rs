//! Channel names.
//!
//! A [`Channel`] is an opaque topic name. Channels are never declared up
//! front: the [`super::Registry`] creates one when its first connection
//! registers and drops it when the last one leaves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the reserved channel every "global" event is delivered to.
pub const WILDCARD_CHANNEL: &str = "all";

/// Name of a broadcast topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// Creates a channel from any string-like name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved wildcard channel (`"all"`).
    #[must_use]
    pub fn wildcard() -> Self {
        Self(WILDCARD_CHANNEL.to_string())
    }

    /// Returns `true` if this is the wildcard channel.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_CHANNEL
    }

    /// Returns the channel name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self(name)
    }
}
