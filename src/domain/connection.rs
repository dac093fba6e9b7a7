//! One subscriber's open stream.
//!
//! A [`Connection`] pairs registration metadata (id, channel, optional
//! scope) with the send primitive captured when the stream was accepted.
//! The stream handler owns its lifecycle; the registry only holds it for
//! membership.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::{Channel, ConnectionId, EncodedEvent};

/// Why a write to a subscriber failed. Either way the subscriber is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The receiving half of the stream is gone or the connection is closing.
    #[error("subscriber stream closed")]
    Closed,
    /// The subscriber stopped draining its buffer.
    #[error("subscriber buffer full")]
    Full,
}

/// Write side of a subscriber stream.
///
/// Implementations must not block: publishers call this inline for every
/// subscriber in a snapshot.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Queues `event` for the subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the subscriber can no longer accept events.
    fn send(&self, event: &EncodedEvent) -> Result<(), SendError>;
}

impl EventSink for mpsc::Sender<EncodedEvent> {
    fn send(&self, event: &EncodedEvent) -> Result<(), SendError> {
        self.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// A registered subscriber stream.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    channel: Channel,
    scope: Option<String>,
    sink: Box<dyn EventSink>,
    alive: AtomicBool,
    cancel: CancellationToken,
}

impl Connection {
    /// Creates a live connection with a fresh id.
    ///
    /// `cancel` is fired when removal begins so the owning stream can end.
    pub fn new(
        channel: Channel,
        scope: Option<String>,
        sink: impl EventSink + 'static,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            channel,
            scope,
            sink: Box::new(sink),
            alive: AtomicBool::new(true),
            cancel,
        }
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the channel this connection is bound to.
    #[must_use]
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the scope filter, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns `true` until removal has begun.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns the token fired when this connection starts closing.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Writes an encoded event to the subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] once the connection is closing, or
    /// whatever the underlying sink reports.
    pub fn send(&self, event: &EncodedEvent) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::Closed);
        }
        self.sink.send(event)
    }

    /// Flips the connection to closing and fires its cancellation token.
    ///
    /// Returns `true` only for the call that performed the transition.
    /// Registered connections are closed through [`super::Registry::prune`]
    /// so membership and liveness change together.
    pub(crate) fn mark_closed(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        if was_alive {
            self.cancel.cancel();
        }
        was_alive
    }
}
