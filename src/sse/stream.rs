//! Subscriber stream lifecycle.
//!
//! [`StreamHandler::open`] drives a connection through
//! `Opening → Open → Closing → Closed`:
//!
//! - **Open**: the `connected` handshake is queued on the connection's own
//!   buffer *before* the connection becomes visible in the registry, so no
//!   published event can overtake it. The connection is then registered.
//! - **Closing**: triggered by the client going away (the stream is
//!   dropped), by server shutdown (the parent token is cancelled), by a
//!   failed send inside the publisher, or by a direct
//!   [`Registry::deregister`]. Each of these fires the connection's
//!   cancellation token; a single listener task per connection then calls
//!   [`Registry::prune`]. Only one path observes the removal.
//! - **Closed**: the listener has run and the stream has ended.

use std::sync::Arc;

use async_stream::stream;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::domain::{Connection, EncodedEvent, Event, Registry, Subscription};

/// Opens and tears down subscriber streams.
#[derive(Debug, Clone)]
pub struct StreamHandler {
    registry: Arc<Registry>,
    shutdown: CancellationToken,
    buffer: usize,
}

impl StreamHandler {
    /// Creates a handler registering into `registry`.
    ///
    /// Every connection gets a child of `shutdown`, so cancelling it closes
    /// all streams. `buffer` is the number of undelivered events a
    /// subscriber may lag behind before it is treated as dead.
    #[must_use]
    pub fn new(registry: Arc<Registry>, shutdown: CancellationToken, buffer: usize) -> Self {
        Self {
            registry,
            shutdown,
            buffer: buffer.max(1),
        }
    }

    /// Accepts a subscriber: sends the handshake, registers the connection
    /// and arms its close listener.
    ///
    /// If the handshake cannot be queued the connection is never registered
    /// and the returned stream ends immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, subscription: Subscription) -> OpenStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        let cancel = self.shutdown.child_token();
        let connection = Arc::new(Connection::new(
            subscription.channel,
            subscription.scope,
            tx,
            cancel.clone(),
        ));

        self.admit(&connection);
        self.spawn_close_listener(Arc::clone(&connection));

        OpenStream {
            connection,
            events: rx,
            guard: cancel.drop_guard(),
        }
    }

    /// Queues the handshake, then registers. A failed handshake closes the
    /// connection without registering it. Returns whether it was registered.
    fn admit(&self, connection: &Arc<Connection>) -> bool {
        let handshake = Event::handshake()
            .encode()
            .map_err(|e| e.to_string())
            .and_then(|h| connection.send(&h).map_err(|e| e.to_string()));

        match handshake {
            Ok(()) => {
                self.registry.register(Arc::clone(connection));
                tracing::info!(
                    channel = %connection.channel(),
                    scope = connection.scope(),
                    connection_id = %connection.id(),
                    "stream opened"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    channel = %connection.channel(),
                    connection_id = %connection.id(),
                    error = %e,
                    "handshake failed, closing stream"
                );
                connection.mark_closed();
                false
            }
        }
    }

    fn spawn_close_listener(&self, connection: Arc<Connection>) {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            connection.cancellation_token().cancelled().await;
            let removed_here = registry.prune(&connection);
            tracing::info!(
                channel = %connection.channel(),
                connection_id = %connection.id(),
                removed_here,
                "stream closed"
            );
        });
    }
}

/// A freshly opened subscriber stream.
///
/// Dropping it (or the stream produced by [`OpenStream::into_stream`])
/// starts the Closing transition.
#[derive(Debug)]
pub struct OpenStream {
    connection: Arc<Connection>,
    events: mpsc::Receiver<EncodedEvent>,
    guard: DropGuard,
}

impl OpenStream {
    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Turns the subscriber side into a stream of encoded events.
    ///
    /// The stream drains whatever is buffered and ends once the connection
    /// is cancelled.
    pub fn into_stream(self) -> impl Stream<Item = EncodedEvent> + Send + 'static {
        let Self {
            connection,
            mut events,
            guard,
        } = self;
        let cancel = connection.cancellation_token().clone();
        drop(connection);

        stream! {
            let _guard = guard;
            loop {
                let next = tokio::select! {
                    biased;
                    next = events.recv() => next,
                    () = cancel.cancelled() => None,
                };
                match next {
                    Some(event) => yield event,
                    None => break,
                }
            }
        }
    }
}
