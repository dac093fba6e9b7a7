//! Channel → subscriber membership.
//!
//! [`Registry`] is the only shared mutable state of the gateway. It maps
//! each [`Channel`] to the ordered list of live [`Connection`]s bound to it.
//!
//! # Concurrency
//!
//! Backed by a sharded [`DashMap`]. Every mutation of a channel's list
//! happens under that channel's shard lock, so [`Registry::snapshot_subscribers`]
//! always copies a list that is not mid-mutation. Publishers iterate the
//! copy, never the live list.
//!
//! Empty channels are removed with an atomic conditional remove, so a
//! register racing with the last deregister either lands in the old list
//! (which is then not empty and survives) or creates a fresh one.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use utoipa::ToSchema;

use super::{Channel, Connection, ConnectionId};

/// Subscriber count of one channel, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChannelStats {
    /// Channel name.
    #[schema(value_type = String)]
    pub channel: Channel,
    /// Live subscribers on the channel.
    pub subscribers: usize,
}

/// Process-wide subscriber registry.
///
/// Built once at startup and shared through [`crate::app_state::AppState`].
#[derive(Debug, Default)]
pub struct Registry {
    channels: DashMap<Channel, Vec<Arc<Connection>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to its channel, creating the channel if absent.
    ///
    /// Registering the same connection id twice is a no-op.
    pub fn register(&self, connection: Arc<Connection>) {
        let channel = connection.channel().clone();
        let id = connection.id();
        let mut subscribers = self.channels.entry(channel.clone()).or_default();
        if subscribers.iter().any(|c| c.id() == id) {
            return;
        }
        subscribers.push(connection);
        let count = subscribers.len();
        drop(subscribers);

        tracing::debug!(%channel, connection_id = %id, subscribers = count, "connection registered");
    }

    /// Removes a connection by id and closes it.
    ///
    /// The removed connection is marked closed and its cancellation token
    /// fired, so its stream ends instead of idling unregistered. Unknown
    /// channels and ids are ignored. The channel entry is dropped once its
    /// last connection is gone.
    ///
    /// Returns `true` if this call removed the connection.
    pub fn deregister(&self, channel: &Channel, id: ConnectionId) -> bool {
        let removed = match self.channels.get_mut(channel) {
            Some(mut subscribers) => subscribers
                .iter()
                .position(|c| c.id() == id)
                .map(|index| subscribers.remove(index)),
            None => return false,
        };

        let emptied = self
            .channels
            .remove_if(channel, |_, subscribers| subscribers.is_empty())
            .is_some();

        let Some(connection) = removed else {
            return false;
        };
        connection.mark_closed();
        tracing::debug!(%channel, connection_id = %id, emptied, "connection deregistered");
        true
    }

    /// Closes `connection` and removes it from the registry.
    ///
    /// Safe to call from any number of paths (send failure, client
    /// disconnect, shutdown). Membership is removed under the channel's
    /// lock, so exactly one call observes the removal and returns `true`.
    /// A connection that was already closed but is still registered is
    /// removed as well.
    pub fn prune(&self, connection: &Connection) -> bool {
        connection.mark_closed();
        self.deregister(connection.channel(), connection.id())
    }

    /// Returns a point-in-time copy of a channel's subscribers, in
    /// registration order. Unknown channels yield an empty list.
    #[must_use]
    pub fn snapshot_subscribers(&self, channel: &Channel) -> Vec<Arc<Connection>> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.value().iter().map(Arc::clone).collect())
            .unwrap_or_default()
    }

    /// Number of channels with at least one subscriber.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.channels.get(channel).map_or(0, |s| s.len())
    }

    /// Number of subscribers across all channels.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.channels.iter().map(|entry| entry.value().len()).sum()
    }

    /// Per-channel subscriber counts, sorted by channel name.
    #[must_use]
    pub fn channel_stats(&self) -> Vec<ChannelStats> {
        let mut stats: Vec<ChannelStats> = self
            .channels
            .iter()
            .map(|entry| ChannelStats {
                channel: entry.key().clone(),
                subscribers: entry.value().len(),
            })
            .collect();
        stats.sort_by(|a, b| a.channel.cmp(&b.channel));
        stats
    }
}
