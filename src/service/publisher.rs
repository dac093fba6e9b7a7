//! Publisher: fans events out to registry subscribers.

use std::sync::Arc;

use crate::domain::{Channel, Connection, DeliveryReport, Event, Registry};

/// Stateless publish API used by request handlers.
///
/// Every publish follows the same pattern: encode the event once → take a
/// snapshot of the channel → try each subscriber in order → prune the ones
/// whose send fails, along with any already-closed entries still listed →
/// return a [`DeliveryReport`]. Nothing here blocks on a
/// subscriber and no delivery failure reaches the caller.
#[derive(Debug, Clone)]
pub struct Publisher {
    registry: Arc<Registry>,
}

impl Publisher {
    /// Creates a publisher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Returns the registry this publisher delivers through.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Delivers `event` to every subscriber of `channel`.
    pub fn publish(&self, channel: &Channel, event: &Event) -> DeliveryReport {
        self.deliver(channel, event, |_| true)
    }

    /// Delivers `event` to the subscribers of `channel` whose scope equals
    /// `scope`. Other subscribers are neither sent to nor pruned.
    pub fn publish_scoped(&self, channel: &Channel, scope: &str, event: &Event) -> DeliveryReport {
        self.deliver(channel, event, |c| c.scope() == Some(scope))
    }

    /// Delivers `event` to the wildcard channel.
    ///
    /// This does not touch any other channel; callers that want an event to
    /// be both channel-scoped and global publish twice and add the reports.
    pub fn publish_to_wildcard(&self, event: &Event) -> DeliveryReport {
        self.publish(&Channel::wildcard(), event)
    }

    fn deliver(
        &self,
        channel: &Channel,
        event: &Event,
        filter: impl Fn(&Connection) -> bool,
    ) -> DeliveryReport {
        let encoded = match event.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(%channel, event_type = event.event_type(), error = %e, "failed to encode event");
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport::default();
        for connection in self.registry.snapshot_subscribers(channel) {
            if !connection.is_alive() {
                // Closed but still listed: finish the removal.
                if self.registry.prune(&connection) {
                    report.pruned += 1;
                }
                continue;
            }
            if !filter(&*connection) {
                continue;
            }
            report.attempted += 1;
            match connection.send(&encoded) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        %channel,
                        connection_id = %connection.id(),
                        error = %e,
                        "send failed, pruning subscriber"
                    );
                    if self.registry.prune(&connection) {
                        report.pruned += 1;
                    }
                }
            }
        }

        if report.pruned > 0 {
            tracing::warn!(
                %channel,
                event_type = event.event_type(),
                attempted = report.attempted,
                delivered = report.delivered,
                pruned = report.pruned,
                "event published with pruned subscribers"
            );
        } else {
            tracing::debug!(
                %channel,
                event_type = event.event_type(),
                attempted = report.attempted,
                delivered = report.delivered,
                "event published"
            );
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::domain::connection::tests::{ClosedSink, RecordingSink};
    use crate::domain::{EncodedEvent, EventSink, SendError};

    /// Sink that clears its channel from the registry before failing, like a
    /// disconnect racing the publish.
    #[derive(Debug)]
    struct EvictingSink {
        registry: Arc<Registry>,
        channel: Channel,
    }

    impl EventSink for EvictingSink {
        fn send(&self, _event: &EncodedEvent) -> Result<(), SendError> {
            for connection in self.registry.snapshot_subscribers(&self.channel) {
                self.registry.deregister(connection.channel(), connection.id());
            }
            Err(SendError::Closed)
        }
    }

    type Bodies = Arc<Mutex<Vec<String>>>;

    fn subscribe(registry: &Registry, channel: &str, scope: Option<&str>) -> (Arc<Connection>, Bodies) {
        let sink = RecordingSink::default();
        let bodies = Arc::clone(&sink.bodies);
        let conn = Arc::new(Connection::new(
            Channel::from(channel),
            scope.map(str::to_string),
            sink,
            CancellationToken::new(),
        ));
        registry.register(Arc::clone(&conn));
        (conn, bodies)
    }

    fn received(bodies: &Bodies) -> Vec<Value> {
        bodies
            .lock()
            .map(|b| b.iter().filter_map(|s| serde_json::from_str(s).ok()).collect())
            .unwrap_or_default()
    }

    fn setup() -> (Arc<Registry>, Publisher) {
        let registry = Arc::new(Registry::new());
        let publisher = Publisher::new(Arc::clone(&registry));
        (registry, publisher)
    }

    #[test]
    fn publish_to_all_live_subscribers() {
        let (registry, publisher) = setup();
        let subs: Vec<_> = (0..3).map(|_| subscribe(&registry, "docs", None)).collect();

        let report = publisher.publish(&Channel::from("docs"), &Event::new("updated", json!({})));

        assert_eq!(
            report,
            DeliveryReport {
                attempted: 3,
                delivered: 3,
                pruned: 0
            }
        );
        for (_, bodies) in &subs {
            assert_eq!(received(bodies).len(), 1);
        }
    }

    #[test]
    fn failing_subscriber_is_pruned_and_others_still_receive() {
        let (registry, publisher) = setup();
        let (_, first) = subscribe(&registry, "docs", None);
        let dead = Arc::new(Connection::new(
            Channel::from("docs"),
            None,
            ClosedSink,
            CancellationToken::new(),
        ));
        registry.register(Arc::clone(&dead));
        let (_, last) = subscribe(&registry, "docs", None);

        let channel = Channel::from("docs");
        let report = publisher.publish(&channel, &Event::new("updated", json!({})));

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned, 1);
        assert!(!dead.is_alive());
        assert!(dead.cancellation_token().is_cancelled());
        assert!(
            registry
                .snapshot_subscribers(&channel)
                .iter()
                .all(|c| c.id() != dead.id())
        );
        assert_eq!(received(&first).len(), 1);
        assert_eq!(received(&last).len(), 1);
    }

    #[test]
    fn closed_subscriber_left_in_registry_is_swept() {
        let (registry, publisher) = setup();
        let (conn, bodies) = subscribe(&registry, "docs", None);
        conn.mark_closed();

        let channel = Channel::from("docs");
        let report = publisher.publish(&channel, &Event::new("updated", json!({})));

        assert_eq!(
            report,
            DeliveryReport {
                attempted: 0,
                delivered: 0,
                pruned: 1
            }
        );
        assert!(received(&bodies).is_empty());
        assert_eq!(registry.channel_count(), 0);
        let again = publisher.publish(&channel, &Event::new("updated", json!({})));
        assert_eq!(again, DeliveryReport::default());
    }

    #[test]
    fn failed_send_already_removed_elsewhere_is_not_counted_as_pruned() {
        let (registry, publisher) = setup();
        let channel = Channel::from("docs");
        let conn = Arc::new(Connection::new(
            channel.clone(),
            None,
            EvictingSink {
                registry: Arc::clone(&registry),
                channel: channel.clone(),
            },
            CancellationToken::new(),
        ));
        registry.register(Arc::clone(&conn));

        let report = publisher.publish(&channel, &Event::new("updated", json!({})));

        assert_eq!(report.attempted, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(report.pruned, 0);
        assert!(!conn.is_alive());
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn publish_scoped_only_reaches_matching_scope() {
        let (registry, publisher) = setup();
        let (_, group_a) = subscribe(&registry, "mapping", Some("groupA"));
        let (b_conn, group_b) = subscribe(&registry, "mapping", Some("groupB"));

        let report = publisher.publish_scoped(
            &Channel::from("mapping"),
            "groupA",
            &Event::new("update", Value::Null),
        );

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 0);
        assert_eq!(received(&group_a).len(), 1);
        assert!(received(&group_b).is_empty());
        assert!(b_conn.is_alive());
        assert_eq!(registry.subscriber_count(&Channel::from("mapping")), 2);
    }

    #[test]
    fn unmatched_dead_subscriber_is_not_pruned_by_scoped_publish() {
        let (registry, publisher) = setup();
        let dead = Arc::new(Connection::new(
            Channel::from("mapping"),
            Some("groupB".to_string()),
            ClosedSink,
            CancellationToken::new(),
        ));
        registry.register(Arc::clone(&dead));

        let report = publisher.publish_scoped(
            &Channel::from("mapping"),
            "groupA",
            &Event::new("update", Value::Null),
        );

        assert!(report.is_empty());
        assert!(dead.is_alive());
    }

    #[test]
    fn wildcard_publish_only_targets_all_channel() {
        let (registry, publisher) = setup();
        let (_, global) = subscribe(&registry, "all", None);
        let (_, docs) = subscribe(&registry, "docs", None);

        let report = publisher.publish_to_wildcard(&Event::new("announcement", json!({"id": 1})));

        assert_eq!(report.delivered, 1);
        assert_eq!(received(&global).len(), 1);
        assert!(received(&docs).is_empty());
    }

    #[test]
    fn publish_to_unknown_channel_is_empty() {
        let (_, publisher) = setup();
        let report = publisher.publish(&Channel::from("ghost"), &Event::new("x", Value::Null));
        assert!(report.is_empty());
    }

    #[test]
    fn delivered_body_carries_type_and_payload() {
        let (registry, publisher) = setup();
        let (_, bodies) = subscribe(&registry, "docs", None);

        publisher.publish(
            &Channel::from("docs"),
            &Event::new("updated", json!({"documentId": "42"})),
        );

        let got = received(&bodies);
        let Some(body) = got.first() else {
            panic!("nothing delivered");
        };
        assert_eq!(body.get("type"), Some(&json!("updated")));
        assert_eq!(body.get("documentId"), Some(&json!("42")));
    }
}
