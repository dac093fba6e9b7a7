//! Channel publish and diagnostics DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ChannelStats, DeliveryReport};

/// Response of `POST /api/v1/channels/{family}/events`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Channel the event was published to.
    pub channel: String,
    /// Scope filter applied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Whether the event was also delivered to the wildcard channel.
    pub global: bool,
    /// Merged fan-out counts.
    pub report: DeliveryReport,
}

/// Response of `GET /api/v1/channels`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelsResponse {
    /// Channels with at least one subscriber.
    pub channel_count: usize,
    /// Subscribers across all channels.
    pub total_subscribers: usize,
    /// Per-channel counts, sorted by name.
    pub channels: Vec<ChannelStats>,
}
