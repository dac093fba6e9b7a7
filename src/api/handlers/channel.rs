//! Channel handlers: publish, diagnostics, family catalog.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::api::dto::{ChannelsResponse, PublishResponse};
use crate::app_state::AppState;
use crate::domain::{ChannelFamily, Event};
use crate::error::{ErrorResponse, GatewayError};

/// Query parameter that also sends the event to the wildcard channel.
const GLOBAL_PARAM: &str = "global";

/// `POST /channels/{family}/events`: Publish an event to a channel family.
///
/// The body is a JSON object with a string `type`; other fields form the
/// payload. Scoped families take their scope from the query string, as on
/// subscribe. `?global=true` additionally delivers to `all`.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown family, a missing scope or a
/// malformed event.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{family}/events",
    tag = "Channels",
    summary = "Publish an event",
    description = "Fans an event out to the live subscribers of a channel family. Delivery is best-effort; the response reports how many subscribers were reached and how many were pruned.",
    params(("family" = String, Path, description = "Channel family name")),
    request_body = Object,
    responses(
        (status = 202, description = "Event accepted for fan-out", body = PublishResponse),
        (status = 400, description = "Missing scope or invalid event", body = ErrorResponse),
        (status = 404, description = "Unknown channel family", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    Path(family): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let subscription = state.catalog.get(&family)?.resolve(&params)?;
    let event = Event::from_json(body)?;
    let global = params
        .get(GLOBAL_PARAM)
        .is_some_and(|v| matches!(v.as_str(), "true" | "1"));

    let mut report = match subscription.scope.as_deref() {
        Some(scope) => state
            .publisher
            .publish_scoped(&subscription.channel, scope, &event),
        None => state.publisher.publish(&subscription.channel, &event),
    };
    if global && !subscription.channel.is_wildcard() {
        report += state.publisher.publish_to_wildcard(&event);
    }

    let response = PublishResponse {
        channel: subscription.channel.to_string(),
        scope: subscription.scope,
        global,
        report,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// `GET /channels`: Live channel and subscriber counts.
#[utoipa::path(
    get,
    path = "/api/v1/channels",
    tag = "Channels",
    summary = "List live channels",
    description = "Returns every channel that currently has subscribers, with counts.",
    responses(
        (status = 200, description = "Channel diagnostics", body = ChannelsResponse),
    )
)]
pub async fn list_channels(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry();
    let channels = registry.channel_stats();
    Json(ChannelsResponse {
        channel_count: channels.len(),
        total_subscribers: channels.iter().map(|c| c.subscribers).sum(),
        channels,
    })
}

/// `GET /channels/families`: Configured channel families.
#[utoipa::path(
    get,
    path = "/api/v1/channels/families",
    tag = "Channels",
    summary = "List channel families",
    description = "Returns the channel families clients may subscribe to, with their scope parameter if any.",
    responses(
        (status = 200, description = "Channel family catalog", body = Vec<ChannelFamily>),
    )
)]
pub async fn list_families(State(state): State<AppState>) -> impl IntoResponse {
    let families: Vec<ChannelFamily> = state.catalog.families().cloned().collect();
    Json(families)
}

/// Channel routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route("/channels/families", get(list_families))
        .route("/channels/{family}/events", post(publish_event))
}
