//! Axum SSE subscribe handler.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::StreamExt;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// `GET /events/{family}`: Subscribe to a channel family.
///
/// Required query parameters depend on the family (`groupId` for
/// `mapping`). They are validated before any connection is created.
///
/// # Errors
///
/// Returns [`GatewayError::UnknownChannelFamily`] for an unconfigured
/// family and [`GatewayError::MissingParameter`] when a required scope is
/// absent.
pub async fn subscribe_handler(
    Path(family): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let subscription = state.catalog.get(&family)?.resolve(&params)?;

    let events = state
        .streams
        .open(subscription)
        .into_stream()
        .map(|event| Ok::<_, Infallible>(SseEvent::default().data(event.body())));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}
