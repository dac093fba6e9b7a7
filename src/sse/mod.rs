//! SSE layer: subscribe endpoint and stream lifecycle.
//!
//! `GET /events/{family}` opens a long-lived `text/event-stream` response.
//! The body is a sequence of `data: <json>\n\n` frames, starting with the
//! `connected` handshake.

pub mod handler;
pub mod stream;

pub use stream::{OpenStream, StreamHandler};

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// Subscribe routes, mounted at the root.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events/{family}", get(handler::subscribe_handler))
}
