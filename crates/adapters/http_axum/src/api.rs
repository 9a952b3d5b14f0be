//! JSON API and push endpoint handlers.

#[allow(clippy::missing_errors_doc)]
pub mod channels;
#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod push;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Controller push
        .route("/ipx800v3/{entity_id}/{state}", get(push::set_channel))
        .route("/ipx800v3_data/{data}", get(push::set_channels))
        .route("/ipx800v3_refresh/{data}", get(push::refresh))
        // Channels
        .route("/channels", get(channels::list))
        .route("/channels/{entity_id}", get(channels::get))
        .route("/channels/{entity_id}/{action}", post(channels::command))
        // Devices
        .route("/devices", get(devices::list))
        .route("/devices/health", get(devices::health))
        // Events
        .route("/events/stream", get(sse::stream))
}
