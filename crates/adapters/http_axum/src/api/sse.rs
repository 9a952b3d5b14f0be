//! Server-Sent Events (SSE) stream of channel changes.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::state::AppState;

/// SSE event name of a channel change.
pub const CHANGE_EVENT: &str = "channel_changed";

/// `GET /api/events/stream`: SSE stream of change notifications.
///
/// Each accepted flip is sent as a JSON-encoded `ChannelChange` in a
/// `channel_changed` event. The stream continues until the client
/// disconnects or the bridge shuts down.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let changes = state.bridge.event_bus().subscribe();
    let events = BroadcastStream::new(changes).filter_map(|result| match result {
        Ok(change) => match serde_json::to_string(&change) {
            Ok(json) => Some(Ok(Event::default().event(CHANGE_EVENT).data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize change for SSE stream");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some changes were dropped");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
