//! Endpoints the controller calls on its own.
//!
//! The IPX800 "push" feature issues a plain `GET` with basic auth whenever
//! an input or output changes; the URL template is configured on the
//! controller. All three routes answer `OK` once the request is queued.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use ipxbridge_domain::id::EntityId;
use ipxbridge_domain::update::parse_switch_state;

use crate::auth::basic_credentials;
use crate::error::ApiError;
use crate::state::AppState;

/// Response of every push endpoint.
pub enum PushResponse {
    Ok,
}

impl IntoResponse for PushResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok => (StatusCode::OK, "OK").into_response(),
        }
    }
}

/// `GET /api/ipx800v3/{entity_id}/{state}`: set one channel.
pub async fn set_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((entity_id, raw_state)): Path<(String, String)>,
) -> Result<PushResponse, ApiError> {
    let credentials = basic_credentials(&headers)?;
    let receiver = state.bridge.push_receiver();
    receiver.authenticate(credentials.as_ref())?;
    let on = parse_switch_state(&raw_state)?;
    receiver.set_channel(credentials.as_ref(), &EntityId::new(entity_id), on)?;
    Ok(PushResponse::Ok)
}

/// `GET /api/ipx800v3_data/{data}`: set several channels at once.
pub async fn set_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(data): Path<String>,
) -> Result<PushResponse, ApiError> {
    let credentials = basic_credentials(&headers)?;
    state
        .bridge
        .push_receiver()
        .set_channels(credentials.as_ref(), &data)?;
    Ok(PushResponse::Ok)
}

/// `GET /api/ipx800v3_refresh/{data}`: poll now. The segment is ignored.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(_data): Path<String>,
) -> Result<PushResponse, ApiError> {
    let credentials = basic_credentials(&headers)?;
    state
        .bridge
        .push_receiver()
        .refresh_all(credentials.as_ref())?;
    Ok(PushResponse::Ok)
}
