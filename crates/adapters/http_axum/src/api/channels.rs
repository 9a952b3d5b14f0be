//! JSON handlers for channels.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use ipxbridge_domain::channel::ChannelSnapshot;
use ipxbridge_domain::error::{NotFoundError, ValidationError};
use ipxbridge_domain::id::EntityId;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<ChannelSnapshot>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<ChannelSnapshot>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the command endpoint.
pub enum CommandResponse {
    Accepted,
}

impl IntoResponse for CommandResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted => StatusCode::ACCEPTED.into_response(),
        }
    }
}

fn not_found(entity_id: &str) -> NotFoundError {
    NotFoundError {
        entity: "Entity",
        id: entity_id.to_string(),
    }
}

/// `GET /api/channels`: every channel with its reconciled state.
pub async fn list(State(state): State<AppState>) -> ListResponse {
    ListResponse::Ok(Json(state.bridge.store().snapshots()))
}

/// `GET /api/channels/{entity_id}`
pub async fn get(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<GetResponse, ApiError> {
    let snapshot = state
        .bridge
        .store()
        .snapshot_by_entity(&EntityId::new(entity_id.as_str()))
        .ok_or_else(|| not_found(&entity_id))?;
    Ok(GetResponse::Ok(Json(snapshot)))
}

/// `POST /api/channels/{entity_id}/{on|off|toggle}`: queue a command.
pub async fn command(
    State(state): State<AppState>,
    Path((entity_id, action)): Path<(String, String)>,
) -> Result<CommandResponse, ApiError> {
    let entity = state
        .bridge
        .entity(&EntityId::new(entity_id.as_str()))
        .ok_or_else(|| not_found(&entity_id))?;
    match action.as_str() {
        "on" => entity.request_change(true)?,
        "off" => entity.request_change(false)?,
        "toggle" => entity.toggle()?,
        _ => return Err(ValidationError::UnknownAction(action).into()),
    }
    Ok(CommandResponse::Accepted)
}
