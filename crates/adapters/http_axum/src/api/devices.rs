//! JSON handlers for devices.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use ipxbridge_domain::device::DeviceSummary;
use ipxbridge_domain::health::DeviceHealth;

use crate::state::AppState;

/// One device together with its poll health.
#[derive(Debug, Serialize)]
pub struct DeviceHealthView {
    #[serde(flatten)]
    pub device: DeviceSummary,
    pub health: DeviceHealth,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<DeviceSummary>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the health endpoint.
pub enum HealthResponse {
    Ok(Json<Vec<DeviceHealthView>>),
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/devices`
pub async fn list(State(state): State<AppState>) -> ListResponse {
    ListResponse::Ok(Json(state.bridge.devices()))
}

/// `GET /api/devices/health`
pub async fn health(State(state): State<AppState>) -> HealthResponse {
    let views = state
        .bridge
        .health()
        .into_iter()
        .map(|(device, health)| DeviceHealthView { device, health })
        .collect();
    HealthResponse::Ok(Json(views))
}
