//! Shared application state for axum handlers.

use std::sync::Arc;

use ipxbridge_app::bridge::Bridge;

/// Application state shared across all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
}

impl AppState {
    #[must_use]
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }
}
