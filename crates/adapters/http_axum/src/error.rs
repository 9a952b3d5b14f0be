//! HTTP error response mapping.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use ipxbridge_domain::error::{AuthError, BridgeError, NotFoundError, ValidationError};

/// Realm announced on `401` responses.
pub const AUTH_REALM: &str = "Basic realm=\"ipx800\"";

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`BridgeError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            BridgeError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            BridgeError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            BridgeError::Auth(err) => {
                let body = Json(ErrorBody {
                    error: err.to_string(),
                });
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, AUTH_REALM)],
                    body,
                )
                    .into_response();
            }
            BridgeError::Communication(err) => {
                tracing::warn!(error = %err, "controller unavailable");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            BridgeError::Configuration(err) => {
                tracing::error!(error = %err, "configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipxbridge_domain::error::{CommunicationError, ConfigurationError};

    fn status_of(err: impl Into<BridgeError>) -> StatusCode {
        ApiError(err.into()).into_response().status()
    }

    #[test]
    fn should_map_errors_to_status_codes() {
        assert_eq!(
            status_of(ValidationError::InvalidState("maybe".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(NotFoundError {
                entity: "Entity",
                id: "switch.x".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CommunicationError::Timeout { after_secs: 5 }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ConfigurationError::EmptyHost),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn should_challenge_on_auth_error() {
        let response = ApiError::from(AuthError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            AUTH_REALM
        );
    }
}
