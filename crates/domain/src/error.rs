//! Common error types used across the workspace.
//!
//! Each failure family has its own typed enum; [`BridgeError`] wraps them via
//! `#[from]` so port boundaries can carry a single error type while callers
//! still match on the precise cause.

use crate::channel::{ChannelKind, ChannelRole};

/// Top-level error type crossing port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transient failure talking to a controller.
    #[error("communication error: {0}")]
    Communication(#[from] CommunicationError),

    /// Credentials rejected, on the device side or on the push side.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Invalid or missing channel mapping, surfaced once at startup.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A referenced channel or device does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A request was well-formed but not acceptable.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Network unreachable, timeout, or malformed response.
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    #[error("device unreachable: {message}")]
    Unreachable { message: String },

    #[error("request timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

/// Rejected or missing credentials.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("device rejected credentials (HTTP {status})")]
    DeviceRejected { status: u16 },

    #[error("no credentials provided")]
    MissingCredentials,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Invalid device or channel definition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("host must not be empty")]
    EmptyHost,

    #[error("channel `{name}` must have a positive id")]
    InvalidLocalId { name: String },

    #[error("component `{0}` is not supported")]
    UnsupportedComponent(String),

    #[error("type `{0}` is not supported")]
    UnsupportedType(String),

    #[error("component {role} cannot be bound to an {kind} channel")]
    IncompatibleRole { role: ChannelRole, kind: ChannelKind },

    #[error("{kind} channel {local_id} is configured twice")]
    DuplicateChannel { kind: ChannelKind, local_id: u16 },

    #[error("entity id `{0}` is already in use")]
    DuplicateEntityId(String),

    #[error("device `{0}` is configured twice")]
    DuplicateDevice(String),

    #[error("scan interval and request timeout must be positive")]
    ZeroInterval,
}

/// A lookup by identifier found nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Request-level validation failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid state `{0}`, expected `on` or `off`")]
    InvalidState(String),

    #[error("channel `{0}` is read-only")]
    ReadOnlyChannel(String),

    #[error("unknown action `{0}`, expected `on`, `off` or `toggle`")]
    UnknownAction(String),
}
