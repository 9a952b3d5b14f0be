//! IPX800 adapter error types.

use std::time::Duration;

use ipxbridge_domain::error::{AuthError, BridgeError, CommunicationError, ValidationError};

/// Errors specific to talking to an IPX800.
#[derive(Debug, thiserror::Error)]
pub enum Ipx800Error {
    /// Connection refused, DNS failure, reset, and the like.
    #[error("request failed")]
    Transport(#[source] reqwest::Error),

    /// No complete answer within the device's request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The controller refused the configured credentials.
    #[error("controller answered HTTP {status}")]
    Unauthorized { status: u16 },

    /// Any other non-2xx answer.
    #[error("controller answered HTTP {status}")]
    Status { status: u16 },

    /// The status document could not be understood.
    #[error("malformed status document: {0}")]
    Malformed(String),

    /// Commands can only target relays.
    #[error("channel {0} is an input")]
    NotWritable(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl Ipx800Error {
    /// Classify a `reqwest` failure, given the timeout that was in force.
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err)
        }
    }

    /// Convert into a [`BridgeError`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> BridgeError {
        match self {
            Self::Transport(err) => CommunicationError::Unreachable {
                message: error_chain(&err),
            }
            .into(),
            Self::Timeout(after) => CommunicationError::Timeout {
                after_secs: after.as_secs(),
            }
            .into(),
            Self::Unauthorized { status } => AuthError::DeviceRejected { status }.into(),
            Self::Status { status } => CommunicationError::UnexpectedStatus { status }.into(),
            Self::Malformed(reason) => CommunicationError::MalformedResponse { reason }.into(),
            Self::NotWritable(channel) => ValidationError::ReadOnlyChannel(channel).into(),
            Self::Client(err) => CommunicationError::Unreachable {
                message: error_chain(&err),
            }
            .into(),
        }
    }
}

impl From<Ipx800Error> for BridgeError {
    fn from(err: Ipx800Error) -> Self {
        err.into_domain()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
