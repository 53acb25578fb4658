//! Error types for chatlink.

use thiserror::Error;

/// Failure of a single collaborator call.
///
/// The session treats every variant uniformly as "this call failed" and
/// wraps it in the matching [`SessionError`] tag.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request could not be sent or its body could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Websocket handshake or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A response body could not be decoded.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// The handshake did not provide a channel endpoint for a push session.
    #[error("endpoint did not provide a stream url")]
    MissingStreamUrl,

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// Main error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Initial handshake failed; no session was created.
    #[error("conversation creation failed: {0}")]
    CreationFailed(#[source] TransportError),

    /// An inbound push message could not be parsed; the channel stays open.
    #[error("failed to parse channel message: {0}")]
    ChannelParseFailed(#[source] serde_json::Error),

    /// The push channel reported a transport error.
    #[error("channel error: {0}")]
    ChannelError(#[source] std::sync::Arc<TransportError>),

    /// The reconnect sequence failed; the session has no live channel.
    #[error("reconnect failed: {0}")]
    ReconnectFailed(#[source] TransportError),

    /// A poll fetch failed; polling stopped.
    #[error("poll failed: {0}")]
    PollFailed(#[source] TransportError),

    /// Credential refresh failed; renewal stopped.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] TransportError),

    /// Outbound activity could not be delivered.
    #[error("send failed: {0}")]
    SendFailed(#[source] TransportError),

    /// The session has been cleaned up.
    #[error("session closed")]
    SessionClosed,

    /// `end` was already called on this session.
    #[error("conversation already ended")]
    AlreadyEnded,

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::LifecycleState,
        to: crate::session::LifecycleState,
    },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
