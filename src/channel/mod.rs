//! Delivery channel plumbing.
//!
//! A session receives activities either over a persistent push connection
//! or by polling. The push side is split in two: a [`StreamConnector`]
//! opens the transport and yields [`StreamEvent`]s, and a [`PushChannel`]
//! owns the task that feeds those events into the session. The pull side is
//! a [`PullLoop`].

mod pull;
mod push;
mod websocket;

pub use pull::{PullLoop, DEFAULT_POLL_INTERVAL};
pub use push::{PushChannel, PushHandler};
pub use websocket::WebSocketConnector;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Close code reported when a transport ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame that carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// How a session receives activities. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Persistent connection; the endpoint delivers batches proactively.
    #[default]
    Push,
    /// Client-driven polling after the watermark.
    Pull,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Pull => f.write_str("pull"),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" | "websocket" => Ok(Self::Push),
            "pull" | "poll" | "polling" => Ok(Self::Pull),
            other => Err(format!("unknown delivery mode: {}", other)),
        }
    }
}

/// Event raised by an open push transport.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A text frame.
    Message(String),
    /// Transport error. Does not by itself end the stream.
    Error(Arc<TransportError>),
    /// The transport closed with the given code. Always the last event.
    Closed(u16),
}

/// Opens push transports.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Connect to `url`.
    ///
    /// Dropping the returned receiver must close the transport.
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<StreamEvent>, TransportError>;
}
