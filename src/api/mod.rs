//! Credential collaborator contract.
//!
//! The session never builds requests itself. Every network call goes through
//! a [`ConversationApi`], whose wire shapes belong to the implementation.
//!
//! ## Calls
//!
//! - `create_conversation` - initial handshake with the channel secret
//! - `refresh_token` - extend the session credential
//! - `reconnect_conversation` - fresh stream url and token for a push channel
//! - `send_activity` - post one outbound activity
//! - `fetch_activities` - pull activities after a watermark

mod http;

pub use http::{HttpConversationApi, DEFAULT_ENDPOINT};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivitySet, Watermark};
use crate::error::TransportError;

/// Result of the initial handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    pub token: String,
    /// Lifetime of `token` in seconds.
    pub expires_in: u64,
    #[serde(rename = "streamUrl", default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

/// Result of a credential refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    pub token: String,
    pub expires_in: u64,
}

/// Result of a reconnect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconnection {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    pub token: String,
    #[serde(rename = "streamUrl")]
    pub stream_url: String,
    /// Some endpoints also report a new lifetime on reconnect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Acknowledgement of a posted activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAck {
    pub id: String,
}

/// Network operations the session depends on.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn create_conversation(
        &self,
        secret: &str,
        endpoint: &str,
    ) -> Result<Conversation, TransportError>;

    async fn refresh_token(
        &self,
        token: &str,
        endpoint: &str,
    ) -> Result<RefreshedToken, TransportError>;

    async fn reconnect_conversation(
        &self,
        conversation_id: &str,
        token: &str,
        endpoint: &str,
        watermark: Option<Watermark>,
    ) -> Result<Reconnection, TransportError>;

    async fn send_activity(
        &self,
        conversation_id: &str,
        token: &str,
        endpoint: &str,
        activity: &Activity,
    ) -> Result<ServerAck, TransportError>;

    async fn fetch_activities(
        &self,
        conversation_id: &str,
        token: &str,
        endpoint: &str,
        watermark: Option<Watermark>,
    ) -> Result<ActivitySet, TransportError>;
}
