//! HTTP implementation of the collaborator contract.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Conversation, ConversationApi, Reconnection, RefreshedToken, ServerAck};
use crate::activity::{Activity, ActivitySet, Watermark};
use crate::error::TransportError;

/// Public Direct Line endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://directline.botframework.com/v3/directline";

/// Direct-Line-style REST client.
#[derive(Debug, Clone, Default)]
pub struct HttpConversationApi {
    http: Client,
}

impl HttpConversationApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured reqwest client (proxies, timeouts, ...).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request.send().await?;
        decode(response).await
    }
}

fn url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn create_conversation(
        &self,
        secret: &str,
        endpoint: &str,
    ) -> Result<Conversation, TransportError> {
        debug!("creating conversation at {}", endpoint);
        let request = self
            .http
            .post(url(endpoint, "conversations"))
            .bearer_auth(secret);
        self.execute(request).await
    }

    async fn refresh_token(
        &self,
        token: &str,
        endpoint: &str,
    ) -> Result<RefreshedToken, TransportError> {
        let request = self
            .http
            .post(url(endpoint, "tokens/refresh"))
            .bearer_auth(token);
        self.execute(request).await
    }

    async fn reconnect_conversation(
        &self,
        conversation_id: &str,
        token: &str,
        endpoint: &str,
        watermark: Option<Watermark>,
    ) -> Result<Reconnection, TransportError> {
        let mut request = self
            .http
            .get(url(endpoint, &format!("conversations/{}", conversation_id)))
            .bearer_auth(token);
        if let Some(watermark) = watermark {
            request = request.query(&[("watermark", watermark.to_string())]);
        }
        self.execute(request).await
    }

    async fn send_activity(
        &self,
        conversation_id: &str,
        token: &str,
        endpoint: &str,
        activity: &Activity,
    ) -> Result<ServerAck, TransportError> {
        let request = self
            .http
            .post(url(
                endpoint,
                &format!("conversations/{}/activities", conversation_id),
            ))
            .bearer_auth(token)
            .json(activity);
        self.execute(request).await
    }

    async fn fetch_activities(
        &self,
        conversation_id: &str,
        token: &str,
        endpoint: &str,
        watermark: Option<Watermark>,
    ) -> Result<ActivitySet, TransportError> {
        let mut request = self
            .http
            .get(url(
                endpoint,
                &format!("conversations/{}/activities", conversation_id),
            ))
            .bearer_auth(token);
        if let Some(watermark) = watermark {
            request = request.query(&[("watermark", watermark.to_string())]);
        }
        self.execute(request).await
    }
}
