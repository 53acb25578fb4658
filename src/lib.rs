//! # chatlink
//!
//! Conversation session manager for bot messaging channels.
//!
//! A [`Session`] keeps one conversation with a remote endpoint alive and
//! delivers its activities exactly once, in watermark order, whether they
//! arrive over a websocket push channel or by polling. Credential renewal
//! and push channel reconnects run in the background.
//!
//! ## Features
//!
//! - **Push or pull delivery**: websocket stream or fixed-cadence polling
//! - **Watermark ledger**: stale and duplicate batches are discarded whole
//! - **Token renewal**: the credential is refreshed ahead of expiry
//! - **Explicit subscriptions**: one handle per consumer and notification kind
//!
//! ## Quick Start
//!
//! ```no_run
//! use chatlink::{Session, SessionOptions, DEFAULT_ENDPOINT};
//!
//! #[tokio::main]
//! async fn main() -> chatlink::Result<()> {
//!     chatlink::logging::try_init().ok();
//!
//!     let (session, mut events) =
//!         Session::start("user-1", "secret", DEFAULT_ENDPOINT, SessionOptions::push()).await?;
//!
//!     session.send_message("hello").await?;
//!
//!     if let Some(batch) = events.activities.recv().await {
//!         for activity in batch {
//!             println!("{:?}", activity.text);
//!         }
//!     }
//!
//!     session.end(true).await?;
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod api;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;

// Re-export commonly used types
pub use activity::{Activity, ActivitySet, ChannelAccount, Watermark};
pub use api::{ConversationApi, HttpConversationApi, ServerAck, DEFAULT_ENDPOINT};
pub use channel::{DeliveryMode, StreamConnector, StreamEvent, WebSocketConnector};
pub use error::{Result, SessionError, TransportError};
pub use session::{
    Credential, LifecycleState, Session, SessionEvents, SessionOptions, Subscription,
    SubscriptionId,
};
