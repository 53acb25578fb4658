//! Session management module.
//!
//! This module provides the conversation session and its parts: the
//! lifecycle state machine, the activity ledger, credential renewal and
//! consumer notifications.

mod id;
mod ledger;
mod manager;
mod notify;
mod options;
mod state;
mod timer;
mod token;

pub use id::SubscriptionId;
pub use ledger::{ActivityLedger, IngestOutcome};
pub use manager::Session;
pub use notify::{SessionEvents, Subscription};
pub use options::SessionOptions;
pub use state::LifecycleState;
pub use timer::TimerSlot;
pub use token::{Credential, TokenManager, DEFAULT_REFRESH_MARGIN};
