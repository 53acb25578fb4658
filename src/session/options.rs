//! Options accepted when starting a session.

use std::time::Duration;

use crate::channel::{DeliveryMode, DEFAULT_POLL_INTERVAL};

use super::token::DEFAULT_REFRESH_MARGIN;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Delivery mode; fixed for the session's lifetime.
    pub mode: DeliveryMode,
    /// Reconnect after an unsolicited push channel close.
    pub auto_reconnect: bool,
    /// Delay between poll cycles in pull mode.
    pub poll_interval: Duration,
    /// Lead time before credential expiry at which it is renewed.
    pub refresh_margin: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Push,
            auto_reconnect: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }
}

impl SessionOptions {
    /// Options for a push session.
    pub fn push() -> Self {
        Self::default()
    }

    /// Options for a pull session.
    pub fn pull() -> Self {
        Self {
            mode: DeliveryMode::Pull,
            ..Default::default()
        }
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }
}
