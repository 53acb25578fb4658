//! Session credential and its renewal cycle.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::TimerSlot;

/// Default lead time before expiry at which the credential is renewed.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Bearer token and its absolute expiry. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Instant,
}

impl Credential {
    /// Create a credential that expires `expires_in` from now.
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self::expiring_at(token, Instant::now() + expires_in)
    }

    pub fn expiring_at(token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Owns the single outstanding renewal timer of a session.
#[derive(Debug)]
pub struct TokenManager {
    margin: Duration,
    timer: TimerSlot,
}

impl TokenManager {
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            timer: TimerSlot::new(),
        }
    }

    /// Time from `now` until `credential` should be renewed.
    ///
    /// Zero when the renewal point has already passed.
    pub fn renewal_delay(&self, credential: &Credential, now: Instant) -> Duration {
        credential
            .expires_at()
            .checked_sub(self.margin)
            .and_then(|at| at.checked_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Start a renewal cycle, cancelling any previous one.
    ///
    /// `refresh` runs after `first_delay`. It returns the delay until the
    /// next renewal, or `None` to stop the cycle.
    pub fn start<F, Fut>(&mut self, first_delay: Duration, mut refresh: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        debug!(delay_ms = first_delay.as_millis() as u64, "token renewal scheduled");
        self.timer.replace(tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::time::sleep(delay).await;
                match refresh().await {
                    Some(next) => {
                        debug!(delay_ms = next.as_millis() as u64, "token renewal rescheduled");
                        delay = next;
                    }
                    None => break,
                }
            }
        }));
    }

    /// Cancel the outstanding renewal.
    pub fn stop(&mut self) -> bool {
        self.timer.cancel()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_MARGIN)
    }
}
