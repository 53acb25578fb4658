//! Pull delivery channel.
//!
//! The regular loop is single-flight: one cycle at a time, the next one
//! scheduled a fixed interval after the previous one completed. Direct
//! cycles run once, outside the loop, and may interleave with it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::debug;

use crate::session::TimerSlot;

/// Default delay between the end of one poll and the start of the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling loop of a pull session.
#[derive(Debug)]
pub struct PullLoop {
    interval: Duration,
    timer: TimerSlot,
    direct: JoinSet<()>,
}

impl PullLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: TimerSlot::new(),
            direct: JoinSet::new(),
        }
    }

    /// Start the regular loop unless it is already running.
    ///
    /// `cycle` performs one fetch and returns whether polling should go on.
    /// Returns `false` if a loop was already running.
    pub fn start<F, Fut>(&mut self, mut cycle: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        if self.timer.is_running() {
            return false;
        }

        let interval = self.interval;
        debug!(interval_ms = interval.as_millis() as u64, "poll loop started");
        self.timer.replace(tokio::spawn(async move {
            while cycle().await {
                tokio::time::sleep(interval).await;
            }
            debug!("poll loop stopped");
        }));
        true
    }

    /// Run one cycle outside the regular loop.
    pub fn run_direct<Fut>(&mut self, cycle: Fut)
    where
        Fut: Future<Output = bool> + Send + 'static,
    {
        while self.direct.try_join_next().is_some() {}
        self.direct.spawn(async move {
            cycle.await;
        });
    }

    /// Stop the loop and abort in-flight direct cycles.
    pub fn stop(&mut self) -> bool {
        self.direct.abort_all();
        self.timer.cancel()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}

impl Default for PullLoop {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
