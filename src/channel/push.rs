//! Push delivery channel.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::StreamEvent;
use crate::error::TransportError;

/// Receiver of push channel events.
///
/// Every callback carries the generation of the channel that raised it so
/// the receiver can ignore events from a channel it already replaced.
pub trait PushHandler: Send + Sync + 'static {
    /// A non-empty text frame arrived.
    fn on_message(&self, generation: u64, text: String);
    /// The transport reported an error.
    fn on_error(&self, generation: u64, error: Arc<TransportError>);
    /// The transport closed. No further callbacks follow for this generation.
    fn on_closed(&self, generation: u64, code: u16);
}

/// One live push connection.
///
/// Closing (or dropping) the channel aborts its reader task, which drops the
/// event receiver and thereby releases the transport. No callback fires after
/// `close` returns.
pub struct PushChannel {
    generation: u64,
    url: String,
    reader: Option<JoinHandle<()>>,
}

impl PushChannel {
    /// Start feeding `events` into `handler`.
    pub fn spawn<H: PushHandler>(
        generation: u64,
        url: impl Into<String>,
        events: mpsc::Receiver<StreamEvent>,
        handler: Weak<H>,
    ) -> Self {
        let url = url.into();
        debug!(generation, %url, "push channel opened");
        let reader = tokio::spawn(read_loop(generation, events, handler));
        Self {
            generation,
            url,
            reader: Some(reader),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check whether the reader is still running.
    pub fn is_live(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Tear the channel down.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            debug!(generation = self.generation, "push channel closed");
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("generation", &self.generation)
            .field("url", &self.url)
            .field("live", &self.is_live())
            .finish()
    }
}

async fn read_loop<H: PushHandler>(
    generation: u64,
    mut events: mpsc::Receiver<StreamEvent>,
    handler: Weak<H>,
) {
    let mut closed = false;

    while let Some(event) = events.recv().await {
        let Some(handler) = handler.upgrade() else {
            return;
        };

        match event {
            StreamEvent::Message(text) => {
                // Keep-alive frames carry no batch.
                if text.trim().is_empty() {
                    trace!(generation, "push channel: keep-alive");
                    continue;
                }
                handler.on_message(generation, text);
            }
            StreamEvent::Error(error) => handler.on_error(generation, error),
            StreamEvent::Closed(code) => {
                closed = true;
                handler.on_closed(generation, code);
                break;
            }
        }
    }

    if !closed {
        if let Some(handler) = handler.upgrade() {
            handler.on_closed(generation, super::ABNORMAL_CLOSURE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl PushHandler for Recorder {
        fn on_message(&self, generation: u64, text: String) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:msg:{}", generation, text));
        }

        fn on_error(&self, generation: u64, error: Arc<TransportError>) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:err:{}", generation, error));
        }

        fn on_closed(&self, generation: u64, code: u16) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:closed:{}", generation, code));
        }
    }

    #[tokio::test]
    async fn test_events_forwarded_in_order() {
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = mpsc::channel(8);
        let channel = PushChannel::spawn(7, "wss://x", rx, Arc::downgrade(&recorder));

        tx.send(StreamEvent::Message("{}".into())).await.unwrap();
        tx.send(StreamEvent::Message("  ".into())).await.unwrap();
        tx.send(StreamEvent::Error(Arc::new(TransportError::Other("oops".into()))))
            .await
            .unwrap();
        tx.send(StreamEvent::Closed(1000)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while channel.is_live() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["7:msg:{}", "7:err:oops", "7:closed:1000"]);
    }

    #[tokio::test]
    async fn test_sender_drop_reports_abnormal_close() {
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = mpsc::channel(8);
        let channel = PushChannel::spawn(1, "wss://x", rx, Arc::downgrade(&recorder));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), async {
            while channel.is_live() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["1:closed:1006"]);
    }

    #[tokio::test]
    async fn test_close_releases_transport() {
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = mpsc::channel(8);
        let mut channel = PushChannel::spawn(2, "wss://x", rx, Arc::downgrade(&recorder));

        channel.close();
        assert!(!channel.is_live());

        tokio::time::timeout(Duration::from_secs(1), tx.closed())
            .await
            .unwrap();
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
