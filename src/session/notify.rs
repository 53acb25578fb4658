//! Consumer notifications.
//!
//! Each notification kind keeps its own list of subscribers. A
//! [`Subscription`] is the only handle to its slot: dropping it (or calling
//! [`Subscription::unsubscribe`]) releases exactly that slot and leaves every
//! other subscriber in place.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;

use super::SubscriptionId;
use crate::activity::Activity;
use crate::error::SessionError;

/// Subscribers of one notification kind.
pub(crate) struct Listeners<T> {
    senders: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<T>)>>,
}

impl<T: Clone> Listeners<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            senders: Mutex::new(Vec::new()),
        })
    }

    fn senders(&self) -> MutexGuard<'_, Vec<(SubscriptionId, mpsc::UnboundedSender<T>)>> {
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribe(self: &Arc<Self>) -> Subscription<T> {
        let id = SubscriptionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders().push((id, tx));
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Deliver `value` to every subscriber. Returns the number reached.
    fn emit(&self, value: T) -> usize {
        let mut senders = self.senders();
        senders.retain(|(_, tx)| tx.send(value.clone()).is_ok());
        senders.len()
    }

    fn remove(&self, id: SubscriptionId) {
        self.senders().retain(|(sid, _)| *sid != id);
    }

    fn clear(&self) {
        self.senders().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.senders().len()
    }
}

/// Handle to one subscription.
#[derive(Debug)]
pub struct Subscription<T: Clone> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
    registry: Weak<Listeners<T>>,
}

impl<T: Clone> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once the subscription was detached and every buffered
    /// notification has been received.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take a buffered notification without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Release this subscription.
    pub fn unsubscribe(self) {}
}

impl<T: Clone> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").finish_non_exhaustive()
    }
}

/// The three subscriptions handed out by `Session::start`.
///
/// They exist before any channel runs, so no early batch is missed.
#[derive(Debug)]
pub struct SessionEvents {
    pub activities: Subscription<Vec<Activity>>,
    pub errors: Subscription<Arc<SessionError>>,
    pub closed: Subscription<u16>,
}

/// Notification hub of a session.
#[derive(Debug)]
pub(crate) struct Notifier {
    activities: Arc<Listeners<Vec<Activity>>>,
    errors: Arc<Listeners<Arc<SessionError>>>,
    closed: Arc<Listeners<u16>>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self {
            activities: Listeners::new(),
            errors: Listeners::new(),
            closed: Listeners::new(),
        }
    }

    pub(crate) fn subscribe_all(&self) -> SessionEvents {
        SessionEvents {
            activities: self.subscribe_activities(),
            errors: self.subscribe_errors(),
            closed: self.subscribe_closed(),
        }
    }

    pub(crate) fn subscribe_activities(&self) -> Subscription<Vec<Activity>> {
        self.activities.subscribe()
    }

    pub(crate) fn subscribe_errors(&self) -> Subscription<Arc<SessionError>> {
        self.errors.subscribe()
    }

    pub(crate) fn subscribe_closed(&self) -> Subscription<u16> {
        self.closed.subscribe()
    }

    pub(crate) fn activities(&self, batch: Vec<Activity>) {
        self.activities.emit(batch);
    }

    pub(crate) fn error(&self, error: SessionError) {
        self.errors.emit(Arc::new(error));
    }

    pub(crate) fn closed(&self, code: u16) {
        self.closed.emit(code);
    }

    /// Detach every subscriber of every kind.
    pub(crate) fn detach_all(&self) {
        self.activities.clear();
        self.errors.clear();
        self.closed.clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.activities.len() + self.errors.len() + self.closed.len()
    }
}
