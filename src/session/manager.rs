//! Session orchestrator.
//!
//! A [`Session`] owns one conversation. Three kinds of background task touch
//! its state: the push channel reader (or the poll loop), the renewal timer
//! and the reconnect sequence. All of them go through one mutex, hold it only
//! between suspension points, and check the lifecycle after every network
//! call so that nothing mutates a session that has been cleaned up.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::ledger::{ActivityLedger, IngestOutcome};
use super::notify::{Notifier, SessionEvents, Subscription};
use super::token::{Credential, TokenManager};
use super::{LifecycleState, SessionOptions, TimerSlot};
use crate::activity::{Activity, ActivitySet, Watermark};
use crate::api::{ConversationApi, HttpConversationApi, ServerAck};
use crate::channel::{
    DeliveryMode, PullLoop, PushChannel, PushHandler, StreamConnector, StreamEvent,
    WebSocketConnector,
};
use crate::error::{SessionError, TransportError};
use crate::Result;

/// Mutable state of a session.
struct SessionState {
    conversation_id: String,
    credential: Credential,
    channel_endpoint: Option<String>,
    ledger: ActivityLedger,
    lifecycle: LifecycleState,
    /// Set while `cleanup` runs; close events seen meanwhile are ignored.
    tearing_down: bool,
    push: Option<PushChannel>,
    next_generation: u64,
    pull: PullLoop,
    tokens: TokenManager,
    reconnect: TimerSlot,
}

/// What a network call needs from the state.
struct Snapshot {
    conversation_id: String,
    token: String,
    watermark: Option<Watermark>,
}

struct Inner {
    me: Weak<Inner>,
    user_id: String,
    endpoint: String,
    options: SessionOptions,
    api: Arc<dyn ConversationApi>,
    connector: Arc<dyn StreamConnector>,
    state: Mutex<SessionState>,
    notifier: Notifier,
}

/// A live conversation with a remote endpoint.
///
/// Dropping the session cleans it up.
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Start a session over HTTP and websockets.
    pub async fn start(
        user_id: impl Into<String>,
        secret: &str,
        endpoint: impl Into<String>,
        options: SessionOptions,
    ) -> Result<(Session, SessionEvents)> {
        Self::start_with(
            Arc::new(HttpConversationApi::new()),
            Arc::new(WebSocketConnector::new()),
            user_id,
            secret,
            endpoint,
            options,
        )
        .await
    }

    /// Start a session with explicit collaborators.
    ///
    /// Performs the initial handshake and, in push mode, opens the channel.
    /// On failure nothing is left running.
    pub async fn start_with(
        api: Arc<dyn ConversationApi>,
        connector: Arc<dyn StreamConnector>,
        user_id: impl Into<String>,
        secret: &str,
        endpoint: impl Into<String>,
        options: SessionOptions,
    ) -> Result<(Session, SessionEvents)> {
        let user_id = user_id.into();
        let endpoint = endpoint.into();

        let conversation = api
            .create_conversation(secret, &endpoint)
            .await
            .map_err(SessionError::CreationFailed)?;

        let stream = match options.mode {
            DeliveryMode::Push => {
                let url = conversation
                    .stream_url
                    .clone()
                    .ok_or(SessionError::CreationFailed(TransportError::MissingStreamUrl))?;
                let events = connector
                    .connect(&url)
                    .await
                    .map_err(SessionError::CreationFailed)?;
                Some((url, events))
            }
            DeliveryMode::Pull => None,
        };

        let state = SessionState {
            conversation_id: conversation.conversation_id,
            credential: Credential::new(
                conversation.token,
                Duration::from_secs(conversation.expires_in),
            ),
            channel_endpoint: conversation.stream_url,
            ledger: ActivityLedger::new(),
            lifecycle: LifecycleState::Active,
            tearing_down: false,
            push: None,
            next_generation: 1,
            pull: PullLoop::new(options.poll_interval),
            tokens: TokenManager::new(options.refresh_margin),
            reconnect: TimerSlot::new(),
        };

        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            user_id,
            endpoint,
            options,
            api,
            connector,
            state: Mutex::new(state),
            notifier: Notifier::new(),
        });

        let events = inner.notifier.subscribe_all();
        {
            let mut state = inner.lock()?;
            if let Some((url, events)) = stream {
                inner.install_push(&mut state, url, events);
            }
            inner.start_renewal(&mut state);
            info!(
                conversation = %state.conversation_id,
                mode = %inner.options.mode,
                "session started"
            );
        }

        Ok((Session { inner }, events))
    }

    /// Send an activity with the current credential.
    ///
    /// In pull mode a successful send starts the poll loop if it is not
    /// running and `auto_start_pull` is set.
    pub async fn send(&self, activity: Activity, auto_start_pull: bool) -> Result<ServerAck> {
        let snapshot = self.inner.snapshot()?;
        let ack = self
            .inner
            .api
            .send_activity(
                &snapshot.conversation_id,
                &snapshot.token,
                &self.inner.endpoint,
                &activity,
            )
            .await
            .map_err(SessionError::SendFailed)?;
        debug!(id = %ack.id, kind = %activity.kind, "activity sent");

        if auto_start_pull && self.inner.options.mode == DeliveryMode::Pull {
            let mut state = self.inner.lock()?;
            self.inner.start_polling(&mut state);
        }

        Ok(ack)
    }

    /// Send a text message from the local user.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<ServerAck> {
        let activity = Activity::message(self.inner.user_id.as_str(), text);
        self.send(activity, true).await
    }

    /// End the conversation.
    ///
    /// The end-of-conversation marker is appended to the local log because
    /// the endpoint does not echo it. With `cleanup` set, all resources are
    /// released afterwards.
    pub async fn end(&self, cleanup: bool) -> Result<ServerAck> {
        match self.inner.lock()?.lifecycle {
            LifecycleState::Active => {}
            LifecycleState::Closing => return Err(SessionError::AlreadyEnded),
            LifecycleState::Closed => return Err(SessionError::SessionClosed),
        }

        let mut marker = Activity::end_of_conversation(self.inner.user_id.as_str());
        let ack = self.send(marker.clone(), false).await?;

        {
            let mut state = self.inner.lock()?;
            if state.lifecycle.transition_to(LifecycleState::Closing).is_err() {
                return Err(SessionError::AlreadyEnded);
            }
            marker.id = Some(ack.id.clone());
            state.ledger.append_local(marker);
        }
        info!("conversation ended");

        if cleanup {
            self.cleanup();
        }
        Ok(ack)
    }

    /// Release every resource held by the session.
    ///
    /// Stops polling and renewal, closes the push channel and detaches all
    /// subscriptions. Calling it again does nothing.
    pub fn cleanup(&self) {
        self.inner.cleanup();
    }

    /// Restart the poll loop, e.g. after a poll failure.
    ///
    /// Returns `false` in push mode or when a loop is already running.
    pub fn start_polling(&self) -> Result<bool> {
        let mut state = self.inner.lock()?;
        if state.lifecycle.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(self.inner.start_polling(&mut state))
    }

    /// Restart the renewal cycle, e.g. after a refresh failure.
    pub fn restart_token_renewal(&self) -> Result<()> {
        let mut state = self.inner.lock()?;
        if state.lifecycle.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        self.inner.start_renewal(&mut state);
        Ok(())
    }

    /// Run the reconnect sequence now. Push mode only.
    pub async fn reconnect(&self) -> Result<()> {
        if self.inner.options.mode != DeliveryMode::Push {
            return Ok(());
        }
        self.inner.reconnect().await
    }

    pub fn subscribe_activities(&self) -> Subscription<Vec<Activity>> {
        self.inner.notifier.subscribe_activities()
    }

    pub fn subscribe_errors(&self) -> Subscription<Arc<SessionError>> {
        self.inner.notifier.subscribe_errors()
    }

    pub fn subscribe_closed(&self) -> Subscription<u16> {
        self.inner.notifier.subscribe_closed()
    }

    /// Full activity log.
    pub fn activities(&self) -> Vec<Activity> {
        self.inner.state().ledger.activities().to_vec()
    }

    /// Activities not sent by the local user.
    pub fn foreign_activities(&self) -> Vec<Activity> {
        self.inner.state().ledger.foreign(&self.inner.user_id)
    }

    pub fn watermark(&self) -> Option<Watermark> {
        self.inner.state().ledger.watermark()
    }

    pub fn conversation_id(&self) -> String {
        self.inner.state().conversation_id.clone()
    }

    pub fn credential(&self) -> Credential {
        self.inner.state().credential.clone()
    }

    pub fn channel_endpoint(&self) -> Option<String> {
        self.inner.state().channel_endpoint.clone()
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn mode(&self) -> DeliveryMode {
        self.inner.options.mode
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.state().lifecycle
    }

    /// Check whether a push channel is currently connected.
    pub fn is_channel_live(&self) -> bool {
        self.inner
            .state()
            .push
            .as_ref()
            .is_some_and(PushChannel::is_live)
    }

    pub fn is_polling(&self) -> bool {
        self.inner.state().pull.is_running()
    }

    pub fn is_renewing(&self) -> bool {
        self.inner.state().tokens.is_running()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.cleanup();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.inner.user_id)
            .field("mode", &self.inner.options.mode)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| SessionError::LockPoisoned)
    }

    /// Lock for reads and teardown, which must proceed even after a panic
    /// elsewhere.
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.state().lifecycle.is_closed()
    }

    fn snapshot(&self) -> Result<Snapshot> {
        let state = self.lock()?;
        if !state.lifecycle.can_send() {
            return Err(SessionError::SessionClosed);
        }
        Ok(Snapshot {
            conversation_id: state.conversation_id.clone(),
            token: state.credential.token().to_string(),
            watermark: state.ledger.watermark(),
        })
    }

    fn install_push(
        &self,
        state: &mut SessionState,
        url: String,
        events: mpsc::Receiver<StreamEvent>,
    ) {
        let generation = state.next_generation;
        state.next_generation += 1;
        state.push = Some(PushChannel::spawn(
            generation,
            url,
            events,
            self.me.clone(),
        ));
    }

    // ------------------------------------------------------------------
    // Token renewal
    // ------------------------------------------------------------------

    fn start_renewal(&self, state: &mut SessionState) {
        let delay = state
            .tokens
            .renewal_delay(&state.credential, Instant::now());
        let me = self.me.clone();
        state.tokens.start(delay, move || {
            let me = me.clone();
            async move {
                match me.upgrade() {
                    Some(inner) => inner.refresh().await,
                    None => None,
                }
            }
        });
    }

    /// Refresh the credential. Returns the delay until the next renewal.
    async fn refresh(&self) -> Option<Duration> {
        let token = self.snapshot().ok()?.token;
        let result = self.api.refresh_token(&token, &self.endpoint).await;

        let mut state = self.lock().ok()?;
        if state.lifecycle.is_closed() {
            return None;
        }

        match result {
            Ok(refreshed) => {
                state.credential =
                    Credential::new(refreshed.token, Duration::from_secs(refreshed.expires_in));
                state.conversation_id = refreshed.conversation_id;
                debug!(expires_in = refreshed.expires_in, "token refreshed");
                Some(
                    state
                        .tokens
                        .renewal_delay(&state.credential, Instant::now()),
                )
            }
            Err(e) => {
                drop(state);
                warn!(error = %e, "token refresh failed");
                self.notifier.error(SessionError::RefreshFailed(e));
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Pull delivery
    // ------------------------------------------------------------------

    fn start_polling(&self, state: &mut SessionState) -> bool {
        if self.options.mode != DeliveryMode::Pull || state.lifecycle.is_closed() {
            return false;
        }
        let me = self.me.clone();
        state.pull.start(move || {
            let me = me.clone();
            async move {
                match me.upgrade() {
                    Some(inner) => inner.poll().await,
                    None => false,
                }
            }
        })
    }

    fn poll_direct(&self, state: &mut SessionState) {
        let me = self.me.clone();
        state.pull.run_direct(async move {
            match me.upgrade() {
                Some(inner) => inner.poll().await,
                None => false,
            }
        });
    }

    /// One poll cycle. Returns whether polling should continue.
    async fn poll(&self) -> bool {
        let Ok(snapshot) = self.snapshot() else {
            return false;
        };

        let result = self
            .api
            .fetch_activities(
                &snapshot.conversation_id,
                &snapshot.token,
                &self.endpoint,
                snapshot.watermark,
            )
            .await;

        match result {
            Ok(set) => self.ingest(set),
            Err(e) => {
                if self.is_closed() {
                    return false;
                }
                warn!(error = %e, "poll failed");
                self.notifier.error(SessionError::PollFailed(e));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Offer a batch to the ledger and notify on advance.
    ///
    /// Notification happens under the state lock so that batches reach
    /// subscribers in watermark order. Returns `false` once closed.
    fn ingest(&self, set: ActivitySet) -> bool {
        let Ok(mut state) = self.lock() else {
            return false;
        };
        if state.lifecycle.is_closed() {
            return false;
        }

        match state.ledger.ingest(set) {
            IngestOutcome::Advanced { watermark, batch } => {
                debug!(%watermark, count = batch.len(), "batch incorporated");
                if self.options.mode == DeliveryMode::Pull {
                    self.poll_direct(&mut state);
                }
                if !batch.is_empty() {
                    self.notifier.activities(batch);
                }
            }
            IngestOutcome::Stale => trace!("stale batch discarded"),
        }
        true
    }

    // ------------------------------------------------------------------
    // Reconnect
    // ------------------------------------------------------------------

    async fn reconnect(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        info!("reconnecting push channel");

        let reconnection = match self
            .api
            .reconnect_conversation(
                &snapshot.conversation_id,
                &snapshot.token,
                &self.endpoint,
                snapshot.watermark,
            )
            .await
        {
            Ok(reconnection) => reconnection,
            Err(e) => return Err(self.drop_channel(e)),
        };

        let old = {
            let mut state = self.lock()?;
            if state.lifecycle.is_closed() {
                return Err(SessionError::SessionClosed);
            }
            let expires_at = match reconnection.expires_in {
                Some(secs) => Instant::now() + Duration::from_secs(secs),
                None => state.credential.expires_at(),
            };
            state.conversation_id = reconnection.conversation_id.clone();
            state.credential = Credential::expiring_at(reconnection.token.clone(), expires_at);
            state.channel_endpoint = Some(reconnection.stream_url.clone());
            if reconnection.expires_in.is_some() {
                self.start_renewal(&mut state);
            }
            state.push.take()
        };
        if let Some(mut old) = old {
            old.close();
        }

        let events = match self.connector.connect(&reconnection.stream_url).await {
            Ok(events) => events,
            Err(e) => return Err(self.drop_channel(e)),
        };

        let mut state = self.lock()?;
        if state.lifecycle.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        self.install_push(&mut state, reconnection.stream_url, events);
        info!(conversation = %state.conversation_id, "push channel reconnected");
        Ok(())
    }

    /// Leave the session without a channel after a failed reconnect.
    fn drop_channel(&self, cause: TransportError) -> SessionError {
        if let Ok(mut state) = self.lock() {
            if let Some(mut push) = state.push.take() {
                push.close();
            }
        }
        SessionError::ReconnectFailed(cause)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    fn cleanup(&self) -> bool {
        let mut state = self.state();
        if state.lifecycle.is_closed() {
            return false;
        }

        state.tearing_down = true;
        state.pull.stop();
        state.tokens.stop();
        state.reconnect.cancel();
        if let Some(mut push) = state.push.take() {
            push.close();
        }
        state.lifecycle = LifecycleState::Closed;
        state.tearing_down = false;
        drop(state);

        self.notifier.detach_all();
        info!("session cleaned up");
        true
    }
}

impl PushHandler for Inner {
    fn on_message(&self, _generation: u64, text: String) {
        match serde_json::from_str::<ActivitySet>(&text) {
            Ok(set) => {
                self.ingest(set);
            }
            Err(e) => {
                if self.is_closed() {
                    return;
                }
                warn!(error = %e, "unparseable channel message dropped");
                self.notifier.error(SessionError::ChannelParseFailed(e));
            }
        }
    }

    fn on_error(&self, _generation: u64, error: Arc<TransportError>) {
        if self.is_closed() {
            return;
        }
        warn!(%error, "push channel error");
        self.notifier.error(SessionError::ChannelError(error));
    }

    fn on_closed(&self, generation: u64, code: u16) {
        {
            let mut state = self.state();
            if state.lifecycle.is_closed() || state.tearing_down {
                return;
            }
            if state.push.as_ref().map(PushChannel::generation) != Some(generation) {
                return;
            }

            if self.options.auto_reconnect {
                let me = self.me.clone();
                state.reconnect.replace(tokio::spawn(async move {
                    let Some(inner) = me.upgrade() else {
                        return;
                    };
                    match inner.reconnect().await {
                        Ok(()) => {}
                        Err(SessionError::SessionClosed) => {}
                        Err(e) => {
                            warn!(error = %e, "reconnect failed");
                            inner.notifier.error(e);
                        }
                    }
                }));
            }
        }

        info!(code, "push channel closed");
        self.notifier.closed(code);
    }
}
