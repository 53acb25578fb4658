//! Test doubles shared by the session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatlink::api::{Conversation, ConversationApi, Reconnection, RefreshedToken, ServerAck};
use chatlink::{
    Activity, ActivitySet, Session, SessionEvents, SessionOptions, StreamConnector, StreamEvent,
    TransportError, Watermark,
};
use tokio::sync::mpsc;

pub const USER: &str = "user-1";
pub const BOT: &str = "bot";
pub const SECRET: &str = "secret";
pub const ENDPOINT: &str = "https://mock.test/v3/directline";
pub const CONVERSATION: &str = "conv-1";

/// One scripted answer to `fetch_activities`.
pub enum FetchStep {
    Batch(ActivitySet),
    Fail,
}

fn failure() -> TransportError {
    TransportError::Status {
        status: 500,
        body: "mock failure".to_string(),
    }
}

/// Scripted conversation endpoint.
///
/// Fetches answer from the script and, once it runs dry, with an empty set
/// carrying the requested watermark. Refresh and reconnect always succeed
/// unless their failure flag is set.
pub struct MockApi {
    expires_in: u64,
    refresh_expires_in: u64,
    reconnect_expires_in: Option<u64>,
    stream_url: bool,

    pub fail_create: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub fail_reconnect: AtomicBool,

    fetches: Mutex<VecDeque<FetchStep>>,
    sent: Mutex<Vec<Activity>>,
    fetch_watermarks: Mutex<Vec<Option<Watermark>>>,
    refresh_tokens: Mutex<Vec<String>>,
    reconnect_watermarks: Mutex<Vec<Option<Watermark>>>,
    reconnects: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            expires_in: 1800,
            refresh_expires_in: 1800,
            reconnect_expires_in: None,
            stream_url: true,
            fail_create: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            fail_reconnect: AtomicBool::new(false),
            fetches: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            fetch_watermarks: Mutex::new(Vec::new()),
            refresh_tokens: Mutex::new(Vec::new()),
            reconnect_watermarks: Mutex::new(Vec::new()),
            reconnects: AtomicUsize::new(0),
        }
    }

    pub fn expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }

    pub fn refresh_expires_in(mut self, secs: u64) -> Self {
        self.refresh_expires_in = secs;
        self
    }

    pub fn reconnect_expires_in(mut self, secs: u64) -> Self {
        self.reconnect_expires_in = Some(secs);
        self
    }

    pub fn without_stream_url(mut self) -> Self {
        self.stream_url = false;
        self
    }

    pub fn script(&self, step: FetchStep) {
        self.fetches.lock().unwrap().push_back(step);
    }

    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_watermarks.lock().unwrap().len()
    }

    pub fn fetch_watermarks(&self) -> Vec<Option<Watermark>> {
        self.fetch_watermarks.lock().unwrap().clone()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_tokens.lock().unwrap().len()
    }

    pub fn refresh_tokens(&self) -> Vec<String> {
        self.refresh_tokens.lock().unwrap().clone()
    }

    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn reconnect_watermarks(&self) -> Vec<Option<Watermark>> {
        self.reconnect_watermarks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationApi for MockApi {
    async fn create_conversation(
        &self,
        _secret: &str,
        _endpoint: &str,
    ) -> Result<Conversation, TransportError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(failure());
        }
        Ok(Conversation {
            conversation_id: CONVERSATION.to_string(),
            token: "tok-0".to_string(),
            expires_in: self.expires_in,
            stream_url: self
                .stream_url
                .then(|| "wss://mock.test/stream/0".to_string()),
        })
    }

    async fn refresh_token(
        &self,
        token: &str,
        _endpoint: &str,
    ) -> Result<RefreshedToken, TransportError> {
        let n = {
            let mut tokens = self.refresh_tokens.lock().unwrap();
            tokens.push(token.to_string());
            tokens.len()
        };
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(failure());
        }
        Ok(RefreshedToken {
            conversation_id: CONVERSATION.to_string(),
            token: format!("tok-refresh-{}", n),
            expires_in: self.refresh_expires_in,
        })
    }

    async fn reconnect_conversation(
        &self,
        _conversation_id: &str,
        _token: &str,
        _endpoint: &str,
        watermark: Option<Watermark>,
    ) -> Result<Reconnection, TransportError> {
        self.reconnect_watermarks.lock().unwrap().push(watermark);
        let n = self.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_reconnect.load(Ordering::SeqCst) {
            return Err(failure());
        }
        Ok(Reconnection {
            conversation_id: CONVERSATION.to_string(),
            token: format!("tok-reconnect-{}", n),
            stream_url: format!("wss://mock.test/stream/{}", n),
            expires_in: self.reconnect_expires_in,
        })
    }

    async fn send_activity(
        &self,
        _conversation_id: &str,
        _token: &str,
        _endpoint: &str,
        activity: &Activity,
    ) -> Result<ServerAck, TransportError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(failure());
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(activity.clone());
        Ok(ServerAck {
            id: format!("{}|{:07}", CONVERSATION, sent.len()),
        })
    }

    async fn fetch_activities(
        &self,
        _conversation_id: &str,
        _token: &str,
        _endpoint: &str,
        watermark: Option<Watermark>,
    ) -> Result<ActivitySet, TransportError> {
        self.fetch_watermarks.lock().unwrap().push(watermark);
        let step = self.fetches.lock().unwrap().pop_front();
        match step {
            Some(FetchStep::Batch(set)) => Ok(set),
            Some(FetchStep::Fail) => Err(failure()),
            None => Ok(ActivitySet {
                activities: Vec::new(),
                watermark: watermark.map(|w| w.to_string()),
            }),
        }
    }
}

/// Push transport double. Tests drive each opened stream by index.
#[derive(Default)]
pub struct MockConnector {
    pub fail: AtomicBool,
    streams: Mutex<Vec<(String, mpsc::Sender<StreamEvent>)>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connections(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn url(&self, index: usize) -> Option<String> {
        self.streams
            .lock()
            .unwrap()
            .get(index)
            .map(|(url, _)| url.clone())
    }

    /// Check whether the session still holds stream `index`.
    pub fn is_open(&self, index: usize) -> bool {
        self.streams
            .lock()
            .unwrap()
            .get(index)
            .is_some_and(|(_, tx)| !tx.is_closed())
    }

    /// Raise `event` on stream `index`. Returns `false` if it is closed.
    pub async fn emit(&self, index: usize, event: StreamEvent) -> bool {
        let tx = self
            .streams
            .lock()
            .unwrap()
            .get(index)
            .map(|(_, tx)| tx.clone());
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl StreamConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<StreamEvent>, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Other("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::channel(16);
        self.streams.lock().unwrap().push((url.to_string(), tx));
        Ok(rx)
    }
}

pub fn bot_message(id: &str, text: &str) -> Activity {
    let mut activity = Activity::message(BOT, text);
    activity.id = Some(id.to_string());
    activity
}

pub fn user_message(id: &str, text: &str) -> Activity {
    let mut activity = Activity::message(USER, text);
    activity.id = Some(id.to_string());
    activity
}

/// A batch of bot messages.
pub fn batch(watermark: &str, texts: &[&str]) -> ActivitySet {
    let activities = texts
        .iter()
        .enumerate()
        .map(|(i, text)| bot_message(&format!("{}.{}", watermark, i), text))
        .collect();
    ActivitySet::new(activities, watermark)
}

/// Serialized batch as it arrives over a push channel.
pub fn frame(set: &ActivitySet) -> StreamEvent {
    StreamEvent::Message(serde_json::to_string(set).unwrap())
}

pub fn texts(activities: &[Activity]) -> Vec<String> {
    activities
        .iter()
        .filter_map(|a| a.text.clone())
        .collect()
}

pub async fn start(
    api: &Arc<MockApi>,
    connector: &Arc<MockConnector>,
    options: SessionOptions,
) -> chatlink::Result<(Session, SessionEvents)> {
    Session::start_with(
        api.clone(),
        connector.clone(),
        USER,
        SECRET,
        ENDPOINT,
        options,
    )
    .await
}

pub async fn start_pull(api: &Arc<MockApi>) -> (Session, SessionEvents) {
    start(api, &Arc::new(MockConnector::new()), SessionOptions::pull())
        .await
        .unwrap()
}

pub async fn start_push(
    api: &Arc<MockApi>,
    connector: &Arc<MockConnector>,
) -> (Session, SessionEvents) {
    start(api, connector, SessionOptions::push()).await.unwrap()
}

/// Poll `cond` until it holds, giving background tasks time to run.
pub async fn wait_until<F>(cond: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
