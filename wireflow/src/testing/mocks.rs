//! Fake connectors, storages and senders.

use crate::errors::StageError;
use crate::params::Params;
use crate::stages::{
    CoreLogic, DbConnectors, MessageCallback, Payload, PullConnector, PushConnector, StageData,
    Storage, Subscription,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A pull connector returning `{"n": k}` with `k` incrementing per fetch.
#[derive(Debug, Default)]
pub struct CountingConnector {
    counter: AtomicUsize,
}

impl CountingConnector {
    /// Creates a connector counting from zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fetches performed so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullConnector for CountingConnector {
    async fn fetch(&self, _params: &Params) -> Result<StageData, StageError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(StageData::Single(json!({ "n": n })))
    }
}

/// A pull connector returning a fixed payload, or nothing at all.
#[derive(Debug)]
pub struct StaticConnector {
    payload: Option<Payload>,
}

impl StaticConnector {
    /// Always returns the given payload.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// Always reports "no data available".
    #[must_use]
    pub fn empty() -> Self {
        Self { payload: None }
    }
}

#[async_trait]
impl PullConnector for StaticConnector {
    async fn fetch(&self, _params: &Params) -> Result<StageData, StageError> {
        Ok(StageData::from(self.payload.clone()))
    }
}

/// An in-memory storage engine guarding its records with a mutex.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: Mutex<Vec<Payload>>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything persisted so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Payload> {
        self.records.lock().clone()
    }

    /// Number of persisted records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was persisted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save(&self, payload: &Payload, _params: &Params) -> Result<(), StageError> {
        self.records.lock().push(payload.clone());
        Ok(())
    }

    async fn load(&self, _params: &Params) -> Result<Option<Payload>, StageError> {
        let records = self.records.lock();
        if records.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Array(records.clone())))
        }
    }
}

/// A sender recording every delivered payload.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Payload>>,
    calls: AtomicUsize,
}

impl RecordingSender {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads delivered so far, in order. `None` payloads are not
    /// recorded since senders no-op on them.
    #[must_use]
    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().clone()
    }

    /// Total invocations, including `None` payloads.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::stages::Sender for RecordingSender {
    async fn send(&self, payload: Option<&Payload>, _params: &Params) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(payload) = payload {
            self.sent.lock().push(payload.clone());
        }
        Ok(())
    }
}

/// A push connector driven by the test: messages are emitted manually.
#[derive(Default)]
pub struct ScriptedPushConnector {
    callback: Mutex<Option<MessageCallback>>,
    unsubscribed: Arc<AtomicBool>,
}

impl ScriptedPushConnector {
    /// Creates a connector with no subscriber yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a JSON payload to the subscriber, if any.
    ///
    /// # Panics
    ///
    /// Panics when the payload cannot be serialized.
    pub fn emit(&self, payload: &Payload) {
        let raw = serde_json::to_vec(payload).expect("payload serializes");
        self.emit_raw(raw);
    }

    /// Delivers raw bytes to the subscriber, if any.
    pub fn emit_raw(&self, raw: Vec<u8>) {
        if let Some(callback) = self.callback.lock().clone() {
            callback(raw);
        }
    }

    /// Whether the subscription was closed.
    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushConnector for ScriptedPushConnector {
    async fn subscribe(
        &self,
        on_message: MessageCallback,
    ) -> Result<Box<dyn Subscription>, StageError> {
        *self.callback.lock() = Some(on_message);
        Ok(Box::new(ScriptedSubscription {
            unsubscribed: Arc::clone(&self.unsubscribed),
        }))
    }
}

struct ScriptedSubscription {
    unsubscribed: Arc<AtomicBool>,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn unsubscribe(self: Box<Self>) -> Result<(), StageError> {
        self.unsubscribed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Core logic that passes data through until the n-th call, then fails.
#[derive(Debug)]
pub struct FailOnNthCall {
    n: usize,
    calls: AtomicUsize,
    message: String,
}

impl FailOnNthCall {
    /// Fails on the `n`-th invocation (1-based) with the given message.
    #[must_use]
    pub fn new(n: usize, message: impl Into<String>) -> Self {
        Self {
            n,
            calls: AtomicUsize::new(0),
            message: message.into(),
        }
    }

    /// Invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoreLogic for FailOnNthCall {
    async fn launch(
        &self,
        payload: Option<Payload>,
        _connectors: &DbConnectors,
        _params: &Params,
    ) -> Result<StageData, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.n {
            return Err(StageError::Other(anyhow::anyhow!("{}", self.message)));
        }
        Ok(StageData::from(payload))
    }
}
