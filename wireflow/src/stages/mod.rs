//! Stage contracts and the closed set of stage kinds.
//!
//! Stages are the units of work a pipeline is composed of: configure,
//! fetch, store, transform, send. The engine consumes them through the
//! traits in this module; concrete connector and storage engines live
//! outside the core.

mod spec;

pub use spec::{StageKind, StageSpec};

use crate::errors::StageError;
use crate::params::Params;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The data unit threaded between stages.
pub type Payload = Value;

/// A shared handle to a pipeline's storage engine.
///
/// Handles may be called concurrently by several pipelines reading the
/// same storage; synchronization is the engine's own responsibility.
pub type StorageHandle = Arc<dyn Storage>;

/// Storage handles of other pipelines, keyed by pipeline name.
pub type DbConnectors = HashMap<String, StorageHandle>;

/// Callback invoked by a push connector for every inbound raw message.
pub type MessageCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Data produced by a connector, core-logic or custom stage.
///
/// `Empty` is the non-fatal "no data available" sentinel; it causes the
/// remaining data-carrying stages of the current tick to be skipped or to
/// receive `None` explicitly, depending on their kind. `Multi` is a lazy,
/// finite, non-restartable sequence used by multi-step stages to fan out
/// downstream execution.
pub enum StageData {
    /// No data available; not an error.
    Empty,
    /// A single payload.
    Single(Payload),
    /// A lazy sequence of payloads for multi-step fan-out.
    Multi(BoxStream<'static, Payload>),
}

impl StageData {
    /// Wraps an iterator of payloads into the multi-step shape.
    pub fn from_iter<I>(payloads: I) -> Self
    where
        I: IntoIterator<Item = Payload>,
        I::IntoIter: Send + 'static,
    {
        Self::Multi(Box::pin(futures::stream::iter(payloads)))
    }
}

impl From<Option<Payload>> for StageData {
    fn from(payload: Option<Payload>) -> Self {
        payload.map_or(Self::Empty, Self::Single)
    }
}

impl From<Payload> for StageData {
    fn from(payload: Payload) -> Self {
        Self::Single(payload)
    }
}

impl fmt::Debug for StageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "StageData::Empty"),
            Self::Single(value) => f.debug_tuple("StageData::Single").field(value).finish(),
            Self::Multi(_) => write!(f, "StageData::Multi(..)"),
        }
    }
}

/// Parameters produced by a configuration stage.
pub enum Configured {
    /// One parameter bag for the downstream stages.
    Single(Params),
    /// A lazy sequence of parameter bags for multi-step fan-out.
    Multi(BoxStream<'static, Params>),
}

impl Configured {
    /// Wraps an iterator of parameter bags into the multi-step shape.
    pub fn from_iter<I>(bags: I) -> Self
    where
        I: IntoIterator<Item = Params>,
        I::IntoIter: Send + 'static,
    {
        Self::Multi(Box::pin(futures::stream::iter(bags)))
    }
}

impl From<Params> for Configured {
    fn from(params: Params) -> Self {
        Self::Single(params)
    }
}

impl fmt::Debug for Configured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(params) => f.debug_tuple("Configured::Single").field(params).finish(),
            Self::Multi(_) => write!(f, "Configured::Multi(..)"),
        }
    }
}

/// Produces run-time parameters for the downstream stages of a tick.
///
/// Configuration stages see the cross-pipeline storage handles, so they
/// can derive request parameters from already-persisted data.
#[async_trait]
pub trait Configuration: Send + Sync {
    /// Builds the parameter bag for the current tick.
    async fn configure(
        &self,
        connectors: &DbConnectors,
        params: &Params,
    ) -> Result<Configured, StageError>;
}

/// A pull-based input connector (HTTP-shaped).
///
/// Must not fail just because no data is available: that case is
/// signalled with [`StageData::Empty`] and skips the rest of the tick.
#[async_trait]
pub trait PullConnector: Send + Sync {
    /// Fetches the next batch of data.
    async fn fetch(&self, params: &Params) -> Result<StageData, StageError>;
}

/// A push-based input connector (MQTT-shaped).
///
/// `subscribe` registers a callback that the connector invokes from its
/// own dispatch context for every inbound raw message; the returned
/// subscription is kept alive until the owning worker stops.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Subscribes to the source, delivering raw messages to `on_message`.
    async fn subscribe(
        &self,
        on_message: MessageCallback,
    ) -> Result<Box<dyn Subscription>, StageError>;
}

/// A live push subscription, closed when the worker exits.
#[async_trait]
pub trait Subscription: Send {
    /// Unsubscribes from the source.
    async fn unsubscribe(self: Box<Self>) -> Result<(), StageError>;
}

/// A storage engine consumed through save/load.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists one payload.
    async fn save(&self, payload: &Payload, params: &Params) -> Result<(), StageError>;

    /// Loads the stored data, or `None` when nothing was persisted yet.
    async fn load(&self, params: &Params) -> Result<Option<Payload>, StageError>;
}

/// User-defined processing logic.
///
/// Receives the upstream payload explicitly (including `None`) together
/// with read access to every other pipeline's storage handle.
#[async_trait]
pub trait CoreLogic: Send + Sync {
    /// Runs the logic for one tick.
    async fn launch(
        &self,
        payload: Option<Payload>,
        connectors: &DbConnectors,
        params: &Params,
    ) -> Result<StageData, StageError>;
}

/// Delivers processed data to an external destination.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Sends one payload; must tolerate `None` by doing nothing.
    async fn send(&self, payload: Option<&Payload>, params: &Params) -> Result<(), StageError>;
}

/// A closure-backed configuration stage.
pub struct FnConfiguration<F>(F)
where
    F: Fn(&DbConnectors, &Params) -> Result<Configured, StageError> + Send + Sync;

impl<F> FnConfiguration<F>
where
    F: Fn(&DbConnectors, &Params) -> Result<Configured, StageError> + Send + Sync,
{
    /// Wraps a closure as a configuration stage.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Configuration for FnConfiguration<F>
where
    F: Fn(&DbConnectors, &Params) -> Result<Configured, StageError> + Send + Sync,
{
    async fn configure(
        &self,
        connectors: &DbConnectors,
        params: &Params,
    ) -> Result<Configured, StageError> {
        (self.0)(connectors, params)
    }
}

/// A closure-backed pull connector.
pub struct FnConnector<F>(F)
where
    F: Fn(&Params) -> Result<StageData, StageError> + Send + Sync;

impl<F> FnConnector<F>
where
    F: Fn(&Params) -> Result<StageData, StageError> + Send + Sync,
{
    /// Wraps a closure as a pull connector.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> PullConnector for FnConnector<F>
where
    F: Fn(&Params) -> Result<StageData, StageError> + Send + Sync,
{
    async fn fetch(&self, params: &Params) -> Result<StageData, StageError> {
        (self.0)(params)
    }
}

/// A closure-backed core-logic stage.
pub struct FnCoreLogic<F>(F)
where
    F: Fn(Option<Payload>, &DbConnectors, &Params) -> Result<StageData, StageError> + Send + Sync;

impl<F> FnCoreLogic<F>
where
    F: Fn(Option<Payload>, &DbConnectors, &Params) -> Result<StageData, StageError> + Send + Sync,
{
    /// Wraps a closure as a core-logic stage.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> CoreLogic for FnCoreLogic<F>
where
    F: Fn(Option<Payload>, &DbConnectors, &Params) -> Result<StageData, StageError> + Send + Sync,
{
    async fn launch(
        &self,
        payload: Option<Payload>,
        connectors: &DbConnectors,
        params: &Params,
    ) -> Result<StageData, StageError> {
        (self.0)(payload, connectors, params)
    }
}

/// A closure-backed sender.
pub struct FnSender<F>(F)
where
    F: Fn(Option<&Payload>, &Params) -> Result<(), StageError> + Send + Sync;

impl<F> FnSender<F>
where
    F: Fn(Option<&Payload>, &Params) -> Result<(), StageError> + Send + Sync,
{
    /// Wraps a closure as a sender.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Sender for FnSender<F>
where
    F: Fn(Option<&Payload>, &Params) -> Result<(), StageError> + Send + Sync,
{
    async fn send(&self, payload: Option<&Payload>, params: &Params) -> Result<(), StageError> {
        (self.0)(payload, params)
    }
}
