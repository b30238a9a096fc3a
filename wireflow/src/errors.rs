//! Error types for the wireflow engine.
//!
//! Two layers are distinguished: [`StageError`] covers runtime failures
//! raised by stage implementations (connectors, storages, senders, user
//! logic), while [`FlowError`] covers configuration-time problems and the
//! aggregate failure surfaced by a finished flow.

use thiserror::Error;

/// A runtime failure raised by a stage implementation.
#[derive(Debug, Error)]
pub enum StageError {
    /// A payload could not be decoded as JSON.
    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A connector failed while fetching or subscribing.
    #[error("connector error: {0}")]
    Connector(String),

    /// A storage handle failed while saving or loading.
    #[error("storage error: {0}")]
    Storage(String),

    /// A sender failed while delivering data.
    #[error("send error: {0}")]
    Send(String),

    /// A stage produced output incompatible with its declared shape.
    #[error("stage contract violation: {0}")]
    Contract(String),

    /// Escape hatch for user-defined stage logic.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Creates a connector error.
    #[must_use]
    pub fn connector(message: impl Into<String>) -> Self {
        Self::Connector(message.into())
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a send error.
    #[must_use]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }

    /// Creates a contract violation error.
    #[must_use]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }
}

/// The main error type for flow configuration and execution.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Two pipelines with the same name were added to one processor.
    #[error("pipeline names in a flow must be unique, duplicate: '{name}'")]
    DuplicatePipeline {
        /// The duplicated pipeline name.
        name: String,
    },

    /// A pipeline's stage list does not match any supported action shape.
    #[error("pipeline '{pipeline}' has an unsupported stage shape: {reason}")]
    UnsupportedShape {
        /// The offending pipeline.
        pipeline: String,
        /// Why the shape was rejected.
        reason: String,
    },

    /// A pipeline was run before its action was compiled.
    #[error("pipeline '{pipeline}' was not compiled before run")]
    NotCompiled {
        /// The offending pipeline.
        pipeline: String,
    },

    /// Fixed wall-clock launch times are a declared extension point only.
    #[error("fixed launch time is not supported yet")]
    LaunchTimeNotSupported,

    /// A stage failed at runtime.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn pipeline worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The aggregate failure raised by `launch_flow` when any worker
    /// recorded an unrecoverable error.
    #[error("flow failed, please reconfigure it: {message}")]
    FlowFailed {
        /// The first recorded failure message.
        message: String,
    },
}
