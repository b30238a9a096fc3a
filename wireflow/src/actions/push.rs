//! Event-driven subscribe-and-store execution.

use crate::errors::{FlowError, StageError};
use crate::params::Params;
use crate::stages::{
    MessageCallback, Payload, PushConnector, StageKind, StageSpec, StorageHandle,
};
use crate::status::ExecutionStatus;
use crate::timer::FlowTimer;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// Poll interval of the push loop between inbound-message wakeups.
const PUSH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Action for push-based input pipelines: a push connector feeding a
/// storage stage.
///
/// Inbound messages arrive on the connector's own dispatch context and
/// are appended to a mutex-guarded buffer; the worker drains the buffer
/// into storage once it reaches the flush threshold (default 1, i.e.
/// every message). The buffer is the critical section shared between the
/// dispatch context and the worker loop.
pub struct PushInputAction {
    pipeline_name: String,
    connector: Arc<dyn PushConnector>,
    storage: StorageHandle,
    storage_params: Params,
    flush_threshold: usize,
}

impl PushInputAction {
    /// Builds the action, validating the push stage shape.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnsupportedShape`] unless the chain is
    /// exactly a push connector followed by a storage stage.
    pub fn new(
        pipeline_name: impl Into<String>,
        stages: Vec<StageSpec>,
    ) -> Result<Self, FlowError> {
        let pipeline_name = pipeline_name.into();

        let shape: Vec<StageKind> = stages.iter().map(StageSpec::kind).collect();
        if shape != [StageKind::PushConnector, StageKind::Storage] {
            return Err(FlowError::UnsupportedShape {
                pipeline: pipeline_name,
                reason: "push pipelines must be exactly a push connector followed by a storage"
                    .to_string(),
            });
        }

        let mut stages = stages.into_iter();
        let Some(StageSpec::PushConnector {
            stage: connector,
            flush_threshold,
        }) = stages.next()
        else {
            unreachable!("shape checked above");
        };
        let Some(StageSpec::Storage {
            stage: storage,
            params: storage_params,
        }) = stages.next()
        else {
            unreachable!("shape checked above");
        };

        Ok(Self {
            pipeline_name,
            connector,
            storage,
            storage_params,
            flush_threshold: flush_threshold.max(1),
        })
    }

    /// The name of the owning pipeline.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub(crate) fn storage_handle(&self) -> StorageHandle {
        Arc::clone(&self.storage)
    }

    /// Subscribes and pumps messages into storage until stop is requested.
    ///
    /// Without an execution budget the loop runs until the shared failure
    /// flag flips; with one it exits once the budget is exhausted. The
    /// subscription is closed on every exit path.
    pub async fn execute(&self, timer: FlowTimer, status: &ExecutionStatus) -> Result<(), FlowError> {
        let buffer: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());

        let on_message: MessageCallback = {
            let buffer = Arc::clone(&buffer);
            let notify = Arc::clone(&notify);
            Arc::new(move |raw| {
                buffer.lock().push(raw);
                notify.notify_one();
            })
        };

        let subscription = self.connector.subscribe(on_message).await?;
        let pumped = self.pump(&buffer, &notify, timer, status).await;
        let unsubscribed = subscription.unsubscribe().await;

        pumped?;
        unsubscribed?;
        Ok(())
    }

    async fn pump(
        &self,
        buffer: &Mutex<Vec<Vec<u8>>>,
        notify: &Notify,
        timer: FlowTimer,
        status: &ExecutionStatus,
    ) -> Result<(), StageError> {
        loop {
            if !status.is_ok() {
                info!(
                    pipeline = self.pipeline_name.as_str(),
                    failure = status.failure_message().as_deref().unwrap_or(""),
                    "flow failure observed, stopping pipeline"
                );
                break;
            }
            if timer.limit_reached() || timer.will_exceed(PUSH_POLL_INTERVAL) {
                break;
            }

            tokio::select! {
                () = notify.notified() => {}
                () = tokio::time::sleep(PUSH_POLL_INTERVAL) => {}
            }

            self.flush(buffer).await?;
        }
        Ok(())
    }

    /// Drains the buffer into storage once it reaches the threshold.
    async fn flush(&self, buffer: &Mutex<Vec<Vec<u8>>>) -> Result<(), StageError> {
        let drained: Vec<Vec<u8>> = {
            let mut buf = buffer.lock();
            if buf.len() >= self.flush_threshold {
                std::mem::take(&mut *buf)
            } else {
                Vec::new()
            }
        };

        for raw in drained {
            let payload: Payload = serde_json::from_slice(&raw)?;
            self.storage.save(&payload, &self.storage_params).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PushInputAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushInputAction")
            .field("pipeline_name", &self.pipeline_name)
            .field("flush_threshold", &self.flush_threshold)
            .finish()
    }
}
