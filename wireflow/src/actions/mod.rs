//! Actions: the runtime strategies that execute a pipeline's stage list.
//!
//! An action owns the ordered stages of one pipeline and knows how to run
//! them once and repeatedly on a schedule. Three variants exist, chosen at
//! compile time from the pipeline's stage shape: full processing, pull
//! input and push input.

mod chain;
mod full;
mod pull;
mod push;

pub use full::FullProcessingAction;
pub use pull::PullInputAction;
pub use push::PushInputAction;

pub(crate) use chain::perform_chain;

use crate::errors::FlowError;
use crate::params::PipelineParams;
use crate::schedule::Scheduler;
use crate::stages::{DbConnectors, StageSpec, StorageHandle};
use crate::status::ExecutionStatus;
use crate::timer::FlowTimer;
use std::time::Duration;
use tracing::info;

/// Sleep granularity of a scheduling loop: half the period, clamped to
/// the half-second to ten-second range. Bounds the worst-case latency
/// between "stop requested" and "worker actually stops".
#[must_use]
pub fn break_interval(period: Duration) -> Duration {
    (period / 2).clamp(Duration::from_millis(500), Duration::from_secs(10))
}

/// The compiled runtime strategy of one pipeline.
#[derive(Debug)]
pub enum Action {
    /// Generic scheduled chain execution.
    Full(FullProcessingAction),
    /// Periodic pull-and-store without core logic.
    Pull(PullInputAction),
    /// Event-driven subscribe-and-store.
    Push(PushInputAction),
}

impl Action {
    /// The name of the owning pipeline.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        match self {
            Self::Full(action) => action.pipeline_name(),
            Self::Pull(action) => action.pipeline_name(),
            Self::Push(action) => action.pipeline_name(),
        }
    }

    /// The storage handle this action exposes to other pipelines, if any.
    #[must_use]
    pub(crate) fn storage_handle(&self) -> Option<StorageHandle> {
        match self {
            Self::Full(action) => action.storage_handle(),
            Self::Pull(action) => action.storage_handle(),
            Self::Push(action) => Some(action.storage_handle()),
        }
    }

    /// Runs the action until its budget is exhausted or the flow fails.
    pub async fn execute(
        &self,
        connectors: &DbConnectors,
        timer: FlowTimer,
        status: &ExecutionStatus,
    ) -> Result<(), FlowError> {
        match self {
            Self::Full(action) => action.execute(connectors, timer, status).await,
            Self::Pull(action) => action.execute(connectors, timer, status).await,
            Self::Push(action) => action.execute(timer, status).await,
        }
    }
}

/// The shared scheduling loop of the pull-based action variants.
///
/// Performs the chain once up front (after the optional start delay),
/// then re-checks the shared failure flag and the execution budget on
/// every tick. Stop is cooperative: it is only noticed between ticks,
/// never mid-stage.
pub(crate) async fn scheduled_execution(
    pipeline: &str,
    stages: &[StageSpec],
    connectors: &DbConnectors,
    params: &PipelineParams,
    timer: FlowTimer,
    status: &ExecutionStatus,
) -> Result<(), FlowError> {
    let tick = break_interval(params.period);

    if let Some(delay) = params.delay {
        tokio::time::sleep(delay).await;
    }

    perform_chain(pipeline, stages, connectors).await?;
    if timer.limit_reached() || timer.will_exceed(tick) {
        return Ok(());
    }

    let mut scheduler = Scheduler::new(params.period, params.launch_time.clone());
    loop {
        if !status.is_ok() {
            info!(
                pipeline,
                failure = status.failure_message().as_deref().unwrap_or(""),
                "flow failure observed, stopping pipeline"
            );
            break;
        }

        if let Some(result) = scheduler
            .tick(|| perform_chain(pipeline, stages, connectors))
            .await?
        {
            result?;
        }

        if timer.limit_reached() || timer.will_exceed(tick) {
            break;
        }
        tokio::time::sleep(tick).await;
    }

    Ok(())
}

#[cfg(test)]
mod action_tests;
