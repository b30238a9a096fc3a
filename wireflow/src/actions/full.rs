//! Generic scheduled execution of a heterogeneous stage chain.

use super::scheduled_execution;
use crate::errors::FlowError;
use crate::params::PipelineParams;
use crate::stages::{DbConnectors, StageKind, StageSpec, StorageHandle};
use crate::status::ExecutionStatus;
use crate::timer::FlowTimer;

/// Action for pipelines carrying core logic or any mixed stage chain
/// (connector, storage, core logic, send in any combination).
#[derive(Debug)]
pub struct FullProcessingAction {
    pipeline_name: String,
    stages: Vec<StageSpec>,
    params: PipelineParams,
}

impl FullProcessingAction {
    /// Builds the action, validating the stage shape.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnsupportedShape`] for an empty stage list or
    /// a chain containing a push connector.
    pub fn new(
        pipeline_name: impl Into<String>,
        stages: Vec<StageSpec>,
        params: PipelineParams,
    ) -> Result<Self, FlowError> {
        let pipeline_name = pipeline_name.into();
        if stages.is_empty() {
            return Err(FlowError::UnsupportedShape {
                pipeline: pipeline_name,
                reason: "pipeline has no stages".to_string(),
            });
        }
        if stages.iter().any(|s| s.kind() == StageKind::PushConnector) {
            return Err(FlowError::UnsupportedShape {
                pipeline: pipeline_name,
                reason: "push connectors are only supported in push input pipelines".to_string(),
            });
        }
        Ok(Self {
            pipeline_name,
            stages,
            params,
        })
    }

    /// The name of the owning pipeline.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub(crate) fn storage_handle(&self) -> Option<StorageHandle> {
        self.stages.iter().find_map(StageSpec::storage_handle)
    }

    /// Runs the chain on its schedule until stop is requested.
    pub async fn execute(
        &self,
        connectors: &DbConnectors,
        timer: FlowTimer,
        status: &ExecutionStatus,
    ) -> Result<(), FlowError> {
        scheduled_execution(
            &self.pipeline_name,
            &self.stages,
            connectors,
            &self.params,
            timer,
            status,
        )
        .await
    }
}
