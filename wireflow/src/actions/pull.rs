//! Periodic pull-and-store execution for input-only pipelines.

use super::scheduled_execution;
use crate::errors::FlowError;
use crate::params::PipelineParams;
use crate::stages::{DbConnectors, StageKind, StageSpec, StorageHandle};
use crate::status::ExecutionStatus;
use crate::timer::FlowTimer;

/// Action for input-only pipelines: a pull connector feeding a storage,
/// optionally preceded by a configuration stage, with no core logic.
#[derive(Debug)]
pub struct PullInputAction {
    pipeline_name: String,
    stages: Vec<StageSpec>,
    params: PipelineParams,
}

impl PullInputAction {
    /// Builds the action, validating the input-only stage shape.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnsupportedShape`] unless the chain consists
    /// of configuration, connector and storage stages only, with at least
    /// one connector and one storage.
    pub fn new(
        pipeline_name: impl Into<String>,
        stages: Vec<StageSpec>,
        params: PipelineParams,
    ) -> Result<Self, FlowError> {
        let pipeline_name = pipeline_name.into();

        let supported = [StageKind::Configuration, StageKind::Connector, StageKind::Storage];
        if let Some(stage) = stages.iter().find(|s| !supported.contains(&s.kind())) {
            return Err(FlowError::UnsupportedShape {
                pipeline: pipeline_name,
                reason: format!("{} stages are not supported in input-only pipelines", stage.kind()),
            });
        }
        let has_connector = stages.iter().any(|s| s.kind() == StageKind::Connector);
        let has_storage = stages.iter().any(|s| s.kind() == StageKind::Storage);
        if !has_connector || !has_storage {
            return Err(FlowError::UnsupportedShape {
                pipeline: pipeline_name,
                reason: "input-only pipelines need a connector and a storage stage".to_string(),
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

    /// Runs the pull-and-store chain on its schedule.
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
