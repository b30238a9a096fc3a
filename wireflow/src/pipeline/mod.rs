//! Pipelines: named, independently scheduled stage chains.

mod template;

use crate::actions::Action;
use crate::errors::FlowError;
use crate::params::{Params, PipelineParams};
use crate::stages::{
    Configuration, CoreLogic, DbConnectors, PullConnector, PushConnector, Sender, StageKind,
    StageSpec, StorageHandle,
};
use crate::status::ExecutionStatus;
use crate::timer::FlowTimer;
use std::sync::Arc;
use tracing::{debug, info};

/// A named container binding an ordered stage list to execution settings.
///
/// Stages are attached through the fluent `with_*` methods and compiled
/// into an [`Action`] by [`Pipeline::create_action`]; the action variant
/// is selected from the stage shape. The `db_connectors` map giving read
/// access to other pipelines' storages is injected by the flow processor
/// after compilation, before any pipeline starts running.
pub struct Pipeline {
    name: String,
    params: PipelineParams,
    stages: Vec<StageSpec>,
    action: Option<Action>,
    db_connectors: DbConnectors,
}

impl Pipeline {
    /// Creates an empty pipeline with the given name and settings.
    #[must_use]
    pub fn new(name: impl Into<String>, params: PipelineParams) -> Self {
        Self {
            name: name.into(),
            params,
            stages: Vec::new(),
            action: None,
            db_connectors: DbConnectors::new(),
        }
    }

    /// Creates a pipeline with a generated unique name.
    #[must_use]
    pub fn unnamed(params: PipelineParams) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), params)
    }

    /// The pipeline name, unique within a flow.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attached stages, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// The cross-pipeline storage handles injected by the flow processor.
    #[must_use]
    pub fn db_connectors(&self) -> &DbConnectors {
        &self.db_connectors
    }

    /// Attaches a configuration stage.
    #[must_use]
    pub fn with_configuration(self, stage: Arc<dyn Configuration>) -> Self {
        self.push_stage(StageSpec::Configuration {
            stage,
            params: Params::new(),
            multi_step: false,
        })
    }

    /// Attaches a configuration stage yielding a lazy sequence of
    /// parameter bags, fanning downstream stages out once per bag.
    #[must_use]
    pub fn with_multi_step_configuration(self, stage: Arc<dyn Configuration>) -> Self {
        self.push_stage(StageSpec::Configuration {
            stage,
            params: Params::new(),
            multi_step: true,
        })
    }

    /// Attaches a pull connector stage.
    #[must_use]
    pub fn with_connector(self, stage: Arc<dyn PullConnector>) -> Self {
        self.push_stage(StageSpec::Connector {
            stage,
            params: Params::new(),
            multi_step: false,
        })
    }

    /// Attaches a pull connector yielding a lazy sequence of payloads.
    #[must_use]
    pub fn with_multi_step_connector(self, stage: Arc<dyn PullConnector>) -> Self {
        self.push_stage(StageSpec::Connector {
            stage,
            params: Params::new(),
            multi_step: true,
        })
    }

    /// Attaches a push connector flushing every inbound message.
    #[must_use]
    pub fn with_push_connector(self, stage: Arc<dyn PushConnector>) -> Self {
        self.with_buffered_push_connector(stage, 1)
    }

    /// Attaches a push connector that buffers inbound messages and
    /// flushes them to storage once `flush_threshold` are queued.
    #[must_use]
    pub fn with_buffered_push_connector(
        self,
        stage: Arc<dyn PushConnector>,
        flush_threshold: usize,
    ) -> Self {
        self.push_stage(StageSpec::PushConnector {
            stage,
            flush_threshold,
        })
    }

    /// Attaches a storage stage.
    #[must_use]
    pub fn with_storage(self, stage: StorageHandle) -> Self {
        self.with_storage_params(stage, Params::new())
    }

    /// Attaches a storage stage with bound save parameters.
    #[must_use]
    pub fn with_storage_params(self, stage: StorageHandle, params: Params) -> Self {
        self.push_stage(StageSpec::Storage { stage, params })
    }

    /// Attaches a core-logic stage.
    #[must_use]
    pub fn with_core_logic(self, stage: Arc<dyn CoreLogic>) -> Self {
        self.push_stage(StageSpec::CoreLogic {
            stage,
            params: Params::new(),
            multi_step: false,
        })
    }

    /// Attaches a core-logic stage yielding a lazy sequence of payloads.
    #[must_use]
    pub fn with_multi_step_core_logic(self, stage: Arc<dyn CoreLogic>) -> Self {
        self.push_stage(StageSpec::CoreLogic {
            stage,
            params: Params::new(),
            multi_step: true,
        })
    }

    /// Attaches a send stage.
    #[must_use]
    pub fn with_sender(self, stage: Arc<dyn Sender>) -> Self {
        self.push_stage(StageSpec::Send {
            stage,
            params: Params::new(),
        })
    }

    /// Attaches a free-form custom function with an open parameter bag.
    #[must_use]
    pub fn with_custom_function(self, stage: Arc<dyn CoreLogic>, params: Params) -> Self {
        self.push_stage(StageSpec::Custom {
            stage,
            params,
            multi_step: false,
        })
    }

    /// Attaches a custom function yielding a lazy sequence of payloads.
    #[must_use]
    pub fn with_multi_step_custom_function(
        self,
        stage: Arc<dyn CoreLogic>,
        params: Params,
    ) -> Self {
        self.push_stage(StageSpec::Custom {
            stage,
            params,
            multi_step: true,
        })
    }

    fn push_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Whether the pipeline carries core logic (including custom stages).
    #[must_use]
    pub fn has_core_logic(&self) -> bool {
        self.has_kind(StageKind::CoreLogic) || self.has_kind(StageKind::Custom)
    }

    /// Whether the pipeline carries a configuration stage.
    #[must_use]
    pub fn has_configuration(&self) -> bool {
        self.has_kind(StageKind::Configuration)
    }

    /// Whether the pipeline carries a storage stage.
    #[must_use]
    pub fn has_storage(&self) -> bool {
        self.has_kind(StageKind::Storage)
    }

    pub(crate) fn has_kind(&self, kind: StageKind) -> bool {
        self.stages.iter().any(|stage| stage.kind() == kind)
    }

    /// Compiles the stage list into the matching action variant.
    ///
    /// Idempotent: once the action exists, repeated calls are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnsupportedShape`] when the stage list does
    /// not match any supported action shape.
    pub fn create_action(&mut self) -> Result<(), FlowError> {
        if self.action.is_some() {
            debug!(pipeline = self.name.as_str(), "action already compiled, skipping");
            return Ok(());
        }
        self.action = Some(template::compile_action(self)?);
        Ok(())
    }

    pub(crate) fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub(crate) fn pipeline_params(&self) -> &PipelineParams {
        &self.params
    }

    pub(crate) fn set_db_connectors(&mut self, connectors: DbConnectors) {
        self.db_connectors = connectors;
    }

    /// Runs the compiled action until its budget is exhausted or the
    /// flow fails.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotCompiled`] when called before
    /// [`Pipeline::create_action`], or the first stage failure.
    pub async fn run(&self, timer: FlowTimer, status: &ExecutionStatus) -> Result<(), FlowError> {
        info!(pipeline = self.name.as_str(), "launch pipeline");
        let action = self.action.as_ref().ok_or_else(|| FlowError::NotCompiled {
            pipeline: self.name.clone(),
        })?;
        action.execute(&self.db_connectors, timer, status).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("stages", &self.stages)
            .field("compiled", &self.action.is_some())
            .field(
                "db_connectors",
                &self.db_connectors.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingConnector, InMemoryStorage, ScriptedPushConnector};
    use std::time::Duration;

    #[test]
    fn compiles_input_only_shape_to_pull_action() {
        let mut pipeline = Pipeline::new("ints", PipelineParams::new())
            .with_connector(Arc::new(CountingConnector::new()))
            .with_storage(Arc::new(InMemoryStorage::new()));

        pipeline.create_action().unwrap();
        assert!(matches!(pipeline.action(), Some(Action::Pull(_))));
    }

    #[test]
    fn compiles_push_shape_to_push_action() {
        let mut pipeline = Pipeline::new("events", PipelineParams::new())
            .with_push_connector(Arc::new(ScriptedPushConnector::new()))
            .with_storage(Arc::new(InMemoryStorage::new()));

        pipeline.create_action().unwrap();
        assert!(matches!(pipeline.action(), Some(Action::Push(_))));
    }

    #[test]
    fn compiles_core_logic_shape_to_full_action() {
        let mut pipeline = Pipeline::new("core", PipelineParams::new())
            .with_connector(Arc::new(CountingConnector::new()))
            .with_core_logic(Arc::new(crate::testing::FailOnNthCall::new(99, "never")));

        pipeline.create_action().unwrap();
        assert!(matches!(pipeline.action(), Some(Action::Full(_))));
    }

    #[test]
    fn empty_pipeline_fails_to_compile() {
        let mut pipeline = Pipeline::new("empty", PipelineParams::new());
        let err = pipeline.create_action().unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedShape { .. }));
    }

    #[test]
    fn push_connector_with_trailing_sender_fails_to_compile() {
        let mut pipeline = Pipeline::new("bad", PipelineParams::new())
            .with_push_connector(Arc::new(ScriptedPushConnector::new()))
            .with_storage(Arc::new(InMemoryStorage::new()))
            .with_sender(Arc::new(crate::testing::RecordingSender::new()));

        let err = pipeline.create_action().unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedShape { .. }));
    }

    #[test]
    fn create_action_is_idempotent() {
        let mut pipeline = Pipeline::new("ints", PipelineParams::new().period(Duration::from_secs(1)))
            .with_connector(Arc::new(CountingConnector::new()))
            .with_storage(Arc::new(InMemoryStorage::new()));

        pipeline.create_action().unwrap();
        pipeline.create_action().unwrap();
        assert!(pipeline.action().is_some());
    }

    #[tokio::test]
    async fn running_uncompiled_pipeline_fails() {
        let pipeline = Pipeline::new("raw", PipelineParams::new())
            .with_connector(Arc::new(CountingConnector::new()))
            .with_storage(Arc::new(InMemoryStorage::new()));

        let status = ExecutionStatus::new();
        let err = pipeline
            .run(FlowTimer::new(Some(Duration::from_millis(10))), &status)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NotCompiled { .. }));
    }
}
