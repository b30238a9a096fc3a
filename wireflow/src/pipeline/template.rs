//! Action selection: maps a pipeline's stage shape to an action variant.

use super::Pipeline;
use crate::actions::{Action, FullProcessingAction, PullInputAction, PushInputAction};
use crate::errors::FlowError;
use crate::stages::StageKind;

/// Compiles the action matching the pipeline's stage shape.
///
/// Selection rule: a push connector selects the event-driven push
/// variant; a pull connector without core logic (and nothing beyond
/// configuration, connector and storage stages) selects the input-only
/// pull variant; everything else runs as a full processing chain. Each
/// variant validates its own shape and rejects unsupported combinations.
pub(crate) fn compile_action(pipeline: &Pipeline) -> Result<Action, FlowError> {
    let stages = pipeline.stages().to_vec();
    let name = pipeline.name();

    if pipeline.has_kind(StageKind::PushConnector) {
        return PushInputAction::new(name, stages).map(Action::Push);
    }

    let input_only = pipeline.stages().iter().all(|stage| {
        matches!(
            stage.kind(),
            StageKind::Configuration | StageKind::Connector | StageKind::Storage
        )
    });
    if pipeline.has_kind(StageKind::Connector) && !pipeline.has_core_logic() && input_only {
        return PullInputAction::new(name, stages, pipeline.pipeline_params().clone())
            .map(Action::Pull);
    }

    FullProcessingAction::new(name, stages, pipeline.pipeline_params().clone()).map(Action::Full)
}
