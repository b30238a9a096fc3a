//! Sequential stage-chain execution with multi-step fan-out.

use crate::errors::StageError;
use crate::params::Params;
use crate::stages::{Configured, DbConnectors, Payload, StageData, StageSpec};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

/// Output of a multi-step stage: either parameter bags or payloads.
enum FanOut {
    Params(BoxStream<'static, Params>),
    Data(BoxStream<'static, Payload>),
}

/// Runs the full stage chain exactly once, left to right.
///
/// The chain threads a payload slot and a configured-parameters slot
/// between stages. When a multi-step stage is reached, every remaining
/// downstream stage re-runs once per yielded value and the chain ends
/// there; behavior with more than one multi-step stage in a chain is
/// undefined (the tail treats later stages as single-step).
pub(crate) async fn perform_chain(
    pipeline: &str,
    stages: &[StageSpec],
    connectors: &DbConnectors,
) -> Result<(), StageError> {
    let mut data: Option<Payload> = None;
    let mut configured: Option<Params> = None;

    for (idx, stage) in stages.iter().enumerate() {
        if stage.is_multi_step() {
            debug!(pipeline, stage = %stage.kind(), "fan-out over multi-step stage");
            let tail = &stages[idx + 1..];
            match launch_multi(stage, data, configured, connectors).await? {
                FanOut::Params(mut bags) => {
                    while let Some(bag) = bags.next().await {
                        run_tail(pipeline, tail, None, Some(bag), connectors).await?;
                    }
                }
                FanOut::Data(mut payloads) => {
                    while let Some(payload) = payloads.next().await {
                        run_tail(pipeline, tail, Some(payload), None, connectors).await?;
                    }
                }
            }
            return Ok(());
        }

        let (next_data, next_configured) =
            launch_single(pipeline, stage, data, configured, connectors).await?;
        data = next_data;
        configured = next_configured;
    }

    Ok(())
}

/// Runs the stages after a fan-out point once, in single-step mode.
async fn run_tail(
    pipeline: &str,
    stages: &[StageSpec],
    mut data: Option<Payload>,
    mut configured: Option<Params>,
    connectors: &DbConnectors,
) -> Result<(), StageError> {
    for stage in stages {
        let (next_data, next_configured) =
            launch_single(pipeline, stage, data, configured, connectors).await?;
        data = next_data;
        configured = next_configured;
    }
    Ok(())
}

/// Runs one single-step stage and returns the new chain state.
///
/// Parameter threading follows the engine's channel rules: configuration
/// replaces the configured slot and clears data, connectors and core
/// logic replace the data slot and clear configured parameters, storage
/// and send pass both slots through unchanged.
async fn launch_single(
    pipeline: &str,
    stage: &StageSpec,
    data: Option<Payload>,
    configured: Option<Params>,
    connectors: &DbConnectors,
) -> Result<(Option<Payload>, Option<Params>), StageError> {
    debug!(pipeline, stage = %stage.kind(), "launch stage");

    match stage {
        StageSpec::Configuration { stage, params, .. } => {
            match stage.configure(connectors, params).await? {
                Configured::Single(bag) => Ok((None, Some(bag))),
                Configured::Multi(_) => Err(StageError::contract(
                    "configuration stage yielded a lazy sequence but was not attached as multi-step",
                )),
            }
        }
        StageSpec::Connector { stage, params, .. } => {
            let merged = merge(params, configured.as_ref());
            match stage.fetch(&merged).await? {
                StageData::Empty => Ok((None, None)),
                StageData::Single(payload) => Ok((Some(payload), None)),
                StageData::Multi(_) => Err(StageError::contract(
                    "connector yielded a lazy sequence but was not attached as multi-step",
                )),
            }
        }
        StageSpec::Storage { stage, params } => {
            // A missing payload is simply not persisted.
            if let Some(payload) = &data {
                let merged = merge(params, configured.as_ref());
                stage.save(payload, &merged).await?;
            }
            Ok((data, configured))
        }
        StageSpec::CoreLogic { stage, params, .. } | StageSpec::Custom { stage, params, .. } => {
            let merged = merge(params, configured.as_ref());
            match stage.launch(data, connectors, &merged).await? {
                StageData::Empty => Ok((None, None)),
                StageData::Single(payload) => Ok((Some(payload), None)),
                StageData::Multi(_) => Err(StageError::contract(
                    "core logic yielded a lazy sequence but was not attached as multi-step",
                )),
            }
        }
        StageSpec::Send { stage, params } => {
            let merged = merge(params, configured.as_ref());
            stage.send(data.as_ref(), &merged).await?;
            Ok((data, configured))
        }
        StageSpec::PushConnector { .. } => Err(StageError::contract(
            "push connectors cannot run inside a scheduled stage chain",
        )),
    }
}

/// Runs one multi-step stage, returning its lazy output sequence.
async fn launch_multi(
    stage: &StageSpec,
    data: Option<Payload>,
    configured: Option<Params>,
    connectors: &DbConnectors,
) -> Result<FanOut, StageError> {
    match stage {
        StageSpec::Configuration { stage, params, .. } => {
            match stage.configure(connectors, params).await? {
                Configured::Multi(bags) => Ok(FanOut::Params(bags)),
                Configured::Single(bag) => {
                    Ok(FanOut::Params(Box::pin(futures::stream::iter(vec![bag]))))
                }
            }
        }
        StageSpec::Connector { stage, params, .. } => {
            let merged = merge(params, configured.as_ref());
            Ok(FanOut::Data(into_stream(stage.fetch(&merged).await?)))
        }
        StageSpec::CoreLogic { stage, params, .. } | StageSpec::Custom { stage, params, .. } => {
            let merged = merge(params, configured.as_ref());
            Ok(FanOut::Data(into_stream(
                stage.launch(data, connectors, &merged).await?,
            )))
        }
        StageSpec::PushConnector { .. } | StageSpec::Storage { .. } | StageSpec::Send { .. } => {
            Err(StageError::contract(
                "storage, send and push stages cannot be multi-step",
            ))
        }
    }
}

fn into_stream(data: StageData) -> BoxStream<'static, Payload> {
    match data {
        StageData::Empty => Box::pin(futures::stream::empty()),
        StageData::Single(payload) => Box::pin(futures::stream::iter(vec![payload])),
        StageData::Multi(stream) => stream,
    }
}

fn merge(bound: &Params, configured: Option<&Params>) -> Params {
    match configured {
        Some(overrides) => bound.merged(overrides),
        None => bound.clone(),
    }
}
