//! Behavioral tests for chain execution and the action variants.

use super::*;
use crate::errors::StageError;
use crate::params::Params;
use crate::stages::{
    Configured, FnConfiguration, FnConnector, FnCoreLogic, Payload, StageData, Storage,
};
use crate::testing::{
    CountingConnector, InMemoryStorage, RecordingSender, ScriptedPushConnector, StaticConnector,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

fn connector_stage(stage: Arc<dyn crate::stages::PullConnector>) -> StageSpec {
    StageSpec::Connector {
        stage,
        params: Params::new(),
        multi_step: false,
    }
}

fn storage_stage(stage: StorageHandle) -> StageSpec {
    StageSpec::Storage {
        stage,
        params: Params::new(),
    }
}

fn sender_stage(stage: Arc<dyn crate::stages::Sender>) -> StageSpec {
    StageSpec::Send {
        stage,
        params: Params::new(),
    }
}

#[tokio::test]
async fn chain_runs_each_single_step_stage_exactly_once_in_order() {
    let connector = Arc::new(CountingConnector::new());
    let logic_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let logic_calls_inner = Arc::clone(&logic_calls);
    let sender = Arc::new(RecordingSender::new());

    let stages = vec![
        connector_stage(connector.clone()),
        StageSpec::CoreLogic {
            stage: Arc::new(FnCoreLogic::new(move |payload, _connectors, _params| {
                logic_calls_inner.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let n = payload
                    .as_ref()
                    .and_then(|p| p.get("n"))
                    .and_then(Payload::as_u64)
                    .unwrap_or(0);
                Ok(StageData::Single(json!({ "doubled": n * 2 })))
            })),
            params: Params::new(),
            multi_step: false,
        },
        sender_stage(sender.clone()),
    ];

    perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap();

    assert_eq!(connector.fetch_count(), 1);
    assert_eq!(logic_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(sender.sent(), vec![json!({ "doubled": 0 })]);
}

#[tokio::test]
async fn multi_step_stage_fans_out_downstream_stages_once_per_value() {
    let connector = Arc::new(CountingConnector::new());
    let storage = Arc::new(InMemoryStorage::new());
    let sender = Arc::new(RecordingSender::new());

    let stages = vec![
        connector_stage(connector.clone()),
        StageSpec::CoreLogic {
            stage: Arc::new(FnCoreLogic::new(|_payload, _connectors, _params| {
                Ok(StageData::from_iter(vec![json!(1), json!(2), json!(3)]))
            })),
            params: Params::new(),
            multi_step: true,
        },
        storage_stage(storage.clone()),
        sender_stage(sender.clone()),
    ];

    perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap();

    // Upstream of the fan-out runs once, the tail once per yielded value.
    assert_eq!(connector.fetch_count(), 1);
    assert_eq!(storage.snapshot(), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(sender.sent(), vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn multi_step_configuration_fans_out_parameter_bags() {
    let storage = Arc::new(InMemoryStorage::new());

    let stages = vec![
        StageSpec::Configuration {
            stage: Arc::new(FnConfiguration::new(|_connectors, _params| {
                Ok(Configured::from_iter(vec![
                    Params::new().with("source", json!("a")),
                    Params::new().with("source", json!("b")),
                ]))
            })),
            params: Params::new(),
            multi_step: true,
        },
        connector_stage(Arc::new(FnConnector::new(|params| {
            let source = params.get("source").cloned().unwrap_or(json!(null));
            Ok(StageData::Single(json!({ "from": source })))
        }))),
        storage_stage(storage.clone()),
    ];

    perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap();

    assert_eq!(
        storage.snapshot(),
        vec![json!({ "from": "a" }), json!({ "from": "b" })]
    );
}

mockall::mock! {
    pub StorageEngine {}

    #[async_trait]
    impl Storage for StorageEngine {
        async fn save(&self, payload: &Payload, params: &Params) -> Result<(), StageError>;
        async fn load(&self, params: &Params) -> Result<Option<Payload>, StageError>;
    }
}

#[tokio::test]
async fn storage_is_never_invoked_when_connector_yields_no_data() {
    let mut storage = MockStorageEngine::new();
    storage.expect_save().times(0);

    let stages = vec![
        connector_stage(Arc::new(StaticConnector::empty())),
        storage_stage(Arc::new(storage)),
    ];

    perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn none_payload_reaches_core_logic_and_sender_explicitly() {
    let sender = Arc::new(RecordingSender::new());
    let stages = vec![
        connector_stage(Arc::new(StaticConnector::empty())),
        StageSpec::CoreLogic {
            stage: Arc::new(FnCoreLogic::new(|payload, _connectors, _params| {
                assert!(payload.is_none());
                Ok(StageData::Empty)
            })),
            params: Params::new(),
            multi_step: false,
        },
        sender_stage(sender.clone()),
    ];

    perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap();

    // The sender was invoked but tolerated the missing payload.
    assert_eq!(sender.call_count(), 1);
    assert_eq!(sender.sent(), Vec::<Payload>::new());
}

#[tokio::test]
async fn undeclared_lazy_output_is_a_contract_violation() {
    let stages = vec![connector_stage(Arc::new(FnConnector::new(|_params| {
        Ok(StageData::from_iter(vec![json!(1), json!(2)]))
    })))];

    let err = perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::Contract(_)));
}

#[tokio::test]
async fn configured_parameters_override_bound_parameters() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_inner = Arc::clone(&seen);

    let stages = vec![
        StageSpec::Configuration {
            stage: Arc::new(FnConfiguration::new(|_connectors, _params| {
                Ok(Configured::Single(Params::new().with("limit", json!(5))))
            })),
            params: Params::new(),
            multi_step: false,
        },
        StageSpec::Connector {
            stage: Arc::new(FnConnector::new(move |params| {
                seen_inner.lock().push(params.clone());
                Ok(StageData::Empty)
            })),
            params: Params::new()
                .with("limit", json!(100))
                .with("topic", json!("/demo")),
            multi_step: false,
        },
    ];

    perform_chain("test", &stages, &DbConnectors::new())
        .await
        .unwrap();

    let observed = seen.lock();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].get("limit"), Some(&json!(5)));
    assert_eq!(observed[0].get("topic"), Some(&json!("/demo")));
}

#[tokio::test]
async fn scheduled_loop_terminates_within_budget_plus_one_tick() {
    let storage = Arc::new(InMemoryStorage::new());
    let stages = vec![
        connector_stage(Arc::new(CountingConnector::new())),
        storage_stage(storage.clone()),
    ];
    let params = PipelineParams::new().period(Duration::from_millis(200));
    let status = ExecutionStatus::new();

    let budget = Duration::from_secs(1);
    let started = Instant::now();
    scheduled_execution(
        "bounded",
        &stages,
        &DbConnectors::new(),
        &params,
        FlowTimer::new(Some(budget)),
        &status,
    )
    .await
    .unwrap();

    // Budget plus one clamped tick, with headroom for scheduling jitter.
    assert!(started.elapsed() < budget + break_interval(params.period) + Duration::from_millis(500));
    assert!(!storage.is_empty());
}

#[tokio::test]
async fn scheduled_loop_observes_failure_flag_between_ticks() {
    let storage = Arc::new(InMemoryStorage::new());
    let stages = vec![
        connector_stage(Arc::new(CountingConnector::new())),
        storage_stage(storage.clone()),
    ];
    let params = PipelineParams::new().period(Duration::from_secs(60));

    let status = ExecutionStatus::new();
    status.record_failure("another pipeline died");

    // Unbounded timer: only the failure flag can stop the loop.
    scheduled_execution(
        "observer",
        &stages,
        &DbConnectors::new(),
        &params,
        FlowTimer::new(None),
        &status,
    )
    .await
    .unwrap();

    // The initial perform still ran; the loop exited on its first check.
    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn push_action_flushes_every_message_and_unsubscribes() {
    let connector = Arc::new(ScriptedPushConnector::new());
    let storage = Arc::new(InMemoryStorage::new());
    let action = PushInputAction::new(
        "events",
        vec![
            StageSpec::PushConnector {
                stage: connector.clone(),
                flush_threshold: 1,
            },
            storage_stage(storage.clone()),
        ],
    )
    .unwrap();

    let status = Arc::new(ExecutionStatus::new());
    let timer = FlowTimer::new(Some(Duration::from_millis(1200)));

    let worker = {
        let status = Arc::clone(&status);
        tokio::spawn(async move { action.execute(timer, &status).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    connector.emit(&json!({ "reading": 1 }));
    connector.emit(&json!({ "reading": 2 }));
    connector.emit(&json!({ "reading": 3 }));

    worker.await.unwrap().unwrap();
    assert_eq!(storage.len(), 3);
    assert!(connector.is_unsubscribed());
}

#[tokio::test]
async fn push_action_honours_flush_threshold() {
    let connector = Arc::new(ScriptedPushConnector::new());
    let storage = Arc::new(InMemoryStorage::new());
    let action = PushInputAction::new(
        "events",
        vec![
            StageSpec::PushConnector {
                stage: connector.clone(),
                flush_threshold: 2,
            },
            storage_stage(storage.clone()),
        ],
    )
    .unwrap();

    let status = Arc::new(ExecutionStatus::new());
    let timer = FlowTimer::new(Some(Duration::from_millis(1200)));
    let worker = {
        let status = Arc::clone(&status);
        tokio::spawn(async move { action.execute(timer, &status).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    // One buffered message stays below the threshold and is never flushed.
    connector.emit(&json!({ "reading": 1 }));

    worker.await.unwrap().unwrap();
    assert!(storage.is_empty());
}

#[tokio::test]
async fn push_action_fails_on_undecodable_payload() {
    let connector = Arc::new(ScriptedPushConnector::new());
    let storage = Arc::new(InMemoryStorage::new());
    let action = PushInputAction::new(
        "events",
        vec![
            StageSpec::PushConnector {
                stage: connector.clone(),
                flush_threshold: 1,
            },
            storage_stage(storage.clone()),
        ],
    )
    .unwrap();

    let status = Arc::new(ExecutionStatus::new());
    let timer = FlowTimer::new(Some(Duration::from_secs(5)));
    let worker = {
        let status = Arc::clone(&status);
        tokio::spawn(async move { action.execute(timer, &status).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    connector.emit_raw(b"definitely not json".to_vec());

    let result = worker.await.unwrap();
    assert!(matches!(result, Err(FlowError::Stage(StageError::Decode(_)))));
    // The subscription is closed even on the failure path.
    assert!(connector.is_unsubscribed());
}

#[test]
fn full_action_rejects_push_connectors() {
    let err = FullProcessingAction::new(
        "bad",
        vec![StageSpec::PushConnector {
            stage: Arc::new(ScriptedPushConnector::new()),
            flush_threshold: 1,
        }],
        PipelineParams::new(),
    )
    .unwrap_err();
    assert!(matches!(err, FlowError::UnsupportedShape { .. }));
}

#[test]
fn pull_action_rejects_core_logic() {
    let err = PullInputAction::new(
        "bad",
        vec![
            connector_stage(Arc::new(CountingConnector::new())),
            StageSpec::CoreLogic {
                stage: Arc::new(FnCoreLogic::new(|payload, _c, _p| {
                    Ok(StageData::from(payload))
                })),
                params: Params::new(),
                multi_step: false,
            },
        ],
        PipelineParams::new(),
    )
    .unwrap_err();
    assert!(matches!(err, FlowError::UnsupportedShape { .. }));
}
