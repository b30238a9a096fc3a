//! Two sensor pipelines feeding a reporting pipeline.
//!
//! The `indoor` and `outdoor` pipelines poll mock temperature sensors and
//! persist the readings; the `report` pipeline reads both storages through
//! the injected handles and logs a summary. Run with
//! `cargo run --example quick_start`.

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wireflow::observability::init_tracing;
use wireflow::prelude::*;
use wireflow::testing::InMemoryStorage;

/// Pull connector producing one random reading per poll.
fn sensor(low: f64, high: f64) -> Arc<dyn PullConnector> {
    Arc::new(FnConnector::new(move |_params| {
        let celsius = rand::thread_rng().gen_range(low..high);
        Ok(StageData::Single(json!({ "celsius": celsius })))
    }))
}

/// Core logic summarising the readings persisted by the sensor pipelines.
struct Report;

#[async_trait]
impl CoreLogic for Report {
    async fn launch(
        &self,
        _payload: Option<Payload>,
        connectors: &DbConnectors,
        params: &Params,
    ) -> Result<StageData, StageError> {
        for name in ["indoor", "outdoor"] {
            let Some(storage) = connectors.get(name) else {
                continue;
            };
            let Some(Payload::Array(readings)) = storage.load(params).await? else {
                continue;
            };
            let values: Vec<f64> = readings
                .iter()
                .filter_map(|reading| reading.get("celsius"))
                .filter_map(Payload::as_f64)
                .collect();
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            info!(sensor = name, readings = values.len(), mean, "summary");
        }
        Ok(StageData::Empty)
    }
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
    init_tracing();

    let mut processor = FlowProcessor::default();
    processor.add_pipeline(
        Pipeline::new("indoor", PipelineParams::new().period(Duration::from_secs(2)))
            .with_connector(sensor(18.0, 25.0))
            .with_storage(Arc::new(InMemoryStorage::new())),
    )?;
    processor.add_pipeline(
        Pipeline::new("outdoor", PipelineParams::new().period(Duration::from_secs(2)))
            .with_connector(sensor(-5.0, 15.0))
            .with_storage(Arc::new(InMemoryStorage::new())),
    )?;
    processor.add_pipeline(
        Pipeline::new(
            "report",
            PipelineParams::new()
                .period(Duration::from_secs(4))
                .delay(Duration::from_secs(1)),
        )
        .with_core_logic(Arc::new(Report)),
    )?;

    processor.launch_flow(Some(Duration::from_secs(20))).await
}
