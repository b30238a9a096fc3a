//! Flow orchestration: launching every pipeline concurrently and
//! aggregating failure status.


use crate::errors::FlowError;
use crate::pipeline::Pipeline;
use crate::stages::DbConnectors;
use crate::status::ExecutionStatus;
use crate::timer::FlowTimer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How pipeline workers are spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// One tokio task per pipeline on the shared runtime.
    #[default]
    Task,
    /// One dedicated OS thread per pipeline, each with its own
    /// current-thread runtime. Gives pipelines full scheduling isolation
    /// from each other and from the caller's runtime.
    Thread,
}

/// Owns a set of pipelines and launches them concurrently.
///
/// One worker runs per pipeline; workers only share the per-flow
/// [`ExecutionStatus`] and the read-only snapshot of storage handles
/// assembled before any worker starts. The first worker to fail records
/// the failure; all others observe it on their next scheduling tick and
/// exit cooperatively.
#[derive(Debug)]
pub struct FlowProcessor {
    pipelines: HashMap<String, Pipeline>,
    mode: WorkerMode,
}

impl Default for FlowProcessor {
    fn default() -> Self {
        Self::new(WorkerMode::default())
    }
}

impl FlowProcessor {
    /// Creates an empty processor with the given worker mode.
    #[must_use]
    pub fn new(mode: WorkerMode) -> Self {
        Self {
            pipelines: HashMap::new(),
            mode,
        }
    }

    /// Adds a pipeline to the execution pool.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DuplicatePipeline`] when a pipeline with the
    /// same name was already added.
    pub fn add_pipeline(&mut self, pipeline: Pipeline) -> Result<(), FlowError> {
        if self.pipelines.contains_key(pipeline.name()) {
            return Err(FlowError::DuplicatePipeline {
                name: pipeline.name().to_string(),
            });
        }
        self.pipelines.insert(pipeline.name().to_string(), pipeline);
        Ok(())
    }

    /// Returns a pipeline by name.
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    /// Compiles every pipeline's action and wires cross-pipeline storage
    /// access.
    ///
    /// The extraction map holds one storage handle per pipeline exposing
    /// a storage stage, keyed by pipeline name. It is built once, after
    /// all pipelines are compiled, and injected whole into every pipeline
    /// carrying core logic or a configuration stage. No pipeline ever
    /// observes a partially built map.
    ///
    /// # Errors
    ///
    /// Returns the first compile error of any pipeline.
    pub fn initialize_internal_structure(&mut self) -> Result<(), FlowError> {
        for pipeline in self.pipelines.values_mut() {
            pipeline.create_action()?;
        }

        let extraction: DbConnectors = self
            .pipelines
            .iter()
            .filter_map(|(name, pipeline)| {
                pipeline
                    .action()
                    .and_then(crate::actions::Action::storage_handle)
                    .map(|handle| (name.clone(), handle))
            })
            .collect();

        for pipeline in self.pipelines.values_mut() {
            if pipeline.has_core_logic() || pipeline.has_configuration() {
                pipeline.set_db_connectors(extraction.clone());
            }
        }
        Ok(())
    }

    /// Launches every pipeline in its own worker and joins them all.
    ///
    /// `execution_budget` bounds the overall wall-clock run time; `None`
    /// runs until a failure stops the flow.
    ///
    /// # Errors
    ///
    /// Returns a compile error before any worker starts, or
    /// [`FlowError::FlowFailed`] carrying the first recorded failure
    /// message once all workers have joined.
    pub async fn launch_flow(mut self, execution_budget: Option<Duration>) -> Result<(), FlowError> {
        let timer = FlowTimer::new(execution_budget);
        self.initialize_internal_structure()?;

        let status = Arc::new(ExecutionStatus::new());
        info!(
            pipelines = self.pipelines.len(),
            mode = ?self.mode,
            "launching flow"
        );

        match self.mode {
            WorkerMode::Task => {
                let handles: Vec<_> = self
                    .pipelines
                    .into_values()
                    .map(|pipeline| {
                        let status = Arc::clone(&status);
                        tokio::spawn(run_worker(pipeline, timer, status))
                    })
                    .collect();

                for handle in handles {
                    if let Err(join_error) = handle.await {
                        status.record_failure(format!("pipeline worker panicked: {join_error}"));
                    }
                }
            }
            WorkerMode::Thread => {
                let mut threads = Vec::with_capacity(self.pipelines.len());
                for (name, pipeline) in self.pipelines {
                    let status = Arc::clone(&status);
                    let thread = std::thread::Builder::new()
                        .name(format!("wireflow-{name}"))
                        .spawn(move || match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(runtime) => runtime.block_on(run_worker(pipeline, timer, status)),
                            Err(error) => status.record_failure(format!(
                                "failed to build worker runtime: {error}"
                            )),
                        })?;
                    threads.push(thread);
                }

                let join_status = Arc::clone(&status);
                let joined = tokio::task::spawn_blocking(move || {
                    for thread in threads {
                        if thread.join().is_err() {
                            join_status.record_failure("pipeline worker panicked");
                        }
                    }
                })
                .await;
                if let Err(join_error) = joined {
                    status.record_failure(format!("worker join failed: {join_error}"));
                }
            }
        }

        info!("flow finished execution");
        if status.is_ok() {
            Ok(())
        } else {
            Err(FlowError::FlowFailed {
                message: status
                    .failure_message()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            })
        }
    }
}

/// Worker boundary: converts an uncaught pipeline error into the shared
/// first-writer-wins failure record and terminates only this worker.
async fn run_worker(pipeline: Pipeline, timer: FlowTimer, status: Arc<ExecutionStatus>) {
    let name = pipeline.name().to_string();
    if let Err(error) = pipeline.run(timer, &status).await {
        status.record_failure(error.to_string());
        info!(
            pipeline = name.as_str(),
            error = %error,
            "service failure, stopping pipeline"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PipelineParams;
    use crate::testing::{CountingConnector, InMemoryStorage};
    use std::sync::Arc;

    fn input_pipeline(name: &str) -> Pipeline {
        Pipeline::new(name, PipelineParams::new())
            .with_connector(Arc::new(CountingConnector::new()))
            .with_storage(Arc::new(InMemoryStorage::new()))
    }

    #[test]
    fn duplicate_pipeline_names_are_rejected_at_add_time() {
        let mut processor = FlowProcessor::default();
        processor.add_pipeline(input_pipeline("ints")).unwrap();

        let err = processor.add_pipeline(input_pipeline("ints")).unwrap_err();
        assert!(matches!(err, FlowError::DuplicatePipeline { name } if name == "ints"));
    }

    #[test]
    fn compile_errors_surface_before_any_worker_starts() {
        let mut processor = FlowProcessor::default();
        processor
            .add_pipeline(Pipeline::new("empty", PipelineParams::new()))
            .unwrap();

        let err = processor.initialize_internal_structure().unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedShape { .. }));
    }
}
