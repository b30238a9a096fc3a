//! # Wireflow
//!
//! A lightweight ETL orchestration library: pipelines are declaratively
//! composed out of interchangeable stages (configuration, connector,
//! storage, core logic, send) and the runtime schedules and repeatedly
//! executes each pipeline on its own cadence, isolating failures between
//! pipelines.
//!
//! - **Stage composition**: closed stage kinds with a uniform
//!   parameter-threading contract, including lazy multi-step fan-out
//! - **Per-pipeline scheduling**: one worker per pipeline with a rolling
//!   interval scheduler and cooperative timeout checks between ticks
//! - **Cross-pipeline storage access**: core-logic pipelines read every
//!   other pipeline's already-persisted output through shared handles
//! - **Failure propagation**: a first-writer-wins status record stops
//!   the whole flow once any pipeline fails irrecoverably
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wireflow::prelude::*;
//! use wireflow::testing::{CountingConnector, InMemoryStorage};
//!
//! # async fn demo() -> Result<(), FlowError> {
//! let mut processor = FlowProcessor::default();
//! processor.add_pipeline(
//!     Pipeline::new("ints", PipelineParams::new().period(Duration::from_secs(2)))
//!         .with_connector(Arc::new(CountingConnector::new()))
//!         .with_storage(Arc::new(InMemoryStorage::new())),
//! )?;
//! processor.launch_flow(Some(Duration::from_secs(12))).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod actions;
pub mod errors;
pub mod flow;
pub mod observability;
pub mod params;
pub mod pipeline;
pub mod schedule;
pub mod stages;
pub mod status;
pub mod testing;
pub mod timer;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::actions::{Action, FullProcessingAction, PullInputAction, PushInputAction};
    pub use crate::errors::{FlowError, StageError};
    pub use crate::flow::{FlowProcessor, WorkerMode};
    pub use crate::params::{Params, PipelineParams};
    pub use crate::pipeline::Pipeline;
    pub use crate::schedule::Scheduler;
    pub use crate::stages::{
        Configuration, Configured, CoreLogic, DbConnectors, FnConfiguration, FnConnector,
        FnCoreLogic, FnSender, Payload, PullConnector, PushConnector, Sender, StageData,
        StageKind, StageSpec, Storage, StorageHandle, Subscription,
    };
    pub use crate::status::ExecutionStatus;
    pub use crate::timer::FlowTimer;
}
