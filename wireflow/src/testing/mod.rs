//! Reusable fakes for exercising pipelines without real I/O.
//!
//! These doubles back the crate's own test suite and are available to
//! users for wiring demo flows: counting and scripted connectors, an
//! in-memory storage engine and a recording sender.

mod mocks;

pub use mocks::{
    CountingConnector, FailOnNthCall, InMemoryStorage, RecordingSender, ScriptedPushConnector,
    StaticConnector,
};
