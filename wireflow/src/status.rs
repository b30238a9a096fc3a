//! Shared execution status with first-writer-wins failure recording.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// The shared status record observed by every pipeline worker in a flow.
///
/// One instance is created per `launch_flow` invocation and handed to each
/// worker behind an `Arc`, so two concurrently running flows never share
/// state. Recording a failure is idempotent: only the first message is
/// kept, later writers are ignored.
#[derive(Debug, Default)]
pub struct ExecutionStatus {
    failed: AtomicBool,
    message: RwLock<Option<String>>,
}

impl ExecutionStatus {
    /// Creates a fresh, healthy status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the flow is still healthy.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
    }

    /// Marks the flow as failed with the given message.
    ///
    /// Only the first failure is recorded; the flag never resets to ok.
    pub fn record_failure(&self, message: impl Into<String>) {
        if self
            .failed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.message.write() = Some(message.into());
        }
    }

    /// Returns the first recorded failure message, if any.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.message.read().clone()
    }
}
