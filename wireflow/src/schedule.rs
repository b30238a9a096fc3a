//! Cadence control for repeatedly executed actions.

use crate::errors::FlowError;
use std::future::Future;
use std::time::{Duration, Instant};

/// Decides when a periodic function is due to run again.
///
/// The scheduler tracks the instant of the previous invocation and fires
/// the wrapped function only once the configured period has elapsed,
/// resetting the clock before each launch. A fixed wall-clock launch time
/// is a declared extension point: ticking a scheduler configured with one
/// fails instead of silently falling back to interval mode.
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    launch_time: Option<String>,
    last_launch: Instant,
}

impl Scheduler {
    /// Creates a scheduler with the given period.
    ///
    /// The clock starts now, so the first launch happens one full period
    /// after construction.
    #[must_use]
    pub fn new(period: Duration, launch_time: Option<String>) -> Self {
        Self {
            period,
            launch_time,
            last_launch: Instant::now(),
        }
    }

    /// Runs `f` if the period has elapsed since the previous launch.
    ///
    /// Returns `Ok(Some(output))` when the function fired, `Ok(None)` when
    /// it is not due yet.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::LaunchTimeNotSupported`] when a fixed launch
    /// time was configured.
    pub async fn tick<F, Fut, T>(&mut self, f: F) -> Result<Option<T>, FlowError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.launch_time.is_some() {
            return Err(FlowError::LaunchTimeNotSupported);
        }

        if self.last_launch.elapsed() >= self.period {
            self.last_launch = Instant::now();
            Ok(Some(f().await))
        } else {
            Ok(None)
        }
    }
}
