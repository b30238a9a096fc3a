//! Wall-clock budget tracking for flow execution.

use std::time::{Duration, Instant};
use tracing::debug;

/// Tracks elapsed time against an optional overall execution budget.
///
/// The start instant is captured at construction, when the flow launches,
/// and the same timer value is shared by every pipeline worker. A timer
/// without a budget never reports its limit as reached.
#[derive(Debug, Clone, Copy)]
pub struct FlowTimer {
    started: Instant,
    budget: Option<Duration>,
}

impl FlowTimer {
    /// Starts a timer with an optional execution budget.
    #[must_use]
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Returns the configured budget, if any.
    #[must_use]
    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Returns the time elapsed since the flow started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Checks whether the execution budget has been exhausted.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        match self.budget {
            None => false,
            Some(budget) => {
                if self.started.elapsed() >= budget {
                    debug!("execution budget reached");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Checks whether the budget would be exhausted after sleeping `pause`.
    #[must_use]
    pub fn will_exceed(&self, pause: Duration) -> bool {
        match self.budget {
            None => false,
            Some(budget) => self.started.elapsed() + pause >= budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_timer_never_expires() {
        let timer = FlowTimer::new(None);
        assert!(!timer.limit_reached());
        assert!(!timer.will_exceed(Duration::from_secs(3600)));
    }

    #[test]
    fn bounded_timer_reports_upcoming_expiry() {
        let timer = FlowTimer::new(Some(Duration::from_secs(60)));
        assert!(!timer.limit_reached());
        assert!(timer.will_exceed(Duration::from_secs(60)));
        assert!(!timer.will_exceed(Duration::from_millis(100)));
    }

    #[test]
    fn bounded_timer_expires_after_budget() {
        let timer = FlowTimer::new(Some(Duration::from_millis(5)));
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.limit_reached());
    }
}
