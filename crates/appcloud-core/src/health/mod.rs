//! Health convergence polling.
//!
//! The controller has no push notification; convergence is observed by
//! sampling the application manifest at a fixed quantum until the health
//! ratio equals the target or the budget runs out.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::CloudResult;
use crate::gateway::{ControlPlane, ControlPlaneGateway};
use crate::wait::{Budget, Sleeper};

/// Smallest sleep quantum; a zero interval would never drain the budget.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Result of one `await_health` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthOutcome {
    /// Last observed health, `None` if the budget allowed no sample.
    pub health: Option<f64>,
    pub samples: u32,
    pub converged: bool,
}

impl HealthOutcome {
    /// Last observed health, zero when nothing was sampled.
    pub fn observed(&self) -> f64 {
        self.health.unwrap_or(0.0)
    }
}

pub struct HealthPoller<'a, G, S> {
    control: &'a ControlPlane<G>,
    sleeper: S,
    interval: Duration,
}

impl<'a, G: ControlPlaneGateway, S: Sleeper> HealthPoller<'a, G, S> {
    pub fn new(control: &'a ControlPlane<G>, sleeper: S, interval: Duration) -> Self {
        Self {
            control,
            sleeper,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `app` until its health equals `target` exactly or `timeout`
    /// is spent.
    ///
    /// Running out of budget is not an error; the caller decides whether
    /// the last observed value is good enough. Each call is independent.
    pub fn await_health(&self, app: &str, target: f64, timeout: Duration) -> CloudResult<HealthOutcome> {
        let mut budget = Budget::new(timeout);
        let mut outcome = HealthOutcome {
            health: None,
            samples: 0,
            converged: false,
        };

        while !budget.is_exhausted() && !outcome.converged {
            self.sleeper.sleep(self.interval);
            budget.spend(self.interval);

            let manifest = self.control.get_app(app)?;
            let health = manifest.health().unwrap_or(0.0);
            outcome.samples += 1;
            outcome.health = Some(health);
            // Exact comparison: 1.0 means every desired instance runs.
            outcome.converged = health == target;

            debug!(
                app,
                health,
                target,
                sample = outcome.samples,
                remaining_ms = budget.remaining().as_millis() as u64,
                "health sample"
            );
        }

        if !outcome.converged {
            warn!(
                app,
                target,
                observed = outcome.observed(),
                samples = outcome.samples,
                "health did not converge within budget"
            );
        }
        Ok(outcome)
    }
}
