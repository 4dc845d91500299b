//! Staged (canary) update rollout.
//!
//! `run_update` uploads new bits, asks the controller to roll them out
//! and polls the rollout state until it reaches `SUCCEEDED` or
//! `CANARY_FAILED`. Intermediate phase strings are opaque and only
//! reported. Running out of budget is `UpdateTimedOut`, never a failure
//! verdict.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CloudError, CloudResult};
use crate::gateway::{ControlPlane, ControlPlaneGateway};
use crate::state::InstanceMapStore;
use crate::state::instance_map::canary_label;
use crate::wait::{Budget, Sleeper};

pub const INITIAL_PHASE: &str = "NONE";
pub const SUCCEEDED: &str = "SUCCEEDED";
pub const CANARY_FAILED: &str = "CANARY_FAILED";

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// How `update` rolls new bits out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// Staged rollout driven by [`CanaryUpdateCoordinator`].
    #[default]
    Canary,
    /// Plain stop + start, bypassing the coordinator.
    Restart,
}

/// Terminal rollout state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Succeeded,
    CanaryFailed {
        /// Locator of the failed canary instance, when the controller
        /// reported one. It is recorded under `<app>-canary`.
        canary: Option<String>,
    },
}

impl UpdateOutcome {
    pub fn state(&self) -> &'static str {
        match self {
            UpdateOutcome::Succeeded => SUCCEEDED,
            UpdateOutcome::CanaryFailed { .. } => CANARY_FAILED,
        }
    }
}

pub struct CanaryUpdateCoordinator<'a, G, S> {
    control: &'a ControlPlane<G>,
    instance_map: &'a InstanceMapStore,
    sleeper: S,
    interval: Duration,
    timeout: Duration,
}

impl<'a, G: ControlPlaneGateway, S: Sleeper> CanaryUpdateCoordinator<'a, G, S> {
    pub fn new(
        control: &'a ControlPlane<G>,
        instance_map: &'a InstanceMapStore,
        sleeper: S,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            control,
            instance_map,
            sleeper,
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }

    /// Upload `bits`, trigger the rollout and drive it to a terminal state.
    ///
    /// `on_phase` is called once per distinct phase reported by the
    /// controller, including the terminal one.
    pub fn run_update(
        &self,
        app: &str,
        bits: Vec<u8>,
        on_phase: &mut dyn FnMut(&str),
    ) -> CloudResult<UpdateOutcome> {
        self.control.upload_bits(app, bits)?;
        self.control.trigger_update(app)?;
        info!(app, "update triggered");
        self.poll(app, on_phase)
    }

    fn poll(&self, app: &str, on_phase: &mut dyn FnMut(&str)) -> CloudResult<UpdateOutcome> {
        let mut budget = Budget::new(self.timeout);
        let mut phase = INITIAL_PHASE.to_string();

        while !budget.is_exhausted() {
            self.sleeper.sleep(self.interval);
            budget.spend(self.interval);

            let status = self.control.update_status(app)?;
            debug!(app, state = %status.state, "update sample");

            if status.state != phase {
                info!(app, from = %phase, to = %status.state, "update phase changed");
                on_phase(&status.state);
                phase = status.state.clone();
            }

            match phase.as_str() {
                SUCCEEDED => return Ok(UpdateOutcome::Succeeded),
                CANARY_FAILED => {
                    warn!(app, canary = ?status.canary, "canary failed");
                    if let Some(locator) = &status.canary {
                        self.instance_map.record(&canary_label(app), locator)?;
                    }
                    return Ok(UpdateOutcome::CanaryFailed {
                        canary: status.canary,
                    });
                }
                _ => {}
            }
        }

        warn!(app, last_state = %phase, "update did not reach a terminal state");
        Err(CloudError::UpdateTimedOut {
            app: app.to_string(),
            last_state: phase,
        })
    }
}
