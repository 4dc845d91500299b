//! Instance count scaling.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::{CloudError, CloudResult};
use crate::gateway::{ControlPlane, ControlPlaneGateway};
use crate::types::AppManifest;

/// A scaling instruction: `+d`, `-d` or an absolute count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceSpec {
    Relative(i64),
    Absolute(u32),
}

impl FromStr for InstanceSpec {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CloudError::InvalidInstanceSpec(s.to_string());
        let (sign, digits) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => (0, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        if sign == 0 {
            digits.parse().map(InstanceSpec::Absolute).map_err(|_| invalid())
        } else {
            let delta: i64 = digits.parse().map_err(|_| invalid())?;
            Ok(InstanceSpec::Relative(sign * delta))
        }
    }
}

impl fmt::Display for InstanceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceSpec::Relative(delta) => write!(f, "{delta:+}"),
            InstanceSpec::Absolute(count) => write!(f, "{count}"),
        }
    }
}

/// New instance count for `current` under `spec`.
///
/// Fails with `InstanceCountTooLow` when the result would drop below one.
pub fn compute_new_count(current: u32, spec: InstanceSpec) -> CloudResult<u32> {
    let requested = match spec {
        InstanceSpec::Relative(delta) => i64::from(current).saturating_add(delta),
        InstanceSpec::Absolute(count) => i64::from(count),
    };
    if requested < 1 {
        return Err(CloudError::InstanceCountTooLow(requested));
    }
    u32::try_from(requested).map_err(|_| CloudError::InvalidInstanceSpec(spec.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Up,
    Down,
}

impl fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleDirection::Up => write!(f, "up"),
            ScaleDirection::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// Already at the requested count; nothing was sent.
    Unchanged { count: u32 },
    Scaled {
        from: u32,
        to: u32,
        direction: ScaleDirection,
    },
}

impl ScaleOutcome {
    pub fn count(&self) -> u32 {
        match self {
            ScaleOutcome::Unchanged { count } => *count,
            ScaleOutcome::Scaled { to, .. } => *to,
        }
    }
}

pub struct InstanceScaler<'a, G> {
    control: &'a ControlPlane<G>,
}

impl<'a, G: ControlPlaneGateway> InstanceScaler<'a, G> {
    pub fn new(control: &'a ControlPlane<G>) -> Self {
        Self { control }
    }

    /// Write `new_count` into an already fetched manifest.
    pub fn apply(&self, manifest: &AppManifest, new_count: u32) -> CloudResult<ScaleOutcome> {
        let current = manifest.instances;
        if new_count < 1 {
            return Err(CloudError::InstanceCountTooLow(i64::from(new_count)));
        }
        if new_count == current {
            return Ok(ScaleOutcome::Unchanged { count: current });
        }

        let direction = if new_count > current {
            ScaleDirection::Up
        } else {
            ScaleDirection::Down
        };

        let mut updated = manifest.clone();
        updated.instances = new_count;
        let response = self.control.put_app(&updated)?;
        if !response.is_success() {
            if response.status == 403 {
                return Err(CloudError::AccessDenied);
            }
            return Err(CloudError::ScalingRequestRejected {
                app: manifest.name.clone(),
                status: response.status,
            });
        }

        info!(app = %manifest.name, from = current, to = new_count, %direction, "scaled instances");
        Ok(ScaleOutcome::Scaled {
            from: current,
            to: new_count,
            direction,
        })
    }

    /// Compute the new count from `spec` and apply it.
    ///
    /// Local validation happens before any request is issued.
    pub fn scale(&self, manifest: &AppManifest, spec: InstanceSpec) -> CloudResult<ScaleOutcome> {
        let new_count = compute_new_count(manifest.instances, spec)?;
        self.apply(manifest, new_count)
    }
}
