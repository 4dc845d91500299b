//! Outcomes returned to the front end for printing.

use crate::gateway::CrashRecord;
use crate::update::UpdateOutcome;

/// Whether a fetch-modify-write actually wrote anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    /// Already in the requested shape; no write was issued.
    Unchanged,
}

impl Change {
    pub fn is_applied(&self) -> bool {
        matches!(self, Change::Applied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartReport {
    pub stopped: Change,
    pub started: Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub app: String,
    /// Upload size, e.g. `12K`.
    pub size: String,
    pub fingerprint: String,
    /// Database provisioned and bound during the push.
    pub database: Option<String>,
    pub started: Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub app: String,
    pub released: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    Rolled(UpdateOutcome),
    Restarted(RestartReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// `(old, new)` memory in MiB when the reservation changed.
    pub memory: Option<(u32, u32)>,
    pub result: UpdateResult,
}

/// A crash record and the debug label it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledCrash {
    pub label: String,
    pub crash: CrashRecord,
}
