//! Application and service manifests exchanged with the controller.
//!
//! Manifests are read, mutated and written back wholesale. Fields the
//! client does not model are kept in `extra` so a PUT never drops
//! controller-owned attributes.

pub mod memory;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use memory::{MEMORY_CHOICES, memory_choice_to_quota, memory_quota_to_choice};

/// Desired run state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppState {
    #[default]
    Stopped,
    Started,
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppState::Stopped => write!(f, "STOPPED"),
            AppState::Started => write!(f, "STARTED"),
        }
    }
}

/// Framework model and startup command used to stage the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Staging {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Resources {
    /// Memory quota in MiB.
    pub memory: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full description of an application, desired and observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    pub name: String,
    #[serde(default)]
    pub staging: Staging,
    #[serde(default)]
    pub uris: Vec<String>,
    pub instances: u32,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub state: AppState,
    #[serde(default)]
    pub services: Vec<String>,
    /// Observed by the controller; absent means nothing is running.
    #[serde(
        rename = "runningInstances",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub running_instances: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppManifest {
    /// Manifest for a new application in the STOPPED state.
    pub fn new(name: impl Into<String>, staging: Staging, memory: u32) -> Self {
        Self {
            name: name.into(),
            staging,
            uris: Vec::new(),
            instances: 1,
            resources: Resources {
                memory,
                extra: Map::new(),
            },
            state: AppState::Stopped,
            services: Vec::new(),
            running_instances: None,
            extra: Map::new(),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        if !self.uris.contains(&uri) {
            self.uris.push(uri);
        }
        self
    }

    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances.max(1);
        self
    }

    /// Fraction of desired instances observed running, capped at 1.0.
    ///
    /// Right after a scale-down the controller can still report more
    /// running instances than desired; that counts as fully healthy.
    /// `None` only when the desired count is zero, which the controller
    /// never reports for a valid manifest.
    pub fn health(&self) -> Option<f64> {
        if self.instances == 0 {
            return None;
        }
        let ratio = f64::from(self.running_instances.unwrap_or(0)) / f64::from(self.instances);
        Some(ratio.min(1.0))
    }

    pub fn is_bound_to(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }
}

/// A provisioned (or to-be-provisioned) service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub vendor: String,
    pub version: String,
    pub tier: String,
    #[serde(default)]
    pub options: std::collections::BTreeMap<String, String>,
    /// Derived from the catalog at provisioning time, never sent.
    #[serde(skip)]
    pub price: Option<Price>,
}

/// Flat price per billing period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount: String,
    pub period: String,
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}/{}", self.amount, self.period)
    }
}

/// Display label for an application's health, as shown by `apps`.
pub fn health_label(app: &AppManifest) -> String {
    if app.state == AppState::Started
        && app.running_instances.is_some()
        && let Some(ratio) = app.health()
    {
        let rounded = (ratio * 1000.0).round() / 1000.0;
        if rounded == 1.0 {
            return "RUNNING".to_string();
        }
        return format!("{}%", (rounded * 100.0).round());
    }

    match app.state {
        AppState::Stopped => "STOPPED".to_string(),
        AppState::Started => "N/A".to_string(),
    }
}
