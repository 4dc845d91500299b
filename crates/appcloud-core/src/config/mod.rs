//! Client configuration: target controller and polling budgets.

pub mod store;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

pub use store::ConfigStore;

pub const DEFAULT_TARGET: &str = "localhost:8080";
const DEFAULT_DOMAIN: &str = "vcap.me";

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Controller host, optionally with a port.
    #[serde(default = "default_target")]
    pub target: String,

    /// Acts on behalf of another user (sent as `PROXY-USER`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_user: Option<String>,

    #[serde(default)]
    pub polling: PollingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            proxy_user: None,
            polling: PollingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Base URL of the controller API.
    pub fn base_url(&self) -> anyhow::Result<Url> {
        let target = strip_scheme(&self.target);
        Url::parse(&format!("http://{target}"))
            .map_err(|e| anyhow::anyhow!("Invalid target '{}': {}", self.target, e))
    }

    /// Domain suggested for new application URLs.
    ///
    /// `api.example.com` suggests `example.com`; a bare host falls back
    /// to `vcap.me`.
    pub fn suggested_domain(&self) -> String {
        let host = strip_scheme(&self.target);
        let host = host.split(':').next().unwrap_or(host);
        let mut labels = host.split('.');
        labels.next();
        let rest: Vec<&str> = labels.collect();
        if rest.is_empty() {
            DEFAULT_DOMAIN.to_string()
        } else {
            rest.join(".")
        }
    }
}

/// Poll quanta and budgets for the convergence loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "default_update_timeout_secs")]
    pub update_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: default_health_interval_ms(),
            health_timeout_secs: default_health_timeout_secs(),
            update_interval_ms: default_update_interval_ms(),
            update_timeout_secs: default_update_timeout_secs(),
        }
    }
}

impl PollingConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }
}

/// Remove a leading `http://` or `https://`, case-insensitively.
pub fn strip_scheme(input: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if input.len() >= scheme.len() && input[..scheme.len()].eq_ignore_ascii_case(scheme) {
            return &input[scheme.len()..];
        }
    }
    input
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

fn default_health_interval_ms() -> u64 {
    500
}

fn default_health_timeout_secs() -> u64 {
    30
}

fn default_update_interval_ms() -> u64 {
    1000
}

fn default_update_timeout_secs() -> u64 {
    300
}
