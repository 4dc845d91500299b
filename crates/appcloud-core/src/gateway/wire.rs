//! Payload shapes returned by the controller's introspection endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `GET /info`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct TargetInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub version: Option<String>,
    #[serde(default)]
    pub support: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

impl TargetInfo {
    /// A controller must describe itself fully to be accepted as a target.
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.version.is_some()
            && self.support.is_some()
            && self.description.is_some()
    }
}

/// `GET /apps/<name>/update`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateStatus {
    pub state: String,
    /// Locator of the canary instance, present on some failures.
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub canary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceInfo {
    #[serde(deserialize_with = "u32_from_string_or_number")]
    pub index: u32,
    pub state: String,
    /// Seconds since the epoch.
    #[serde(default)]
    pub since: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrashRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub instance: String,
    pub since: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct InstanceStats {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub cores: Option<u32>,
    /// Seconds.
    #[serde(default)]
    pub uptime: Option<f64>,
    #[serde(default)]
    pub mem_quota: Option<u64>,
    #[serde(default)]
    pub disk_quota: Option<u64>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub cpu: Option<f64>,
    /// KiB.
    #[serde(default)]
    pub mem: Option<f64>,
    /// Bytes.
    #[serde(default)]
    pub disk: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InstancesEnvelope {
    #[serde(default)]
    pub instances: Vec<InstanceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CrashesEnvelope {
    #[serde(default)]
    pub crashes: Vec<CrashRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatsEntry {
    #[serde(default)]
    pub stats: Option<InstanceStats>,
}

pub(crate) type StatsPayload = BTreeMap<String, StatsEntry>;

/// Render a JSON scalar the way it was written (strings unquoted).
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected string or number, got {value}")))
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

fn u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = string_or_number(deserializer)?;
    raw.parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid instance index '{raw}'")))
}
