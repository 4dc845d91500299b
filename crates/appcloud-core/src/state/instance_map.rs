//! Instance debug map persistence.
//!
//! Maps synthetic labels (`<app>-canary`, `<app>-<N>`) to server-side
//! instance locators. The file is rewritten wholesale on every save;
//! callers that want to keep existing entries load, insert and save.
//! There is no file locking, the last writer wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub const INSTANCE_MAP_FILE: &str = "instances.json";

pub type InstanceMap = BTreeMap<String, String>;

/// Label under which a failed canary instance is recorded.
pub fn canary_label(app: &str) -> String {
    format!("{app}-canary")
}

/// Label for the `index`-th (1-based) crash record of an app.
pub fn crash_label(app: &str, index: usize) -> String {
    format!("{app}-{index}")
}

#[derive(Debug, Clone)]
pub struct InstanceMapStore {
    path: PathBuf,
}

impl InstanceMapStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(INSTANCE_MAP_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the map, returning an empty map if the file doesn't exist.
    pub fn load(&self) -> anyhow::Result<InstanceMap> {
        if !self.path.exists() {
            return Ok(InstanceMap::new());
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read instance map: {}", self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse instance map: {}", self.path.display()))
    }

    /// Load the map, treating an unreadable file as empty.
    pub fn load_or_default(&self) -> InstanceMap {
        match self.load() {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable instance map");
                InstanceMap::new()
            }
        }
    }

    /// Replace the stored map atomically (tmp + rename).
    pub fn save(&self, map: &InstanceMap) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid instance map path: {}", self.path.display()))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let bytes = serde_json::to_vec_pretty(map).context("Failed to serialize instance map")?;
        let tmp_path = dir.join(format!("{}.{}.tmp", INSTANCE_MAP_FILE, std::process::id()));
        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp instance map: {}", tmp_path.display()))?;

        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!(
                    "Failed to remove existing instance map: {}",
                    self.path.display()
                )
            })?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename tmp instance map: {}", tmp_path.display()))?;
        Ok(())
    }

    /// Insert one entry, keeping everything already recorded.
    pub fn record(&self, label: &str, locator: &str) -> anyhow::Result<()> {
        let mut map = self.load_or_default();
        map.insert(label.to_string(), locator.to_string());
        self.save(&map)
    }

    /// Translate a label to its locator; unknown labels pass through.
    pub fn resolve(&self, label: &str) -> String {
        self.load_or_default()
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }
}
