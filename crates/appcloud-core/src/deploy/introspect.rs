//! Read-only views of running applications.

use tracing::debug;

use super::{DeploymentController, LabelledCrash};
use crate::error::{CloudError, CloudResult};
use crate::gateway::{ControlPlaneGateway, InstanceInfo, InstanceStats};
use crate::state::InstanceMap;
use crate::state::instance_map::crash_label;
use crate::wait::Sleeper;

/// Instance consulted by `files` when none is named.
pub const DEFAULT_INSTANCE: &str = "0";
pub const DEFAULT_FILES_PATH: &str = "/";

impl<G: ControlPlaneGateway, S: Sleeper> DeploymentController<G, S> {
    /// Running instances sorted by index.
    pub fn instances(&self, app: &str) -> CloudResult<Vec<InstanceInfo>> {
        let mut instances = self.control.instances(app)?;
        instances.sort_by_key(|i| i.index);
        Ok(instances)
    }

    /// Crash records, oldest first, labelled `<app>-1`, `<app>-2`, ...
    ///
    /// The debug map is replaced by exactly these labels.
    pub fn crashes(&self, app: &str) -> CloudResult<Vec<LabelledCrash>> {
        let mut crashes = self.control.crashes(app)?;
        crashes.sort_by_key(|c| c.since);

        let labelled: Vec<LabelledCrash> = crashes
            .into_iter()
            .enumerate()
            .map(|(i, crash)| LabelledCrash {
                label: crash_label(app, i + 1),
                crash,
            })
            .collect();

        let map: InstanceMap = labelled
            .iter()
            .map(|c| (c.label.clone(), c.crash.instance.clone()))
            .collect();
        self.instance_map.save(&map)?;
        debug!(app, crashes = labelled.len(), "instance map rewritten");

        Ok(labelled)
    }

    /// Directory listing or file content from one instance.
    ///
    /// `instance` may be an index, a locator, or a label from the debug
    /// map (`<app>-canary`, `<app>-<N>`).
    pub fn files(&self, app: &str, instance: Option<&str>, path: Option<&str>) -> CloudResult<String> {
        self.control.get_app(app)?;
        let instance = self
            .instance_map
            .resolve(instance.unwrap_or(DEFAULT_INSTANCE));
        self.control
            .files(app, &instance, path.unwrap_or(DEFAULT_FILES_PATH))
    }

    /// Per-instance resource usage sorted by index.
    pub fn stats(&self, app: &str) -> CloudResult<Vec<(u32, InstanceStats)>> {
        let manifest = self.control.get_app(app)?;
        let stats = self.control.stats(app)?;
        if stats.is_empty() && manifest.running_instances.unwrap_or(0) == 0 {
            return Err(CloudError::NoRunningInstances(app.to_string()));
        }
        Ok(stats)
    }
}
