//! Deployment lifecycle orchestration.
//!
//! Every operation takes the application it acts on as an explicit
//! parameter; the controller keeps no per-command context between calls.
//!
//! Mutations are fetch-modify-write: the current manifest is read, one
//! field is changed and the full manifest is written back. There is no
//! version token, so two concurrent mutations of the same application
//! race and the last writer wins.

mod introspect;
mod report;
mod services;

use tracing::info;

use crate::bits::Bits;
use crate::config::{PollingConfig, strip_scheme};
use crate::error::{CloudError, CloudResult};
use crate::gateway::{ControlPlane, ControlPlaneGateway, TargetInfo};
use crate::health::{HealthOutcome, HealthPoller};
use crate::scale::{InstanceScaler, InstanceSpec, ScaleOutcome};
use crate::state::InstanceMapStore;
use crate::types::{AppManifest, AppState, ServiceManifest};
use crate::update::{CanaryUpdateCoordinator, UpdateStrategy};
use crate::wait::{Sleeper, ThreadSleeper};

pub use introspect::{DEFAULT_FILES_PATH, DEFAULT_INSTANCE};
pub use report::{
    Change, DeleteReport, LabelledCrash, PushReport, RestartReport, UpdateReport, UpdateResult,
};

/// Decides, per bound service, whether `delete` releases it.
///
/// Called as `decide(app, service)`; `true` releases the service.
pub type ReleaseDecision<'a> = dyn FnMut(&str, &str) -> anyhow::Result<bool> + 'a;

/// Options for [`DeploymentController::update`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateRequest {
    /// New memory reservation in MiB, applied before the bits.
    pub memory: Option<u32>,
    pub strategy: UpdateStrategy,
}

impl UpdateRequest {
    pub fn with_memory(mut self, memory: Option<u32>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

pub struct DeploymentController<G, S = ThreadSleeper> {
    control: ControlPlane<G>,
    instance_map: InstanceMapStore,
    polling: PollingConfig,
    sleeper: S,
}

impl<G: ControlPlaneGateway> DeploymentController<G, ThreadSleeper> {
    pub fn new(control: ControlPlane<G>, instance_map: InstanceMapStore, polling: PollingConfig) -> Self {
        Self {
            control,
            instance_map,
            polling,
            sleeper: ThreadSleeper,
        }
    }
}

impl<G: ControlPlaneGateway, S: Sleeper> DeploymentController<G, S> {
    /// Replace the sleep used by the poll loops.
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> DeploymentController<G, T> {
        DeploymentController {
            control: self.control,
            instance_map: self.instance_map,
            polling: self.polling,
            sleeper,
        }
    }

    pub fn control(&self) -> &ControlPlane<G> {
        &self.control
    }

    pub fn instance_map(&self) -> &InstanceMapStore {
        &self.instance_map
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    // --- Target ---

    pub fn info(&self) -> CloudResult<TargetInfo> {
        self.control.info()
    }

    /// Fetch `/info` and check it looks like a controller.
    pub fn validate_target(&self, target: &str) -> CloudResult<TargetInfo> {
        let info = match self.control.info() {
            Ok(info) => info,
            Err(CloudError::TransportFailure(_) | CloudError::MalformedResponse(_)) => {
                return Err(CloudError::InvalidTarget(target.to_string()));
            }
            Err(e) => return Err(e),
        };
        if !info.is_complete() {
            return Err(CloudError::InvalidTarget(target.to_string()));
        }
        Ok(info)
    }

    // --- Lifecycle ---

    pub fn list_apps(&self) -> CloudResult<Vec<AppManifest>> {
        self.control.list_apps()
    }

    /// Register a new application; fails if the name is taken.
    pub fn create(&self, manifest: &AppManifest) -> CloudResult<()> {
        if self.control.find_app(&manifest.name)?.is_some() {
            return Err(CloudError::AlreadyExists(manifest.name.clone()));
        }
        self.control.create_app(manifest)?;
        info!(app = %manifest.name, instances = manifest.instances, "application created");
        Ok(())
    }

    /// Create, optionally provision and bind a database, upload and start.
    pub fn push(
        &self,
        manifest: &AppManifest,
        bits: Bits,
        database: Option<&ServiceManifest>,
    ) -> CloudResult<PushReport> {
        let app = manifest.name.as_str();
        self.create(manifest)?;

        let database = match database {
            Some(service) => {
                self.control.provision_service(service)?;
                self.bind_service(app, &service.name)?;
                Some(service.name.clone())
            }
            None => None,
        };

        let size = bits.size_label();
        let fingerprint = bits.fingerprint.clone();
        self.control.upload_bits(app, bits.into_archive())?;
        info!(app, %size, %fingerprint, "application bits uploaded");

        let started = self.start(app)?;
        Ok(PushReport {
            app: app.to_string(),
            size,
            fingerprint,
            database,
            started,
        })
    }

    /// Set desired state to STARTED; a no-op if already started.
    pub fn start(&self, app: &str) -> CloudResult<Change> {
        let change = self.set_state(app, AppState::Started, "starting application")?;
        if change.is_applied() {
            info!(app, "application started");
        }
        Ok(change)
    }

    /// Set desired state to STOPPED; a no-op if already stopped.
    pub fn stop(&self, app: &str) -> CloudResult<Change> {
        let change = self.set_state(app, AppState::Stopped, "stopping application")?;
        if change.is_applied() {
            info!(app, "application stopped");
        }
        Ok(change)
    }

    /// Stop then start. A failed stop aborts before the start.
    pub fn restart(&self, app: &str) -> CloudResult<RestartReport> {
        let stopped = self.stop(app)?;
        let started = self.start(app)?;
        Ok(RestartReport { stopped, started })
    }

    fn set_state(&self, app: &str, state: AppState, operation: &str) -> CloudResult<Change> {
        self.modify(app, operation, |manifest| {
            if manifest.state == state {
                return Ok(false);
            }
            manifest.state = state;
            Ok(true)
        })
    }

    /// Delete `app`, releasing each bound service `decide` approves.
    ///
    /// Services are never released without an explicit yes.
    pub fn delete(&self, app: &str, decide: &mut ReleaseDecision<'_>) -> CloudResult<DeleteReport> {
        let manifest = self.control.get_app(app)?;
        let mut released = Vec::new();
        for service in &manifest.services {
            if decide(app, service)? {
                released.push(service.clone());
            }
        }
        self.control.delete_app(app, &released)?;
        info!(app, released = ?released, "application deleted");
        Ok(DeleteReport {
            app: app.to_string(),
            released,
        })
    }

    /// Delete every application, each with its own release decisions.
    pub fn delete_all(&self, decide: &mut ReleaseDecision<'_>) -> CloudResult<Vec<DeleteReport>> {
        let apps = self.control.list_apps()?;
        apps.iter()
            .map(|manifest| self.delete(&manifest.name, &mut *decide))
            .collect()
    }

    /// Roll new bits out with the requested strategy.
    ///
    /// `on_phase` sees each distinct rollout phase (canary strategy only).
    pub fn update(
        &self,
        app: &str,
        request: UpdateRequest,
        bits: Bits,
        on_phase: &mut dyn FnMut(&str),
    ) -> CloudResult<UpdateReport> {
        let mut manifest = self.control.get_app(app)?;

        let mut memory = None;
        if let Some(new_memory) = request.memory
            && new_memory != manifest.resources.memory
        {
            let old_memory = manifest.resources.memory;
            manifest.resources.memory = new_memory;
            self.control
                .update_app(&manifest, "updating memory reservation for")?;
            info!(app, from = old_memory, to = new_memory, "memory reservation updated");
            memory = Some((old_memory, new_memory));
        }

        let result = match request.strategy {
            UpdateStrategy::Restart => {
                self.control.upload_bits(app, bits.into_archive())?;
                UpdateResult::Restarted(self.restart(app)?)
            }
            UpdateStrategy::Canary => {
                let coordinator = CanaryUpdateCoordinator::new(
                    &self.control,
                    &self.instance_map,
                    &self.sleeper,
                    self.polling.update_interval(),
                    self.polling.update_timeout(),
                );
                UpdateResult::Rolled(coordinator.run_update(app, bits.into_archive(), on_phase)?)
            }
        };

        Ok(UpdateReport { memory, result })
    }

    /// Scale `app` by a relative or absolute instruction.
    pub fn scale(&self, app: &str, spec: InstanceSpec) -> CloudResult<ScaleOutcome> {
        let manifest = self.control.get_app(app)?;
        InstanceScaler::new(&self.control).scale(&manifest, spec)
    }

    /// Poll until `app` reaches `target` health or the configured budget
    /// runs out.
    pub fn await_health(&self, app: &str, target: f64) -> CloudResult<HealthOutcome> {
        HealthPoller::new(&self.control, &self.sleeper, self.polling.health_interval())
            .await_health(app, target, self.polling.health_timeout())
    }

    // --- Routing ---

    /// Add `uri` to the app's routes; already mapped is a no-op.
    pub fn map_uri(&self, app: &str, uri: &str) -> CloudResult<Change> {
        let uri = strip_scheme(uri).to_string();
        self.modify(app, "mapping url for", |manifest| {
            if manifest.uris.contains(&uri) {
                return Ok(false);
            }
            manifest.uris.push(uri.clone());
            Ok(true)
        })
    }

    /// Remove a previously mapped `uri`.
    pub fn unmap_uri(&self, app: &str, uri: &str) -> CloudResult<Change> {
        let uri = strip_scheme(uri).to_string();
        self.modify(app, "unmapping url for", |manifest| {
            let before = manifest.uris.len();
            manifest.uris.retain(|u| u != &uri);
            if manifest.uris.len() == before {
                return Err(CloudError::UriNotMapped {
                    app: manifest.name.clone(),
                    uri: uri.clone(),
                });
            }
            Ok(true)
        })
    }

    // --- Service bindings ---

    /// Bind an existing service; already bound is a no-op.
    ///
    /// Fails with `NotFound` before touching the app if `service` has not
    /// been provisioned.
    pub fn attach_service(&self, app: &str, service: &str) -> CloudResult<Change> {
        self.control.get_service(service)?;
        self.bind_service(app, service)
    }

    fn bind_service(&self, app: &str, service: &str) -> CloudResult<Change> {
        self.modify(app, "binding service to", |manifest| {
            if manifest.is_bound_to(service) {
                return Ok(false);
            }
            manifest.services.push(service.to_string());
            Ok(true)
        })
    }

    /// Unbind a service; not bound is a no-op.
    pub fn detach_service(&self, app: &str, service: &str) -> CloudResult<Change> {
        self.modify(app, "unbinding service from", |manifest| {
            if !manifest.is_bound_to(service) {
                return Ok(false);
            }
            manifest.services.retain(|s| s != service);
            Ok(true)
        })
    }

    /// Fetch, mutate and write back. `mutate` returns whether anything
    /// changed; unchanged manifests are not written.
    fn modify<F>(&self, app: &str, operation: &str, mutate: F) -> CloudResult<Change>
    where
        F: FnOnce(&mut AppManifest) -> CloudResult<bool>,
    {
        let mut manifest = self.control.get_app(app)?;
        if !mutate(&mut manifest)? {
            return Ok(Change::Unchanged);
        }
        self.control.update_app(&manifest, operation)?;
        Ok(Change::Applied)
    }
}
