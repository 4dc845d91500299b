//! Typed controller endpoints.
//!
//! Wraps any [`ControlPlaneGateway`] and turns status codes into
//! [`CloudError`] values. 403 is always `AccessDenied` and 400 always
//! carries the controller's description verbatim.

use serde_json::json;
use tracing::debug;

use super::wire::{
    CrashesEnvelope, InstancesEnvelope, StatsPayload, TargetInfo, UpdateStatus,
};
use super::{ControlPlaneGateway, CrashRecord, GatewayRequest, GatewayResponse, InstanceInfo, InstanceStats};
use crate::catalog::ServiceCatalog;
use crate::error::{CloudError, CloudResult};
use crate::types::{AppManifest, ServiceManifest};

const APPS: &str = "apps";
const SERVICES: &str = "services";
const INFO: &str = "info";

#[derive(Debug, Clone)]
pub struct ControlPlane<G> {
    gateway: G,
}

impl<G: ControlPlaneGateway> ControlPlane<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn send(&self, request: GatewayRequest) -> CloudResult<GatewayResponse> {
        let method = request.method;
        let path = request.path();
        let response = self.gateway.send(request)?;
        debug!(%method, %path, status = response.status, "control plane request");
        Ok(response)
    }

    // --- Target ---

    pub fn info(&self) -> CloudResult<TargetInfo> {
        let response = self.send(GatewayRequest::get([INFO]))?;
        check(&response, || "contacting target".to_string())?;
        response.parse()
    }

    // --- Applications ---

    pub fn list_apps(&self) -> CloudResult<Vec<AppManifest>> {
        let response = self.send(GatewayRequest::get([APPS]))?;
        check(&response, || "listing applications".to_string())?;
        response.parse()
    }

    /// Fetch an application, `None` if the controller doesn't know it.
    pub fn find_app(&self, name: &str) -> CloudResult<Option<AppManifest>> {
        let response = self.send(GatewayRequest::get([APPS, name]))?;
        if response.status == 404 {
            return Ok(None);
        }
        check(&response, || format!("fetching application '{name}'"))?;
        response.parse().map(Some)
    }

    pub fn get_app(&self, name: &str) -> CloudResult<AppManifest> {
        self.find_app(name)?
            .ok_or_else(|| CloudError::app_not_found(name))
    }

    pub fn create_app(&self, manifest: &AppManifest) -> CloudResult<()> {
        let request = GatewayRequest::post([APPS]).with_json(serde_json::to_value(manifest)?);
        let response = self.send(request)?;
        check(&response, || format!("creating application '{}'", manifest.name))
    }

    /// PUT the full manifest and return the raw response.
    ///
    /// Callers that need their own rejection error (scaling) inspect the
    /// status; everyone else uses [`ControlPlane::update_app`].
    pub fn put_app(&self, manifest: &AppManifest) -> CloudResult<GatewayResponse> {
        let request =
            GatewayRequest::put([APPS, manifest.name.as_str()]).with_json(serde_json::to_value(manifest)?);
        self.send(request)
    }

    pub fn update_app(&self, manifest: &AppManifest, operation: &str) -> CloudResult<()> {
        let response = self.put_app(manifest)?;
        check(&response, || format!("{operation} '{}'", manifest.name))
    }

    /// Delete an application, releasing `services` in the same request.
    pub fn delete_app(&self, name: &str, services: &[String]) -> CloudResult<()> {
        let request = GatewayRequest::delete([APPS, name]).with_json(json!({ "services": services }));
        let response = self.send(request)?;
        if response.status == 404 {
            return Err(CloudError::app_not_found(name));
        }
        check(&response, || format!("deleting application '{name}'"))
    }

    /// Upload zipped application bits.
    pub fn upload_bits(&self, name: &str, archive: Vec<u8>) -> CloudResult<()> {
        let request = GatewayRequest::put([APPS, name, "application"]).with_archive(archive);
        let response = self.send(request)?;
        check(&response, || format!("uploading application '{name}'"))
    }

    pub fn trigger_update(&self, name: &str) -> CloudResult<()> {
        let response = self.send(GatewayRequest::post([APPS, name, "update"]))?;
        check(&response, || format!("updating application '{name}'"))
    }

    pub fn update_status(&self, name: &str) -> CloudResult<UpdateStatus> {
        let response = self.send(GatewayRequest::get([APPS, name, "update"]))?;
        check(&response, || format!("polling update of '{name}'"))?;
        response.parse()
    }

    // --- Introspection ---

    /// Running instances; the controller answers `[]` when none run.
    pub fn instances(&self, name: &str) -> CloudResult<Vec<InstanceInfo>> {
        let response = self.send(GatewayRequest::get([APPS, name, "instances"]))?;
        not_found_is_app(&response, name)?;
        check(&response, || format!("fetching instances of '{name}'"))?;

        let value: serde_json::Value = response.parse()?;
        if value.is_array() {
            return Ok(Vec::new());
        }
        let envelope: InstancesEnvelope = serde_json::from_value(value)?;
        Ok(envelope.instances)
    }

    pub fn crashes(&self, name: &str) -> CloudResult<Vec<CrashRecord>> {
        let response = self.send(GatewayRequest::get([APPS, name, "crashes"]))?;
        not_found_is_app(&response, name)?;
        check(&response, || format!("fetching crashes of '{name}'"))?;
        let envelope: CrashesEnvelope = response.parse()?;
        Ok(envelope.crashes)
    }

    /// Per-instance stats keyed by instance index; instances without
    /// stats are skipped.
    pub fn stats(&self, name: &str) -> CloudResult<Vec<(u32, InstanceStats)>> {
        let response = self.send(GatewayRequest::get([APPS, name, "stats"]))?;
        not_found_is_app(&response, name)?;
        if response.status == 400 {
            return Err(CloudError::ValidationRejected(
                "information not available, is instance index out of bounds?".to_string(),
            ));
        }
        check(&response, || format!("fetching stats of '{name}'"))?;

        let payload: StatsPayload = response.parse()?;
        let mut stats = Vec::new();
        for (index, entry) in payload {
            let index: u32 = index.parse().map_err(|_| {
                CloudError::MalformedResponse(format!("invalid instance index '{index}'"))
            })?;
            if let Some(s) = entry.stats {
                stats.push((index, s));
            }
        }
        stats.sort_by_key(|(index, _)| *index);
        Ok(stats)
    }

    /// Directory listing or file content from one instance.
    pub fn files(&self, name: &str, instance: &str, path: &str) -> CloudResult<String> {
        let mut segments = vec![APPS, name, "instances", instance, "files"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let response = self.send(GatewayRequest::get(segments))?;
        not_found_is_app(&response, name)?;
        if response.status == 400 {
            return Err(CloudError::ValidationRejected(
                "information not available, either pathinfo is incorrect or instance index is out of bounds"
                    .to_string(),
            ));
        }
        check(&response, || format!("fetching files of '{name}'"))?;
        Ok(response.body)
    }

    // --- Services ---

    pub fn service_catalog(&self) -> CloudResult<ServiceCatalog> {
        let response = self.send(GatewayRequest::get([INFO, SERVICES]))?;
        check(&response, || "getting services list".to_string())?;
        response.parse()
    }

    pub fn list_services(&self) -> CloudResult<Vec<ServiceManifest>> {
        let response = self.send(GatewayRequest::get([SERVICES]))?;
        check(&response, || "getting services list".to_string())?;
        response.parse()
    }

    pub fn get_service(&self, name: &str) -> CloudResult<ServiceManifest> {
        let response = self.send(GatewayRequest::get([SERVICES, name]))?;
        if response.status == 404 {
            return Err(CloudError::service_not_found(name));
        }
        check(&response, || format!("getting service '{name}'"))?;
        response.parse()
    }

    pub fn provision_service(&self, manifest: &ServiceManifest) -> CloudResult<()> {
        let request = GatewayRequest::post([SERVICES]).with_json(serde_json::to_value(manifest)?);
        let response = self.send(request)?;
        check(&response, || "provisioning services".to_string())
    }

    pub fn release_service(&self, name: &str) -> CloudResult<()> {
        let response = self.send(GatewayRequest::delete([SERVICES, name]))?;
        if response.status == 404 {
            return Err(CloudError::service_not_found(name));
        }
        check(&response, || format!("removing service '{name}'"))
    }
}

/// Map a non-success response to the shared error taxonomy.
pub(crate) fn check(response: &GatewayResponse, operation: impl FnOnce() -> String) -> CloudResult<()> {
    match response.status {
        _ if response.is_success() => Ok(()),
        403 => Err(CloudError::AccessDenied),
        400 => Err(CloudError::ValidationRejected(response.description())),
        status => Err(CloudError::RequestRejected {
            operation: operation(),
            status,
        }),
    }
}

fn not_found_is_app(response: &GatewayResponse, name: &str) -> CloudResult<()> {
    if response.status == 404 {
        Err(CloudError::app_not_found(name))
    } else {
        Ok(())
    }
}
