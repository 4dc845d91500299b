//! Provisioned services.

use tracing::info;

use super::DeploymentController;
use crate::catalog::{Chooser, DirectoryEntry, ServiceRequest, ServiceResolver, directory};
use crate::error::CloudResult;
use crate::gateway::ControlPlaneGateway;
use crate::types::ServiceManifest;
use crate::wait::Sleeper;

impl<G: ControlPlaneGateway, S: Sleeper> DeploymentController<G, S> {
    pub fn list_services(&self) -> CloudResult<Vec<ServiceManifest>> {
        self.control.list_services()
    }

    /// Services bound to `app`, in binding order.
    pub fn app_services(&self, app: &str) -> CloudResult<Vec<ServiceManifest>> {
        let manifest = self.control.get_app(app)?;
        manifest
            .services
            .iter()
            .map(|name| self.control.get_service(name))
            .collect()
    }

    /// Catalog flattened to type/vendor/version rows.
    pub fn service_directory(&self) -> CloudResult<Vec<DirectoryEntry>> {
        Ok(directory(&self.control.service_catalog()?))
    }

    /// Resolve `request` against the live catalog without provisioning.
    pub fn resolve_service(
        &self,
        request: &ServiceRequest,
        chooser: &mut dyn Chooser,
    ) -> CloudResult<ServiceManifest> {
        let catalog = self.control.service_catalog()?;
        ServiceResolver::new(&catalog).resolve(request, chooser)
    }

    /// Resolve and provision a new service.
    ///
    /// Resolution failures surface before anything is sent.
    pub fn provision_service(
        &self,
        request: &ServiceRequest,
        chooser: &mut dyn Chooser,
    ) -> CloudResult<ServiceManifest> {
        let manifest = self.resolve_service(request, chooser)?;
        self.control.provision_service(&manifest)?;
        info!(
            service = %manifest.name,
            vendor = %manifest.vendor,
            tier = %manifest.tier,
            price = ?manifest.price.as_ref().map(ToString::to_string),
            "service provisioned"
        );
        Ok(manifest)
    }

    pub fn release_service(&self, name: &str) -> CloudResult<()> {
        self.control.release_service(name)?;
        info!(service = name, "service released");
        Ok(())
    }
}
