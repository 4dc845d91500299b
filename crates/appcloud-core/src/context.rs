//! Application context for dependency injection.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{ClientConfig, ConfigStore};
use crate::deploy::DeploymentController;
use crate::gateway::{ControlPlane, HttpGateway};
use crate::state::{InstanceMapStore, load_token};

const APP_DIR: &str = "appcloud";

/// Paths shared by every command.
///
/// Front ends create this once per invocation and build the controller
/// from it; nothing here outlives the command.
#[derive(Debug, Clone)]
pub struct AppContext {
    config_dir: PathBuf,
    state_dir: PathBuf,
}

impl AppContext {
    /// Create a context with explicit paths.
    pub fn new(config_dir: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            config_dir,
            state_dir,
        }
    }

    /// Create a context from the platform's standard directories.
    pub fn from_env() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        let config_dir = dirs::config_dir()
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| home.join(".config").join(APP_DIR));
        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| home.join(".local").join("state").join(APP_DIR));
        Ok(Self::new(config_dir, state_dir))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::from_dir(&self.config_dir)
    }

    pub fn instance_map(&self) -> InstanceMapStore {
        InstanceMapStore::new(&self.state_dir)
    }

    pub fn load_config(&self) -> anyhow::Result<ClientConfig> {
        self.config_store().load()
    }

    pub fn load_token(&self) -> anyhow::Result<Option<String>> {
        load_token(&self.state_dir)
    }

    /// HTTP gateway for `config`'s target, authenticated with the stored
    /// token when there is one.
    pub fn gateway(&self, config: &ClientConfig) -> anyhow::Result<HttpGateway> {
        let token = self.load_token()?;
        Ok(HttpGateway::new(config.base_url()?, token)?.with_proxy_user(config.proxy_user.clone()))
    }

    /// Controller for `config`'s target.
    pub fn controller(&self, config: &ClientConfig) -> anyhow::Result<DeploymentController<HttpGateway>> {
        let gateway = self.gateway(config)?;
        Ok(DeploymentController::new(
            ControlPlane::new(gateway),
            self.instance_map(),
            config.polling.clone(),
        ))
    }
}
