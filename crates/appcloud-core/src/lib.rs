//! AppCloud Core Library
//!
//! Client-side deployment lifecycle for a platform-as-a-service
//! controller: application manifests, convergence polling, scaling,
//! canary rollouts and service provisioning.

pub mod bits;
pub mod catalog;
pub mod config;
pub mod context;
pub mod deploy;
pub mod detect;
pub mod error;
pub mod format;
pub mod gateway;
pub mod health;
pub mod scale;
pub mod state;
pub mod types;
pub mod update;
pub mod wait;

/// Re-exports of commonly used types
pub mod prelude {
    // Errors
    pub use crate::error::{CloudError, CloudResult};

    // Model
    pub use crate::types::{AppManifest, AppState, Price, ServiceManifest, Staging};

    // Gateway
    pub use crate::gateway::{
        ControlPlane, ControlPlaneGateway, GatewayRequest, GatewayResponse, HttpGateway,
    };

    // Convergence
    pub use crate::health::{HealthOutcome, HealthPoller};
    pub use crate::scale::{InstanceScaler, InstanceSpec, ScaleOutcome};
    pub use crate::update::{CanaryUpdateCoordinator, UpdateOutcome, UpdateStrategy};
    pub use crate::wait::{NoSleep, Sleeper, ThreadSleeper};

    // Services
    pub use crate::catalog::{Chooser, ServiceCatalog, ServiceRequest, ServiceResolver};

    // Orchestration
    pub use crate::context::AppContext;
    pub use crate::deploy::{Change, DeploymentController, UpdateRequest};
}
