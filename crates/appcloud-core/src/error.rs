//! Error types for control-plane operations.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors surfaced by the deployment lifecycle engine.
///
/// Display strings are user-facing: the CLI prints them verbatim at its
/// single error boundary.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{kind} '{name}' does not exist{}", hint_suffix(.hint))]
    NotFound {
        kind: &'static str,
        name: String,
        hint: Option<&'static str>,
    },

    #[error("application '{0}' already exists, use update or delete")]
    AlreadyExists(String),

    #[error("{0}")]
    ValidationRejected(String),

    #[error("access denied, please login or register")]
    AccessDenied,

    #[error("invalid number of instances '{0}', expected <num>, +<delta> or -<delta>")]
    InvalidInstanceSpec(String),

    #[error("there must be at least 1 instance (requested {0})")]
    InstanceCountTooLow(i64),

    #[error("problem updating number of instances for '{app}' (HTTP {status})")]
    ScalingRequestRejected { app: String, status: u16 },

    #[error("could not find {level} '{key}'{}", context_suffix(.context))]
    UnknownCatalogEntry {
        level: &'static str,
        key: String,
        context: String,
    },

    #[error("pricing model '{0}' is not supported")]
    UnsupportedPricingModel(String),

    #[error("update of '{app}' did not finish in time (last state: {last_state})")]
    UpdateTimedOut { app: String, last_state: String },

    #[error("unable to contact target server: {0}")]
    TransportFailure(String),

    #[error("problem {operation} (HTTP {status})")]
    RequestRejected { operation: String, status: u16 },

    #[error("'{uri}' is not mapped to '{app}', you can only unmap a previously registered URL")]
    UriNotMapped { app: String, uri: String },

    #[error("no running instances for '{0}'")]
    NoRunningInstances(String),

    #[error("new target host is not valid: '{0}'")]
    InvalidTarget(String),

    #[error("malformed response from controller: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CloudError {
    /// Missing application, with the usual corrective hint.
    pub fn app_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "application",
            name: name.into(),
            hint: Some("use push first"),
        }
    }

    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "service",
            name: name.into(),
            hint: None,
        }
    }

    /// True for errors raised before any request reached the controller.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidInstanceSpec(_)
                | Self::InstanceCountTooLow(_)
                | Self::UnknownCatalogEntry { .. }
                | Self::UnsupportedPricingModel(_)
        )
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    hint.map(|h| format!(", {h}")).unwrap_or_default()
}

fn context_suffix(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" for {context}")
    }
}
