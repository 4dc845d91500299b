//! Control-plane gateway.
//!
//! The gateway is the only component that talks to the controller. It
//! performs one blocking request and hands back the status code and raw
//! payload; interpreting statuses is the job of [`ControlPlane`].
//!
//! # Components
//!
//! - **`ControlPlaneGateway`**: transport contract (implemented by
//!   [`HttpGateway`] and by in-memory fakes in tests)
//! - **`api`**: typed endpoints over any gateway
//! - **`wire`**: payload shapes for introspection endpoints

pub mod api;
pub mod http;
pub mod wire;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CloudError, CloudResult};

pub use api::ControlPlane;
pub use http::HttpGateway;
pub use wire::{CrashRecord, InstanceInfo, InstanceStats, TargetInfo, UpdateStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    /// Zipped application bits.
    Archive(Vec<u8>),
}

/// One request against the controller API.
///
/// The resource is kept as path segments so the transport can escape
/// each one (service names and file paths may contain anything).
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub body: Body,
}

impl GatewayRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: Body::Empty,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Post, segments)
    }

    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Put, segments)
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Delete, segments)
    }

    pub fn with_json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn with_archive(mut self, archive: Vec<u8>) -> Self {
        self.body = Body::Archive(archive);
        self
    }

    /// Unescaped path, for logs and test assertions.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Status code and raw payload returned by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn parse<T: DeserializeOwned>(&self) -> CloudResult<T> {
        serde_json::from_str(&self.body).map_err(CloudError::from)
    }

    /// Human-readable `description` carried by 400 responses.
    pub fn description(&self) -> String {
        serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| v.get("description").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| self.body.trim().to_string())
    }
}

/// Blocking transport to the controller.
///
/// Implementations must not retry: a failed call surfaces immediately as
/// [`CloudError::TransportFailure`].
pub trait ControlPlaneGateway {
    fn send(&self, request: GatewayRequest) -> CloudResult<GatewayResponse>;
}

impl<G: ControlPlaneGateway + ?Sized> ControlPlaneGateway for &G {
    fn send(&self, request: GatewayRequest) -> CloudResult<GatewayResponse> {
        (**self).send(request)
    }
}

impl<G: ControlPlaneGateway + ?Sized> ControlPlaneGateway for Box<G> {
    fn send(&self, request: GatewayRequest) -> CloudResult<GatewayResponse> {
        (**self).send(request)
    }
}
