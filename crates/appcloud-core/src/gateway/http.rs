//! HTTP transport over reqwest.
//!
//! The client is async; each request is driven to completion on a
//! private current-thread tokio runtime so callers stay blocking.

use std::time::Duration;

use anyhow::Context;
use url::Url;

use super::{Body, ControlPlaneGateway, GatewayRequest, GatewayResponse, Method};
use crate::error::{CloudError, CloudResult};

const USER_AGENT: &str = concat!("appcloud/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpGateway {
    base_url: Url,
    token: Option<String>,
    proxy_user: Option<String>,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpGateway {
    pub fn new(base_url: Url, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;

        Ok(Self {
            base_url,
            token,
            proxy_user: None,
            client,
            runtime,
        })
    }

    /// Act on behalf of another user.
    pub fn with_proxy_user(mut self, proxy_user: Option<String>) -> Self {
        self.proxy_user = proxy_user;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a request, each segment percent-escaped.
    pub fn url_for(&self, segments: &[String]) -> CloudResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::InvalidTarget(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, request: GatewayRequest) -> CloudResult<GatewayResponse> {
        let url = self.url_for(&request.segments)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url.clone());
        if let Some(token) = &self.token {
            builder = builder.header("AUTHORIZATION", token);
        }
        if let Some(user) = &self.proxy_user {
            builder = builder.header("PROXY-USER", user);
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Archive(bytes) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/zip")
                .body(bytes),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CloudError::TransportFailure(format!("{url}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CloudError::TransportFailure(format!("{url}: {e}")))?;

        Ok(GatewayResponse { status, body })
    }
}

impl ControlPlaneGateway for HttpGateway {
    fn send(&self, request: GatewayRequest) -> CloudResult<GatewayResponse> {
        self.runtime.block_on(self.execute(request))
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token.is_some())
            .field("proxy_user", &self.proxy_user)
            .finish()
    }
}
