//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;

use serde_json::{Value, json};

use appcloud_core::catalog::{Candidate, ChoiceLevel, Chooser, ServiceCatalog};
use appcloud_core::error::{CloudError, CloudResult};
use appcloud_core::gateway::{ControlPlaneGateway, GatewayRequest, GatewayResponse, Method};

/// In-memory controller: answers from a script and records every request.
///
/// Requests are matched against the script in order; the first route with
/// the same method and path is consumed. A route marked `repeat` stays in
/// place and answers every matching request.
#[derive(Default)]
pub struct FakeGateway {
    routes: RefCell<VecDeque<Route>>,
    requests: RefCell<Vec<GatewayRequest>>,
}

struct Route {
    method: Method,
    path: String,
    response: Result<GatewayResponse, String>,
    repeat: bool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Ok(GatewayResponse::json(status, &body)), false)
    }

    pub fn on_raw(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, Ok(GatewayResponse::new(status, body)), false)
    }

    pub fn always(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Ok(GatewayResponse::json(status, &body)), true)
    }

    pub fn fail(&self, method: Method, path: &str, reason: &str) -> &Self {
        self.push(method, path, Err(reason.to_string()), false)
    }

    fn push(
        &self,
        method: Method,
        path: &str,
        response: Result<GatewayResponse, String>,
        repeat: bool,
    ) -> &Self {
        self.routes.borrow_mut().push_back(Route {
            method,
            path: path.to_string(),
            response,
            repeat,
        });
        self
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.borrow().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .count()
    }

    /// JSON bodies sent with `method` to `path`, in order.
    pub fn bodies(&self, method: Method, path: &str) -> Vec<Value> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .filter_map(|r| match &r.body {
                appcloud_core::gateway::Body::Json(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ControlPlaneGateway for FakeGateway {
    fn send(&self, request: GatewayRequest) -> CloudResult<GatewayResponse> {
        let path = request.path();
        let method = request.method;
        self.requests.borrow_mut().push(request);

        let mut routes = self.routes.borrow_mut();
        let position = routes
            .iter()
            .position(|r| r.method == method && r.path == path)
            .unwrap_or_else(|| panic!("unscripted request: {method} {path}"));

        let response = if routes[position].repeat {
            routes[position].response.clone()
        } else {
            routes
                .remove(position)
                .map(|r| r.response)
                .unwrap_or_else(|| panic!("route vanished: {method} {path}"))
        };
        response.map_err(CloudError::TransportFailure)
    }
}

/// Manifest JSON as the controller returns it.
pub fn app(name: &str, state: &str, instances: u32, running: Option<u32>) -> Value {
    let mut app = json!({
        "name": name,
        "staging": {"model": "rails/1.0", "stack": "thin start"},
        "uris": [format!("{name}.vcap.me")],
        "instances": instances,
        "resources": {"memory": 256},
        "state": state,
        "services": [],
        "meta": {"version": 1}
    });
    if let Some(running) = running {
        app["runningInstances"] = json!(running);
    }
    app
}

pub fn app_with_services(name: &str, services: &[&str]) -> Value {
    let mut app = app(name, "STARTED", 1, Some(1));
    app["services"] = json!(services);
    app
}

/// Catalog with a single database vendor and a multi-vendor key-value
/// type. Kept as text: catalog order is document order.
pub const CATALOG: &str = r#"{
    "database": {
        "mysql": {
            "5.1": {
                "description": "MySQL database",
                "tiers": {
                    "free": {
                        "description": "Free tier",
                        "order": 1,
                        "options": {
                            "size": {
                                "type": "value",
                                "description": "Storage size",
                                "values": ["256MiB"]
                            }
                        }
                    }
                }
            }
        }
    },
    "key-value": {
        "redis": {
            "2.2": {
                "description": "Redis",
                "tiers": {
                    "std": {
                        "description": "Standard",
                        "order": 2,
                        "options": {
                            "size": {"type": "value", "values": ["256MiB", "1GiB"]}
                        },
                        "pricing": {
                            "type": "flat",
                            "period": "month",
                            "values": {"256MiB": 10, "1GiB": 25}
                        }
                    },
                    "free": {
                        "description": "Free",
                        "order": 1,
                        "options": {
                            "size": {"type": "value", "values": ["64MiB"]}
                        }
                    }
                }
            }
        },
        "memcached": {
            "1.4": {
                "tiers": {
                    "metered": {
                        "options": {
                            "size": {"type": "value", "values": ["128MiB"]}
                        },
                        "pricing": {"type": "metered", "values": {"128MiB": 1}}
                    }
                }
            }
        }
    }
}"#;

pub fn catalog() -> ServiceCatalog {
    serde_json::from_str(CATALOG).unwrap()
}

/// Chooser that answers from a queue and records what it was asked.
#[derive(Default)]
pub struct ScriptedChooser {
    picks: VecDeque<usize>,
    pub asked: Vec<(ChoiceLevel, Vec<Candidate>)>,
    pub auto: Vec<(ChoiceLevel, String)>,
    pub name: Option<String>,
}

impl ScriptedChooser {
    pub fn new(picks: &[usize]) -> Self {
        Self {
            picks: picks.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl Chooser for ScriptedChooser {
    fn choose(&mut self, level: &ChoiceLevel, candidates: &[Candidate]) -> anyhow::Result<usize> {
        self.asked.push((level.clone(), candidates.to_vec()));
        self.picks
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected choice at {}", level.noun()))
    }

    fn auto_selected(&mut self, level: &ChoiceLevel, candidate: &Candidate) {
        self.auto.push((level.clone(), candidate.key.clone()));
    }

    fn service_name(&mut self, _default: &str) -> anyhow::Result<Option<String>> {
        Ok(self.name.clone())
    }
}
