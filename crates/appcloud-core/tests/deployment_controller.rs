//! Lifecycle orchestration over a scripted controller.

mod support;

use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use appcloud_core::bits;
use appcloud_core::config::PollingConfig;
use appcloud_core::deploy::{
    Change, DeploymentController, RestartReport, UpdateRequest, UpdateResult,
};
use appcloud_core::error::CloudError;
use appcloud_core::gateway::{ControlPlane, Method};
use appcloud_core::scale::InstanceSpec;
use appcloud_core::state::InstanceMapStore;
use appcloud_core::types::{AppManifest, ServiceManifest, Staging};
use appcloud_core::update::{UpdateOutcome, UpdateStrategy};
use appcloud_core::wait::NoSleep;

use support::{FakeGateway, app, app_with_services};

fn controller<'g>(
    gateway: &'g FakeGateway,
    temp: &TempDir,
) -> DeploymentController<&'g FakeGateway, NoSleep> {
    DeploymentController::new(
        ControlPlane::new(gateway),
        InstanceMapStore::new(temp.path()),
        PollingConfig::default(),
    )
    .with_sleeper(NoSleep)
}

fn last_put(gateway: &FakeGateway, path: &str) -> Value {
    gateway
        .bodies(Method::Put, path)
        .pop()
        .unwrap_or_else(|| panic!("no PUT to {path}"))
}

fn service(name: &str) -> Value {
    json!({
        "name": name,
        "type": "database",
        "vendor": "mysql",
        "version": "5.1",
        "tier": "free",
        "options": {}
    })
}

fn small_bits(temp: &TempDir) -> bits::Bits {
    let dir = temp.path().join("app");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("app.js"), "console.log('hi')").unwrap();
    bits::package(&dir, None).unwrap()
}

#[test]
fn start_writes_started_state() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STOPPED", 1, None))
        .on(Method::Put, "/apps/blog", 200, json!({}));

    let change = controller(&gateway, &temp).start("blog").unwrap();

    assert_eq!(change, Change::Applied);
    let sent = last_put(&gateway, "/apps/blog");
    assert_eq!(sent["state"], "STARTED");
    assert_eq!(sent["meta"]["version"], 1);
}

#[test]
fn start_and_stop_are_idempotent() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Get, "/apps/docs", 200, app("docs", "STOPPED", 1, None));
    let controller = controller(&gateway, &temp);

    assert_eq!(controller.start("blog").unwrap(), Change::Unchanged);
    assert_eq!(controller.stop("docs").unwrap(), Change::Unchanged);
    assert_eq!(gateway.count(Method::Put, "/apps/blog"), 0);
    assert_eq!(gateway.count(Method::Put, "/apps/docs"), 0);
}

#[test]
fn missing_app_suggests_push() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on(Method::Get, "/apps/ghost", 404, json!({}));

    let err = controller(&gateway, &temp).start("ghost").unwrap_err();
    assert_eq!(
        err.to_string(),
        "application 'ghost' does not exist, use push first"
    );
}

#[test]
fn restart_stops_then_starts() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 2, Some(2)))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app("blog", "STOPPED", 2, None))
        .on(Method::Put, "/apps/blog", 200, json!({}));

    let report = controller(&gateway, &temp).restart("blog").unwrap();

    assert_eq!(
        report,
        RestartReport {
            stopped: Change::Applied,
            started: Change::Applied
        }
    );
    let states: Vec<Value> = gateway
        .bodies(Method::Put, "/apps/blog")
        .into_iter()
        .map(|b| b["state"].clone())
        .collect();
    assert_eq!(states, [json!("STOPPED"), json!("STARTED")]);
}

#[test]
fn failed_stop_aborts_restart() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Put, "/apps/blog", 500, json!({}));

    let err = controller(&gateway, &temp).restart("blog").unwrap_err();

    assert!(matches!(err, CloudError::RequestRejected { status: 500, .. }));
    assert_eq!(gateway.requests().len(), 2);
}

#[test]
fn create_refuses_existing_name() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)));

    let manifest = AppManifest::new("blog", Staging::default(), 128);
    let err = controller(&gateway, &temp).create(&manifest).unwrap_err();

    assert!(matches!(err, CloudError::AlreadyExists(ref name) if name == "blog"));
    assert_eq!(gateway.count(Method::Post, "/apps"), 0);
}

#[test]
fn create_passes_validation_description_through() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 404, json!({}))
        .on(
            Method::Post,
            "/apps",
            400,
            json!({"code": 100, "description": "Invalid URI: 'blog.example'"}),
        );

    let manifest = AppManifest::new("blog", Staging::default(), 128);
    let err = controller(&gateway, &temp).create(&manifest).unwrap_err();

    assert!(matches!(err, CloudError::ValidationRejected(ref d) if d == "Invalid URI: 'blog.example'"));
}

#[test]
fn forbidden_is_access_denied() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on(Method::Get, "/apps", 403, json!({}));

    let err = controller(&gateway, &temp).list_apps().unwrap_err();
    assert_eq!(err.to_string(), "access denied, please login or register");
}

#[test]
fn transport_failures_propagate_without_retry() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.fail(Method::Get, "/apps/blog", "connection refused");

    let err = controller(&gateway, &temp).stop("blog").unwrap_err();
    assert!(matches!(err, CloudError::TransportFailure(_)));
    assert_eq!(gateway.requests().len(), 1);
}

#[test]
fn push_creates_binds_uploads_and_starts() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    let created = app("blog", "STOPPED", 1, None);
    let mut bound = created.clone();
    bound["services"] = json!(["blog_database"]);
    gateway
        .on(Method::Get, "/apps/blog", 404, json!({}))
        .on(Method::Post, "/apps", 201, json!({}))
        .on(Method::Post, "/services", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, created)
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Put, "/apps/blog/application", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, bound)
        .on(Method::Put, "/apps/blog", 200, json!({}));

    let manifest = AppManifest::new(
        "blog",
        Staging {
            model: "rails/1.0".to_string(),
            stack: Some("thin start".to_string()),
        },
        256,
    )
    .with_uri("blog.vcap.me");
    let database = ServiceManifest {
        name: "blog_database".to_string(),
        service_type: "database".to_string(),
        vendor: "mysql".to_string(),
        version: "5.1".to_string(),
        tier: "free".to_string(),
        options: Default::default(),
        price: None,
    };

    let bits = small_bits(&temp);
    let report = controller(&gateway, &temp)
        .push(&manifest, bits, Some(&database))
        .unwrap_or_else(|e| panic!("push failed: {e}"));

    assert_eq!(report.database.as_deref(), Some("blog_database"));
    assert!(report.size.ends_with('K'));

    let posted = gateway.bodies(Method::Post, "/apps");
    assert_eq!(posted[0]["staging"]["model"], "rails/1.0");
    assert_eq!(posted[0]["uris"], json!(["blog.vcap.me"]));
    assert_eq!(posted[0]["state"], "STOPPED");

    let puts = gateway.bodies(Method::Put, "/apps/blog");
    assert_eq!(puts[0]["services"], json!(["blog_database"]));
    assert_eq!(puts[1]["state"], "STARTED");

    let order: Vec<String> = gateway
        .requests()
        .iter()
        .map(|r| format!("{} {}", r.method, r.path()))
        .collect();
    assert_eq!(
        order,
        [
            "GET /apps/blog",
            "POST /apps",
            "POST /services",
            "GET /apps/blog",
            "PUT /apps/blog",
            "PUT /apps/blog/application",
            "GET /apps/blog",
            "PUT /apps/blog",
        ]
    );
}

#[test]
fn delete_releases_only_confirmed_services() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app_with_services("blog", &["db", "cache"]))
        .on(Method::Delete, "/apps/blog", 200, json!({}));

    let mut asked = Vec::new();
    let report = controller(&gateway, &temp)
        .delete("blog", &mut |app: &str, service: &str| {
            asked.push(format!("{app}/{service}"));
            Ok(service == "cache")
        })
        .unwrap();

    assert_eq!(asked, ["blog/db", "blog/cache"]);
    assert_eq!(report.released, ["cache"]);
    assert_eq!(
        gateway.bodies(Method::Delete, "/apps/blog"),
        [json!({"services": ["cache"]})]
    );
}

#[test]
fn delete_all_walks_every_app() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(
            Method::Get,
            "/apps",
            200,
            json!([app("blog", "STARTED", 1, Some(1)), app("docs", "STOPPED", 1, None)]),
        )
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Delete, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/docs", 200, app_with_services("docs", &["db"]))
        .on(Method::Delete, "/apps/docs", 200, json!({}));

    let reports = controller(&gateway, &temp)
        .delete_all(&mut |_: &str, _: &str| Ok(false))
        .unwrap();

    let names: Vec<&str> = reports.iter().map(|r| r.app.as_str()).collect();
    assert_eq!(names, ["blog", "docs"]);
    assert!(reports.iter().all(|r| r.released.is_empty()));
}

#[test]
fn map_and_unmap_uris() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)));
    let controller = controller(&gateway, &temp);

    assert_eq!(
        controller.map_uri("blog", "http://www.blog.com").unwrap(),
        Change::Applied
    );
    assert_eq!(
        last_put(&gateway, "/apps/blog")["uris"],
        json!(["blog.vcap.me", "www.blog.com"])
    );

    // Already mapped: no write.
    assert_eq!(
        controller.map_uri("blog", "blog.vcap.me").unwrap(),
        Change::Unchanged
    );

    assert_eq!(
        controller.unmap_uri("blog", "https://blog.vcap.me").unwrap(),
        Change::Applied
    );
    assert_eq!(last_put(&gateway, "/apps/blog")["uris"], json!([]));

    let err = controller.unmap_uri("blog", "nope.vcap.me").unwrap_err();
    assert!(matches!(err, CloudError::UriNotMapped { ref uri, .. } if uri == "nope.vcap.me"));
    assert_eq!(gateway.count(Method::Put, "/apps/blog"), 2);
}

#[test]
fn attach_and_detach_use_set_semantics() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .always(Method::Get, "/services/db", 200, service("db"))
        .always(Method::Get, "/services/cache", 200, service("cache"))
        .on(Method::Get, "/apps/blog", 200, app_with_services("blog", &["db"]))
        .on(Method::Get, "/apps/blog", 200, app_with_services("blog", &["db"]))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app_with_services("blog", &["db", "cache"]))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app_with_services("blog", &["cache"]));
    let controller = controller(&gateway, &temp);

    assert_eq!(controller.attach_service("blog", "db").unwrap(), Change::Unchanged);
    assert_eq!(controller.attach_service("blog", "cache").unwrap(), Change::Applied);
    assert_eq!(
        last_put(&gateway, "/apps/blog")["services"],
        json!(["db", "cache"])
    );
    assert_eq!(controller.detach_service("blog", "db").unwrap(), Change::Applied);
    assert_eq!(last_put(&gateway, "/apps/blog")["services"], json!(["cache"]));
    assert_eq!(controller.detach_service("blog", "db").unwrap(), Change::Unchanged);
}

#[test]
fn attaching_unknown_service_is_not_found() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on(Method::Get, "/services/nosuch", 404, json!({}));

    let err = controller(&gateway, &temp)
        .attach_service("blog", "nosuch")
        .unwrap_err();

    assert!(matches!(
        err,
        CloudError::NotFound { kind: "service", ref name, .. } if name == "nosuch"
    ));
    assert_eq!(gateway.count(Method::Get, "/apps/blog"), 0);
    assert_eq!(gateway.count(Method::Put, "/apps/blog"), 0);
}

#[test]
fn scale_fetches_then_writes() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 3, Some(3)))
        .on(Method::Put, "/apps/blog", 200, json!({}));

    let outcome = controller(&gateway, &temp)
        .scale("blog", "+2".parse::<InstanceSpec>().unwrap())
        .unwrap();

    assert_eq!(outcome.count(), 5);
    assert_eq!(gateway.count(Method::Put, "/apps/blog"), 1);
}

#[test]
fn await_health_uses_configured_budget() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.always(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 2, Some(1)));
    let polling = PollingConfig {
        health_interval_ms: 500,
        health_timeout_secs: 2,
        ..PollingConfig::default()
    };
    let controller = DeploymentController::new(
        ControlPlane::new(&gateway),
        InstanceMapStore::new(temp.path()),
        polling,
    )
    .with_sleeper(NoSleep);

    let outcome = controller.await_health("blog", 1.0).unwrap();

    assert_eq!(outcome.samples, 4);
    assert_eq!(outcome.health, Some(0.5));
    assert_eq!(controller.polling().health_interval(), Duration::from_millis(500));
}

#[test]
fn update_with_restart_strategy_skips_rollout() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Put, "/apps/blog/application", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Put, "/apps/blog", 200, json!({}))
        .on(Method::Get, "/apps/blog", 200, app("blog", "STOPPED", 1, None))
        .on(Method::Put, "/apps/blog", 200, json!({}));

    let request = UpdateRequest::default()
        .with_memory(Some(512))
        .with_strategy(UpdateStrategy::Restart);
    let bits = small_bits(&temp);
    let mut phases: Vec<String> = Vec::new();
    let report = controller(&gateway, &temp)
        .update("blog", request, bits, &mut |phase: &str| phases.push(phase.to_string()))
        .unwrap();

    assert_eq!(report.memory, Some((256, 512)));
    assert!(matches!(report.result, UpdateResult::Restarted(_)));
    assert_eq!(
        gateway.bodies(Method::Put, "/apps/blog")[0]["resources"]["memory"],
        512
    );
    assert_eq!(gateway.count(Method::Post, "/apps/blog/update"), 0);
    assert!(phases.is_empty());
}

#[test]
fn update_with_canary_strategy_drives_rollout() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on(Method::Put, "/apps/blog/application", 200, json!({}))
        .on(Method::Post, "/apps/blog/update", 204, json!({}))
        .on(Method::Get, "/apps/blog/update", 200, json!({"state": "CANARY"}))
        .on(Method::Get, "/apps/blog/update", 200, json!({"state": "SUCCEEDED"}));

    let mut phases = Vec::new();
    let bits = small_bits(&temp);
    let report = controller(&gateway, &temp)
        .update(
            "blog",
            UpdateRequest::default().with_memory(Some(256)),
            bits,
            &mut |phase: &str| phases.push(phase.to_string()),
        )
        .unwrap();

    assert_eq!(report.memory, None);
    assert_eq!(report.result, UpdateResult::Rolled(UpdateOutcome::Succeeded));
    assert_eq!(phases, ["CANARY", "SUCCEEDED"]);
    assert_eq!(gateway.count(Method::Put, "/apps/blog"), 0);
}

#[test]
fn crashes_rewrite_debug_map() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on(
        Method::Get,
        "/apps/blog/crashes",
        200,
        json!({"crashes": [
            {"instance": "bbb", "since": 1300000200},
            {"instance": "aaa", "since": 1300000100}
        ]}),
    );
    let controller = controller(&gateway, &temp);
    controller.instance_map().record("blog-canary", "old").unwrap();

    let crashes = controller.crashes("blog").unwrap();

    let labels: Vec<(&str, &str)> = crashes
        .iter()
        .map(|c| (c.label.as_str(), c.crash.instance.as_str()))
        .collect();
    assert_eq!(labels, [("blog-1", "aaa"), ("blog-2", "bbb")]);

    let map = controller.instance_map().load().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["blog-2"], "bbb");
}

#[test]
fn files_resolve_instance_labels() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on_raw(Method::Get, "/apps/blog/instances/f3a9c0/files/logs/stderr.log", 200, "boom\n")
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 1, Some(1)))
        .on_raw(Method::Get, "/apps/blog/instances/0/files", 200, "logs/\n");
    let controller = controller(&gateway, &temp);
    controller.instance_map().record("blog-canary", "f3a9c0").unwrap();

    let content = controller
        .files("blog", Some("blog-canary"), Some("/logs/stderr.log"))
        .unwrap();
    assert_eq!(content, "boom\n");

    let listing = controller.files("blog", None, None).unwrap();
    assert_eq!(listing, "logs/\n");
}

#[test]
fn instances_and_stats_are_sorted_by_index() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(
            Method::Get,
            "/apps/blog/instances",
            200,
            json!({"instances": [
                {"index": 1, "state": "RUNNING", "since": 1300000000},
                {"index": "0", "state": "STARTING"}
            ]}),
        )
        .on(Method::Get, "/apps/blog", 200, app("blog", "STARTED", 2, Some(2)))
        .on(
            Method::Get,
            "/apps/blog/stats",
            200,
            json!({
                "10": {"stats": {"host": "10.0.0.2", "port": 8010, "uptime": 61.0}},
                "2": {"stats": {"host": "10.0.0.1", "port": 8002, "uptime": 3.5}},
                "3": {}
            }),
        );
    let controller = controller(&gateway, &temp);

    let indices: Vec<u32> = controller
        .instances("blog")
        .unwrap()
        .iter()
        .map(|i| i.index)
        .collect();
    assert_eq!(indices, [0, 1]);

    let stats = controller.stats("blog").unwrap();
    let indices: Vec<u32> = stats.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, [2, 10]);
    assert_eq!(stats[1].1.host.as_deref(), Some("10.0.0.2"));
}

#[test]
fn no_instances_is_empty_list() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on(Method::Get, "/apps/blog/instances", 200, json!([]));

    assert!(controller(&gateway, &temp).instances("blog").unwrap().is_empty());
}

#[test]
fn validate_target_requires_full_description() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway
        .on(
            Method::Get,
            "/info",
            200,
            json!({"name": "vcap", "version": 0.999, "support": "http://support", "description": "VMware's Cloud"}),
        )
        .on(Method::Get, "/info", 200, json!({"name": "nginx"}));
    let controller = controller(&gateway, &temp);

    let info = controller.validate_target("api.vcap.me").unwrap();
    assert_eq!(info.version.as_deref(), Some("0.999"));

    let err = controller.validate_target("www.example.com").unwrap_err();
    assert!(matches!(err, CloudError::InvalidTarget(ref t) if t == "www.example.com"));
}

#[test]
fn service_directory_keeps_catalog_order() {
    let temp = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.on_raw(Method::Get, "/info/services", 200, support::CATALOG);

    let rows = controller(&gateway, &temp).service_directory().unwrap();

    let keys: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|r| (r.service_type.as_str(), r.vendor.as_str(), r.version.as_str()))
        .collect();
    assert_eq!(
        keys,
        [
            ("database", "mysql", "5.1"),
            ("key-value", "redis", "2.2"),
            ("key-value", "memcached", "1.4"),
        ]
    );
    assert_eq!(rows[0].description.as_deref(), Some("MySQL database"));
    assert_eq!(rows[2].description, None);
}
