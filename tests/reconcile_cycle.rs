//! Integration tests for full reconcile cycles against the in-memory server.
//!
//! Every test starts from `resource::mock_server()`, which registers a
//! collection for each catalog variant and enforces digests the way the
//! real server does.

use pbskit::{Method, MockApi};
use pbsync::engine::{ApplyResult, Change, ExecuteOptions, PlanItem, execute};
use pbsync::{DeclaredState, ErrorCategory, ErrorKind, Operation, Reconciler, ResourceKind, resource};
use serde_json::{Value, json};

// =============================================================================
// Test Helpers
// =============================================================================

fn setup() -> Reconciler<MockApi> {
    let _ = env_logger::builder().is_test(true).try_init();
    Reconciler::new(resource::mock_server())
}

fn remote(name: &str) -> DeclaredState {
    DeclaredState::new()
        .with("name", name)
        .with("host", "pbs2.example.com")
        .with("auth_id", "sync@pbs")
        .with("password", "hunter2")
}

fn influx_udp(name: &str) -> DeclaredState {
    DeclaredState::new()
        .with("type", "influxdb-udp")
        .with("name", name)
        .with("server", "10.0.0.5")
        .with("port", 8089)
}

fn influx_http(name: &str) -> DeclaredState {
    DeclaredState::new()
        .with("type", "influxdb-http")
        .with("name", name)
        .with("server", "influx.local")
        .with("port", 8086)
        .with("scheme", "http")
        .with("token", "influx-token")
}

fn last_write(api: &MockApi) -> (Method, String, Value) {
    let request = api.writes().pop().expect("a write request");
    (request.method, request.path, request.body.unwrap_or(Value::Null))
}

// =============================================================================
// CRUD Cycle
// =============================================================================

#[test]
fn test_remote_full_cycle() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);

    let declared = remote("offsite");
    let created = remotes.create(&declared).unwrap();
    assert_eq!(created.str("host"), Some("pbs2.example.com"));
    assert!(created.version.is_some());

    let read = remotes.read(&created.key, Some(&declared)).unwrap();
    assert_eq!(read, created);

    let next = declared.clone().with("comment", "second site");
    let updated = remotes.update(&read.key, &read, &next).unwrap();
    assert_eq!(updated.str("comment"), Some("second site"));
    assert_ne!(updated.version, read.version);

    let (method, path, body) = last_write(r.api());
    assert_eq!(method, Method::Put);
    assert_eq!(path, "/config/remote/offsite");
    assert_eq!(body["comment"], json!("second site"));
    assert_eq!(
        body["digest"],
        json!(read.version.as_ref().unwrap().as_str())
    );

    remotes
        .delete(&updated.key, updated.version.as_ref())
        .unwrap();
    assert!(r.api().object("/config/remote/offsite").is_none());

    let err = remotes.read(&updated.key, Some(&next)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.operation, Operation::Read);
}

#[test]
fn test_clearing_a_field_sends_delete_list() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);

    let declared = remote("offsite").with("comment", "temporary").with("port", 8007);
    let prior = remotes.create(&declared).unwrap();

    let next = remote("offsite").with("port", 8007);
    let updated = remotes.update(&prior.key, &prior, &next).unwrap();
    assert_eq!(updated.value("comment"), None);

    let (_, _, body) = last_write(r.api());
    assert_eq!(body["delete"], json!(["comment"]));
    assert!(body.get("comment").is_none());
    assert!(body.get("port").is_none());
}

#[test]
fn test_unchanged_declaration_makes_no_write() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let declared = remote("offsite").with("port", "8007");
    let prior = remotes.create(&declared).unwrap();
    r.api().clear_requests();

    let next = remotes.update(&prior.key, &prior, &declared).unwrap();
    assert_eq!(next, prior);
    assert!(r.api().requests().is_empty());
}

#[test]
fn test_create_missing_required_field_sends_nothing() {
    let r = setup();
    let declared = DeclaredState::new().with("name", "offsite").with("host", "h");
    let err = r.resource(ResourceKind::Remote).create(&declared).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Declaration);
    assert!(err.to_string().contains("auth_id") || err.to_string().contains("password"));
    assert!(r.api().requests().is_empty());
}

// =============================================================================
// Concurrency Guard
// =============================================================================

#[test]
fn test_stale_digest_is_a_conflict() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let prior = remotes.create(&remote("offsite")).unwrap();
    let snapshot = prior.clone();

    assert!(r.api().modify("/config/remote/offsite", "comment", json!("edited elsewhere")));

    let next = remote("offsite").with("comment", "mine");
    let err = remotes.update(&prior.key, &prior, &next).unwrap_err();
    assert!(err.is_conflict());
    assert!(!err.is_retryable());
    assert_eq!(prior, snapshot);

    let stored = r.api().object("/config/remote/offsite").unwrap();
    assert_eq!(stored["comment"], json!("edited elsewhere"));
}

#[test]
fn test_delete_with_stale_digest_is_rejected() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let prior = remotes.create(&remote("offsite")).unwrap();
    r.api().modify("/config/remote/offsite", "port", json!(8008));

    let err = remotes
        .delete(&prior.key, prior.version.as_ref())
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(r.api().object("/config/remote/offsite").is_some());
}

#[test]
fn test_delete_of_missing_object_succeeds() {
    let r = setup();
    let key = pbsync::ResourceKey::new("never-created");
    r.resource(ResourceKind::Remote).delete(&key, None).unwrap();

    let (method, path, _) = last_write(r.api());
    assert_eq!(method, Method::Delete);
    assert_eq!(path, "/config/remote/never-created");
}

// =============================================================================
// Secrets
// =============================================================================

#[test]
fn test_secret_is_carried_forward_and_not_resent() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let declared = remote("offsite");
    let prior = remotes.create(&declared).unwrap();

    let stored = r.api().object("/config/remote/offsite").unwrap();
    assert_eq!(stored["password"], json!("hunter2"));

    let read = remotes.read(&prior.key, Some(&declared)).unwrap();
    assert_eq!(read.str("password"), Some("hunter2"));
    assert!(!read.is_unknown("password"));

    let next = declared.clone().with("fingerprint", "aa:bb");
    remotes.update(&read.key, &read, &next).unwrap();
    let (_, _, body) = last_write(r.api());
    assert!(body.get("password").is_none());
    assert_eq!(body["fingerprint"], json!("aa:bb"));
}

#[test]
fn test_changed_secret_is_sent() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let prior = remotes.create(&remote("offsite")).unwrap();

    let next = remote("offsite").with("password", "correct horse");
    let updated = remotes.update(&prior.key, &prior, &next).unwrap();
    assert_eq!(updated.str("password"), Some("correct horse"));

    let stored = r.api().object("/config/remote/offsite").unwrap();
    assert_eq!(stored["password"], json!("correct horse"));
}

#[test]
fn test_import_marks_secrets_unknown() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    remotes.create(&remote("offsite")).unwrap();

    let imported = remotes.import("offsite").unwrap();
    assert!(imported.is_unknown("password"));
    assert_eq!(imported.value("password"), None);
    assert_eq!(imported.str("auth_id"), Some("sync@pbs"));

    // no password declared: nothing to write
    let without = DeclaredState::new()
        .with("name", "offsite")
        .with("host", "pbs2.example.com")
        .with("auth_id", "sync@pbs");
    r.api().clear_requests();
    remotes.update(&imported.key, &imported, &without).unwrap();
    assert!(r.api().writes().is_empty());

    // declared password: written once to converge
    let updated = remotes
        .update(&imported.key, &imported, &remote("offsite"))
        .unwrap();
    let (_, _, body) = last_write(r.api());
    assert_eq!(body["password"], json!("hunter2"));
    assert_eq!(updated.str("password"), Some("hunter2"));
}

#[test]
fn test_import_rejects_malformed_identifier() {
    let r = setup();
    let err = r
        .resource(ResourceKind::MetricsExporter)
        .import("no-variant")
        .unwrap_err();
    assert_eq!(err.operation, Operation::Import);
    assert!(matches!(err.kind, ErrorKind::InvalidKey(_)));

    let err = r.resource(ResourceKind::Job).import("backup/nightly").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnsupportedVariant { .. }));
}

// =============================================================================
// Legacy Fields and Variants
// =============================================================================

#[test]
fn test_legacy_http_exporter_cycle() {
    let r = setup();
    let exporters = r.resource(ResourceKind::MetricsExporter);
    let declared = influx_http("influx");
    let created = exporters.create(&declared).unwrap();

    let stored = r
        .api()
        .object("/config/metrics/influxdb-http/influx")
        .unwrap();
    assert_eq!(stored["url"], json!("http://influx.local:8086"));
    assert!(stored.get("server").is_none());
    assert_eq!(stored["verify-tls"], json!(true));

    assert_eq!(created.str("type"), Some("influxdb-http"));
    assert_eq!(created.str("server"), Some("influx.local"));
    assert_eq!(created.value("port"), Some(&json!(8086)));
    assert_eq!(created.str("token"), Some("influx-token"));

    r.api().clear_requests();
    exporters.update(&created.key, &created, &declared).unwrap();
    assert!(r.api().writes().is_empty());

    let next = declared.clone().with("verify_certificate", false);
    let updated = exporters.update(&created.key, &created, &next).unwrap();
    let (_, _, body) = last_write(r.api());
    assert_eq!(body["verify-tls"], json!(false));
    assert!(body.get("url").is_none());
    assert_eq!(updated.value("verify_tls"), Some(&json!(false)));
}

#[test]
fn test_udp_exporter_host_is_composed() {
    let r = setup();
    let exporters = r.resource(ResourceKind::MetricsExporter);
    let created = exporters.create(&influx_udp("udp")).unwrap();

    let stored = r.api().object("/config/metrics/influxdb-udp/udp").unwrap();
    assert_eq!(stored["host"], json!("10.0.0.5:8089"));
    assert_eq!(stored["mtu"], json!(1500));

    assert_eq!(created.key.to_string(), "influxdb-udp/udp");
    assert_eq!(created.str("server"), Some("10.0.0.5"));
    assert_eq!(created.value("port"), Some(&json!(8089)));
}

#[test]
fn test_discriminator_change_requires_replacement() {
    let r = setup();
    let exporters = r.resource(ResourceKind::MetricsExporter);
    let prior = exporters.create(&influx_udp("metrics")).unwrap();
    r.api().clear_requests();

    let next = influx_http("metrics");
    let err = exporters.update(&prior.key, &prior, &next).unwrap_err();
    assert!(err.requires_replacement());
    assert!(r.api().requests().is_empty());

    exporters
        .delete(&prior.key, prior.version.as_ref())
        .unwrap();
    let replaced = exporters.create(&next).unwrap();
    assert_eq!(replaced.key.to_string(), "influxdb-http/metrics");
    assert!(r.api().object("/config/metrics/influxdb-udp/metrics").is_none());
    assert!(r.api().object("/config/metrics/influxdb-http/metrics").is_some());
}

#[test]
fn test_create_only_change_requires_replacement() {
    let r = setup();
    let stores = r.resource(ResourceKind::Datastore);
    let declared = DeclaredState::new()
        .with("name", "store1")
        .with("path", "/mnt/datastore/store1")
        .with("reuse_datastore", true);
    let prior = stores.create(&declared).unwrap();
    assert!(prior.value("reuse_datastore").is_some());

    let moved = DeclaredState::new()
        .with("name", "store1")
        .with("path", "/mnt/other/store1");
    let err = stores.update(&prior.key, &prior, &moved).unwrap_err();
    assert!(err.requires_replacement());

    let change = pbsync::plan_change(
        resource::schema(ResourceKind::Datastore),
        Some(&prior),
        Some(&moved),
    )
    .unwrap();
    assert!(matches!(change, Change::Replace { .. }));
}

#[test]
fn test_datastore_composites_are_property_strings() {
    let r = setup();
    let stores = r.resource(ResourceKind::Datastore);
    let declared = DeclaredState::new()
        .with("name", "store1")
        .with("path", "/mnt/datastore/store1")
        .with(
            "maintenance_mode",
            json!({"type": "read-only", "message": "disk swap, back soon"}),
        );
    let prior = stores.create(&declared).unwrap();

    let stored = r.api().object("/config/datastore/store1").unwrap();
    assert_eq!(
        stored["maintenance-mode"],
        json!("message=\"disk swap, back soon\",type=read-only")
    );
    assert_eq!(
        prior.value("maintenance_mode"),
        Some(&json!({"type": "read-only", "message": "disk swap, back soon"}))
    );

    let online = DeclaredState::new()
        .with("name", "store1")
        .with("path", "/mnt/datastore/store1");
    stores.update(&prior.key, &prior, &online).unwrap();
    let (_, _, body) = last_write(r.api());
    assert_eq!(body["delete"], json!(["maintenance-mode"]));
}

#[test]
fn test_notification_mailto_accepts_single_address() {
    let r = setup();
    let targets = r.resource(ResourceKind::NotificationTarget);
    let declared = DeclaredState::new()
        .with("type", "sendmail")
        .with("name", "mail-admins")
        .with("mailto", "admin@example.com");
    let created = targets.create(&declared).unwrap();

    let stored = r
        .api()
        .object("/config/notifications/endpoints/sendmail/mail-admins")
        .unwrap();
    assert_eq!(stored["mailto"], json!(["admin@example.com"]));
    assert_eq!(created.value("disable"), Some(&json!(false)));

    r.api().clear_requests();
    targets.update(&created.key, &created, &declared).unwrap();
    assert!(r.api().writes().is_empty());
}

// =============================================================================
// Error Mapping
// =============================================================================

#[test]
fn test_rejected_field_is_schema_incompatible() {
    let r = setup();
    r.api()
        .reject_field("verify-tls", "schema does not allow additional properties");

    let err = r
        .resource(ResourceKind::MetricsExporter)
        .create(&influx_http("influx"))
        .unwrap_err();
    match &err.kind {
        ErrorKind::SchemaIncompatible { field, .. } => assert_eq!(field, "verify_tls"),
        other => panic!("expected schema incompatibility, got {other:?}"),
    }
    assert_eq!(err.key, "influxdb-http/influx");
    assert_eq!(err.resource, ResourceKind::MetricsExporter);
}

#[test]
fn test_transport_failure_is_retryable() {
    let r = setup();
    r.api()
        .fail_next(pbskit::ApiError::http("connection reset", None));
    let err = r
        .resource(ResourceKind::Remote)
        .create(&remote("offsite"))
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(r.api().object("/config/remote/offsite").is_none());
}

#[test]
fn test_duplicate_create_is_not_retryable() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    remotes.create(&remote("dup")).unwrap();

    let err = remotes.create(&remote("dup")).unwrap_err();
    assert_eq!(err.operation, Operation::Create);
    assert_eq!(err.category(), ErrorCategory::Remote);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn test_cancelled_reconciler_stops_before_request() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let prior = remotes.create(&remote("offsite")).unwrap();
    r.api().clear_requests();

    r.cancel_token().cancel();
    let err = remotes
        .update(&prior.key, &prior, &remote("offsite").with("comment", "x"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert!(r.api().requests().is_empty());
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn test_list_all_metrics_variants() {
    let r = setup();
    let exporters = r.resource(ResourceKind::MetricsExporter);
    exporters.create(&influx_http("influx")).unwrap();
    exporters.create(&influx_udp("udp")).unwrap();

    let listed = exporters.list(None).unwrap();
    let keys: Vec<String> = listed.iter().map(|o| o.key.to_string()).collect();
    assert_eq!(keys, vec!["influxdb-http/influx", "influxdb-udp/udp"]);

    let http = &listed[0];
    assert_eq!(http.str("type"), Some("influxdb-http"));
    assert_eq!(http.str("url"), Some("http://influx.local:8086"));
    assert_eq!(http.str("server"), Some("influx.local"));
    assert_eq!(http.value("port"), Some(&json!(8086)));
    assert!(http.is_unknown("token"));

    let udp = &listed[1];
    assert_eq!(udp.str("host"), Some("10.0.0.5:8089"));
    assert_eq!(udp.str("server"), Some("10.0.0.5"));

    let only_udp = exporters.list(Some("influxdb-udp")).unwrap();
    assert_eq!(only_udp.len(), 1);
    assert_eq!(only_udp[0].key.to_string(), "influxdb-udp/udp");
}

#[test]
fn test_listed_object_updates_like_an_import() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    remotes.create(&remote("offsite")).unwrap();

    let listed = remotes.list(None).unwrap();
    assert_eq!(listed.len(), 1);
    let prior = &listed[0];
    assert!(prior.is_unknown("password"));

    let updated = remotes.update(&prior.key, prior, &remote("offsite")).unwrap();
    assert_eq!(updated.str("password"), Some("hunter2"));
    let (method, _, body) = last_write(r.api());
    assert_eq!(method, Method::Put);
    assert_eq!(body["password"], json!("hunter2"));
}

#[test]
fn test_list_unknown_variant() {
    let r = setup();
    let err = r
        .resource(ResourceKind::MetricsExporter)
        .list(Some("graphite"))
        .unwrap_err();
    assert_eq!(err.operation, Operation::List);
    assert!(matches!(err.kind, ErrorKind::UnsupportedVariant { .. }));
    assert!(r.api().requests().is_empty());
}

// =============================================================================
// Batch Execution
// =============================================================================

#[test]
fn test_execute_mixed_plan() {
    let r = setup();
    let remotes = r.resource(ResourceKind::Remote);
    let exporters = r.resource(ResourceKind::MetricsExporter);

    let existing = remotes.create(&remote("existing")).unwrap();
    let doomed = remotes.create(&remote("doomed")).unwrap();
    let unchanged = remotes.create(&remote("unchanged")).unwrap();
    let udp = exporters.create(&influx_udp("metrics")).unwrap();

    let items = vec![
        PlanItem::create(ResourceKind::Remote, remote("new-a")),
        PlanItem::create(ResourceKind::Remote, remote("new-b")),
        PlanItem::update(
            ResourceKind::Remote,
            existing,
            remote("existing").with("comment", "updated"),
        ),
        PlanItem::update(ResourceKind::Remote, unchanged, remote("unchanged")),
        PlanItem::delete(ResourceKind::Remote, doomed),
        PlanItem::update(ResourceKind::MetricsExporter, udp, influx_http("metrics")),
    ];

    let report = execute(&r, items, ExecuteOptions::default());
    let summary = &report.summary;
    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.replaced, 1);
    assert!(summary.is_success());
    assert_eq!(summary.total(), 6);

    let ids: Vec<&str> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "remote:new-a",
            "remote:new-b",
            "remote:existing",
            "remote:unchanged",
            "remote:doomed",
            "metrics_exporter:influxdb-udp/metrics",
        ]
    );

    match &report.outcomes[5].result {
        ApplyResult::Replaced(observed) => {
            assert_eq!(observed.key.to_string(), "influxdb-http/metrics");
        }
        other => panic!("expected replacement, got {other:?}"),
    }
    assert!(r.api().object("/config/remote/doomed").is_none());
    assert!(r.api().object("/config/remote/new-b").is_some());
}
