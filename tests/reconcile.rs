//! Reconciliation cycle tests against an in-process engine.

use std::time::Duration;

use serde_json::json;

use hostplane::builder::Document;
use hostplane::config::ReconcileConfig;
use hostplane::reconciler::{Phase, ReconcileError, RecordFile, RollbackOutcome, VerifyOutcome};

mod common;
use common::{fast_config, harness, harness_with, host, refused};

#[tokio::test]
async fn test_single_host_is_applied() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();

    let report = h.reconciler.trigger("test").await.unwrap();

    assert!(report.warnings.is_empty());
    assert_eq!(report.routes, 1);
    assert_eq!(report.verify, VerifyOutcome::Matched);

    let active = h.engine.active().expect("engine received a document");
    let routes = active.as_value()["apps"]["http"]["servers"]["srv0"]["routes"].as_array().unwrap().clone();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["match"], json!([{"host": ["app.example.com"]}]));
    let chain = routes[0]["handle"][0]["routes"].as_array().unwrap();
    let proxy = &chain.last().unwrap()["handle"][0];
    assert_eq!(proxy["handler"], "reverse_proxy");
    assert_eq!(proxy["upstreams"], json!([{"dial": "10.0.0.5:8080"}]));

    let record = h.reconciler.applied().unwrap();
    assert_eq!(record.document, active);
    assert_eq!(record.fingerprint, report.fingerprint);
    assert_eq!(h.reconciler.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_validation_failure_leaves_engine_untouched() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.reconciler.trigger("first").await.unwrap();
    let before = h.reconciler.applied().unwrap();

    h.store.create_host(host(0, "api.example.com", "10.0.0.6", 9000)).await.unwrap();
    h.adapter.reject("adapting config using json: unknown field \"bogus\"");
    let err = h.reconciler.trigger("second").await.unwrap_err();

    match &err {
        ReconcileError::Validation { context, source } => {
            assert_eq!(context.domains, vec!["api.example.com", "app.example.com"]);
            assert!(source.diagnostic().unwrap().contains("unknown field"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.engine.applies(), 1);
    assert_eq!(h.reconciler.applied().unwrap().fingerprint, before.fingerprint);
    assert_eq!(h.reconciler.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_engine_down_rolls_back_to_previous_record() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.reconciler.trigger("first").await.unwrap();
    let previous = h.reconciler.applied().unwrap();

    h.store.create_host(host(0, "api.example.com", "10.0.0.6", 9000)).await.unwrap();
    h.engine.fail_next([refused(), refused()]);
    let err = h.reconciler.trigger("second").await.unwrap_err();

    match &err {
        ReconcileError::Apply { source, rollback, .. } => {
            assert_eq!(source.kind(), "connection_refused");
            assert_eq!(
                rollback,
                &RollbackOutcome::Restored { fingerprint: previous.fingerprint.clone() }
            );
        }
        other => panic!("expected apply error, got {other:?}"),
    }
    assert!(err.to_string().contains("refused the connection"));
    assert_eq!(h.reconciler.phase(), Phase::RolledBack);
    assert_eq!(h.reconciler.applied().unwrap().fingerprint, previous.fingerprint);

    // 1 initial + 2 failed + 1 rollback
    assert_eq!(h.engine.applies(), 4);
    assert_eq!(h.engine.active().unwrap(), previous.document);
}

#[tokio::test]
async fn test_first_apply_failure_has_nothing_to_restore() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.engine.set_down(Some(refused()));

    let err = h.reconciler.trigger("first").await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Apply { rollback: RollbackOutcome::NothingToRestore, .. }
    ));
    assert_eq!(h.engine.applies(), 2);
    assert!(h.reconciler.applied().is_none());
    assert_eq!(h.reconciler.phase(), Phase::RolledBack);
}

#[tokio::test]
async fn test_rollback_failure_raises_alarm() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.reconciler.trigger("first").await.unwrap();
    let previous = h.reconciler.applied().unwrap();

    h.store.create_host(host(0, "api.example.com", "10.0.0.6", 9000)).await.unwrap();
    h.engine.set_down(Some(refused()));
    let err = h.reconciler.trigger("second").await.unwrap_err();

    assert!(err.is_alarm());
    match &err {
        ReconcileError::RollbackFailed { previous_fingerprint, .. } => {
            assert_eq!(previous_fingerprint, &previous.fingerprint);
        }
        other => panic!("expected rollback failure, got {other:?}"),
    }
    // 1 initial + 2 apply + 2 rollback attempts
    assert_eq!(h.engine.applies(), 5);
    assert!(h.reconciler.status().last_error.unwrap().contains("engine state unknown"));
}

#[tokio::test]
async fn test_next_cycle_recovers_after_rollback() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.engine.set_down(Some(refused()));
    h.reconciler.trigger("down").await.unwrap_err();

    h.engine.set_down(None);
    let report = h.reconciler.trigger("retry").await.unwrap();
    assert_eq!(report.routes, 1);
    assert_eq!(h.reconciler.phase(), Phase::Idle);
    assert!(h.reconciler.status().last_error.is_none());
}

#[tokio::test]
async fn test_concurrent_triggers_coalesce() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.engine.set_delay(Duration::from_millis(100));

    let first = {
        let r = h.reconciler.clone();
        tokio::spawn(async move { r.trigger("first").await })
    };
    // Let the first cycle reach the engine before piling on.
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.store.create_host(host(0, "api.example.com", "10.0.0.6", 9000)).await.unwrap();

    let mut followers = Vec::new();
    for i in 0..10 {
        let r = h.reconciler.clone();
        followers.push(tokio::spawn(async move { r.trigger(&format!("burst {i}")).await }));
    }

    let first = first.await.unwrap().unwrap();
    let mut reports = Vec::new();
    for f in followers {
        reports.push(f.await.unwrap().unwrap());
    }

    assert_eq!(first.generation, 1);
    assert!(reports.iter().all(|r| r.generation == 2));

    // A superseded cycle leaves verification to the follow-up.
    assert_eq!(first.verify, VerifyOutcome::Skipped);
    assert!(reports.iter().all(|r| r.verify == VerifyOutcome::Matched));
    assert_eq!(h.adapter.adapts(), 2);
    assert_eq!(h.engine.applies(), 2);

    // The follow-up cycle saw the change made during the first one.
    let last = h.engine.accepted().pop().unwrap();
    assert_eq!(last.route_count(), 2);
}

#[tokio::test]
async fn test_dropped_caller_does_not_abort_cycle() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    h.engine.set_delay(Duration::from_millis(50));

    let r = h.reconciler.clone();
    let _ = tokio::time::timeout(Duration::from_millis(10), r.trigger("impatient")).await;

    let mut phases = h.reconciler.subscribe_phase();
    phases.wait_for(|p| *p == Phase::Idle).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.engine.active().is_some());
    assert!(h.reconciler.applied().is_some());
}

#[tokio::test]
async fn test_verify_mismatch_is_informational() {
    let h = harness();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    *h.engine.fetch_override.lock().unwrap() =
        Some(Document::from_value(json!({"apps": {"http": {"servers": {}}}})));

    let report = h.reconciler.trigger("test").await.unwrap();

    match report.verify {
        VerifyOutcome::Mismatch { differences } => {
            assert_eq!(differences, vec!["/apps/http/servers/srv0: missing".to_string()]);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
    assert_eq!(h.engine.applies(), 1);
    assert!(h.reconciler.applied().is_some());
}

#[tokio::test]
async fn test_verify_can_be_disabled() {
    let h = harness_with(ReconcileConfig { verify: false, ..fast_config() });
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    let report = h.reconciler.trigger("test").await.unwrap();
    assert_eq!(report.verify, VerifyOutcome::Disabled);
}

#[tokio::test]
async fn test_build_warnings_do_not_block_apply() {
    let h = harness();
    let mut forced = host(0, "secure.example.com", "10.0.0.7", 443);
    forced.features.force_tls = true;
    h.store.create_host(forced).await.unwrap();
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();

    let report = h.reconciler.trigger("test").await.unwrap();

    assert_eq!(report.routes, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].excluded);
}

#[tokio::test]
async fn test_record_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("applied.json");
    let config = ReconcileConfig {
        record_path: Some(path.to_string_lossy().into_owned()),
        ..fast_config()
    };

    let h = harness_with(config.clone());
    h.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    let report = h.reconciler.trigger("before restart").await.unwrap();

    let on_disk = RecordFile::new(&path).load().await.unwrap().unwrap();
    assert_eq!(on_disk.fingerprint, report.fingerprint);

    // A fresh process whose first apply fails can still roll back.
    let restarted = harness_with(config);
    assert_eq!(
        restarted.reconciler.restore_record().await.unwrap(),
        Some(report.fingerprint.clone())
    );
    restarted.store.create_host(host(0, "app.example.com", "10.0.0.5", 8080)).await.unwrap();
    restarted.engine.fail_next([refused(), refused()]);
    let err = restarted.reconciler.trigger("after restart").await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Apply { rollback: RollbackOutcome::Restored { .. }, .. }
    ));
    assert_eq!(restarted.engine.active().unwrap(), restarted.reconciler.applied().unwrap().document);
}

#[tokio::test]
async fn test_builder_output_validates_with_documented_shape() {
    use hostplane::builder::Builder;
    use hostplane::config::BuildConfig;
    use hostplane::engine::Validator;
    use hostplane::model::{DesiredState, Location, Upstream};

    let adapter = common::FakeAdapter::new();
    let validator = Validator::new(adapter.clone());
    let builder = Builder::new(BuildConfig::default());

    let mut state = DesiredState::default();
    state.hosts.push(host(1, "example.com", "localhost", 8080));
    let built = builder.build(&state).document;
    let canonical = validator.validate(&built.to_text()).await.unwrap();
    assert_eq!(canonical, built);
    let routes = canonical.as_value().pointer("/apps/http/servers/srv0/routes").unwrap();
    assert_eq!(routes.as_array().unwrap().len(), 1);

    // Richer snapshots round-trip as well.
    let mut api = host(2, "*.api.example.com", "10.0.0.9", 9000);
    api.features.websocket = true;
    api.features.block_exploits = true;
    api.locations.push(Location { path: "/static".to_string(), upstream: Upstream::new("10.0.0.10", 80) });
    state.hosts.push(api);
    let mut disabled = host(3, "old.example.com", "10.0.0.11", 80);
    disabled.enabled = false;
    state.hosts.push(disabled);
    let out = builder.build(&state);
    assert_eq!(out.warnings.len(), 1);
    let canonical = validator.validate(&out.document.to_text()).await.unwrap();
    assert_eq!(canonical.fingerprint(), out.document.fingerprint());
    assert_eq!(adapter.adapts(), 2);
}

#[tokio::test]
async fn test_forced_tls_without_certificate_is_left_out() {
    let h = harness();
    let mut forced = host(0, "example.com", "localhost", 8080);
    forced.features.force_tls = true;
    h.store.create_host(forced).await.unwrap();

    let report = h.reconciler.trigger("test").await.unwrap();

    assert_eq!(report.routes, 0);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].host_id, 1);
    assert!(report.warnings[0].to_string().contains("example.com"));
}
