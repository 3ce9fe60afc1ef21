//! End-to-end boundary scenarios: connectivity checks and deriving a
//! synthetic health probe from an external app.

use evalforge_core::auth::{AuthMethod, Secret};
use evalforge_core::model::{
    ExecutionOutcome, ExternalAppInput, ModelBackend, ModelStatus, NewModel, TestKind,
};
use evalforge_core::service::Service;
use evalforge_core::storage::Store;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(dir: &tempfile::TempDir) -> Service {
    let store = Store::open(&dir.path().join("forge.db")).unwrap();
    store.init_schema().unwrap();
    Service::new(store, vec![])
}

#[tokio::test]
async fn connectivity_check_ends_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3.2:latest"}, {"name": "phi3"}]
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let svc = service(&dir);
    let model = svc
        .create_model(&NewModel {
            name: "local".into(),
            backend: ModelBackend::LocalInference,
            endpoint: server.uri(),
            model_name: "llama3.2".into(),
        })
        .unwrap();
    assert_eq!(model.status, ModelStatus::Untested);

    let model = svc.test_connectivity(model.id).await.unwrap();
    assert_eq!(model.status, ModelStatus::Connected);
}

#[tokio::test]
async fn connectivity_check_ends_error_when_model_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "phi3"}]
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let svc = service(&dir);
    let model = svc
        .create_model(&NewModel {
            name: "local".into(),
            backend: ModelBackend::LocalInference,
            endpoint: server.uri(),
            model_name: "llama3.2".into(),
        })
        .unwrap();

    let model = svc.test_connectivity(model.id).await.unwrap();
    // never left untested or testing after an explicit check
    assert_eq!(model.status, ModelStatus::Error);
}

#[tokio::test]
async fn connectivity_check_ends_error_on_unreachable_endpoint() {
    let dir = tempdir().unwrap();
    let svc = service(&dir);
    let model = svc
        .create_model(&NewModel {
            name: "local".into(),
            backend: ModelBackend::LocalInference,
            endpoint: "http://127.0.0.1:1".into(),
            model_name: "llama3.2".into(),
        })
        .unwrap();

    let model = svc.test_connectivity(model.id).await.unwrap();
    assert_eq!(model.status, ModelStatus::Error);
}

#[tokio::test]
async fn derived_probe_inherits_app_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("X-API-Key", "k1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let svc = service(&dir);
    let app = svc
        .create_external_app(&ExternalAppInput {
            name: "billing".into(),
            service_name: "billing-svc".into(),
            base_url: server.uri(),
            description: None,
            auth_method: AuthMethod::ApiKey,
            secret: Some(Secret::new("k1")),
            health_endpoint: Some("/health".into()),
            timeout_secs: Some(5),
            ssl_verify: true,
            active: true,
        })
        .unwrap();

    let test = svc
        .create_synthetic_test_from_app(app.id, "billing health", TestKind::Api)
        .unwrap();
    assert_eq!(test.url, format!("{}{}", app.base_url, "/health"));
    assert_eq!(test.timeout_secs, 5);
    assert_eq!(test.auth_method, AuthMethod::ApiKey);
    assert_eq!(test.service_name, "billing-svc");

    let execution = svc.execute_synthetic_test(test.id).await.unwrap();
    assert_eq!(execution.outcome, ExecutionOutcome::Success);
    assert_eq!(svc.list_executions(Some(test.id), None).unwrap().len(), 1);
}

#[tokio::test]
async fn rollups_are_empty_without_data() {
    let dir = tempdir().unwrap();
    let svc = service(&dir);

    let dashboard = svc.dashboard_rollup().unwrap();
    assert_eq!(dashboard.total_evaluations, 0);
    assert_eq!(dashboard.avg_accuracy, None);

    let synthetic = svc.synthetic_rollup().unwrap();
    assert_eq!(synthetic.uptime.total_executions, 0);
    assert_eq!(synthetic.uptime.success_rate, 0.0);
    assert_eq!(synthetic.api.avg_response_time_ms, None);
}

#[tokio::test]
async fn synthetic_rollup_counts_recent_executions_per_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let svc = service(&dir);
    let uptime = svc
        .create_synthetic_test(&evalforge_core::model::SyntheticTestDraft::manual(
            "up",
            "svc",
            TestKind::Uptime,
            server.uri(),
        ))
        .unwrap();
    let api = {
        let mut d = evalforge_core::model::SyntheticTestDraft::manual(
            "api",
            "svc",
            TestKind::Api,
            server.uri(),
        );
        d.expected_status = Some(404); // will record a failure
        svc.create_synthetic_test(&d).unwrap()
    };

    svc.execute_synthetic_test(uptime.id).await.unwrap();
    svc.execute_synthetic_test(uptime.id).await.unwrap();
    svc.execute_synthetic_test(api.id).await.unwrap();

    let rollup = svc.synthetic_rollup().unwrap();
    assert_eq!(rollup.uptime.total_executions, 2);
    assert!((rollup.uptime.success_rate - 100.0).abs() < 1e-9);
    assert_eq!(rollup.api.total_executions, 1);
    assert_eq!(rollup.api.success_rate, 0.0);
    assert!(rollup.browser.total_executions == 0);
}
