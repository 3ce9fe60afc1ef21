use evalforge_core::auth::{AuthMethod, Secret};
use evalforge_core::dataset::sample_dataset;
use evalforge_core::errors::CoreError;
use evalforge_core::model::{
    EndpointInput, ExternalAppInput, ModelBackend, NewExecution, NewModel, ExecutionOutcome,
    SamplingParams, SyntheticTestDraft, TestKind,
};
use evalforge_core::storage::Store;
use tempfile::tempdir;

fn open_store(dir: &tempfile::TempDir) -> Store {
    let store = Store::open(&dir.path().join("forge.db")).unwrap();
    store.init_schema().unwrap();
    store
}

fn app_input(name: &str, secret: Option<&str>) -> ExternalAppInput {
    ExternalAppInput {
        name: name.into(),
        service_name: format!("{}-svc", name),
        base_url: "https://api.example.com".into(),
        description: None,
        auth_method: if secret.is_some() {
            AuthMethod::ApiKey
        } else {
            AuthMethod::None
        },
        secret: secret.map(Secret::new),
        health_endpoint: None,
        timeout_secs: None,
        ssl_verify: true,
        active: true,
    }
}

#[test]
fn model_and_evaluation_lifecycle() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let model = store
        .create_model(&NewModel {
            name: "local llama".into(),
            backend: ModelBackend::LocalInference,
            endpoint: "http://localhost:11434".into(),
            model_name: "llama3.2".into(),
        })
        .unwrap();
    assert_eq!(model.status.as_str(), "untested");

    let pairs = sample_dataset();
    let eval = store
        .create_evaluation("smoke", &model, SamplingParams::default(), &pairs)
        .unwrap();
    assert_eq!(eval.status.as_str(), "draft");
    assert_eq!(eval.total_questions, 10);
    assert_eq!(eval.model_name, "local llama");

    let questions = store.list_questions(eval.id).unwrap();
    assert_eq!(questions.len(), 10);
    // ordering is part of the identity
    for (i, q) in questions.iter().enumerate() {
        assert_eq!(q.idx as usize, i);
        assert_eq!(q.question, pairs[i].question);
    }

    // deleting the model keeps the evaluation and its denormalized name
    store.delete_model(model.id).unwrap();
    let eval = store.get_evaluation(eval.id).unwrap();
    assert_eq!(eval.model_name, "local llama");

    // cascade: evaluation delete removes questions
    store.delete_evaluation(eval.id).unwrap();
    let conn = rusqlite::Connection::open(dir.path().join("forge.db")).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT count(*) FROM questions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn validation_rejects_bad_input() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let err = store
        .create_model(&NewModel {
            name: "".into(),
            backend: ModelBackend::LocalInference,
            endpoint: "http://localhost:11434".into(),
            model_name: "m".into(),
        })
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let model = store
        .create_model(&NewModel {
            name: "m".into(),
            backend: ModelBackend::LocalInference,
            endpoint: "http://localhost:11434".into(),
            model_name: "m".into(),
        })
        .unwrap();

    let mut params = SamplingParams::default();
    params.temperature = 5.0;
    let err = store
        .create_evaluation("bad", &model, params, &sample_dataset())
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    assert!(matches!(
        store.get_evaluation(999).unwrap_err(),
        CoreError::NotFound(_)
    ));
}

#[test]
fn run_guard_rejects_non_draft() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let model = store
        .create_model(&NewModel {
            name: "m".into(),
            backend: ModelBackend::LocalInference,
            endpoint: "http://localhost:11434".into(),
            model_name: "m".into(),
        })
        .unwrap();
    let eval = store
        .create_evaluation("guarded", &model, SamplingParams::default(), &sample_dataset())
        .unwrap();

    store.begin_run(eval.id).unwrap();
    let err = store.begin_run(eval.id).unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));

    store.fail_run(eval.id).unwrap();
    // terminal states cannot be re-run either
    assert!(matches!(
        store.begin_run(eval.id).unwrap_err(),
        CoreError::InvalidState(_)
    ));
    assert!(matches!(
        store.begin_run(12345).unwrap_err(),
        CoreError::NotFound(_)
    ));
}

#[test]
fn external_app_credentials_are_normalized_at_rest() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let app = store.create_external_app(&app_input("billing", Some("k1"))).unwrap();
    let cred = app.credential.expect("credential envelope");
    assert_eq!(
        cred.to_json().unwrap(),
        r#"{"header_name":"X-API-Key","key":"k1"}"#
    );

    // the raw secret never sits in the column in its original shape
    let conn = rusqlite::Connection::open(dir.path().join("forge.db")).unwrap();
    let stored: String = conn
        .query_row(
            "SELECT credential_json FROM external_apps WHERE id=?1",
            [app.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_ne!(stored, "k1");
    assert_ne!(stored, "\"k1\"");
    assert!(stored.contains("X-API-Key"));

    // updating with the stored envelope is a no-op (idempotent normalization)
    let mut input = app_input("billing", None);
    input.auth_method = AuthMethod::ApiKey;
    input.secret = Some(Secret::new(stored.clone()));
    let updated = store.update_external_app(app.id, &input).unwrap();
    assert_eq!(updated.credential.unwrap().to_json().unwrap(), stored);
}

#[test]
fn app_delete_cascades_endpoints() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let app = store.create_external_app(&app_input("shop", None)).unwrap();
    store
        .create_endpoint(app.id, &EndpointInput::default())
        .unwrap();
    store
        .create_endpoint(
            app.id,
            &EndpointInput {
                path: "/orders".into(),
                ..EndpointInput::default()
            },
        )
        .unwrap();
    assert_eq!(store.list_endpoints(app.id).unwrap().len(), 2);

    store.delete_external_app(app.id).unwrap();
    let conn = rusqlite::Connection::open(dir.path().join("forge.db")).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT count(*) FROM endpoints", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn synthetic_test_delete_cascades_executions() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let draft = SyntheticTestDraft::manual("ping", "svc", TestKind::Uptime, "https://x.example");
    let test = store.create_synthetic_test(&draft).unwrap();
    for _ in 0..3 {
        store
            .insert_execution(&NewExecution {
                test_id: test.id,
                outcome: ExecutionOutcome::Success,
                response_time_ms: 12.0,
                status_code: Some(200),
                error_message: None,
            })
            .unwrap();
    }
    assert_eq!(store.list_executions(Some(test.id), None).unwrap().len(), 3);

    store.delete_synthetic_test(test.id).unwrap();
    let conn = rusqlite::Connection::open(dir.path().join("forge.db")).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT count(*) FROM executions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn execution_listing_is_stable_and_limited() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let test = store
        .create_synthetic_test(&SyntheticTestDraft::manual(
            "ping",
            "svc",
            TestKind::Api,
            "https://x.example",
        ))
        .unwrap();
    for i in 0..5 {
        store
            .insert_execution(&NewExecution {
                test_id: test.id,
                outcome: if i % 2 == 0 {
                    ExecutionOutcome::Success
                } else {
                    ExecutionOutcome::Failure
                },
                response_time_ms: i as f64,
                status_code: Some(200),
                error_message: None,
            })
            .unwrap();
    }

    let first = store.list_executions(None, None).unwrap();
    let second = store.list_executions(None, None).unwrap();
    let ids: Vec<i64> = first.iter().map(|e| e.id).collect();
    assert_eq!(ids, second.iter().map(|e| e.id).collect::<Vec<_>>());
    assert_eq!(first.len(), 5);

    let limited = store.list_executions(None, Some(2)).unwrap();
    assert_eq!(limited.len(), 2);
    // newest first
    assert_eq!(limited[0].id, ids[0]);
}
