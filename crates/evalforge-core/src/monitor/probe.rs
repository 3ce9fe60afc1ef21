use std::time::{Duration, Instant};

use crate::errors::CoreResult;
use crate::model::{
    Execution, ExecutionOutcome, HttpMethod, NewExecution, SyntheticTest, TestKind,
};
use crate::storage::Store;

/// Executes synthetic probes. Every invocation appends exactly one Execution
/// with a terminal outcome, regardless of how the probe went.
#[derive(Clone)]
pub struct ProbeExecutor {
    store: Store,
}

/// Classified probe result before it is persisted.
struct ProbeOutcome {
    outcome: ExecutionOutcome,
    response_time_ms: f64,
    status_code: Option<u16>,
    error_message: Option<String>,
}

impl ProbeExecutor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn execute(&self, test: &SyntheticTest) -> CoreResult<Execution> {
        let probe = self.probe(test).await;
        tracing::info!(
            test = test.id,
            kind = test.kind.as_str(),
            outcome = probe.outcome.as_str(),
            response_time_ms = probe.response_time_ms,
            "probe finished"
        );
        self.store.insert_execution(&NewExecution {
            test_id: test.id,
            outcome: probe.outcome,
            response_time_ms: probe.response_time_ms,
            status_code: probe.status_code,
            error_message: probe.error_message,
        })
    }

    async fn probe(&self, test: &SyntheticTest) -> ProbeOutcome {
        if test.kind == TestKind::Browser {
            // No browser automation backend is wired up; the probe still
            // produces a terminal execution record.
            return ProbeOutcome {
                outcome: ExecutionOutcome::Error,
                response_time_ms: 0.0,
                status_code: None,
                error_message: Some("browser automation not available".to_string()),
            };
        }

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(test.timeout_secs))
            .danger_accept_invalid_certs(!test.ssl_verify)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return ProbeOutcome {
                    outcome: ExecutionOutcome::Error,
                    response_time_ms: 0.0,
                    status_code: None,
                    error_message: Some(format!("client build failed: {}", e)),
                }
            }
        };

        let mut req = client.request(as_reqwest_method(test.method), &test.url);
        if let Some(headers) = test.headers.as_ref().and_then(|h| h.as_object()) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    req = req.header(name.as_str(), value);
                }
            }
        }
        if let Some(body) = &test.body {
            req = req.json(body);
        }
        if let Some(credential) = &test.credential {
            req = credential.apply(req);
        }

        let started = Instant::now();
        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                let status_ok = match test.expected_status {
                    Some(expected) => status.as_u16() == expected,
                    None => status.is_success(),
                };
                let content_ok = match &test.expected_substring {
                    Some(needle) => match resp.text().await {
                        Ok(body) => body.contains(needle),
                        Err(_) => false,
                    },
                    None => true,
                };
                let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                if status_ok && content_ok {
                    ProbeOutcome {
                        outcome: ExecutionOutcome::Success,
                        response_time_ms,
                        status_code: Some(status.as_u16()),
                        error_message: None,
                    }
                } else {
                    ProbeOutcome {
                        outcome: ExecutionOutcome::Failure,
                        response_time_ms,
                        status_code: Some(status.as_u16()),
                        error_message: Some(format!(
                            "status: {}, content check: {}",
                            status.as_u16(),
                            content_ok
                        )),
                    }
                }
            }
            Err(e) if e.is_timeout() => ProbeOutcome {
                outcome: ExecutionOutcome::Timeout,
                response_time_ms: (test.timeout_secs * 1000) as f64,
                status_code: None,
                error_message: Some(format!(
                    "request timeout after {} seconds",
                    test.timeout_secs
                )),
            },
            Err(e) => ProbeOutcome {
                outcome: ExecutionOutcome::Error,
                response_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                status_code: None,
                error_message: Some(e.to_string()),
            },
        }
    }
}

fn as_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}
