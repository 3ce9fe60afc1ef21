use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthMethod, Credential, Secret};
use crate::errors::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Models (inference targets)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelBackend {
    LocalInference,
}

impl ModelBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelBackend::LocalInference => "local_inference",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "local_inference" => Ok(ModelBackend::LocalInference),
            other => Err(CoreError::Persistence(format!(
                "unknown model backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Untested,
    Testing,
    Connected,
    Error,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Untested => "untested",
            ModelStatus::Testing => "testing",
            ModelStatus::Connected => "connected",
            ModelStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "untested" => Ok(ModelStatus::Untested),
            "testing" => Ok(ModelStatus::Testing),
            "connected" => Ok(ModelStatus::Connected),
            "error" => Ok(ModelStatus::Error),
            other => Err(CoreError::Persistence(format!(
                "unknown model status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub backend: ModelBackend,
    pub endpoint: String,
    pub model_name: String,
    pub status: ModelStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModel {
    pub name: String,
    pub backend: ModelBackend,
    pub endpoint: String,
    pub model_name: String,
}

// ---------------------------------------------------------------------------
// Evaluations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Draft,
    Running,
    Completed,
    Failed,
}

impl EvalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalStatus::Draft => "draft",
            EvalStatus::Running => "running",
            EvalStatus::Completed => "completed",
            EvalStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "draft" => Ok(EvalStatus::Draft),
            "running" => Ok(EvalStatus::Running),
            "completed" => Ok(EvalStatus::Completed),
            "failed" => Ok(EvalStatus::Failed),
            other => Err(CoreError::Persistence(format!(
                "unknown evaluation status: {}",
                other
            ))),
        }
    }
}

/// Sampling parameters forwarded to the inference backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            top_p: 0.9,
        }
    }
}

impl SamplingParams {
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(CoreError::validation(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if !(1..=4096).contains(&self.max_tokens) {
            return Err(CoreError::validation(format!(
                "max_tokens {} outside [1, 4096]",
                self.max_tokens
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(CoreError::validation(format!(
                "top_p {} outside [0, 1]",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// Null-aware aggregate averages over an evaluation's results. A missing
/// value means the metric was absent on every result, not that it was zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateScores {
    pub avg_bleu: Option<f64>,
    pub avg_rouge_1: Option<f64>,
    pub avg_rouge_2: Option<f64>,
    pub avg_rouge_l: Option<f64>,
    pub avg_semantic_similarity: Option<f64>,
    pub avg_response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub name: String,
    pub model_id: i64,
    /// Denormalized at creation time; survives deletion of the model.
    pub model_name: String,
    pub status: EvalStatus,
    pub params: SamplingParams,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Ratio in [0, 1]; converted to a percentage only at presentation time.
    pub accuracy: Option<f64>,
    pub aggregates: AggregateScores,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One question/answer pair of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub evaluation_id: i64,
    /// Zero-based position within the dataset. Result[i] answers Question[i].
    pub idx: u32,
    pub question: String,
    pub expected_answer: String,
}

/// Per-result similarity scores. Each field is an independent, pluggable
/// scorer output; `None` means the scorer did not produce a value and the
/// result is excluded from that metric's average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub bleu: Option<f64>,
    pub rouge_1: Option<f64>,
    pub rouge_2: Option<f64>,
    pub rouge_l: Option<f64>,
    pub semantic_similarity: Option<f64>,
}

impl ScoreSet {
    /// Overlay another partial score set; present values win.
    pub fn merge(&mut self, other: ScoreSet) {
        self.bleu = other.bleu.or(self.bleu);
        self.rouge_1 = other.rouge_1.or(self.rouge_1);
        self.rouge_2 = other.rouge_2.or(self.rouge_2);
        self.rouge_l = other.rouge_l.or(self.rouge_l);
        self.semantic_similarity = other.semantic_similarity.or(self.semantic_similarity);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: i64,
    pub evaluation_id: i64,
    pub idx: u32,
    pub question: String,
    pub expected_answer: String,
    pub model_response: String,
    pub correct: bool,
    pub response_time_ms: u64,
    pub scores: ScoreSet,
}

/// Result fields produced by the runner; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub evaluation_id: i64,
    pub idx: u32,
    pub question: String,
    pub expected_answer: String,
    pub model_response: String,
    pub correct: bool,
    pub response_time_ms: u64,
    pub scores: ScoreSet,
}

// ---------------------------------------------------------------------------
// External apps and endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(CoreError::Persistence(format!(
                "unknown http method: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalApp {
    pub id: i64,
    pub name: String,
    pub service_name: String,
    pub base_url: String,
    pub description: Option<String>,
    pub auth_method: AuthMethod,
    pub credential: Option<Credential>,
    pub health_endpoint: String,
    pub timeout_secs: u64,
    pub ssl_verify: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation/update input for an external app. `secret` is the raw
/// authentication material; the store normalizes it into an envelope before
/// persisting, so the raw shape is never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalAppInput {
    pub name: String,
    pub service_name: String,
    pub base_url: String,
    pub description: Option<String>,
    pub auth_method: AuthMethod,
    #[serde(skip_serializing)]
    pub secret: Option<Secret>,
    pub health_endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub ssl_verify: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub app_id: i64,
    pub method: HttpMethod,
    pub path: String,
    pub expected_status: u16,
    pub expected_substring: Option<String>,
    pub headers: Option<serde_json::Value>,
    pub body: Option<serde_json::Value>,
    pub timeout_secs: Option<u64>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInput {
    pub method: HttpMethod,
    pub path: String,
    pub expected_status: u16,
    pub expected_substring: Option<String>,
    pub headers: Option<serde_json::Value>,
    pub body: Option<serde_json::Value>,
    pub timeout_secs: Option<u64>,
    pub active: bool,
}

impl Default for EndpointInput {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            path: "/".into(),
            expected_status: 200,
            expected_substring: None,
            headers: None,
            body: None,
            timeout_secs: None,
            active: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Synthetic tests and executions
// ---------------------------------------------------------------------------

pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Uptime,
    Api,
    Browser,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Uptime => "uptime",
            TestKind::Api => "api",
            TestKind::Browser => "browser",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "uptime" => Ok(TestKind::Uptime),
            "api" => Ok(TestKind::Api),
            "browser" => Ok(TestKind::Browser),
            other => Err(CoreError::Persistence(format!(
                "unknown test kind: {}",
                other
            ))),
        }
    }

    pub const ALL: [TestKind; 3] = [TestKind::Uptime, TestKind::Api, TestKind::Browser];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticTest {
    pub id: i64,
    pub name: String,
    pub service_name: String,
    pub kind: TestKind,
    pub url: String,
    pub method: HttpMethod,
    pub headers: Option<serde_json::Value>,
    pub body: Option<serde_json::Value>,
    /// None means "any 2xx" (uptime-style probes).
    pub expected_status: Option<u16>,
    pub expected_substring: Option<String>,
    pub timeout_secs: u64,
    pub interval_secs: u64,
    pub active: bool,
    pub auth_method: AuthMethod,
    pub credential: Option<Credential>,
    pub ssl_verify: bool,
    pub created_at: DateTime<Utc>,
}

/// Unsaved synthetic test. Built either manually or derived from an external
/// app; the two are mutually exclusive constructor choices, not a runtime
/// flag. `secret` is raw authentication material (or an already-normalized
/// envelope, which passes through unchanged).
#[derive(Debug, Clone)]
pub struct SyntheticTestDraft {
    pub name: String,
    pub service_name: String,
    pub kind: TestKind,
    pub url: String,
    pub method: HttpMethod,
    pub headers: Option<serde_json::Value>,
    pub body: Option<serde_json::Value>,
    pub expected_status: Option<u16>,
    pub expected_substring: Option<String>,
    pub timeout_secs: u64,
    pub interval_secs: u64,
    pub active: bool,
    pub auth_method: AuthMethod,
    pub secret: Option<Secret>,
    pub ssl_verify: bool,
}

impl SyntheticTestDraft {
    pub fn manual(
        name: impl Into<String>,
        service_name: impl Into<String>,
        kind: TestKind,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_name: service_name.into(),
            kind,
            url: url.into(),
            method: HttpMethod::Get,
            headers: None,
            body: None,
            expected_status: Some(200),
            expected_substring: None,
            timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            active: true,
            auth_method: AuthMethod::None,
            secret: None,
            ssl_verify: true,
        }
    }

    /// Derive a health probe from an external app: URL is the app's base URL
    /// joined with its health path, and auth/timeout/SSL settings are copied.
    pub fn from_external_app(app: &ExternalApp, name: impl Into<String>, kind: TestKind) -> Self {
        let url = format!(
            "{}{}",
            app.base_url.trim_end_matches('/'),
            app.health_endpoint
        );
        let secret = app
            .credential
            .as_ref()
            .and_then(|c| c.to_json().ok())
            .map(Secret::new);
        Self {
            name: name.into(),
            service_name: app.service_name.clone(),
            kind,
            url,
            method: HttpMethod::Get,
            headers: None,
            body: None,
            expected_status: if kind == TestKind::Uptime { None } else { Some(200) },
            expected_substring: None,
            timeout_secs: app.timeout_secs,
            interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            active: true,
            auth_method: app.auth_method,
            secret,
            ssl_verify: app.ssl_verify,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Failure,
    Timeout,
    Error,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::Failure => "failure",
            ExecutionOutcome::Timeout => "timeout",
            ExecutionOutcome::Error => "error",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "success" => Ok(ExecutionOutcome::Success),
            "failure" => Ok(ExecutionOutcome::Failure),
            "timeout" => Ok(ExecutionOutcome::Timeout),
            "error" => Ok(ExecutionOutcome::Error),
            other => Err(CoreError::Persistence(format!(
                "unknown execution outcome: {}",
                other
            ))),
        }
    }
}

/// One completed probe invocation. Append-only; never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub test_id: i64,
    pub outcome: ExecutionOutcome,
    pub response_time_ms: f64,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExecution {
    pub test_id: i64,
    pub outcome: ExecutionOutcome,
    pub response_time_ms: f64,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_param_ranges() {
        assert!(SamplingParams::default().validate().is_ok());

        let mut p = SamplingParams::default();
        p.temperature = 2.5;
        assert!(matches!(p.validate(), Err(CoreError::Validation(_))));

        p = SamplingParams::default();
        p.max_tokens = 0;
        assert!(matches!(p.validate(), Err(CoreError::Validation(_))));

        p = SamplingParams::default();
        p.top_p = 1.01;
        assert!(matches!(p.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn score_merge_prefers_present() {
        let mut base = ScoreSet {
            bleu: Some(0.2),
            ..ScoreSet::default()
        };
        base.merge(ScoreSet {
            rouge_1: Some(0.5),
            ..ScoreSet::default()
        });
        assert_eq!(base.bleu, Some(0.2));
        assert_eq!(base.rouge_1, Some(0.5));
        assert_eq!(base.semantic_similarity, None);
    }

    #[test]
    fn draft_from_app_joins_health_path() {
        let app = ExternalApp {
            id: 1,
            name: "billing".into(),
            service_name: "billing-svc".into(),
            base_url: "https://billing.example.com/".into(),
            description: None,
            auth_method: AuthMethod::ApiKey,
            credential: crate::auth::Credential::normalize(AuthMethod::ApiKey, Some("k1")),
            health_endpoint: "/health".into(),
            timeout_secs: 12,
            ssl_verify: true,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let draft = SyntheticTestDraft::from_external_app(&app, "billing health", TestKind::Api);
        assert_eq!(draft.url, "https://billing.example.com/health");
        assert_eq!(draft.timeout_secs, 12);
        assert_eq!(draft.auth_method, AuthMethod::ApiKey);
        // the copied secret is the already-normalized envelope
        assert_eq!(
            draft.secret.as_ref().map(|s| s.expose()),
            Some(r#"{"header_name":"X-API-Key","key":"k1"}"#)
        );
    }

    #[test]
    fn status_round_trip() {
        for s in [
            EvalStatus::Draft,
            EvalStatus::Running,
            EvalStatus::Completed,
            EvalStatus::Failed,
        ] {
            assert_eq!(EvalStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(EvalStatus::parse("bogus").is_err());
    }
}
