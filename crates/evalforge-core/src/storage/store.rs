use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::auth::{AuthMethod, Credential, Secret};
use crate::errors::{CoreError, CoreResult};
use crate::model::{
    AggregateScores, Endpoint, EndpointInput, EvalStatus, Evaluation, Execution, ExecutionOutcome,
    ExternalApp, ExternalAppInput, HttpMethod, Model, ModelBackend, ModelStatus, NewExecution,
    NewModel, NewResult, QaPair, Question, ResultRow, SamplingParams, ScoreSet, SyntheticTest,
    SyntheticTestDraft, TestKind,
};

/// Shared entity store. The connection mutex serializes writes; one writer
/// per row at a time and readers always see the last committed write.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(super::schema::DDL)?;
        Ok(())
    }

    // -- models -------------------------------------------------------------

    pub fn create_model(&self, new: &NewModel) -> CoreResult<Model> {
        require(&new.name, "model name")?;
        require(&new.endpoint, "model endpoint")?;
        require(&new.model_name, "target model identifier")?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO models(name, backend, endpoint, model_name, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.name,
                new.backend.as_str(),
                new.endpoint,
                new.model_name,
                ModelStatus::Untested.as_str()
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_model(id)
    }

    pub fn list_models(&self) -> CoreResult<Vec<Model>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM models ORDER BY id")?;
        let rows = stmt.query_map([], model_from_row)?;
        collect(rows)
    }

    pub fn get_model(&self, id: i64) -> CoreResult<Model> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM models WHERE id=?1", params![id], model_from_row)
            .optional()?
            .ok_or_else(|| CoreError::not_found("model", id))
    }

    /// Models may be deleted while evaluations reference them; evaluations
    /// keep the denormalized model name.
    pub fn delete_model(&self, id: i64) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM models WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(CoreError::not_found("model", id));
        }
        Ok(())
    }

    pub fn set_model_status(&self, id: i64, status: ModelStatus) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE models SET status=?1 WHERE id=?2",
            params![status.as_str(), id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found("model", id));
        }
        Ok(())
    }

    // -- evaluations --------------------------------------------------------

    /// Create an evaluation in draft together with its ordered question list.
    /// The insert is transactional so a failure never leaves a half-written
    /// evaluation visible.
    pub fn create_evaluation(
        &self,
        name: &str,
        model: &Model,
        params_in: SamplingParams,
        pairs: &[QaPair],
    ) -> CoreResult<Evaluation> {
        require(name, "evaluation name")?;
        params_in.validate()?;
        if pairs.is_empty() {
            return Err(CoreError::validation("evaluation has no questions"));
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(CoreError::from)?;
        tx.execute(
            "INSERT INTO evaluations(name, model_id, model_name, status, temperature, max_tokens,
                                     top_p, total_questions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                name,
                model.id,
                model.name,
                EvalStatus::Draft.as_str(),
                params_in.temperature,
                params_in.max_tokens,
                params_in.top_p,
                pairs.len() as i64,
                ts(Utc::now())
            ],
        )?;
        let id = tx.last_insert_rowid();
        for (idx, pair) in pairs.iter().enumerate() {
            tx.execute(
                "INSERT INTO questions(evaluation_id, idx, question, expected_answer)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, idx as i64, pair.question, pair.answer],
            )?;
        }
        tx.commit().map_err(CoreError::from)?;
        drop(conn);
        self.get_evaluation(id)
    }

    pub fn list_evaluations(&self) -> CoreResult<Vec<Evaluation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM evaluations ORDER BY id")?;
        let rows = stmt.query_map([], evaluation_from_row)?;
        collect(rows)
    }

    pub fn get_evaluation(&self, id: i64) -> CoreResult<Evaluation> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM evaluations WHERE id=?1",
            params![id],
            evaluation_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("evaluation", id))
    }

    /// Cascade-deletes the evaluation's questions and results.
    pub fn delete_evaluation(&self, id: i64) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(CoreError::from)?;
        tx.execute("DELETE FROM results WHERE evaluation_id=?1", params![id])?;
        tx.execute("DELETE FROM questions WHERE evaluation_id=?1", params![id])?;
        let n = tx.execute("DELETE FROM evaluations WHERE id=?1", params![id])?;
        tx.commit().map_err(CoreError::from)?;
        if n == 0 {
            return Err(CoreError::not_found("evaluation", id));
        }
        Ok(())
    }

    pub fn list_questions(&self, evaluation_id: i64) -> CoreResult<Vec<Question>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, evaluation_id, idx, question, expected_answer
             FROM questions WHERE evaluation_id=?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![evaluation_id], |row| {
            Ok(Question {
                id: row.get(0)?,
                evaluation_id: row.get(1)?,
                idx: row.get::<_, i64>(2)? as u32,
                question: row.get(3)?,
                expected_answer: row.get(4)?,
            })
        })?;
        collect(rows)
    }

    /// draft -> running. The guard is the WHERE clause: a concurrent second
    /// `run` updates zero rows and gets InvalidState, never a duplicate run.
    pub fn begin_run(&self, id: i64) -> CoreResult<()> {
        self.transition(
            id,
            EvalStatus::Draft,
            "UPDATE evaluations SET status='running', started_at=?1
             WHERE id=?2 AND status='draft'",
        )
    }

    /// running -> completed, persisting the tally and null-aware aggregates.
    pub fn complete_run(
        &self,
        id: i64,
        correct: u32,
        incorrect: u32,
        accuracy: f64,
        aggregates: &AggregateScores,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE evaluations SET status='completed', completed_at=?1, correct_answers=?2,
                    incorrect_answers=?3, accuracy=?4, avg_bleu=?5, avg_rouge_1=?6,
                    avg_rouge_2=?7, avg_rouge_l=?8, avg_semantic_similarity=?9,
                    avg_response_time_ms=?10
             WHERE id=?11 AND status='running'",
            params![
                ts(Utc::now()),
                correct,
                incorrect,
                accuracy,
                aggregates.avg_bleu,
                aggregates.avg_rouge_1,
                aggregates.avg_rouge_2,
                aggregates.avg_rouge_l,
                aggregates.avg_semantic_similarity,
                aggregates.avg_response_time_ms,
                id
            ],
        )?;
        drop(conn);
        if n == 0 {
            return Err(self.transition_error(id, EvalStatus::Running));
        }
        Ok(())
    }

    /// running -> failed. Already-written results are preserved.
    pub fn fail_run(&self, id: i64) -> CoreResult<()> {
        self.transition(
            id,
            EvalStatus::Running,
            "UPDATE evaluations SET status='failed', completed_at=?1
             WHERE id=?2 AND status='running'",
        )
    }

    fn transition(&self, id: i64, expected: EvalStatus, sql: &str) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(sql, params![ts(Utc::now()), id])?;
        drop(conn);
        if n == 0 {
            return Err(self.transition_error(id, expected));
        }
        Ok(())
    }

    fn transition_error(&self, id: i64, expected: EvalStatus) -> CoreError {
        match self.get_evaluation(id) {
            Ok(eval) => CoreError::InvalidState(format!(
                "evaluation {} is {}, expected {}",
                id,
                eval.status.as_str(),
                expected.as_str()
            )),
            Err(e) => e,
        }
    }

    pub fn insert_result(&self, new: &NewResult) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO results(evaluation_id, idx, question, expected_answer, model_response,
                                 correct, response_time_ms, bleu, rouge_1, rouge_2, rouge_l,
                                 semantic_similarity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.evaluation_id,
                new.idx as i64,
                new.question,
                new.expected_answer,
                new.model_response,
                new.correct,
                new.response_time_ms as i64,
                new.scores.bleu,
                new.scores.rouge_1,
                new.scores.rouge_2,
                new.scores.rouge_l,
                new.scores.semantic_similarity,
            ],
        )?;
        Ok(())
    }

    pub fn list_results(&self, evaluation_id: i64) -> CoreResult<Vec<ResultRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM results WHERE evaluation_id=?1 ORDER BY idx")?;
        let rows = stmt.query_map(params![evaluation_id], result_from_row)?;
        collect(rows)
    }

    // -- external apps ------------------------------------------------------

    pub fn create_external_app(&self, input: &ExternalAppInput) -> CoreResult<ExternalApp> {
        require(&input.name, "app name")?;
        require(&input.service_name, "service name")?;
        require(&input.base_url, "base URL")?;
        let credential = normalize_secret(input.auth_method, input.secret.as_ref());
        let now = ts(Utc::now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO external_apps(name, service_name, base_url, description, auth_method,
                                       credential_json, health_endpoint, timeout_secs, ssl_verify,
                                       active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                input.name,
                input.service_name,
                input.base_url,
                input.description,
                input.auth_method.as_str(),
                credential_json(&credential)?,
                input.health_endpoint.as_deref().unwrap_or("/health"),
                input.timeout_secs.unwrap_or(30) as i64,
                input.ssl_verify,
                input.active,
                now,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_external_app(id)
    }

    pub fn list_external_apps(&self) -> CoreResult<Vec<ExternalApp>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM external_apps ORDER BY id")?;
        let rows = stmt.query_map([], app_from_row)?;
        collect(rows)
    }

    pub fn get_external_app(&self, id: i64) -> CoreResult<ExternalApp> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM external_apps WHERE id=?1",
            params![id],
            app_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("external app", id))
    }

    /// Authentication material goes through the normalizer again on update;
    /// passing the stored envelope back is a no-op.
    pub fn update_external_app(&self, id: i64, input: &ExternalAppInput) -> CoreResult<ExternalApp> {
        require(&input.name, "app name")?;
        require(&input.service_name, "service name")?;
        require(&input.base_url, "base URL")?;
        let credential = normalize_secret(input.auth_method, input.secret.as_ref());
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE external_apps SET name=?1, service_name=?2, base_url=?3, description=?4,
                    auth_method=?5, credential_json=?6, health_endpoint=?7, timeout_secs=?8,
                    ssl_verify=?9, active=?10, updated_at=?11
             WHERE id=?12",
            params![
                input.name,
                input.service_name,
                input.base_url,
                input.description,
                input.auth_method.as_str(),
                credential_json(&credential)?,
                input.health_endpoint.as_deref().unwrap_or("/health"),
                input.timeout_secs.unwrap_or(30) as i64,
                input.ssl_verify,
                input.active,
                ts(Utc::now()),
                id
            ],
        )?;
        drop(conn);
        if n == 0 {
            return Err(CoreError::not_found("external app", id));
        }
        self.get_external_app(id)
    }

    /// Cascade-deletes the app's endpoints.
    pub fn delete_external_app(&self, id: i64) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(CoreError::from)?;
        tx.execute("DELETE FROM endpoints WHERE app_id=?1", params![id])?;
        let n = tx.execute("DELETE FROM external_apps WHERE id=?1", params![id])?;
        tx.commit().map_err(CoreError::from)?;
        if n == 0 {
            return Err(CoreError::not_found("external app", id));
        }
        Ok(())
    }

    // -- endpoints ----------------------------------------------------------

    pub fn create_endpoint(&self, app_id: i64, input: &EndpointInput) -> CoreResult<Endpoint> {
        self.get_external_app(app_id)?;
        require(&input.path, "endpoint path")?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO endpoints(app_id, method, path, expected_status, expected_substring,
                                   headers_json, body_json, timeout_secs, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                app_id,
                input.method.as_str(),
                input.path,
                input.expected_status,
                input.expected_substring,
                json_text(&input.headers)?,
                json_text(&input.body)?,
                input.timeout_secs.map(|t| t as i64),
                input.active
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_endpoint(id)
    }

    pub fn list_endpoints(&self, app_id: i64) -> CoreResult<Vec<Endpoint>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM endpoints WHERE app_id=?1 ORDER BY id")?;
        let rows = stmt.query_map(params![app_id], endpoint_from_row)?;
        collect(rows)
    }

    pub fn get_endpoint(&self, id: i64) -> CoreResult<Endpoint> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM endpoints WHERE id=?1",
            params![id],
            endpoint_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("endpoint", id))
    }

    pub fn update_endpoint(&self, id: i64, input: &EndpointInput) -> CoreResult<Endpoint> {
        require(&input.path, "endpoint path")?;
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE endpoints SET method=?1, path=?2, expected_status=?3, expected_substring=?4,
                    headers_json=?5, body_json=?6, timeout_secs=?7, active=?8
             WHERE id=?9",
            params![
                input.method.as_str(),
                input.path,
                input.expected_status,
                input.expected_substring,
                json_text(&input.headers)?,
                json_text(&input.body)?,
                input.timeout_secs.map(|t| t as i64),
                input.active,
                id
            ],
        )?;
        drop(conn);
        if n == 0 {
            return Err(CoreError::not_found("endpoint", id));
        }
        self.get_endpoint(id)
    }

    pub fn delete_endpoint(&self, id: i64) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM endpoints WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(CoreError::not_found("endpoint", id));
        }
        Ok(())
    }

    // -- synthetic tests ----------------------------------------------------

    pub fn create_synthetic_test(&self, draft: &SyntheticTestDraft) -> CoreResult<SyntheticTest> {
        require(&draft.name, "test name")?;
        require(&draft.service_name, "service name")?;
        require(&draft.url, "test URL")?;
        if draft.timeout_secs == 0 {
            return Err(CoreError::validation("timeout must be positive"));
        }
        if draft.interval_secs == 0 {
            return Err(CoreError::validation("interval must be positive"));
        }
        let credential = normalize_secret(draft.auth_method, draft.secret.as_ref());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO synthetic_tests(name, service_name, kind, url, method, headers_json,
                                         body_json, expected_status, expected_substring,
                                         timeout_secs, interval_secs, active, auth_method,
                                         credential_json, ssl_verify, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                draft.name,
                draft.service_name,
                draft.kind.as_str(),
                draft.url,
                draft.method.as_str(),
                json_text(&draft.headers)?,
                json_text(&draft.body)?,
                draft.expected_status,
                draft.expected_substring,
                draft.timeout_secs as i64,
                draft.interval_secs as i64,
                draft.active,
                draft.auth_method.as_str(),
                credential_json(&credential)?,
                draft.ssl_verify,
                ts(Utc::now())
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_synthetic_test(id)
    }

    pub fn list_synthetic_tests(&self) -> CoreResult<Vec<SyntheticTest>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM synthetic_tests ORDER BY id")?;
        let rows = stmt.query_map([], test_from_row)?;
        collect(rows)
    }

    pub fn list_active_synthetic_tests(&self) -> CoreResult<Vec<SyntheticTest>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM synthetic_tests WHERE active=1 ORDER BY id")?;
        let rows = stmt.query_map([], test_from_row)?;
        collect(rows)
    }

    pub fn get_synthetic_test(&self, id: i64) -> CoreResult<SyntheticTest> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM synthetic_tests WHERE id=?1",
            params![id],
            test_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("synthetic test", id))
    }

    /// Cascade-deletes the test's executions.
    pub fn delete_synthetic_test(&self, id: i64) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(CoreError::from)?;
        tx.execute("DELETE FROM executions WHERE test_id=?1", params![id])?;
        let n = tx.execute("DELETE FROM synthetic_tests WHERE id=?1", params![id])?;
        tx.commit().map_err(CoreError::from)?;
        if n == 0 {
            return Err(CoreError::not_found("synthetic test", id));
        }
        Ok(())
    }

    // -- executions ---------------------------------------------------------

    pub fn insert_execution(&self, new: &NewExecution) -> CoreResult<Execution> {
        let executed_at = ts(Utc::now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO executions(test_id, outcome, response_time_ms, status_code,
                                    error_message, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.test_id,
                new.outcome.as_str(),
                new.response_time_ms,
                new.status_code,
                new.error_message,
                executed_at
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM executions WHERE id=?1",
            params![id],
            execution_from_row,
        )
        .map_err(CoreError::from)
    }

    /// Newest first, deterministically tie-broken by id.
    pub fn list_executions(
        &self,
        test_id: Option<i64>,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Execution>> {
        let conn = self.conn.lock().unwrap();
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        match test_id {
            Some(tid) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM executions WHERE test_id=?1
                     ORDER BY executed_at DESC, id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![tid, limit], execution_from_row)?;
                collect(rows)
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM executions ORDER BY executed_at DESC, id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], execution_from_row)?;
                collect(rows)
            }
        }
    }

    /// Executions of all tests of one kind since the cutoff (rollup window).
    pub fn list_executions_since(
        &self,
        kind: TestKind,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.test_id, e.outcome, e.response_time_ms, e.status_code,
                    e.error_message, e.executed_at
             FROM executions e JOIN synthetic_tests t ON e.test_id = t.id
             WHERE t.kind=?1 AND e.executed_at >= ?2
             ORDER BY e.executed_at DESC, e.id DESC",
        )?;
        let rows = stmt.query_map(params![kind.as_str(), ts(cutoff)], execution_from_row)?;
        collect(rows)
    }
}

// -- helpers ----------------------------------------------------------------

/// Fixed-width UTC timestamps so string comparison in SQL matches time order.
fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::Persistence(format!("bad timestamp {:?}: {}", s, e)))
}

fn require(value: &str, field: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn normalize_secret(method: AuthMethod, secret: Option<&Secret>) -> Option<Credential> {
    Credential::normalize(method, secret.map(|s| s.expose()))
}

fn credential_json(credential: &Option<Credential>) -> CoreResult<Option<String>> {
    credential
        .as_ref()
        .map(|c| c.to_json().map_err(CoreError::from))
        .transpose()
}

fn json_text(value: &Option<serde_json::Value>) -> CoreResult<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(CoreError::from))
        .transpose()
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> CoreResult<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn conv<T>(idx: usize, r: CoreResult<T>) -> rusqlite::Result<T> {
    r.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<Model> {
    Ok(Model {
        id: row.get("id")?,
        name: row.get("name")?,
        backend: conv(0, ModelBackend::parse(&row.get::<_, String>("backend")?))?,
        endpoint: row.get("endpoint")?,
        model_name: row.get("model_name")?,
        status: conv(0, ModelStatus::parse(&row.get::<_, String>("status")?))?,
    })
}

fn evaluation_from_row(row: &Row<'_>) -> rusqlite::Result<Evaluation> {
    Ok(Evaluation {
        id: row.get("id")?,
        name: row.get("name")?,
        model_id: row.get("model_id")?,
        model_name: row.get("model_name")?,
        status: conv(0, EvalStatus::parse(&row.get::<_, String>("status")?))?,
        params: SamplingParams {
            temperature: row.get("temperature")?,
            max_tokens: row.get::<_, i64>("max_tokens")? as u32,
            top_p: row.get("top_p")?,
        },
        total_questions: row.get::<_, i64>("total_questions")? as u32,
        correct_answers: row.get::<_, i64>("correct_answers")? as u32,
        incorrect_answers: row.get::<_, i64>("incorrect_answers")? as u32,
        accuracy: row.get("accuracy")?,
        aggregates: AggregateScores {
            avg_bleu: row.get("avg_bleu")?,
            avg_rouge_1: row.get("avg_rouge_1")?,
            avg_rouge_2: row.get("avg_rouge_2")?,
            avg_rouge_l: row.get("avg_rouge_l")?,
            avg_semantic_similarity: row.get("avg_semantic_similarity")?,
            avg_response_time_ms: row.get("avg_response_time_ms")?,
        },
        created_at: conv(0, parse_ts(&row.get::<_, String>("created_at")?))?,
        started_at: opt_ts(row, "started_at")?,
        completed_at: opt_ts(row, "completed_at")?,
    })
}

fn opt_ts(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(col)? {
        Some(s) => Ok(Some(conv(0, parse_ts(&s))?)),
        None => Ok(None),
    }
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get("id")?,
        evaluation_id: row.get("evaluation_id")?,
        idx: row.get::<_, i64>("idx")? as u32,
        question: row.get("question")?,
        expected_answer: row.get("expected_answer")?,
        model_response: row.get("model_response")?,
        correct: row.get("correct")?,
        response_time_ms: row.get::<_, i64>("response_time_ms")? as u64,
        scores: ScoreSet {
            bleu: row.get("bleu")?,
            rouge_1: row.get("rouge_1")?,
            rouge_2: row.get("rouge_2")?,
            rouge_l: row.get("rouge_l")?,
            semantic_similarity: row.get("semantic_similarity")?,
        },
    })
}

fn opt_credential(row: &Row<'_>) -> rusqlite::Result<Option<Credential>> {
    match row.get::<_, Option<String>>("credential_json")? {
        Some(s) => {
            let cred = conv(0, Credential::from_json(&s).map_err(CoreError::from))?;
            Ok(Some(cred))
        }
        None => Ok(None),
    }
}

fn opt_json(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<serde_json::Value>> {
    match row.get::<_, Option<String>>(col)? {
        Some(s) => {
            let value = conv(0, serde_json::from_str(&s).map_err(CoreError::from))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn auth_method_from_row(row: &Row<'_>) -> rusqlite::Result<AuthMethod> {
    let raw = row.get::<_, String>("auth_method")?;
    conv(
        0,
        AuthMethod::parse(&raw)
            .ok_or_else(|| CoreError::Persistence(format!("unknown auth method: {}", raw))),
    )
}

fn app_from_row(row: &Row<'_>) -> rusqlite::Result<ExternalApp> {
    Ok(ExternalApp {
        id: row.get("id")?,
        name: row.get("name")?,
        service_name: row.get("service_name")?,
        base_url: row.get("base_url")?,
        description: row.get("description")?,
        auth_method: auth_method_from_row(row)?,
        credential: opt_credential(row)?,
        health_endpoint: row.get("health_endpoint")?,
        timeout_secs: row.get::<_, i64>("timeout_secs")? as u64,
        ssl_verify: row.get("ssl_verify")?,
        active: row.get("active")?,
        created_at: conv(0, parse_ts(&row.get::<_, String>("created_at")?))?,
        updated_at: conv(0, parse_ts(&row.get::<_, String>("updated_at")?))?,
    })
}

fn endpoint_from_row(row: &Row<'_>) -> rusqlite::Result<Endpoint> {
    Ok(Endpoint {
        id: row.get("id")?,
        app_id: row.get("app_id")?,
        method: conv(0, HttpMethod::parse(&row.get::<_, String>("method")?))?,
        path: row.get("path")?,
        expected_status: row.get::<_, i64>("expected_status")? as u16,
        expected_substring: row.get("expected_substring")?,
        headers: opt_json(row, "headers_json")?,
        body: opt_json(row, "body_json")?,
        timeout_secs: row.get::<_, Option<i64>>("timeout_secs")?.map(|t| t as u64),
        active: row.get("active")?,
    })
}

fn test_from_row(row: &Row<'_>) -> rusqlite::Result<SyntheticTest> {
    Ok(SyntheticTest {
        id: row.get("id")?,
        name: row.get("name")?,
        service_name: row.get("service_name")?,
        kind: conv(0, TestKind::parse(&row.get::<_, String>("kind")?))?,
        url: row.get("url")?,
        method: conv(0, HttpMethod::parse(&row.get::<_, String>("method")?))?,
        headers: opt_json(row, "headers_json")?,
        body: opt_json(row, "body_json")?,
        expected_status: row
            .get::<_, Option<i64>>("expected_status")?
            .map(|s| s as u16),
        expected_substring: row.get("expected_substring")?,
        timeout_secs: row.get::<_, i64>("timeout_secs")? as u64,
        interval_secs: row.get::<_, i64>("interval_secs")? as u64,
        active: row.get("active")?,
        auth_method: auth_method_from_row(row)?,
        credential: opt_credential(row)?,
        ssl_verify: row.get("ssl_verify")?,
        created_at: conv(0, parse_ts(&row.get::<_, String>("created_at")?))?,
    })
}

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<Execution> {
    Ok(Execution {
        id: row.get("id")?,
        test_id: row.get("test_id")?,
        outcome: conv(0, ExecutionOutcome::parse(&row.get::<_, String>("outcome")?))?,
        response_time_ms: row.get("response_time_ms")?,
        status_code: row.get::<_, Option<i64>>("status_code")?.map(|s| s as u16),
        error_message: row.get("error_message")?,
        executed_at: conv(0, parse_ts(&row.get::<_, String>("executed_at")?))?,
    })
}
