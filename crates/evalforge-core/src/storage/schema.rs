pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS models (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  backend TEXT NOT NULL,
  endpoint TEXT NOT NULL,
  model_name TEXT NOT NULL,
  status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  model_id INTEGER NOT NULL,
  model_name TEXT NOT NULL,
  status TEXT NOT NULL,
  temperature REAL NOT NULL,
  max_tokens INTEGER NOT NULL,
  top_p REAL NOT NULL,
  total_questions INTEGER NOT NULL DEFAULT 0,
  correct_answers INTEGER NOT NULL DEFAULT 0,
  incorrect_answers INTEGER NOT NULL DEFAULT 0,
  accuracy REAL,
  avg_bleu REAL,
  avg_rouge_1 REAL,
  avg_rouge_2 REAL,
  avg_rouge_l REAL,
  avg_semantic_similarity REAL,
  avg_response_time_ms REAL,
  created_at TEXT NOT NULL,
  started_at TEXT,
  completed_at TEXT
);

CREATE TABLE IF NOT EXISTS questions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  evaluation_id INTEGER NOT NULL REFERENCES evaluations(id),
  idx INTEGER NOT NULL,
  question TEXT NOT NULL,
  expected_answer TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  evaluation_id INTEGER NOT NULL REFERENCES evaluations(id),
  idx INTEGER NOT NULL,
  question TEXT NOT NULL,
  expected_answer TEXT NOT NULL,
  model_response TEXT NOT NULL,
  correct INTEGER NOT NULL,
  response_time_ms INTEGER NOT NULL,
  bleu REAL,
  rouge_1 REAL,
  rouge_2 REAL,
  rouge_l REAL,
  semantic_similarity REAL
);

CREATE TABLE IF NOT EXISTS external_apps (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  service_name TEXT NOT NULL,
  base_url TEXT NOT NULL,
  description TEXT,
  auth_method TEXT NOT NULL,
  credential_json TEXT,
  health_endpoint TEXT NOT NULL,
  timeout_secs INTEGER NOT NULL,
  ssl_verify INTEGER NOT NULL,
  active INTEGER NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS endpoints (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  app_id INTEGER NOT NULL REFERENCES external_apps(id),
  method TEXT NOT NULL,
  path TEXT NOT NULL,
  expected_status INTEGER NOT NULL,
  expected_substring TEXT,
  headers_json TEXT,
  body_json TEXT,
  timeout_secs INTEGER,
  active INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS synthetic_tests (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  service_name TEXT NOT NULL,
  kind TEXT NOT NULL,
  url TEXT NOT NULL,
  method TEXT NOT NULL,
  headers_json TEXT,
  body_json TEXT,
  expected_status INTEGER,
  expected_substring TEXT,
  timeout_secs INTEGER NOT NULL,
  interval_secs INTEGER NOT NULL,
  active INTEGER NOT NULL,
  auth_method TEXT NOT NULL,
  credential_json TEXT,
  ssl_verify INTEGER NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS executions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  test_id INTEGER NOT NULL REFERENCES synthetic_tests(id),
  outcome TEXT NOT NULL,
  response_time_ms REAL NOT NULL,
  status_code INTEGER,
  error_message TEXT,
  executed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_evaluation ON results(evaluation_id, idx);
CREATE INDEX IF NOT EXISTS idx_questions_evaluation ON questions(evaluation_id, idx);
CREATE INDEX IF NOT EXISTS idx_executions_test ON executions(test_id, executed_at);
"#;
