use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evalforge_core::dataset::sample_dataset;
use evalforge_core::engine::{RunPolicy, Runner};
use evalforge_core::errors::CoreError;
use evalforge_core::model::{
    EvalStatus, ModelBackend, NewModel, SamplingParams, ScoreSet,
};
use evalforge_core::providers::llm::InferenceClient;
use evalforge_core::scoring::Scorer;
use evalforge_core::storage::Store;
use tempfile::tempdir;

/// Answers from the sample key; errors on questions containing a marker.
struct ScriptedClient {
    answers: HashMap<String, String>,
    fail_marker: Option<&'static str>,
}

impl ScriptedClient {
    fn new(fail_marker: Option<&'static str>) -> Self {
        let answers = sample_dataset()
            .into_iter()
            .map(|p| (p.question, p.answer))
            .collect();
        Self {
            answers,
            fail_marker,
        }
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn generate(&self, prompt: &str, _params: &SamplingParams) -> anyhow::Result<String> {
        if let Some(marker) = self.fail_marker {
            if prompt.contains(marker) {
                anyhow::bail!("backend unavailable");
            }
        }
        let answer = self
            .answers
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| "no idea".to_string());
        Ok(format!("The answer is {}.", answer))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["scripted".into()])
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Scores a constant for every result, or fails outright.
struct ConstScorer {
    value: Option<f64>,
    fail: bool,
}

#[async_trait]
impl Scorer for ConstScorer {
    fn name(&self) -> &'static str {
        "const"
    }

    async fn score(&self, _expected: &str, _response: &str) -> anyhow::Result<ScoreSet> {
        if self.fail {
            anyhow::bail!("scorer backend down");
        }
        Ok(ScoreSet {
            bleu: self.value,
            ..ScoreSet::default()
        })
    }
}

fn setup(dir: &tempfile::TempDir) -> (Store, i64) {
    let store = Store::open(&dir.path().join("forge.db")).unwrap();
    store.init_schema().unwrap();
    let model = store
        .create_model(&NewModel {
            name: "scripted".into(),
            backend: ModelBackend::LocalInference,
            endpoint: "http://localhost:11434".into(),
            model_name: "scripted".into(),
        })
        .unwrap();
    let eval = store
        .create_evaluation("run", &model, SamplingParams::default(), &sample_dataset())
        .unwrap();
    (store, eval.id)
}

fn runner(store: &Store, client: ScriptedClient, scorers: Vec<Arc<dyn Scorer>>) -> Runner {
    Runner {
        store: store.clone(),
        client: Arc::new(client),
        scorers,
        policy: RunPolicy {
            question_timeout: Duration::from_secs(5),
        },
    }
}

#[tokio::test]
async fn completed_run_has_full_results_and_accuracy() {
    let dir = tempdir().unwrap();
    let (store, eval_id) = setup(&dir);
    let runner = runner(&store, ScriptedClient::new(None), vec![]);

    let eval = runner.run(eval_id).await.unwrap();
    assert_eq!(eval.status, EvalStatus::Completed);
    assert!(eval.started_at.is_some());
    assert!(eval.completed_at.is_some());

    let results = store.list_results(eval_id).unwrap();
    assert_eq!(results.len() as u32, eval.total_questions);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.idx as usize, i);
        assert!(r.correct, "scripted answers contain the expected text");
    }
    assert_eq!(eval.correct_answers, 10);
    assert_eq!(eval.incorrect_answers, 0);
    let accuracy = eval.accuracy.unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
    assert!((accuracy - 1.0).abs() < 1e-9);
    // no scorers ran, so metric averages are absent rather than zero
    assert_eq!(eval.aggregates.avg_bleu, None);
    assert!(eval.aggregates.avg_response_time_ms.is_some());
}

#[tokio::test]
async fn inference_failure_is_recovered_per_question() {
    let dir = tempdir().unwrap();
    let (store, eval_id) = setup(&dir);
    // "Romeo" appears in exactly one sample question
    let runner = runner(&store, ScriptedClient::new(Some("Romeo")), vec![]);

    let eval = runner.run(eval_id).await.unwrap();
    assert_eq!(eval.status, EvalStatus::Completed);

    let results = store.list_results(eval_id).unwrap();
    assert_eq!(results.len(), 10);
    let failed: Vec<_> = results.iter().filter(|r| !r.correct).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].model_response.starts_with("upstream error:"));
    assert!((eval.accuracy.unwrap() - 0.9).abs() < 1e-9);
    assert_eq!(eval.correct_answers, 9);
    assert_eq!(eval.incorrect_answers, 1);
}

#[tokio::test]
async fn second_run_is_rejected_without_duplicate_results() {
    let dir = tempdir().unwrap();
    let (store, eval_id) = setup(&dir);
    let r = runner(&store, ScriptedClient::new(None), vec![]);
    r.run(eval_id).await.unwrap();

    let r2 = runner(&store, ScriptedClient::new(None), vec![]);
    let err = r2.run(eval_id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));
    assert_eq!(store.list_results(eval_id).unwrap().len(), 10);
}

#[tokio::test]
async fn scorer_errors_leave_metrics_absent() {
    let dir = tempdir().unwrap();
    let (store, eval_id) = setup(&dir);
    let scorers: Vec<Arc<dyn Scorer>> = vec![Arc::new(ConstScorer {
        value: None,
        fail: true,
    })];
    let runner = runner(&store, ScriptedClient::new(None), scorers);

    let eval = runner.run(eval_id).await.unwrap();
    assert_eq!(eval.status, EvalStatus::Completed);
    assert_eq!(eval.aggregates.avg_bleu, None);
    for r in store.list_results(eval_id).unwrap() {
        assert_eq!(r.scores.bleu, None);
    }
}

#[tokio::test]
async fn aggregates_average_present_scores() {
    let dir = tempdir().unwrap();
    let (store, eval_id) = setup(&dir);
    let scorers: Vec<Arc<dyn Scorer>> = vec![Arc::new(ConstScorer {
        value: Some(0.5),
        fail: false,
    })];
    let runner = runner(&store, ScriptedClient::new(None), scorers);

    let eval = runner.run(eval_id).await.unwrap();
    assert!((eval.aggregates.avg_bleu.unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(eval.aggregates.avg_rouge_1, None);
}
