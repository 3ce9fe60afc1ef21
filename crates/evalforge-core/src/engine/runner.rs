use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};

use crate::aggregate;
use crate::errors::{CoreError, CoreResult};
use crate::model::{Evaluation, NewResult, Question, ScoreSet};
use crate::providers::llm::InferenceClient;
use crate::scoring::Scorer;
use crate::storage::Store;

#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Upper bound on a single inference call. Exceeding it records the
    /// question as incorrect and the run continues.
    pub question_timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            question_timeout: Duration::from_secs(60),
        }
    }
}

/// Drives an evaluation through draft -> running -> completed | failed.
pub struct Runner {
    pub store: Store,
    pub client: Arc<dyn InferenceClient>,
    pub scorers: Vec<Arc<dyn Scorer>>,
    pub policy: RunPolicy,
}

impl Runner {
    /// Run an evaluation to a terminal status. Rejected with InvalidState
    /// unless the evaluation is in draft, so a second concurrent `run` can
    /// never produce a duplicate result set.
    pub async fn run(&self, evaluation_id: i64) -> CoreResult<Evaluation> {
        let eval = self.store.get_evaluation(evaluation_id)?;
        self.store.begin_run(evaluation_id)?;
        tracing::info!(
            evaluation = evaluation_id,
            questions = eval.total_questions,
            model = %eval.model_name,
            "evaluation started"
        );

        match self.run_questions(&eval).await {
            Ok(()) => {
                self.finalize(evaluation_id)?;
            }
            Err(e) => {
                // Keep whatever results were written; the failed status is
                // the record that this run did not finish.
                tracing::warn!(evaluation = evaluation_id, error = %e, "evaluation failed");
                let _ = self.store.fail_run(evaluation_id);
                return Err(e);
            }
        }
        self.store.get_evaluation(evaluation_id)
    }

    async fn run_questions(&self, eval: &Evaluation) -> CoreResult<()> {
        let questions = self.store.list_questions(eval.id)?;
        for question in &questions {
            let row = self.answer_question(eval, question).await;
            self.store.insert_result(&row)?;
        }
        Ok(())
    }

    /// Ask one question and score the response. Inference failures are
    /// recovered into an incorrect, score-less result row.
    async fn answer_question(&self, eval: &Evaluation, question: &Question) -> NewResult {
        let started = Instant::now();
        let outcome = timeout(
            self.policy.question_timeout,
            self.client.generate(&question.question, &eval.params),
        )
        .await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let (model_response, correct, scores) = match outcome {
            Ok(Ok(text)) => {
                let correct = is_correct(&question.expected_answer, &text);
                let scores = self.score(&question.expected_answer, &text).await;
                (text, correct, scores)
            }
            Ok(Err(e)) => {
                let err = CoreError::Upstream(e.to_string());
                tracing::warn!(
                    evaluation = eval.id,
                    question = question.idx,
                    error = %err,
                    "inference failed, recording incorrect result"
                );
                (err.to_string(), false, ScoreSet::default())
            }
            Err(_) => {
                let err = CoreError::UpstreamTimeout(format!(
                    "inference timed out after {}s",
                    self.policy.question_timeout.as_secs()
                ));
                tracing::warn!(
                    evaluation = eval.id,
                    question = question.idx,
                    error = %err,
                    "recording incorrect result"
                );
                (err.to_string(), false, ScoreSet::default())
            }
        };

        NewResult {
            evaluation_id: eval.id,
            idx: question.idx,
            question: question.question.clone(),
            expected_answer: question.expected_answer.clone(),
            model_response,
            correct,
            response_time_ms,
            scores,
        }
    }

    /// Run every configured scorer, each bounded by the question timeout
    /// (scorers may call out to an embedding backend). A scorer error or
    /// timeout leaves its fields absent.
    async fn score(&self, expected: &str, response: &str) -> ScoreSet {
        let mut set = ScoreSet::default();
        for scorer in &self.scorers {
            match timeout(self.policy.question_timeout, scorer.score(expected, response)).await {
                Ok(Ok(partial)) => set.merge(partial),
                Ok(Err(e)) => {
                    tracing::warn!(scorer = scorer.name(), error = %e, "scorer failed");
                }
                Err(_) => {
                    tracing::warn!(scorer = scorer.name(), "scorer timed out");
                }
            }
        }
        set
    }

    fn finalize(&self, evaluation_id: i64) -> CoreResult<()> {
        let results = self.store.list_results(evaluation_id)?;
        let correct = results.iter().filter(|r| r.correct).count() as u32;
        let incorrect = results.len() as u32 - correct;
        let accuracy = aggregate::accuracy(&results);
        let aggregates = aggregate::result_aggregates(&results);
        self.store
            .complete_run(evaluation_id, correct, incorrect, accuracy, &aggregates)?;
        tracing::info!(
            evaluation = evaluation_id,
            correct,
            incorrect,
            accuracy,
            "evaluation completed"
        );
        Ok(())
    }
}

/// Case-insensitive containment of the expected answer in the response.
pub fn is_correct(expected: &str, response: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    response.to_lowercase().contains(&expected.to_lowercase())
}
