//! Read-only metric rollups. Every function here is pure over the rows it is
//! given: same input, same output, no store access.

use serde::Serialize;

use crate::model::{
    AggregateScores, EvalStatus, Evaluation, Execution, ExecutionOutcome, ResultRow,
};

/// Mean over present values only. Records missing the metric are excluded
/// from numerator and denominator; an empty window yields `None`.
pub fn null_aware_mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Per-evaluation aggregates over its ordered results.
pub fn result_aggregates(results: &[ResultRow]) -> AggregateScores {
    AggregateScores {
        avg_bleu: null_aware_mean(results.iter().map(|r| r.scores.bleu)),
        avg_rouge_1: null_aware_mean(results.iter().map(|r| r.scores.rouge_1)),
        avg_rouge_2: null_aware_mean(results.iter().map(|r| r.scores.rouge_2)),
        avg_rouge_l: null_aware_mean(results.iter().map(|r| r.scores.rouge_l)),
        avg_semantic_similarity: null_aware_mean(
            results.iter().map(|r| r.scores.semantic_similarity),
        ),
        avg_response_time_ms: null_aware_mean(
            results.iter().map(|r| Some(r.response_time_ms as f64)),
        ),
    }
}

/// Fraction of correct results, as a ratio in [0, 1].
pub fn accuracy(results: &[ResultRow]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let correct = results.iter().filter(|r| r.correct).count();
    correct as f64 / results.len() as f64
}

/// Dashboard-level rollup. Averages are restricted to completed evaluations;
/// accuracy stays a ratio in [0, 1].
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRollup {
    pub total_evaluations: usize,
    pub completed_evaluations: usize,
    pub avg_accuracy: Option<f64>,
    pub avg_bleu: Option<f64>,
    pub avg_rouge_1: Option<f64>,
    pub avg_rouge_2: Option<f64>,
    pub avg_rouge_l: Option<f64>,
    pub avg_semantic_similarity: Option<f64>,
    pub avg_response_time_ms: Option<f64>,
}

pub fn dashboard_rollup(evaluations: &[Evaluation]) -> DashboardRollup {
    let completed: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.status == EvalStatus::Completed)
        .collect();
    DashboardRollup {
        total_evaluations: evaluations.len(),
        completed_evaluations: completed.len(),
        avg_accuracy: null_aware_mean(completed.iter().map(|e| e.accuracy)),
        avg_bleu: null_aware_mean(completed.iter().map(|e| e.aggregates.avg_bleu)),
        avg_rouge_1: null_aware_mean(completed.iter().map(|e| e.aggregates.avg_rouge_1)),
        avg_rouge_2: null_aware_mean(completed.iter().map(|e| e.aggregates.avg_rouge_2)),
        avg_rouge_l: null_aware_mean(completed.iter().map(|e| e.aggregates.avg_rouge_l)),
        avg_semantic_similarity: null_aware_mean(
            completed.iter().map(|e| e.aggregates.avg_semantic_similarity),
        ),
        avg_response_time_ms: null_aware_mean(
            completed.iter().map(|e| e.aggregates.avg_response_time_ms),
        ),
    }
}

/// Rollup over one monitoring category's executions in a window.
/// `success_rate` is a percentage in [0, 100]; an empty window is 0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryRollup {
    pub total_executions: usize,
    pub success_rate: f64,
    pub avg_response_time_ms: Option<f64>,
}

/// Per-category rollups of the synthetic-monitoring window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyntheticRollup {
    pub uptime: CategoryRollup,
    pub api: CategoryRollup,
    pub browser: CategoryRollup,
}

pub fn category_rollup(executions: &[Execution]) -> CategoryRollup {
    if executions.is_empty() {
        return CategoryRollup::default();
    }
    let successes = executions
        .iter()
        .filter(|e| e.outcome == ExecutionOutcome::Success)
        .count();
    CategoryRollup {
        total_executions: executions.len(),
        success_rate: successes as f64 / executions.len() as f64 * 100.0,
        avg_response_time_ms: null_aware_mean(
            executions.iter().map(|e| Some(e.response_time_ms)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoreSet;
    use chrono::Utc;

    fn result(correct: bool, bleu: Option<f64>) -> ResultRow {
        ResultRow {
            id: 0,
            evaluation_id: 1,
            idx: 0,
            question: "q".into(),
            expected_answer: "a".into(),
            model_response: "r".into(),
            correct,
            response_time_ms: 100,
            scores: ScoreSet {
                bleu,
                ..ScoreSet::default()
            },
        }
    }

    fn execution(outcome: ExecutionOutcome, response_time_ms: f64) -> Execution {
        Execution {
            id: 0,
            test_id: 1,
            outcome,
            response_time_ms,
            status_code: None,
            error_message: None,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn null_aware_mean_excludes_missing() {
        // (0.5 + 0.7) / 2, not (0.5 + 0 + 0.7) / 3
        let avg = null_aware_mean([Some(0.5), None, Some(0.7)]).unwrap();
        assert!((avg - 0.6).abs() < 1e-9);
    }

    #[test]
    fn null_aware_mean_empty_is_none() {
        assert_eq!(null_aware_mean([None, None]), None);
        assert_eq!(null_aware_mean(std::iter::empty::<Option<f64>>()), None);
    }

    #[test]
    fn accuracy_is_correct_fraction() {
        let rows = vec![result(true, None), result(false, None), result(true, None)];
        assert!((accuracy(&rows) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(accuracy(&[]), 0.0);
    }

    #[test]
    fn result_aggregates_skip_absent_scores() {
        let rows = vec![
            result(true, Some(0.5)),
            result(false, None),
            result(true, Some(0.7)),
        ];
        let agg = result_aggregates(&rows);
        assert!((agg.avg_bleu.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(agg.avg_rouge_1, None);
        assert!((agg.avg_response_time_ms.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn category_rollup_success_rate_is_percentage() {
        let execs = vec![
            execution(ExecutionOutcome::Success, 20.0),
            execution(ExecutionOutcome::Failure, 30.0),
            execution(ExecutionOutcome::Success, 40.0),
            execution(ExecutionOutcome::Timeout, 50.0),
        ];
        let rollup = category_rollup(&execs);
        assert_eq!(rollup.total_executions, 4);
        assert!((rollup.success_rate - 50.0).abs() < 1e-9);
        assert!((rollup.avg_response_time_ms.unwrap() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_is_zero_rate() {
        let rollup = category_rollup(&[]);
        assert_eq!(rollup.total_executions, 0);
        assert_eq!(rollup.success_rate, 0.0);
        assert_eq!(rollup.avg_response_time_ms, None);
    }
}
