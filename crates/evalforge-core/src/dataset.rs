//! Dataset resolution: the bundled sample set and CSV ingestion.

use std::io::Read;

use crate::errors::{CoreError, CoreResult};
use crate::model::QaPair;

/// Upper bound on question/answer rows per evaluation. Keeps a run bounded
/// to MAX_DATASET_ROWS x question timeout in the worst case.
pub const MAX_DATASET_ROWS: usize = 1000;

/// Where an evaluation's questions come from: the bundled sample or an
/// uploaded question/answer list (already parsed at the transport edge).
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Sample,
    Pairs(Vec<QaPair>),
}

impl DatasetSource {
    /// Resolve into the ordered question list an evaluation is created with.
    pub fn resolve(self) -> CoreResult<Vec<QaPair>> {
        let pairs = match self {
            DatasetSource::Sample => sample_dataset(),
            DatasetSource::Pairs(pairs) => pairs,
        };
        if pairs.is_empty() {
            return Err(CoreError::validation("dataset has no questions"));
        }
        if pairs.len() > MAX_DATASET_ROWS {
            return Err(CoreError::validation(format!(
                "dataset has {} rows (max {})",
                pairs.len(),
                MAX_DATASET_ROWS
            )));
        }
        Ok(pairs)
    }
}

/// The bundled 10-question general-knowledge sample.
pub fn sample_dataset() -> Vec<QaPair> {
    const PAIRS: [(&str, &str); 10] = [
        ("What is the capital of France?", "Paris"),
        ("What is 2 + 2?", "4"),
        ("Who wrote Romeo and Juliet?", "William Shakespeare"),
        (
            "What is the largest planet in our solar system?",
            "Jupiter",
        ),
        ("What year did World War II end?", "1945"),
        ("What is the chemical symbol for gold?", "Au"),
        ("How many continents are there?", "7"),
        ("What is the square root of 64?", "8"),
        ("Who painted the Mona Lisa?", "Leonardo da Vinci"),
        (
            "What is the speed of light in vacuum?",
            "299,792,458 meters per second",
        ),
    ];
    PAIRS
        .iter()
        .map(|(q, a)| QaPair {
            question: (*q).to_string(),
            answer: (*a).to_string(),
        })
        .collect()
}

/// Parse an uploaded dataset: UTF-8 CSV with a `question,answer` header.
/// Column order is free; extra columns are ignored.
pub fn parse_csv<R: Read>(reader: R) -> CoreResult<Vec<QaPair>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| CoreError::validation(format!("unreadable CSV header: {}", e)))?
        .clone();
    let question_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("question"))
        .ok_or_else(|| CoreError::validation("CSV is missing a 'question' column"))?;
    let answer_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("answer"))
        .ok_or_else(|| CoreError::validation("CSV is missing an 'answer' column"))?;

    let mut pairs = Vec::new();
    for (row_idx, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| CoreError::validation(format!("CSV row {}: {}", row_idx + 2, e)))?;
        let question = record.get(question_col).unwrap_or("").to_string();
        let answer = record.get(answer_col).unwrap_or("").to_string();
        if question.is_empty() {
            return Err(CoreError::validation(format!(
                "CSV row {}: empty question",
                row_idx + 2
            )));
        }
        pairs.push(QaPair { question, answer });
        if pairs.len() > MAX_DATASET_ROWS {
            return Err(CoreError::validation(format!(
                "dataset exceeds {} rows",
                MAX_DATASET_ROWS
            )));
        }
    }
    Ok(pairs)
}
