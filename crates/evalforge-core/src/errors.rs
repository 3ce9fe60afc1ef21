use thiserror::Error;

/// Error taxonomy for the orchestration core.
///
/// Callers can match on the variant to distinguish caller mistakes
/// (Validation, InvalidState, NotFound) from collaborator failures
/// (UpstreamTimeout, Upstream) and store failures (Persistence).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Persistence(format!("stored JSON: {}", e))
    }
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        CoreError::NotFound(format!("{} {}", entity, id))
    }
}
