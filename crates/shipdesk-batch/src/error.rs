use shipdesk_api::ApiError;
use thiserror::Error;

/// Failure of a single batch item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchItemError {
    /// Business failure of this item only; the batch continues.
    #[error("{reason}")]
    Rejected { reason: String, suggestion: String },
    /// The operation cannot continue for any item; remaining items are
    /// skipped.
    #[error("batch aborted: {0}")]
    Aborted(String),
}

impl BatchItemError {
    pub fn rejected(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }
}

impl From<ApiError> for BatchItemError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Transport(message) => Self::Aborted(message),
            other => Self::rejected(other.to_string(), ""),
        }
    }
}
