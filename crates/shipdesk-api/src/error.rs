use shipdesk_domain::CoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("packing API transport failure: {0}")]
    Transport(String),
    #[error("packing API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode {context} payload: {message}")]
    Decode {
        context: &'static str,
        message: String,
    },
    #[error("invalid packing API request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub(crate) fn decode(context: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            context,
            message: error.to_string(),
        }
    }
}

impl From<ApiError> for CoreError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::InvalidRequest(message) => Self::InvalidRequest(message),
            other => Self::DependencyUnavailable(other.to_string()),
        }
    }
}
