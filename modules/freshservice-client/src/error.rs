use thiserror::Error;

pub type Result<T> = std::result::Result<T, FreshServiceError>;

#[derive(Debug, Error)]
pub enum FreshServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Ticket {0} not found")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for FreshServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FreshServiceError::Parse(err.to_string())
        } else {
            FreshServiceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FreshServiceError {
    fn from(err: serde_json::Error) -> Self {
        FreshServiceError::Parse(err.to_string())
    }
}
