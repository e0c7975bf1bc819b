use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

/// Phrase Gemini uses in a 400 body when the request itself is over the
/// model's token budget.
const TOKEN_LIMIT_PHRASE: &str = "exceeds the maximum number of tokens";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gemini API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gemini rate limit hit: {0}")]
    RateLimited(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Gemini returned an empty response")]
    EmptyResponse,

    #[error("Gemini blocked the request: {0}")]
    Blocked(String),

    #[error("Gemini File API error: {0}")]
    FileApi(String),

    #[error("Response exceeds the maximum number of tokens: {0}")]
    TokenLimitExceeded(String),

    #[error("Gemini request failed after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },
}

/// Flat tag for [`AiError`], so callers can branch on the class of failure
/// without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorKind {
    Config,
    Network,
    Api,
    RateLimited,
    Parse,
    EmptyResponse,
    Blocked,
    FileApi,
    TokenLimitExceeded,
    RetryExhausted,
}

impl AiError {
    pub fn kind(&self) -> AiErrorKind {
        match self {
            AiError::Config(_) => AiErrorKind::Config,
            AiError::Network(_) => AiErrorKind::Network,
            AiError::Api { .. } => AiErrorKind::Api,
            AiError::RateLimited(_) => AiErrorKind::RateLimited,
            AiError::Parse(_) => AiErrorKind::Parse,
            AiError::EmptyResponse => AiErrorKind::EmptyResponse,
            AiError::Blocked(_) => AiErrorKind::Blocked,
            AiError::FileApi(_) => AiErrorKind::FileApi,
            AiError::TokenLimitExceeded(_) => AiErrorKind::TokenLimitExceeded,
            AiError::RetryExhausted { .. } => AiErrorKind::RetryExhausted,
        }
    }

    /// Worth another attempt with the same request.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Network(_) | AiError::RateLimited(_) | AiError::EmptyResponse => true,
            AiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The backend is unusable for the rest of a batch: either the retry
    /// budget is spent or the model cannot fit the response.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            AiErrorKind::RetryExhausted | AiErrorKind::TokenLimitExceeded
        )
    }

    /// Map a non-success HTTP status and body to the matching variant.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => AiError::RateLimited(body),
            400 if body.contains(TOKEN_LIMIT_PHRASE) => AiError::TokenLimitExceeded(body),
            _ => AiError::Api {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}
