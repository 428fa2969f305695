use thiserror::Error;

/// Any failure talking to the exchange.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Exchange returned {status}: {msg} (code {code:?})")]
    Status {
        status: u16,
        code: Option<i64>,
        msg: String,
    },

    #[error("Failed to decode exchange response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether an idempotent request that failed this way may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) | ApiError::InvalidRequest(_) => false,
        }
    }
}
