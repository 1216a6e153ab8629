#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited by {provider}")]
    RateLimited { provider: &'static str },

    #[error("{provider} request failed (status {status})")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}
