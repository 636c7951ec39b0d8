use thiserror::Error;

/// Failure kinds surfaced by the completion client.
///
/// Malformed individual SSE lines are not represented here: some providers
/// interleave control lines that do not parse as completion chunks, and the
/// stream loop skips them instead of failing.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Missing or unusable credentials/base URL. Never retried; the user has
    /// to fix their settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The server answered with a non-2xx status, or the stream completed
    /// without yielding any content. `status` is `None` for the latter.
    #[error("API request failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Protocol {
        status: Option<u16>,
        message: String,
    },

    /// The request or an individual stream read exceeded its time bound.
    /// Distinct from `Protocol` so "server is slow" reads differently from
    /// "server rejected".
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, reset mid-stream).
    #[error("transport error: {0}")]
    Transport(String),
}

pub type CompletionResult<T> = Result<T, CompletionError>;

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout(err.to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}
