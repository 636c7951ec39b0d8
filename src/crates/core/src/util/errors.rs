use quill_ai_adapters::CompletionError;
use thiserror::Error;

/// Product-wide error type. Wire-level failures from the completion adapter
/// map onto the matching variants; the rest are assistant-side conditions.
#[derive(Debug, Error)]
pub enum QuillError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("API request failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Protocol {
        status: Option<u16>,
        message: String,
    },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The document changed between anchor capture and accept. The accept is
    /// refused and the document is left untouched.
    #[error("selection anchor is no longer valid: {0}")]
    AnchorInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type QuillResult<T> = Result<T, QuillError>;

impl From<CompletionError> for QuillError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Configuration(message) => QuillError::Configuration(message),
            CompletionError::Protocol { status, message } => {
                QuillError::Protocol { status, message }
            }
            CompletionError::Timeout(message) => QuillError::Timeout(message),
            CompletionError::Transport(message) => QuillError::Transport(message),
        }
    }
}
