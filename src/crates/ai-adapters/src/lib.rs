//! OpenAI-compatible chat completion adapter
//!
//! Wire-level client for `POST {base_url}/chat/completions`: request
//! construction, SSE delta streaming and the non-streaming fallback.
//! Everything above the wire (sessions, templates, conversation state)
//! lives in `quill-core`.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientConfig, CompletionClient, DeltaSink, DATE_PLACEHOLDER};
pub use error::{CompletionError, CompletionResult};
pub use types::{ChatMessage, CompletionRequest, Role};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
