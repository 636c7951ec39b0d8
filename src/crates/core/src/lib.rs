// Quill Core Library - Platform-agnostic assistant logic
// Layering: Util -> Config/Host -> Selection/Session/Chat -> Engine

pub mod chat; // Conversation history, rolling summarization
pub mod config; // Settings and templates (persistence is the host's concern)
pub mod engine; // Assistant façade wiring client, sessions and templates
pub mod host; // Traits for the embedding editor shell
pub mod selection; // Debounced selection tracking and affordance placement
pub mod session; // Review sessions: streaming, reveal, accept/reject
pub mod util; // Errors, shared helpers

// Export main types
pub use util::errors::{QuillError, QuillResult};

pub use chat::{ChatContext, ConversationAssembler};
pub use config::{AssistantSettings, ConfigManager, Template};
pub use engine::AssistantEngine;
pub use host::{EditorHandle, HostSignal, Notifier, Position, Range, Rect, Viewport};
pub use selection::{AffordanceState, SelectionTracker};
pub use session::{ReviewPhase, ReviewSession, SelectionAnchor, SessionManager};

// Re-export the wire-level client for hosts that talk to the API directly
pub use quill_ai_adapters::{
    ChatMessage, ClientConfig, CompletionClient, CompletionRequest, Role,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CORE_NAME: &str = "Quill Core";
