//! Conversation history assembly with rolling summarization.
//!
//! Long chats are kept bounded: every `threshold` completed user+assistant
//! pairs, the oldest unsummarized slice is merged into a single summary
//! string that rides inside the system message. The unsummarized tail is
//! always sent verbatim, and the in-flight exchange is never summarized.

use quill_ai_adapters::{ChatMessage, Role};

pub const DEFAULT_SUMMARY_THRESHOLD: usize = 5;

/// Instruction used for the dedicated summarization request.
pub const SUMMARIZE_INSTRUCTION: &str = "You maintain a continuously updated conversation \
summary. If a previous summary is provided, merge the new conversation into it and \
deduplicate; otherwise produce a fresh summary. Cover topics, key conclusions, action \
items and open questions in 100-200 words. Output only the updated summary, with no \
preamble or heading.";

/// Context attached to one chat turn: the editor selection and any documents
/// the user picked.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub selection: Option<String>,
    /// (title, body) pairs.
    pub documents: Vec<(String, String)>,
}

impl ChatContext {
    pub fn is_empty(&self) -> bool {
        self.selection.is_none() && self.documents.is_empty()
    }

    fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(selection) = &self.selection {
            parts.push(format!("[Current selection]\n{selection}"));
        }
        if !self.documents.is_empty() {
            let docs = self
                .documents
                .iter()
                .map(|(title, body)| format!("# {title}\n{body}"))
                .collect::<Vec<_>>()
                .join("\n\n---\n\n");
            parts.push(format!("[Attached documents]\n{docs}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// Builds outbound message lists for a multi-turn chat session.
pub struct ConversationAssembler {
    history: Vec<ChatMessage>,
    summary: Option<String>,
    summarized_pairs: usize,
    threshold: usize,
}

impl ConversationAssembler {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SUMMARY_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            history: Vec::new(),
            summary: None,
            summarized_pairs: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::assistant(content));
    }

    pub fn completed_pairs(&self) -> usize {
        self.history.len() / 2
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.summary = None;
        self.summarized_pairs = 0;
    }

    /// Current user turn content, with the context block prefixed when any
    /// context is attached.
    pub fn compose_user_turn(&self, input: &str, context: Option<&ChatContext>) -> String {
        match context.and_then(ChatContext::render) {
            Some(rendered) => format!(
                "Answer with the following context in mind:\n\n{rendered}\n\n[User question]\n{input}"
            ),
            None => input.to_string(),
        }
    }

    /// Outbound message list for the next request:
    /// [system (+ summary)] + [verbatim unsummarized tail] + [current turn].
    pub fn build_messages(&self, system_prompt: &str, user_turn: String) -> Vec<ChatMessage> {
        let system_content = match &self.summary {
            Some(summary) => {
                format!("{system_prompt}\n\n[Summary of earlier conversation]\n{summary}")
            }
            None => system_prompt.to_string(),
        };

        let mut messages = Vec::with_capacity(self.unsummarized_tail().len() + 2);
        messages.push(ChatMessage::system(system_content));
        messages.extend(self.unsummarized_tail().iter().cloned());
        messages.push(ChatMessage::user(user_turn));
        messages
    }

    fn unsummarized_tail(&self) -> &[ChatMessage] {
        &self.history[(self.summarized_pairs * 2).min(self.history.len())..]
    }

    /// True once a full threshold of completed pairs is waiting to be folded
    /// into the summary.
    pub fn needs_summary(&self) -> bool {
        self.completed_pairs() - self.summarized_pairs >= self.threshold
    }

    /// Message list for the summarization request, covering exactly one
    /// threshold-sized slice of the oldest unsummarized pairs. `None` when
    /// no summarization is due.
    pub fn summary_request_messages(&self, system_prompt: &str) -> Option<Vec<ChatMessage>> {
        if !self.needs_summary() {
            return None;
        }
        let start = self.summarized_pairs * 2;
        let end = start + self.threshold * 2;
        let transcript = self.history[start..end]
            .iter()
            .map(|message| match message.role {
                Role::User => format!("User: {}", message.content),
                _ => format!("Assistant: {}", message.content),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let previous = self
            .summary
            .as_ref()
            .map(|summary| format!("[Previous summary]\n{summary}\n\n"))
            .unwrap_or_default();

        Some(vec![
            ChatMessage::system(format!("{system_prompt}\n\n{SUMMARIZE_INSTRUCTION}")),
            ChatMessage::user(format!(
                "{previous}[Conversation]\n{transcript}\n\n[Task] Output the updated summary."
            )),
        ])
    }

    /// Record a completed summarization: the covered slice is represented
    /// only by the summary from now on.
    pub fn apply_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into().trim().to_string());
        self.summarized_pairs += self.threshold;
    }
}

impl Default for ConversationAssembler {
    fn default() -> Self {
        Self::new()
    }
}
