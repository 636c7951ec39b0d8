//! Assistant façade: wires settings, the completion client, review sessions
//! and conversation state behind the entry points a host shell calls.

use crate::chat::{ChatContext, ConversationAssembler};
use crate::config::{AssistantSettings, ConfigManager};
use crate::host::{EditorHandle, Notifier};
use crate::session::{SelectionAnchor, SessionManager};
use crate::util::errors::{QuillError, QuillResult};
use log::{debug, warn};
use quill_ai_adapters::{ChatMessage, CompletionClient, CompletionRequest};

pub struct AssistantEngine {
    config: ConfigManager,
    sessions: SessionManager,
}

impl AssistantEngine {
    pub fn new(settings: AssistantSettings) -> Self {
        Self {
            config: ConfigManager::new(settings),
            sessions: SessionManager::new(),
        }
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Settings handed in by the host's settings surface. In-flight requests
    /// keep their snapshot; this applies from the next call.
    pub fn update_settings(&self, settings: AssistantSettings) {
        self.config.update(settings);
    }

    fn client_for(settings: &AssistantSettings) -> CompletionClient {
        CompletionClient::new(settings.client_config())
    }

    fn instruction_request(
        settings: &AssistantSettings,
        instruction: &str,
        text: &str,
        stream: bool,
    ) -> CompletionRequest {
        CompletionRequest::new(
            settings.model.clone(),
            vec![
                ChatMessage::system(settings.system_prompt.clone()),
                ChatMessage::user(format!("{instruction}\n\n{text}")),
            ],
        )
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_output_tokens)
        .with_stream(stream)
    }

    /// Run a template against the current selection: captures an anchor,
    /// opens a review session and streams the result into it. Resolves with
    /// the session id once the stream finished and the reveal can start.
    pub async fn invoke_template(
        &self,
        template_id: &str,
        editor: &dyn EditorHandle,
        notifier: &dyn Notifier,
    ) -> QuillResult<String> {
        let settings = self.config.snapshot();
        let template = settings
            .template(template_id)
            .filter(|template| template.enabled)
            .cloned()
            .ok_or_else(|| {
                QuillError::NotFound(format!("template not found or disabled: {template_id}"))
            })?;
        let anchor = SelectionAnchor::capture(editor)
            .ok_or_else(|| QuillError::NotFound("no text is selected".to_string()))?;
        self.invoke_instruction(&settings, &template.instruction, anchor, notifier)
            .await
    }

    /// Generic entry point behind every template: an instruction applied to
    /// an anchored selection. Nothing varies per template beyond the
    /// instruction text.
    pub async fn invoke_instruction(
        &self,
        settings: &AssistantSettings,
        instruction: &str,
        anchor: SelectionAnchor,
        notifier: &dyn Notifier,
    ) -> QuillResult<String> {
        let request = Self::instruction_request(settings, instruction, &anchor.text, true);
        let selected_len = anchor.text.len();
        let session_id = self.sessions.create_session(anchor.text.clone(), anchor);
        debug!("session {} streaming ({} bytes selected)", session_id, selected_len);

        let client = Self::client_for(settings);
        let sessions = &self.sessions;
        let delta_target = session_id.clone();
        let mut sink = move |delta: &str| {
            sessions.push_delta(&delta_target, delta);
        };

        match client.send_streaming(&request, &mut sink).await {
            Ok(_) => {
                self.sessions.complete_stream(&session_id);
                Ok(session_id)
            }
            Err(err) => {
                let err = QuillError::from(err);
                self.sessions.fail_session(&session_id, &err, notifier);
                Err(err)
            }
        }
    }

    /// Advance one session's reveal; see [`SessionManager::tick`].
    pub fn tick(&self, session_id: &str) -> Option<(String, bool)> {
        self.sessions.tick(session_id)
    }

    pub fn accept(
        &self,
        session_id: &str,
        editor: &mut dyn EditorHandle,
        notifier: &dyn Notifier,
    ) -> QuillResult<bool> {
        self.sessions.accept(session_id, editor, notifier)
    }

    pub fn reject(&self, session_id: &str) -> bool {
        self.sessions.reject(session_id)
    }

    /// Host teardown (view closing mid-session included).
    pub fn cleanup(&self) {
        self.sessions.cleanup_all();
    }

    /// One sidebar chat turn: stream the reply, record both sides in the
    /// assembler, then fold old history into the rolling summary when due.
    pub async fn send_chat_turn(
        &self,
        assembler: &mut ConversationAssembler,
        input: &str,
        context: Option<&ChatContext>,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> QuillResult<String> {
        let settings = self.config.snapshot();
        let turn = assembler.compose_user_turn(input, context);
        let messages = assembler.build_messages(&settings.system_prompt, turn.clone());
        let request = CompletionRequest::new(settings.model.clone(), messages)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_output_tokens)
            .with_stream(true);

        let reply = Self::client_for(&settings)
            .send_streaming(&request, on_delta)
            .await?;

        assembler.push_user(turn);
        assembler.push_assistant(reply.clone());
        self.maybe_summarize(&settings, assembler).await;
        Ok(reply)
    }

    /// Summarization failures never block the conversation; the larger
    /// history is kept and summarization is retried when next due.
    async fn maybe_summarize(
        &self,
        settings: &AssistantSettings,
        assembler: &mut ConversationAssembler,
    ) {
        let Some(messages) = assembler.summary_request_messages(&settings.system_prompt) else {
            return;
        };
        let request = CompletionRequest::new(settings.model.clone(), messages)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_output_tokens);
        match Self::client_for(settings).send(&request).await {
            Ok(summary) => {
                debug!("conversation summary updated ({} chars)", summary.len());
                assembler.apply_summary(summary);
            }
            Err(err) => {
                warn!("conversation summarization failed, keeping verbatim history: {err}");
            }
        }
    }
}

impl Default for AssistantEngine {
    fn default() -> Self {
        Self::new(AssistantSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_request_carries_settings_and_selection() {
        let mut settings = AssistantSettings::default();
        settings.model = "gpt-test".to_string();
        settings.temperature = 0.2;
        settings.max_output_tokens = 0;

        let request =
            AssistantEngine::instruction_request(&settings, "Rewrite this:", "old words", true);
        assert_eq!(request.model, "gpt-test");
        assert!(request.stream);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, None);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "Rewrite this:\n\nold words");
    }
}
