//! Review sessions: pair an original text span with an in-flight AI result
//! and drive the reveal-then-decide workflow before any document mutation.

pub mod reveal;

use crate::host::{EditorHandle, Notifier, Range};
use crate::util::errors::{QuillError, QuillResult};
use dashmap::DashMap;
use log::{debug, trace, warn};
use reveal::{RevealClock, DEFAULT_REVEAL_SPEED};

/// Captured reference to a document span plus the text it held.
///
/// Valid only while the document is unmodified elsewhere: the revision
/// counter stamped at capture time is compared at accept time, and a
/// mismatch fails the accept closed instead of applying to wrong content.
#[derive(Debug, Clone)]
pub struct SelectionAnchor {
    pub text: String,
    pub range: Range,
    pub captured_at_revision: u64,
}

impl SelectionAnchor {
    /// Capture the current selection; `None` when nothing is selected.
    pub fn capture(editor: &dyn EditorHandle) -> Option<Self> {
        let text = editor.selection().filter(|text| !text.trim().is_empty())?;
        let range = editor.selection_range()?;
        Some(Self {
            text,
            range,
            captured_at_revision: editor.revision(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    /// Deltas are arriving and appending to the accumulated result.
    Streaming,
    /// The full result is being shown progressively, paced by ticks.
    Revealing,
    /// Reveal finished; exactly two commands are honored: accept, reject.
    AwaitingDecision,
    Accepted,
    Rejected,
    /// Session torn down without a decision (error, cancel, host teardown).
    Closed,
}

impl ReviewPhase {
    /// Terminal phases: decisions are no longer honored, deltas are dropped.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReviewPhase::Accepted | ReviewPhase::Rejected | ReviewPhase::Closed
        )
    }
}

/// One reveal-then-decide exchange over a selection. Sessions are
/// independent: each owns its accumulation buffer, anchor and reveal clock.
#[derive(Debug)]
pub struct ReviewSession {
    pub id: String,
    original_text: String,
    anchor: SelectionAnchor,
    accumulated: String,
    phase: ReviewPhase,
    clock: RevealClock,
    created_at_ms: i64,
}

impl ReviewSession {
    pub fn new(original_text: String, anchor: SelectionAnchor, reveal_speed: usize) -> Self {
        Self {
            id: format!("review-{}", uuid::Uuid::new_v4()),
            original_text,
            anchor,
            accumulated: String::new(),
            phase: ReviewPhase::Streaming,
            clock: RevealClock::new(reveal_speed),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    /// Append a delta. Returns false when the session is no longer
    /// streaming; such deltas are discarded, not queued.
    pub fn push_delta(&mut self, delta: &str) -> bool {
        if self.phase != ReviewPhase::Streaming {
            trace!("discarding delta for session {} in {:?}", self.id, self.phase);
            return false;
        }
        self.accumulated.push_str(delta);
        true
    }

    /// The stream finished; start the paced reveal.
    pub fn complete_stream(&mut self) {
        if self.phase == ReviewPhase::Streaming {
            self.phase = ReviewPhase::Revealing;
        }
    }

    /// Advance the reveal clock one tick. Enters `AwaitingDecision` once the
    /// whole result is visible.
    pub fn tick(&mut self) {
        if self.phase != ReviewPhase::Revealing {
            return;
        }
        self.clock.advance();
        if self.clock.is_complete(&self.accumulated) {
            self.phase = ReviewPhase::AwaitingDecision;
        }
    }

    /// Currently visible portion of the result.
    pub fn revealed_text(&self) -> &str {
        match self.phase {
            ReviewPhase::Streaming | ReviewPhase::Revealing => {
                self.clock.revealed(&self.accumulated)
            }
            _ => &self.accumulated,
        }
    }

    /// Apply the result to the document. Honored only in `AwaitingDecision`;
    /// in any terminal phase this is a no-op (`Ok(false)`), never an error.
    ///
    /// The anchor is revalidated against the editor's current revision
    /// first; a stale anchor closes the session and fails without touching
    /// the document.
    pub fn accept(&mut self, editor: &mut dyn EditorHandle) -> QuillResult<bool> {
        if self.phase != ReviewPhase::AwaitingDecision {
            return Ok(false);
        }
        if editor.revision() != self.anchor.captured_at_revision {
            self.phase = ReviewPhase::Closed;
            return Err(QuillError::AnchorInvalid(format!(
                "document revision advanced from {} to {}",
                self.anchor.captured_at_revision,
                editor.revision()
            )));
        }
        editor.replace_range(self.anchor.range, &self.accumulated)?;
        self.phase = ReviewPhase::Accepted;
        debug!("session {} accepted", self.id);
        Ok(true)
    }

    /// Discard the result. No document mutation, idempotent once terminal.
    pub fn reject(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.accumulated.clear();
        self.phase = ReviewPhase::Rejected;
        debug!("session {} rejected", self.id);
        true
    }

    /// Tear the session down without a decision (stream failure, host view
    /// closing mid-session). Idempotent.
    pub fn close(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = ReviewPhase::Closed;
        }
    }
}

/// Owns all live review sessions. Overlapping invocations create
/// independent sessions; deltas are routed by id and dropped for sessions
/// that no longer exist.
pub struct SessionManager {
    sessions: DashMap<String, ReviewSession>,
    reveal_speed: usize,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_reveal_speed(DEFAULT_REVEAL_SPEED)
    }

    pub fn with_reveal_speed(reveal_speed: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            reveal_speed,
        }
    }

    pub fn create_session(&self, original_text: String, anchor: SelectionAnchor) -> String {
        let session = ReviewSession::new(original_text, anchor, self.reveal_speed);
        let session_id = session.id.clone();
        self.sessions.insert(session_id.clone(), session);
        session_id
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn phase(&self, session_id: &str) -> Option<ReviewPhase> {
        self.sessions.get(session_id).map(|session| session.phase())
    }

    /// Route a delta to its session. Deltas for closed or unknown sessions
    /// are discarded.
    pub fn push_delta(&self, session_id: &str, delta: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => session.push_delta(delta),
            None => {
                trace!("discarding delta for unknown session {}", session_id);
                false
            }
        }
    }

    pub fn complete_stream(&self, session_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.complete_stream();
        }
    }

    /// Close a session after a stream failure and tell the user. The
    /// original document text is never touched on this path.
    pub fn fail_session(&self, session_id: &str, error: &QuillError, notifier: &dyn Notifier) {
        if let Some((_, mut session)) = self.sessions.remove(session_id) {
            session.close();
            warn!("session {} failed: {}", session_id, error);
            notifier.notify(&format!("AI request failed: {error}"));
        }
    }

    /// Advance the reveal of one session; returns the visible text and
    /// whether the session is now awaiting a decision.
    pub fn tick(&self, session_id: &str) -> Option<(String, bool)> {
        let mut session = self.sessions.get_mut(session_id)?;
        session.tick();
        Some((
            session.revealed_text().to_string(),
            session.phase() == ReviewPhase::AwaitingDecision,
        ))
    }

    /// Accept a session's result into the document. Unknown ids are no-ops.
    pub fn accept(
        &self,
        session_id: &str,
        editor: &mut dyn EditorHandle,
        notifier: &dyn Notifier,
    ) -> QuillResult<bool> {
        let result = match self.sessions.get_mut(session_id) {
            Some(mut session) => session.accept(editor),
            None => return Ok(false),
        };
        match result {
            Ok(true) => {
                self.sessions.remove(session_id);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(err) => {
                self.sessions.remove(session_id);
                notifier.notify(
                    "The document changed since this suggestion was created; nothing was applied.",
                );
                Err(err)
            }
        }
    }

    /// Reject a session's result. Unknown ids are no-ops.
    pub fn reject(&self, session_id: &str) -> bool {
        let rejected = match self.sessions.get_mut(session_id) {
            Some(mut session) => session.reject(),
            None => false,
        };
        if rejected {
            self.sessions.remove(session_id);
        }
        rejected
    }

    /// Host teardown: close and drop every live session.
    pub fn cleanup_all(&self) {
        for mut entry in self.sessions.iter_mut() {
            entry.value_mut().close();
        }
        self.sessions.clear();
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
