//! Debounced selection tracking and contextual-affordance placement.
//!
//! Keeps a flicker-resistant answer to "is there a non-empty selection, and
//! where should the floating action button sit". Time is passed in by the
//! caller so the whole state machine is testable without sleeping.

use crate::host::{EditorHandle, HostSignal, Rect, Viewport};
use log::trace;
use std::time::{Duration, Instant};

/// Footprint of the floating affordance, including its expanded menu.
pub const AFFORDANCE_WIDTH: f32 = 160.0;
pub const AFFORDANCE_HEIGHT: f32 = 40.0;
/// Minimum distance kept from every viewport edge.
pub const VIEWPORT_MARGIN: f32 = 10.0;
/// Gap between the selection box and the affordance.
const SELECTION_GAP: f32 = 8.0;
/// Preferred vertical lift above the selection's top edge.
const ABOVE_OFFSET: f32 = 45.0;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq)]
pub enum AffordanceState {
    Hidden,
    Visible {
        x: f32,
        y: f32,
        selected_text: String,
    },
}

/// Compute the affordance position for a selection bounding box.
///
/// Preferred spot is right of and above the selection; flips left when the
/// right edge would overflow, flips below when the top would, then clamps
/// both axes into the viewport with a fixed margin.
pub fn place_affordance(selection: Rect, viewport: Viewport) -> (f32, f32) {
    let mut x = selection.right + SELECTION_GAP;
    let mut y = selection.top - ABOVE_OFFSET;

    if x + AFFORDANCE_WIDTH > viewport.width {
        x = (selection.left - AFFORDANCE_WIDTH - SELECTION_GAP).max(VIEWPORT_MARGIN);
    }
    if y < VIEWPORT_MARGIN {
        y = selection.bottom + SELECTION_GAP;
    }

    x = x.clamp(
        VIEWPORT_MARGIN,
        (viewport.width - AFFORDANCE_WIDTH - VIEWPORT_MARGIN).max(VIEWPORT_MARGIN),
    );
    y = y.clamp(
        VIEWPORT_MARGIN,
        (viewport.height - AFFORDANCE_HEIGHT - VIEWPORT_MARGIN).max(VIEWPORT_MARGIN),
    );
    (x, y)
}

/// Tracks host signals and decides when/where to show the affordance.
pub struct SelectionTracker {
    debounce: Duration,
    pending_since: Option<Instant>,
    has_document_focus: bool,
    state: AffordanceState,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            pending_since: None,
            has_document_focus: true,
            state: AffordanceState::Hidden,
        }
    }

    pub fn state(&self) -> &AffordanceState {
        &self.state
    }

    /// Feed one host signal. Selection changes are debounced; scroll and
    /// resize recompute immediately while visible; leaving the document
    /// surface hides the affordance and drops the stale selection text.
    pub fn handle_signal(
        &mut self,
        signal: HostSignal,
        editor: Option<&dyn EditorHandle>,
        viewport: Viewport,
        now: Instant,
    ) {
        match signal {
            HostSignal::SelectionChanged => {
                self.pending_since = Some(now);
            }
            HostSignal::Scroll | HostSignal::Resize => {
                if self.state != AffordanceState::Hidden {
                    self.recompute(editor, viewport);
                }
            }
            HostSignal::FocusChanged { focused: false } => self.hide(),
            HostSignal::FocusChanged { focused: true } => {}
            HostSignal::ActiveDocumentChanged { is_document } => {
                self.has_document_focus = is_document;
                // Never carry a previous surface's selection into a new one.
                self.hide();
            }
        }
    }

    /// Drive pending debounce work. Call on a UI tick; recomputes once the
    /// debounce window has elapsed since the last selection change.
    pub fn poll(
        &mut self,
        editor: Option<&dyn EditorHandle>,
        viewport: Viewport,
        now: Instant,
    ) -> &AffordanceState {
        if let Some(since) = self.pending_since {
            if now.duration_since(since) >= self.debounce {
                self.pending_since = None;
                self.recompute(editor, viewport);
            }
        }
        &self.state
    }

    fn recompute(&mut self, editor: Option<&dyn EditorHandle>, viewport: Viewport) {
        if !self.has_document_focus {
            self.hide();
            return;
        }
        let Some(editor) = editor else {
            self.hide();
            return;
        };
        let Some(selected_text) = editor.selection().filter(|text| !text.trim().is_empty())
        else {
            self.hide();
            return;
        };
        let Some(geometry) = editor.selection_geometry() else {
            trace!("selection has no geometry; hiding affordance");
            self.hide();
            return;
        };

        let (x, y) = place_affordance(geometry, viewport);
        self.state = AffordanceState::Visible {
            x,
            y,
            selected_text,
        };
    }

    fn hide(&mut self) {
        self.pending_since = None;
        self.state = AffordanceState::Hidden;
    }
}

impl Default for SelectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
