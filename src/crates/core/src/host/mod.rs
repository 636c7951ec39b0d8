//! Contracts for the embedding editor shell.
//!
//! Quill does not own the document model, panels or persistence. The host
//! hands in explicit handles at session-creation time; the core revalidates
//! them at the moment of use instead of re-fetching ambient global state.

use crate::util::errors::QuillResult;
use serde::{Deserialize, Serialize};

/// Line/character position in a document, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub line: u32,
    pub ch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub from: Position,
    pub to: Position,
}

/// Bounding box in viewport pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Change notifications the host shell forwards into the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostSignal {
    /// The active view changed; `is_document` is false for non-editable
    /// surfaces (sidebars, settings, graph views).
    ActiveDocumentChanged { is_document: bool },
    SelectionChanged,
    Scroll,
    Resize,
    FocusChanged { focused: bool },
}

/// Handle to the host's document editor.
pub trait EditorHandle {
    /// Currently selected text, `None` when nothing is selected.
    fn selection(&self) -> Option<String>;
    fn selection_range(&self) -> Option<Range>;
    fn cursor(&self) -> Position;
    fn line_text(&self, line: u32) -> Option<String>;
    fn replace_range(&mut self, range: Range, text: &str) -> QuillResult<()>;
    /// Monotonic counter advanced on every document edit. Anchor validity is
    /// defined against this counter.
    fn revision(&self) -> u64;
    /// Bounding box of the current selection, `None` when no geometry is
    /// available (selection collapsed, view not rendered).
    fn selection_geometry(&self) -> Option<Rect>;
}

/// Sink for user-visible notices ("document changed, suggestion dropped").
pub trait Notifier {
    fn notify(&self, message: &str);
}
