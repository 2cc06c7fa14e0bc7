//! FILENAME: core/engine/src/undo.rs
//! PURPOSE: Undo/Redo history of document snapshots.
//! CONTEXT: Every edit produces a whole new document value, so history
//! stores the document as it was before each edit. Undo swaps the current
//! document with the top snapshot; redo swaps it back.

use crate::model::TemplateDocument;
use std::collections::VecDeque;

/// Maximum number of undo operations to keep in history.
pub const MAX_HISTORY_SIZE: usize = 100;

/// The document as it was before an edit.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Human-readable description (e.g., "Delete row R1", "Add column col_3")
    pub description: String,
    pub document: TemplateDocument,
}

impl Snapshot {
    pub fn new(description: impl Into<String>, document: TemplateDocument) -> Self {
        Snapshot {
            description: description.into(),
            document,
        }
    }
}

/// The history stack for undo/redo operations.
#[derive(Debug)]
pub struct UndoStack {
    /// Snapshots that can be restored by undo (most recent at back)
    undo_stack: VecDeque<Snapshot>,
    /// Snapshots that can be restored by redo (most recent at back)
    redo_stack: VecDeque<Snapshot>,
    max_size: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::with_max_size(MAX_HISTORY_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        UndoStack {
            undo_stack: VecDeque::with_capacity(max_size.min(MAX_HISTORY_SIZE)),
            redo_stack: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    /// Records the state before a new edit. Clears redo.
    pub fn record(&mut self, snapshot: Snapshot) {
        self.redo_stack.clear();
        self.push_undo_for_redo(snapshot);
    }

    /// Push onto the undo stack without clearing redo.
    /// Used by the redo operation.
    pub fn push_undo_for_redo(&mut self, snapshot: Snapshot) {
        while self.undo_stack.len() >= self.max_size {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(snapshot);
    }

    pub fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo_stack.pop_back()
    }

    /// Push a snapshot onto the redo stack (after undo).
    pub fn push_redo(&mut self, snapshot: Snapshot) {
        while self.redo_stack.len() >= self.max_size {
            self.redo_stack.pop_front();
        }
        self.redo_stack.push_back(snapshot);
    }

    pub fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo_stack.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get description of next undo action (for UI).
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|s| s.description.as_str())
    }

    /// Get description of next redo action (for UI).
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|s| s.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get current stack sizes (for debugging).
    pub fn stack_sizes(&self) -> (usize, usize) {
        (self.undo_stack.len(), self.redo_stack.len())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Template;

    fn snapshot(id: &str) -> Snapshot {
        Snapshot::new(format!("Edit {}", id), TemplateDocument::new(Template::new(id)))
    }

    #[test]
    fn test_single_undo() {
        let mut stack = UndoStack::new();
        stack.record(snapshot("T1"));
        assert!(stack.can_undo());
        assert!(!stack.can_redo());
        assert_eq!(stack.undo_description(), Some("Edit T1"));

        let restored = stack.pop_undo().unwrap();
        assert_eq!(restored.document.template.template_meta.template_id, "T1");
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_redo_cleared_on_new_action() {
        let mut stack = UndoStack::new();
        stack.record(snapshot("T1"));
        let undone = stack.pop_undo().unwrap();
        stack.push_redo(undone);
        assert!(stack.can_redo());

        stack.record(snapshot("T2"));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_max_size_enforcement() {
        let mut stack = UndoStack::with_max_size(3);
        for id in ["T1", "T2", "T3", "T4"] {
            stack.record(snapshot(id));
        }
        assert_eq!(stack.stack_sizes().0, 3);
        // Oldest evicted.
        let mut last = None;
        while let Some(s) = stack.pop_undo() {
            last = Some(s);
        }
        assert_eq!(last.unwrap().description, "Edit T2");
    }

    #[test]
    fn test_push_undo_for_redo_preserves_redo() {
        let mut stack = UndoStack::new();
        stack.record(snapshot("T1"));
        let undone = stack.pop_undo().unwrap();
        stack.push_redo(undone);

        stack.push_undo_for_redo(snapshot("T0"));
        assert!(stack.can_redo());
        assert!(stack.can_undo());
    }
}
