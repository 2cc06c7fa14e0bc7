//! FILENAME: core/engine/src/picker.rs
//! PURPOSE: Channel between "pick a cell" mode and the formula being edited.
//! CONTEXT: The grid view holds a `CellPickSender`; clicking a cell while
//! pick mode is on sends its `cell_<rowId>_<colId>` reference. The formula
//! editor owns the `FormulaPicker` and drains picked references into the
//! expression. Picks made while pick mode is off are dropped at the sender.

use formula_parser::cell_id;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Sending half, cheap to clone and hand to any view.
#[derive(Debug, Clone)]
pub struct CellPickSender {
    tx: Sender<String>,
    active: Arc<AtomicBool>,
}

impl CellPickSender {
    /// Sends the reference for (row, column). Returns false when pick mode
    /// is off or the picker has been dropped.
    pub fn pick(&self, row_id: &str, column_id: &str) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(cell_id(row_id, column_id)).is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Receiving half, owned by the formula editor.
#[derive(Debug)]
pub struct FormulaPicker {
    tx: Sender<String>,
    rx: Receiver<String>,
    active: Arc<AtomicBool>,
}

impl Default for FormulaPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaPicker {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        FormulaPicker {
            tx,
            rx,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn sender(&self) -> CellPickSender {
        CellPickSender {
            tx: self.tx.clone(),
            active: Arc::clone(&self.active),
        }
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Turns pick mode off and discards anything not yet drained.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Picked references not yet consumed, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.rx.try_iter().collect()
    }

    /// Appends every pending reference to `expression`, one space between
    /// tokens. Returns how many were appended.
    pub fn drain_into(&self, expression: &mut String) -> usize {
        let picked = self.drain();
        for reference in &picked {
            append_reference(expression, reference);
        }
        picked.len()
    }
}

/// Appends `reference` separated from the existing text by a single space.
pub fn append_reference(expression: &mut String, reference: &str) {
    let trimmed_len = expression.trim_end().len();
    expression.truncate(trimmed_len);
    if !expression.is_empty() {
        expression.push(' ');
    }
    expression.push_str(reference);
}
