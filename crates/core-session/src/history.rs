use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use tracing::trace;

/// Maximum number of snapshots retained in undo history.
pub const UNDO_HISTORY_MAX: usize = 200;

/// A full-text snapshot for undo/redo (coarse clone; documents are small).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSnapshot {
    pub text: String,
    /// Byte offset of the caret when the snapshot was captured.
    pub caret: usize,
    /// Content hash at capture, used to skip identical successive snapshots.
    pub hash: u64,
}

/// Typing run state. A contiguous burst of character inserts and backspaces is captured by a
/// single snapshot taken lazily at the first mutation of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InsertRun {
    #[default]
    Inactive,
    Active {
        edits: u32,
    },
}

/// Undo/redo record owned by the session. Serialisable so it can be parked in the
/// process-scoped store across navigations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHistory {
    undo_stack: Vec<TextSnapshot>,
    redo_stack: Vec<TextSnapshot>,
    #[serde(skip)]
    insert_run: InsertRun,
    #[serde(skip)]
    snapshots_skipped: u64,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn insert_run(&self) -> InsertRun {
        self.insert_run
    }
    pub fn snapshots_skipped(&self) -> u64 {
        self.snapshots_skipped
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.insert_run = InsertRun::Inactive;
    }

    pub fn push_snapshot(&mut self, text: &str, caret: usize) {
        let current_hash = text_hash(text);
        if let Some(last) = self.undo_stack.last()
            && last.hash == current_hash
        {
            self.snapshots_skipped += 1;
            trace!(target: "session.history", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), hash = current_hash, "snapshot_dedupe_skip");
            return;
        }
        self.undo_stack.push(TextSnapshot {
            text: text.to_string(),
            caret,
            hash: current_hash,
        });
        trace!(target: "session.history", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), text_len = text.len(), hash = current_hash, "push_snapshot");
        if self.undo_stack.len() > UNDO_HISTORY_MAX {
            let _ = self.undo_stack.remove(0);
            trace!(target: "session.history", "undo_stack_trimmed");
        }
        self.redo_stack.clear();
    }

    /// Snapshot once at the start of a typing run; later calls within the run are no-ops.
    pub fn begin_insert_run(&mut self, text: &str, caret: usize) {
        if let InsertRun::Active { edits } = &mut self.insert_run {
            *edits += 1;
            return;
        }
        self.push_snapshot(text, caret);
        self.insert_run = InsertRun::Active { edits: 0 };
    }

    pub fn end_insert_run(&mut self) {
        self.insert_run = InsertRun::Inactive;
    }

    /// Discrete edits (newline, paste, delete) always snapshot and close any open run.
    pub fn push_discrete_edit(&mut self, text: &str, caret: usize) {
        self.end_insert_run();
        self.push_snapshot(text, caret);
    }

    /// Restore the previous snapshot into `text`/`caret`. Returns false when nothing to undo.
    pub fn undo(&mut self, text: &mut String, caret: &mut usize) -> bool {
        self.end_insert_run();
        let Some(last) = self.undo_stack.pop() else {
            return false;
        };
        trace!(target: "session.history", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "undo_pop");
        self.redo_stack.push(TextSnapshot {
            hash: text_hash(text),
            text: std::mem::replace(text, last.text),
            caret: *caret,
        });
        *caret = last.caret.min(text.len());
        true
    }

    pub fn redo(&mut self, text: &mut String, caret: &mut usize) -> bool {
        self.end_insert_run();
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        trace!(target: "session.history", redo_depth = self.redo_stack.len(), undo_depth = self.undo_stack.len(), "redo_pop");
        self.undo_stack.push(TextSnapshot {
            hash: text_hash(text),
            text: std::mem::replace(text, next.text),
            caret: *caret,
        });
        *caret = next.caret.min(text.len());
        true
    }
}

fn text_hash(text: &str) -> u64 {
    let mut h = DefaultHasher::new();
    h.write(text.as_bytes());
    h.finish()
}
