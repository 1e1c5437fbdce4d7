//! Confirmation dialogs, acknowledgements, and guarded file actions.
//!
//! Destructive actions (new, open, exit) go through [`FileGuard`]. With unsaved edits the guard
//! presents a [`ConfirmDialog`] and parks the action under the presentation id; the action runs
//! only if that same presentation resolves `true`. Save and save-as never ask: they report
//! through [`Acknowledgements`].

mod ack;
mod confirm;
mod file;

pub use ack::{AckKind, Acknowledgement, Acknowledgements};
pub use confirm::{ConfirmDialog, PresentationId};
pub use file::{
    FileError, FileService, FsFileService, LineEnding, PathPicker, PresetPicker, SOURCE_EXTENSION,
    normalize_line_endings,
};

use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileAction {
    New,
    Open,
    Exit,
}

impl FileAction {
    pub fn question(self) -> &'static str {
        match self {
            FileAction::New => "Discard unsaved changes and start a new file?",
            FileAction::Open => "Discard unsaved changes and open another file?",
            FileAction::Exit => "Discard unsaved changes and exit?",
        }
    }
}

#[derive(Debug)]
pub enum GuardDecision {
    /// No unsaved edits: go ahead.
    Proceed(FileAction),
    /// Wait for the answer of this presentation, then call [`FileGuard::resolve`].
    Confirm {
        presentation: PresentationId,
        answer: oneshot::Receiver<bool>,
    },
}

/// What a completed file action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// New or open finished: load this text as a clean document.
    Loaded(String),
    Cancelled,
    Exit,
}

#[derive(Debug, Default)]
pub struct FileGuard {
    parked: HashMap<PresentationId, FileAction>,
}

impl FileGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, action: FileAction, modified: bool, dialog: &mut ConfirmDialog) -> GuardDecision {
        if !modified {
            return GuardDecision::Proceed(action);
        }
        let (presentation, answer) = dialog.present(action.question());
        self.parked.insert(presentation, action);
        debug!(target: "dialog", presentation, ?action, "action_parked");
        GuardDecision::Confirm { presentation, answer }
    }

    /// The presentation resolved. Returns the action to perform only when accepted.
    pub fn resolve(&mut self, presentation: PresentationId, accepted: bool) -> Option<FileAction> {
        let action = self.parked.remove(&presentation)?;
        info!(target: "dialog", presentation, ?action, accepted, "guard_resolved");
        accepted.then_some(action)
    }

    pub fn parked(&self) -> usize {
        self.parked.len()
    }
}

/// Run a confirmed (or unguarded) action against the file service.
pub fn perform<S: FileService + ?Sized>(action: FileAction, service: &mut S) -> Result<FileOutcome, FileError> {
    match action {
        FileAction::New => service.create_new().map(FileOutcome::Loaded),
        FileAction::Open => Ok(service
            .open()?
            .map(FileOutcome::Loaded)
            .unwrap_or(FileOutcome::Cancelled)),
        FileAction::Exit => {
            service.terminate();
            Ok(FileOutcome::Exit)
        }
    }
}
