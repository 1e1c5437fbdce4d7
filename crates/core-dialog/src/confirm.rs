use core_events::{KeyCode, KeyEvent};
use tokio::sync::oneshot;
use tracing::debug;

/// Identifier of one dialog presentation.
pub type PresentationId = u64;

struct Presentation {
    id: PresentationId,
    question: String,
    responder: oneshot::Sender<bool>,
}

/// Modal yes/no question resolved asynchronously.
///
/// Each presentation owns a fresh responder. Presenting again resolves the superseded one with
/// `false`, so every presentation resolves exactly once and no responder accumulates.
#[derive(Default)]
pub struct ConfirmDialog {
    current: Option<Presentation>,
    presented: u64,
}

impl std::fmt::Debug for ConfirmDialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmDialog")
            .field("open", &self.current.as_ref().map(|p| p.id))
            .field("presented", &self.presented)
            .finish()
    }
}

impl ConfirmDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&mut self, question: impl Into<String>) -> (PresentationId, oneshot::Receiver<bool>) {
        if let Some(old) = self.current.take() {
            debug!(target: "dialog", presentation = old.id, "presentation_superseded");
            let _ = old.responder.send(false);
        }
        self.presented += 1;
        let id = self.presented;
        let (responder, receiver) = oneshot::channel();
        self.current = Some(Presentation {
            id,
            question: question.into(),
            responder,
        });
        debug!(target: "dialog", presentation = id, "presented");
        (id, receiver)
    }

    /// Resolve the open presentation. Returns its id, or `None` when nothing was open.
    pub fn resolve(&mut self, accepted: bool) -> Option<PresentationId> {
        let p = self.current.take()?;
        // The receiver may be gone already; the answer is simply dropped then.
        let _ = p.responder.send(accepted);
        debug!(target: "dialog", presentation = p.id, accepted, "resolved");
        Some(p.id)
    }

    /// y / Enter accept, n / Esc decline. Other keys are swallowed while the dialog is open.
    /// Returns true when the key was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.current.is_none() {
            return false;
        }
        match key.code {
            KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                self.resolve(true);
            }
            KeyCode::Char('n' | 'N') | KeyCode::Esc => {
                self.resolve(false);
            }
            _ => {}
        }
        true
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn question(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.question.as_str())
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}
