//! Session store: editor text persistence, edit history, and the process lifecycle flag.
//!
//! Two stores with different lifetimes back the session:
//! - the durable store holds the last editor text under [`TEXT_KEY`] and survives restarts;
//! - the process-scoped store holds the history snapshot and the "has navigated" flag and is
//!   gone after a full restart.
//!
//! Edits reach the durable store immediately but it may buffer them; the owner calls
//! [`SessionStore::sync`] once per batch of edits to put them on disk.
//!
//! Persistence is best effort. A failing durable store is logged at `warn` and the edit still
//! lands in memory; nothing here returns an error to the caller.
//!
//! Editor text never appears in log output, only its length.

mod history;
mod store;

pub use history::{EditHistory, InsertRun, TextSnapshot, UNDO_HISTORY_MAX};
pub use store::{DurableStore, FileDurableStore, MemoryStore, ProcessScopedStore, StoreError};

use tracing::{debug, info, warn};

/// Durable key holding the last editor text.
pub const TEXT_KEY: &str = "ludus.editor.text";
/// Process-scoped key holding the serialised [`EditHistory`].
pub const HISTORY_KEY: &str = "ludus.editor.history";
/// Process-scoped copy of the text captured alongside the history.
pub const SCOPED_TEXT_KEY: &str = "ludus.editor.text.scoped";
/// Process-scoped lifecycle flag: set once the first activation has been observed.
pub const NAVIGATED_KEY: &str = "ludus.process.navigated";

/// Live session state. `modified` is set by any edit and cleared only by save/open/new.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditorSession {
    pub text: String,
    pub history: EditHistory,
    pub modified: bool,
}

pub struct SessionStore<D: DurableStore> {
    durable: D,
    scoped: ProcessScopedStore,
    session: EditorSession,
    persist_failures: u64,
}

impl<D: DurableStore> SessionStore<D> {
    pub fn new(durable: D) -> Self {
        Self {
            durable,
            scoped: ProcessScopedStore::new(),
            session: EditorSession::default(),
            persist_failures: 0,
        }
    }

    /// Restore previously persisted text (and history, if this process parked one). The restored
    /// text is returned for the editor buffer and does not mark the session modified.
    pub fn initialize(&mut self) -> Option<String> {
        let restored = match self.durable.get(TEXT_KEY) {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "session", error = %e, "initialize_read_failed");
                None
            }
        };
        if let Some(text) = &restored {
            self.session.text = text.clone();
        }
        let history_restored = self.restore_history();
        self.session.modified = false;
        info!(
            target: "session",
            restored = restored.is_some(),
            text_len = self.session.text.len(),
            history_restored,
            "session_initialized"
        );
        restored
    }

    /// Every buffer mutation: mark modified and write the text through to durable storage.
    pub fn on_edit(&mut self, current_text: &str) {
        self.session.modified = true;
        self.session.text.clear();
        self.session.text.push_str(current_text);
        self.write_text();
    }

    /// Park text and history in the process-scoped store (before switching views).
    pub fn on_explicit_persist(&mut self, current_text: &str) {
        match serde_json::to_string(&self.session.history) {
            Ok(json) => self.scoped.put(HISTORY_KEY, json),
            Err(e) => warn!(target: "session", error = %e, "history_encode_failed"),
        }
        self.scoped.put(SCOPED_TEXT_KEY, current_text);
        debug!(
            target: "session",
            text_len = current_text.len(),
            undo_depth = self.session.history.undo_depth(),
            "explicit_persist"
        );
    }

    /// Reload the history parked by [`Self::on_explicit_persist`]. Returns false when the
    /// process-scoped store holds none (always the case right after a restart).
    pub fn restore_history(&mut self) -> bool {
        let Some(json) = self.scoped.get(HISTORY_KEY) else {
            return false;
        };
        match serde_json::from_str::<EditHistory>(json) {
            Ok(history) => {
                self.session.history = history;
                true
            }
            Err(e) => {
                warn!(target: "session", error = %e, "history_decode_failed");
                false
            }
        }
    }

    /// A new/open completed: replace text, drop history, clear the modified flag.
    pub fn load_document(&mut self, text: &str) {
        self.session.text = text.to_string();
        self.session.history.clear();
        self.session.modified = false;
        self.scoped.remove(HISTORY_KEY);
        self.write_text();
        info!(target: "session", text_len = text.len(), "document_loaded");
    }

    pub fn mark_clean(&mut self) {
        self.session.modified = false;
    }

    pub fn is_modified(&self) -> bool {
        self.session.modified
    }

    /// Returns whether the lifecycle flag was already set, then sets it unconditionally.
    pub fn observe_activation(&mut self) -> bool {
        let seen = self.scoped.contains(NAVIGATED_KEY);
        self.scoped.put(NAVIGATED_KEY, "1");
        debug!(target: "session", already_navigated = seen, "activation_observed");
        seen
    }

    /// Undo into `text`/`caret`; a successful undo is an edit like any other.
    pub fn undo(&mut self, text: &mut String, caret: &mut usize) -> bool {
        if !self.session.history.undo(text, caret) {
            return false;
        }
        self.on_edit(text);
        true
    }

    pub fn redo(&mut self, text: &mut String, caret: &mut usize) -> bool {
        if !self.session.history.redo(text, caret) {
            return false;
        }
        self.on_edit(text);
        true
    }

    pub fn text(&self) -> &str {
        &self.session.text
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn history(&self) -> &EditHistory {
        &self.session.history
    }

    pub fn history_mut(&mut self) -> &mut EditHistory {
        &mut self.session.history
    }

    pub fn durable(&self) -> &D {
        &self.durable
    }

    pub fn scoped(&self) -> &ProcessScopedStore {
        &self.scoped
    }

    /// Durable writes that failed since construction.
    pub fn persist_failures(&self) -> u64 {
        self.persist_failures
    }

    /// Push buffered durable writes to storage. Failures are counted like any other.
    pub fn sync(&mut self) {
        if let Err(e) = self.durable.sync() {
            self.persist_failures += 1;
            warn!(
                target: "session",
                error = %e,
                failures = self.persist_failures,
                "sync_failed"
            );
        }
    }

    fn write_text(&mut self) {
        if let Err(e) = self.durable.put(TEXT_KEY, &self.session.text) {
            self.persist_failures += 1;
            warn!(
                target: "session",
                error = %e,
                text_len = self.session.text.len(),
                failures = self.persist_failures,
                "persist_failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    struct FailingStore;

    impl DurableStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                path: "denied".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
        fn put(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "denied".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl Write for LockedWriter<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;
        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn initialize_restores_without_marking_modified() {
        let mut durable = MemoryStore::new();
        durable.put(TEXT_KEY, "hp a : 1.").unwrap();
        let mut store = SessionStore::new(durable);
        assert_eq!(store.initialize().as_deref(), Some("hp a : 1."));
        assert_eq!(store.text(), "hp a : 1.");
        assert!(!store.is_modified());
    }

    #[test]
    fn initialize_on_empty_store_yields_nothing() {
        let mut store = SessionStore::new(MemoryStore::new());
        assert_eq!(store.initialize(), None);
        assert_eq!(store.text(), "");
    }

    #[test]
    fn edit_marks_modified_and_save_clears() {
        let mut store = SessionStore::new(MemoryStore::new());
        store.on_edit("x");
        assert!(store.is_modified());
        assert_eq!(store.durable().get(TEXT_KEY).unwrap().as_deref(), Some("x"));
        store.mark_clean();
        assert!(!store.is_modified());
    }

    #[test]
    fn lifecycle_flag_reports_first_observation_once() {
        let mut store = SessionStore::new(MemoryStore::new());
        assert!(!store.observe_activation());
        assert!(store.observe_activation());
        assert!(store.observe_activation());
    }

    #[test]
    fn explicit_persist_round_trips_history_within_process() {
        let mut store = SessionStore::new(MemoryStore::new());
        store.history_mut().push_discrete_edit("a", 1);
        store.history_mut().push_discrete_edit("ab", 2);
        store.on_explicit_persist("abc");
        assert_eq!(store.scoped().get(SCOPED_TEXT_KEY), Some("abc"));

        store.history_mut().clear();
        assert!(store.restore_history());
        assert_eq!(store.history().undo_depth(), 2);
    }

    #[test]
    fn history_does_not_survive_restart() {
        let mut durable = MemoryStore::new();
        {
            let mut first = SessionStore::new(durable.clone());
            first.on_edit("kept");
            first.history_mut().push_discrete_edit("", 0);
            first.on_explicit_persist("kept");
            durable = first.durable().clone();
        }
        let mut second = SessionStore::new(durable);
        assert_eq!(second.initialize().as_deref(), Some("kept"));
        assert_eq!(second.history().undo_depth(), 0);
        assert!(!second.observe_activation());
    }

    #[test]
    fn load_document_resets_history_and_flag() {
        let mut store = SessionStore::new(MemoryStore::new());
        store.history_mut().push_discrete_edit("old", 3);
        store.on_edit("old!");
        store.load_document("fresh");
        assert!(!store.is_modified());
        assert_eq!(store.history().undo_depth(), 0);
        assert_eq!(store.durable().get(TEXT_KEY).unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn undo_is_an_edit() {
        let mut store = SessionStore::new(MemoryStore::new());
        let mut text = String::from("a");
        let mut caret = 1;
        store.history_mut().push_discrete_edit(&text, caret);
        text.push('b');
        store.on_edit(&text);
        store.mark_clean();

        assert!(store.undo(&mut text, &mut caret));
        assert_eq!(text, "a");
        assert!(store.is_modified());
        assert_eq!(store.durable().get(TEXT_KEY).unwrap().as_deref(), Some("a"));
        assert!(store.redo(&mut text, &mut caret));
        assert_eq!(store.text(), "ab");
    }

    #[test]
    fn edits_reach_disk_on_sync() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(FileDurableStore::FILE_NAME);
        let mut store = SessionStore::new(FileDurableStore::open(dir.path()));
        let mut text = String::new();
        for c in "hp a : 1.".chars() {
            text.push(c);
            store.on_edit(&text);
        }
        assert!(!file.exists());
        assert!(store.durable().is_dirty());

        store.sync();
        assert_eq!(store.persist_failures(), 0);
        let reopened = FileDurableStore::open(dir.path());
        assert_eq!(reopened.get(TEXT_KEY).unwrap().as_deref(), Some("hp a : 1."));
    }

    #[test]
    fn failing_store_is_best_effort() {
        let mut store = SessionStore::new(FailingStore);
        assert_eq!(store.initialize(), None);
        store.on_edit("still here");
        assert_eq!(store.text(), "still here");
        assert!(store.is_modified());
        assert_eq!(store.persist_failures(), 1);
    }

    #[test]
    fn persist_failure_logs_length_not_text() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer = BufferWriter { inner: buf.clone() };
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();
        with_default(subscriber, || {
            let mut store = SessionStore::new(FailingStore);
            store.on_edit("secret source text");
        });
        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(out.contains("persist_failed"));
        assert!(out.contains("text_len=18"));
        assert!(!out.contains("secret source text"));
    }
}
