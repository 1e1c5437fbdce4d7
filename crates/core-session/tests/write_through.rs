//! Property-based tests for session write-through.

use core_session::{DurableStore, FileDurableStore, MemoryStore, SessionStore, TEXT_KEY};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, char),
    Backspace(usize),
    Undo,
    Redo,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (0usize..64, prop::char::range('a', 'z')).prop_map(|(at, c)| Edit::Insert(at, c)),
        2 => (0usize..64).prop_map(Edit::Backspace),
        1 => Just(Edit::Undo),
        1 => Just(Edit::Redo),
    ]
}

/// Apply one edit to the live buffer the way the editor does.
fn apply<D: DurableStore>(store: &mut SessionStore<D>, text: &mut String, caret: &mut usize, e: &Edit) {
    match *e {
        Edit::Insert(at, c) => {
            *caret = at.min(text.len());
            store.history_mut().begin_insert_run(text, *caret);
            text.insert(*caret, c);
            *caret += 1;
            store.on_edit(text);
        }
        Edit::Backspace(at) => {
            *caret = at.min(text.len());
            if *caret == 0 {
                return;
            }
            store.history_mut().begin_insert_run(text, *caret);
            text.remove(*caret - 1);
            *caret -= 1;
            store.on_edit(text);
        }
        Edit::Undo => {
            store.undo(text, caret);
        }
        Edit::Redo => {
            store.redo(text, caret);
        }
    }
}

proptest! {
    // After every edit the durable text equals the live buffer.
    #[test]
    fn persisted_text_tracks_buffer(edits in prop::collection::vec(edit(), 1..80)) {
        let mut store = SessionStore::new(MemoryStore::new());
        let mut text = String::new();
        let mut caret = 0usize;
        let mut touched = false;
        for e in &edits {
            apply(&mut store, &mut text, &mut caret, e);
            touched |= store.is_modified();
            if touched {
                let persisted = store.durable().get(TEXT_KEY).unwrap();
                prop_assert_eq!(persisted.as_deref(), Some(text.as_str()));
                prop_assert_eq!(store.text(), text.as_str());
            }
        }
    }

    // Same invariant through the file-backed store, checked after reopening from disk.
    #[test]
    fn file_store_survives_reopen(edits in prop::collection::vec(edit(), 1..20)) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(FileDurableStore::open(dir.path()));
        let mut text = String::from("seed");
        let mut caret = text.len();
        store.on_edit(&text);
        for e in &edits {
            apply(&mut store, &mut text, &mut caret, e);
        }
        store.sync();
        let mut reopened = SessionStore::new(FileDurableStore::open(dir.path()));
        prop_assert_eq!(reopened.initialize(), Some(text));
        prop_assert!(!reopened.is_modified());
    }
}
