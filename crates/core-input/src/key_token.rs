use core_events::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers,
};

/// Translate a crossterm key event. Releases and keys the IDE has no use for (caps lock, media
/// keys, ...) yield `None`.
pub(crate) fn map_key_event(event: &CKeyEvent) -> Option<KeyEvent> {
    if !matches!(event.kind, CKeyEventKind::Press | CKeyEventKind::Repeat) {
        return None;
    }
    let mut mods = map_mods(event.modifiers);
    let code = match event.code {
        CKeyCode::Char(c) => KeyCode::Char(c),
        CKeyCode::Enter => KeyCode::Enter,
        CKeyCode::Esc => KeyCode::Esc,
        CKeyCode::Backspace => KeyCode::Backspace,
        CKeyCode::Delete => KeyCode::Delete,
        CKeyCode::Tab => KeyCode::Tab,
        CKeyCode::BackTab => {
            mods |= KeyModifiers::SHIFT;
            KeyCode::Tab
        }
        CKeyCode::Up => KeyCode::Up,
        CKeyCode::Down => KeyCode::Down,
        CKeyCode::Left => KeyCode::Left,
        CKeyCode::Right => KeyCode::Right,
        CKeyCode::Home => KeyCode::Home,
        CKeyCode::End => KeyCode::End,
        CKeyCode::PageUp => KeyCode::PageUp,
        CKeyCode::PageDown => KeyCode::PageDown,
        CKeyCode::F(n) => KeyCode::F(n),
        _ => return None,
    };
    Some(KeyEvent::new(code, mods))
}

pub(crate) fn map_mods(mods: CKeyModifiers) -> KeyModifiers {
    let mut out = KeyModifiers::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= KeyModifiers::CTRL;
    }
    if mods.contains(CKeyModifiers::ALT) {
        out |= KeyModifiers::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= KeyModifiers::SHIFT;
    }
    out
}

/// Ctrl-C is surfaced as its own event rather than a chord.
pub(crate) fn is_interrupt(event: &CKeyEvent) -> bool {
    matches!(event.code, CKeyCode::Char('c') | CKeyCode::Char('C'))
        && event.modifiers.contains(CKeyModifiers::CONTROL)
}

/// Label used in `input.event` logs. Printable characters are not logged.
pub(crate) fn key_kind_label(key: &KeyEvent) -> &'static str {
    match key.code {
        KeyCode::Char(_) if key.printable().is_some() => "char",
        KeyCode::Char(_) => "chord",
        KeyCode::F(_) => "function",
        _ => "named",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState as CKeyEventState;

    fn key_event(code: CKeyCode, modifiers: CKeyModifiers, kind: CKeyEventKind) -> CKeyEvent {
        CKeyEvent {
            code,
            modifiers,
            kind,
            state: CKeyEventState::empty(),
        }
    }

    #[test]
    fn maps_basic_char() {
        let ev = key_event(CKeyCode::Char('a'), CKeyModifiers::NONE, CKeyEventKind::Press);
        let key = map_key_event(&ev).expect("char should map");
        assert_eq!(key, KeyEvent::plain(KeyCode::Char('a')));
        assert_eq!(key_kind_label(&key), "char");
    }

    #[test]
    fn maps_function_key() {
        let ev = key_event(CKeyCode::F(5), CKeyModifiers::NONE, CKeyEventKind::Press);
        assert_eq!(map_key_event(&ev), Some(KeyEvent::plain(KeyCode::F(5))));
    }

    #[test]
    fn maps_ctrl_shift_chord() {
        let ev = key_event(
            CKeyCode::Char('S'),
            CKeyModifiers::CONTROL | CKeyModifiers::SHIFT,
            CKeyEventKind::Press,
        );
        let key = map_key_event(&ev).expect("ctrl-shift-s should map");
        assert_eq!(key.code, KeyCode::Char('S'));
        assert!(key.mods.contains(KeyModifiers::CTRL | KeyModifiers::SHIFT));
        assert_eq!(key_kind_label(&key), "chord");
    }

    #[test]
    fn back_tab_becomes_shift_tab() {
        let ev = key_event(CKeyCode::BackTab, CKeyModifiers::SHIFT, CKeyEventKind::Press);
        assert_eq!(
            map_key_event(&ev),
            Some(KeyEvent::new(KeyCode::Tab, KeyModifiers::SHIFT))
        );
    }

    #[test]
    fn repeat_maps_and_release_is_dropped() {
        let repeat = key_event(CKeyCode::Char('j'), CKeyModifiers::NONE, CKeyEventKind::Repeat);
        assert!(map_key_event(&repeat).is_some());
        let release = key_event(CKeyCode::Char('j'), CKeyModifiers::NONE, CKeyEventKind::Release);
        assert!(map_key_event(&release).is_none());
    }

    #[test]
    fn unsupported_keys_return_none() {
        let ev = key_event(CKeyCode::CapsLock, CKeyModifiers::NONE, CKeyEventKind::Press);
        assert!(map_key_event(&ev).is_none());
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        let ev = key_event(CKeyCode::Char('c'), CKeyModifiers::CONTROL, CKeyEventKind::Press);
        assert!(is_interrupt(&ev));
        let plain = key_event(CKeyCode::Char('c'), CKeyModifiers::NONE, CKeyEventKind::Press);
        assert!(!is_interrupt(&plain));
    }
}
