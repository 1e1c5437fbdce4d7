//! core-keymap: fixed IDE shortcut table.
//!
//! Design principles:
//! - Pure and deterministic: resolution depends only on the normalized key chord.
//! - Bindings are declared as an ordered spec list compiled into a lookup map; a later spec for
//!   the same chord overrides an earlier one.
//! - Keys that resolve to nothing are left for the focused pane (editor or console).

use core_events::{KeyCode, KeyEvent, KeyModifiers};
use core_pipeline::NavigationContext;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::trace;

// -------------------------------------------------------------------------------------------------
// Public Symbolic Output
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NewFile,
    OpenFile,
    Save,
    SaveAs,
    Exit,
    Run,
    Navigate(NavigationContext),
    Undo,
    Redo,
    ClearConsole,
}

impl Action {
    /// Short label for the status/help line.
    pub fn label(self) -> &'static str {
        match self {
            Action::NewFile => "new",
            Action::OpenFile => "open",
            Action::Save => "save",
            Action::SaveAs => "save as",
            Action::Exit => "exit",
            Action::Run => "run",
            Action::Navigate(NavigationContext::Overview) => "overview",
            Action::Navigate(NavigationContext::Lexer) => "lexer",
            Action::Navigate(NavigationContext::Syntax) => "syntax",
            Action::Navigate(NavigationContext::Semantic) => "semantic",
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::ClearConsole => "clear output",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Mapping Specification
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct MappingSpec {
    pub chord: KeyEvent,
    pub action: Action,
}

impl MappingSpec {
    const fn new(code: KeyCode, mods: KeyModifiers, action: Action) -> Self {
        Self {
            chord: KeyEvent::new(code, mods),
            action,
        }
    }
}

/// Canonical chord form: with CTRL or ALT held, an uppercase letter becomes lowercase plus SHIFT.
/// Terminals disagree on whether Ctrl-Shift-S arrives as `S` or `s` + SHIFT.
pub fn normalize(key: KeyEvent) -> KeyEvent {
    match key.code {
        KeyCode::Char(c)
            if key.mods.intersects(KeyModifiers::CTRL | KeyModifiers::ALT) && c.is_ascii_uppercase() =>
        {
            KeyEvent::new(
                KeyCode::Char(c.to_ascii_lowercase()),
                key.mods | KeyModifiers::SHIFT,
            )
        }
        _ => key,
    }
}

// -------------------------------------------------------------------------------------------------
// Keymap
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub struct Keymap {
    bindings: HashMap<KeyEvent, Action>,
    specs: Vec<MappingSpec>,
}

impl Keymap {
    pub fn build(specs: Vec<MappingSpec>) -> Self {
        let mut bindings = HashMap::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            let chord = normalize(spec.chord);
            if let Some(prev) = bindings.insert(chord, spec.action) {
                trace!(target: "input.map", mapping_index = idx, ?prev, action = ?spec.action, "binding_override");
            }
        }
        Self { bindings, specs }
    }

    pub fn resolve(&self, key: KeyEvent) -> Option<Action> {
        let chord = normalize(key);
        let action = self.bindings.get(&chord).copied();
        if let Some(action) = action {
            trace!(target: "input.map", key = %chord, ?action, "resolved");
        }
        action
    }

    /// Every chord currently bound to `action` (overridden specs excluded).
    pub fn bindings_for(&self, action: Action) -> SmallVec<[KeyEvent; 2]> {
        self.specs
            .iter()
            .map(|s| normalize(s.chord))
            .filter(|chord| self.bindings.get(chord) == Some(&action))
            .collect()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::build(baseline_ide_specs())
    }
}

/// Human-readable chord, e.g. `Ctrl+Shift+S`, `F5`.
pub fn describe(chord: KeyEvent) -> String {
    let mut out = String::new();
    if chord.mods.contains(KeyModifiers::CTRL) {
        out.push_str("Ctrl+");
    }
    if chord.mods.contains(KeyModifiers::ALT) {
        out.push_str("Alt+");
    }
    if chord.mods.contains(KeyModifiers::SHIFT) {
        out.push_str("Shift+");
    }
    match chord.code {
        KeyCode::Char(c) => out.push(c.to_ascii_uppercase()),
        KeyCode::F(n) => out.push_str(&format!("F{n}")),
        other => out.push_str(&format!("{other:?}")),
    }
    out
}

// -------------------------------------------------------------------------------------------------
// Baseline IDE bindings
// -------------------------------------------------------------------------------------------------
pub fn baseline_ide_specs() -> Vec<MappingSpec> {
    use KeyCode as K;
    let ctrl = KeyModifiers::CTRL;
    let ctrl_shift = KeyModifiers::CTRL.union(KeyModifiers::SHIFT);
    let none = KeyModifiers::empty();
    vec![
        MappingSpec::new(K::Char('q'), ctrl, Action::NewFile),
        MappingSpec::new(K::Char('o'), ctrl, Action::OpenFile),
        MappingSpec::new(K::Char('s'), ctrl, Action::Save),
        MappingSpec::new(K::Char('s'), ctrl_shift, Action::SaveAs),
        MappingSpec::new(K::Char('s'), KeyModifiers::ALT, Action::SaveAs),
        MappingSpec::new(K::Char('w'), ctrl, Action::Exit),
        MappingSpec::new(K::F(5), none, Action::Run),
        MappingSpec::new(K::Char('r'), ctrl, Action::Run),
        MappingSpec::new(K::F(1), none, Action::Navigate(NavigationContext::Overview)),
        MappingSpec::new(K::F(2), none, Action::Navigate(NavigationContext::Lexer)),
        MappingSpec::new(K::F(3), none, Action::Navigate(NavigationContext::Syntax)),
        MappingSpec::new(K::F(4), none, Action::Navigate(NavigationContext::Semantic)),
        MappingSpec::new(K::Char('z'), ctrl, Action::Undo),
        MappingSpec::new(K::Char('y'), ctrl, Action::Redo),
        MappingSpec::new(K::Char('l'), ctrl, Action::ClearConsole),
    ]
}
