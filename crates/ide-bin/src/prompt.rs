//! Single-line path prompt shown in the status row. It feeds the file service's picker.

use core_events::{KeyCode, KeyEvent};
use std::path::PathBuf;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Open,
    SaveAs,
}

impl PromptPurpose {
    pub fn label(self) -> &'static str {
        match self {
            PromptPurpose::Open => "Open file",
            PromptPurpose::SaveAs => "Save as",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Pending,
    Submitted(PathBuf),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PathPrompt {
    purpose: PromptPurpose,
    input: String,
}

impl PathPrompt {
    pub fn new(purpose: PromptPurpose, initial: impl Into<String>) -> Self {
        Self {
            purpose,
            input: initial.into(),
        }
    }

    pub fn purpose(&self) -> PromptPurpose {
        self.purpose
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PromptOutcome {
        if let Some(c) = key.printable() {
            self.input.push(c);
            return PromptOutcome::Pending;
        }
        match key.code {
            KeyCode::Esc => PromptOutcome::Cancelled,
            KeyCode::Enter => match self.input.trim() {
                "" => PromptOutcome::Pending,
                path => PromptOutcome::Submitted(PathBuf::from(path)),
            },
            KeyCode::Backspace => {
                if let Some((idx, _)) = self.input.grapheme_indices(true).next_back() {
                    self.input.truncate(idx);
                }
                PromptOutcome::Pending
            }
            _ => PromptOutcome::Pending,
        }
    }

    pub fn paste(&mut self, text: &str) {
        self.input.extend(text.chars().filter(|c| !c.is_control()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(p: &mut PathPrompt, s: &str) {
        for c in s.chars() {
            assert_eq!(p.handle_key(KeyEvent::plain(KeyCode::Char(c))), PromptOutcome::Pending);
        }
    }

    #[test]
    fn submit_trims_and_blank_stays_open() {
        let mut p = PathPrompt::new(PromptPurpose::Open, "");
        assert_eq!(p.handle_key(KeyEvent::plain(KeyCode::Enter)), PromptOutcome::Pending);
        type_str(&mut p, " demo.lds ");
        assert_eq!(
            p.handle_key(KeyEvent::plain(KeyCode::Enter)),
            PromptOutcome::Submitted(PathBuf::from("demo.lds"))
        );
    }

    #[test]
    fn backspace_and_cancel() {
        let mut p = PathPrompt::new(PromptPurpose::SaveAs, "a.ldz");
        p.handle_key(KeyEvent::plain(KeyCode::Backspace));
        type_str(&mut p, "s");
        assert_eq!(p.input(), "a.lds");
        p.paste("\nx");
        assert_eq!(p.input(), "a.ldsx");
        assert_eq!(p.handle_key(KeyEvent::plain(KeyCode::Esc)), PromptOutcome::Cancelled);
    }
}
