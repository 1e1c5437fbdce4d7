//! Editor text buffer: a `String` plus a byte caret that always sits on a grapheme boundary.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditorBuffer {
    text: String,
    caret: usize,
    /// Column the caret tries to return to on vertical moves.
    sticky_col: Option<usize>,
}

impl EditorBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            caret: 0,
            sticky_col: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Both halves for history restore. The caret is re-clamped on the next call.
    pub fn parts_mut(&mut self) -> (&mut String, &mut usize) {
        self.sticky_col = None;
        (&mut self.text, &mut self.caret)
    }

    /// Snap the caret back onto a grapheme boundary inside the text.
    pub fn clamp_caret(&mut self) {
        self.caret = self.caret.min(self.text.len());
        while !self.text.is_char_boundary(self.caret) {
            self.caret -= 1;
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.caret = 0;
        self.sticky_col = None;
    }

    pub fn insert_str(&mut self, s: &str) {
        self.text.insert_str(self.caret, s);
        self.caret += s.len();
        self.sticky_col = None;
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.caret, c);
        self.caret += c.len_utf8();
        self.sticky_col = None;
    }

    /// Delete the grapheme before the caret. Returns false at the start of the text.
    pub fn backspace(&mut self) -> bool {
        let Some((start, _)) = self.text[..self.caret].grapheme_indices(true).next_back() else {
            return false;
        };
        self.text.replace_range(start..self.caret, "");
        self.caret = start;
        self.sticky_col = None;
        true
    }

    /// Delete the grapheme after the caret. Returns false at the end of the text.
    pub fn delete(&mut self) -> bool {
        let Some(g) = self.text[self.caret..].graphemes(true).next() else {
            return false;
        };
        let end = self.caret + g.len();
        self.text.replace_range(self.caret..end, "");
        self.sticky_col = None;
        true
    }

    pub fn move_left(&mut self) {
        if let Some((start, _)) = self.text[..self.caret].grapheme_indices(true).next_back() {
            self.caret = start;
        }
        self.sticky_col = None;
    }

    pub fn move_right(&mut self) {
        if let Some(g) = self.text[self.caret..].graphemes(true).next() {
            self.caret += g.len();
        }
        self.sticky_col = None;
    }

    pub fn move_home(&mut self) {
        self.caret = self.line_start(self.caret);
        self.sticky_col = None;
    }

    pub fn move_end(&mut self) {
        self.caret = self.line_end(self.caret);
        self.sticky_col = None;
    }

    pub fn move_up(&mut self, lines: usize) {
        let (line, col) = self.line_col();
        let goal = *self.sticky_col.get_or_insert(col);
        self.caret = self.offset_of(line.saturating_sub(lines), goal);
    }

    pub fn move_down(&mut self, lines: usize) {
        let (line, col) = self.line_col();
        let goal = *self.sticky_col.get_or_insert(col);
        let last = self.text.matches('\n').count();
        self.caret = self.offset_of((line + lines).min(last), goal);
    }

    /// Caret as (line, grapheme column).
    pub fn line_col(&self) -> (usize, usize) {
        let before = &self.text[..self.caret];
        let line = before.matches('\n').count();
        let start = self.line_start(self.caret);
        (line, self.text[start..self.caret].graphemes(true).count())
    }

    fn line_start(&self, at: usize) -> usize {
        self.text[..at].rfind('\n').map_or(0, |i| i + 1)
    }

    fn line_end(&self, at: usize) -> usize {
        self.text[at..].find('\n').map_or(self.text.len(), |i| at + i)
    }

    fn offset_of(&self, line: usize, col: usize) -> usize {
        let start = match line {
            0 => 0,
            n => self
                .text
                .match_indices('\n')
                .nth(n - 1)
                .map_or(self.text.len(), |(i, _)| i + 1),
        };
        let end = self.line_end(start);
        self.text[start..end]
            .grapheme_indices(true)
            .nth(col)
            .map_or(end, |(i, _)| start + i)
    }
}
