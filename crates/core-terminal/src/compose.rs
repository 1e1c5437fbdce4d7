use crate::frame::{Frame, Style};
use crate::layout::{Layout, Rect};
use core_highlight::Highlighter;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const TAB_WIDTH: u16 = 4;

/// Editor pane input. `caret` is (line, grapheme column); `first_line` is the scroll position
/// from the previous frame.
#[derive(Debug, Clone, Copy)]
pub struct EditorView<'a> {
    pub text: &'a str,
    pub caret: (usize, usize),
    pub first_line: usize,
    pub file_label: &'a str,
    pub modified: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LexemeRow<'a> {
    pub lexeme: &'a str,
    pub token: &'a str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusView<'a> {
    /// Key hints shown when nothing else claims the row.
    pub hint: &'a str,
    /// Right-aligned run indicator.
    pub run_label: &'a str,
    /// Live acknowledgement text and whether it reports a failure.
    pub ack: Option<(&'a str, bool)>,
    /// Inline path prompt: label and current input.
    pub prompt: Option<(&'a str, &'a str)>,
}

/// Everything one frame shows. Borrowed from the runtime for the duration of a compose call.
#[derive(Debug, Clone, Copy)]
pub struct ViewModel<'a> {
    pub title: &'a str,
    pub editor: EditorView<'a>,
    pub console: &'a str,
    /// The console owns the caret (a program is waiting for input).
    pub console_focused: bool,
    pub lexemes: &'a [LexemeRow<'a>],
    pub diagnostics: &'a str,
    pub status: StatusView<'a>,
    /// Open confirmation question.
    pub dialog: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Composed {
    pub frame: Frame,
    /// Scroll position to feed back into the next [`EditorView`].
    pub editor_first_line: usize,
}

pub fn compose(view: &ViewModel<'_>, width: u16, height: u16) -> Composed {
    let layout = Layout::compute(width, height);
    let mut frame = Frame::new(width, height);

    draw_title(&mut frame, layout.title, view.title);
    let (first_line, editor_cursor) = draw_editor(&mut frame, layout.editor, &view.editor);
    let console_cursor = draw_console(&mut frame, layout.console, view.console, view.console_focused);
    draw_lexemes(&mut frame, layout.lexemes, view.lexemes);
    draw_diagnostics(&mut frame, layout.diagnostics, view.diagnostics);
    let prompt_cursor = draw_status(&mut frame, layout.status, &view.status);

    frame.cursor = if let Some(question) = view.dialog {
        draw_dialog(&mut frame, question);
        None
    } else if view.status.prompt.is_some() {
        prompt_cursor
    } else if view.console_focused {
        console_cursor
    } else {
        editor_cursor
    };

    Composed {
        frame,
        editor_first_line: first_line,
    }
}

fn draw_title(frame: &mut Frame, area: Rect, title: &str) {
    if area.is_empty() {
        return;
    }
    frame.fill(area.x, area.y, area.width, Style::Title);
    frame.put_str(area.x + 1, area.y, title, Style::Title, area.width.saturating_sub(1));
}

fn draw_header(frame: &mut Frame, area: Rect, label: &str) -> Rect {
    let (header, body) = area.split_header();
    if !header.is_empty() {
        frame.fill(header.x, header.y, header.width, Style::Header);
        frame.put_str(header.x + 1, header.y, label, Style::Header, header.width.saturating_sub(1));
    }
    body
}

/// Draw `text` expanding tabs to the next stop. Returns the new column.
fn draw_expanded(frame: &mut Frame, x0: u16, y: u16, col: u16, text: &str, style: Style, limit: u16) -> u16 {
    let mut col = col;
    for (i, piece) in text.split('\t').enumerate() {
        if i > 0 {
            let stop = (col / TAB_WIDTH + 1) * TAB_WIDTH;
            let n = stop.min(limit).saturating_sub(col);
            frame.fill(x0 + col, y, n, Style::Plain);
            col += n;
        }
        if col >= limit {
            break;
        }
        col += frame.put_str(x0 + col, y, piece, style, limit - col);
    }
    col
}

fn display_column(line: &str, graphemes: usize) -> u16 {
    let mut col = 0u16;
    for g in line.graphemes(true).take(graphemes) {
        col = if g == "\t" {
            (col / TAB_WIDTH + 1) * TAB_WIDTH
        } else {
            col.saturating_add(UnicodeWidthStr::width(g) as u16)
        };
    }
    col
}

fn digits(mut n: usize) -> u16 {
    let mut d = 1;
    while n >= 10 {
        n /= 10;
        d += 1;
    }
    d
}

fn draw_editor(frame: &mut Frame, area: Rect, editor: &EditorView<'_>) -> (usize, Option<(u16, u16)>) {
    let label = if editor.modified {
        format!("{} [+]", editor.file_label)
    } else {
        editor.file_label.to_string()
    };
    let body = draw_header(frame, area, &label);
    let (caret_line, caret_col) = editor.caret;
    let rows = body.height as usize;
    if rows == 0 || body.width == 0 {
        return (editor.first_line, None);
    }

    let mut first = editor.first_line;
    if caret_line < first {
        first = caret_line;
    } else if caret_line >= first + rows {
        first = caret_line + 1 - rows;
    }

    let lines: Vec<&str> = editor.text.split('\n').collect();
    let gutter = digits(lines.len()).max(2) + 1;
    let text_x = body.x + gutter.min(body.width);
    let text_w = body.width.saturating_sub(gutter);

    // Block-comment mode depends on every line above the viewport.
    let mut hl = Highlighter::new();
    for line in lines.iter().take(first) {
        hl.highlight_line(line);
    }

    let mut cursor = None;
    for (row, (idx, line)) in lines.iter().enumerate().skip(first).take(rows).enumerate() {
        let y = body.y + row as u16;
        let number = format!("{:>width$} ", idx + 1, width = (gutter - 1) as usize);
        frame.put_str(body.x, y, &number, Style::Gutter, gutter.min(body.width));

        let mut col = 0u16;
        let mut at = 0usize;
        for span in hl.highlight_line(line) {
            if span.start > at {
                col = draw_expanded(frame, text_x, y, col, &line[at..span.start], Style::Plain, text_w);
            }
            col = draw_expanded(frame, text_x, y, col, span.lexeme, Style::Token(span.category), text_w);
            at = span.end();
        }
        if at < line.len() {
            draw_expanded(frame, text_x, y, col, &line[at..], Style::Plain, text_w);
        }

        if idx == caret_line && text_w > 0 {
            let x = display_column(line, caret_col).min(text_w - 1);
            cursor = Some((text_x + x, y));
        }
    }
    (first, cursor)
}

fn draw_console(frame: &mut Frame, area: Rect, text: &str, focused: bool) -> Option<(u16, u16)> {
    let body = draw_header(frame, area, if focused { "Output (input requested)" } else { "Output" });
    if body.is_empty() {
        return None;
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let skip = lines.len().saturating_sub(body.height as usize);
    let mut cursor = None;
    for (row, line) in lines.iter().skip(skip).enumerate() {
        let y = body.y + row as u16;
        let used = draw_expanded(frame, body.x, y, 0, line, Style::Plain, body.width);
        cursor = Some((body.x + used.min(body.width.saturating_sub(1)), y));
    }
    if focused { cursor } else { None }
}

fn draw_lexemes(frame: &mut Frame, area: Rect, rows: &[LexemeRow<'_>]) {
    if area.is_empty() {
        return;
    }
    let body = draw_header(frame, area, "Lexeme / Token");
    let col_w = body.width / 2;
    let capacity = body.height as usize;
    let overflow = rows.len() > capacity;
    let shown = if overflow { capacity.saturating_sub(1) } else { rows.len() };
    for (i, row) in rows.iter().take(shown).enumerate() {
        let y = body.y + i as u16;
        frame.put_str(body.x + 1, y, row.lexeme, Style::Plain, col_w.saturating_sub(2));
        frame.put_str(body.x + col_w, y, row.token, Style::Info, body.width - col_w);
    }
    if overflow && capacity > 0 {
        let more = format!("... {} more", rows.len() - shown);
        frame.put_str(body.x + 1, body.y + shown as u16, &more, Style::Gutter, body.width.saturating_sub(1));
    }
}

fn draw_diagnostics(frame: &mut Frame, area: Rect, text: &str) {
    if area.is_empty() {
        return;
    }
    let body = draw_header(frame, area, "Diagnostics");
    for (i, line) in text.lines().take(body.height as usize).enumerate() {
        frame.put_str(body.x + 1, body.y + i as u16, line, Style::Error, body.width.saturating_sub(1));
    }
}

fn draw_status(frame: &mut Frame, area: Rect, status: &StatusView<'_>) -> Option<(u16, u16)> {
    if area.is_empty() {
        return None;
    }
    frame.fill(area.x, area.y, area.width, Style::Status);
    if let Some((label, input)) = status.prompt {
        let used = frame.put_str(area.x, area.y, &format!("{label}: "), Style::Status, area.width);
        let typed = frame.put_str(area.x + used, area.y, input, Style::Status, area.width - used);
        return Some(((used + typed).min(area.width.saturating_sub(1)), area.y));
    }
    let run_w = UnicodeWidthStr::width(status.run_label) as u16;
    let left_w = area.width.saturating_sub(run_w + 1);
    match status.ack {
        Some((text, is_error)) => {
            let style = if is_error { Style::Error } else { Style::Info };
            frame.put_str(area.x + 1, area.y, text, style, left_w.saturating_sub(1));
        }
        None => {
            frame.put_str(area.x + 1, area.y, status.hint, Style::Status, left_w.saturating_sub(1));
        }
    }
    if run_w < area.width {
        frame.put_str(area.x + area.width - run_w - 1, area.y, status.run_label, Style::Status, run_w);
    }
    None
}

fn draw_dialog(frame: &mut Frame, question: &str) {
    let text = format!(" {question} [y/N] ");
    let w = (UnicodeWidthStr::width(text.as_str()) as u16).min(frame.width);
    if w == 0 || frame.height < 3 {
        return;
    }
    let x = (frame.width - w) / 2;
    let y = frame.height / 2 - 1;
    for dy in 0..3 {
        frame.fill(x, y + dy, w, Style::Dialog);
    }
    frame.put_str(x, y + 1, &text, Style::Dialog, w);
}
