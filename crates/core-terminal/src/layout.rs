/// Screen rectangle in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Split off the first row (pane header) and return (header, body).
    pub fn split_header(self) -> (Rect, Rect) {
        if self.height == 0 {
            return (self, self);
        }
        (
            Rect::new(self.x, self.y, self.width, 1),
            Rect::new(self.x, self.y + 1, self.width, self.height - 1),
        )
    }
}

/// Pane placement for one terminal size.
///
/// ```text
/// title                                   (1 row)
/// editor            | lexemes / tokens
/// ------------------| ----------------
/// output console    | diagnostics
/// status                                  (1 row)
/// ```
/// Below [`Layout::MIN_SIDE_WIDTH`] total columns the side column is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub title: Rect,
    pub editor: Rect,
    pub console: Rect,
    pub lexemes: Rect,
    pub diagnostics: Rect,
    pub status: Rect,
}

impl Layout {
    pub const MIN_SIDE_WIDTH: u16 = 60;
    const MIN_CONSOLE_ROWS: u16 = 4;

    pub fn compute(width: u16, height: u16) -> Self {
        let title = Rect::new(0, 0, width, height.min(1));
        let status = Rect::new(0, height.saturating_sub(1), width, u16::from(height >= 2));
        let body_y = title.height;
        let body_h = height.saturating_sub(title.height + status.height);

        let side_w = if width >= Self::MIN_SIDE_WIDTH { width * 2 / 5 } else { 0 };
        let main_w = width - side_w;
        let console_h = (body_h / 3).max(Self::MIN_CONSOLE_ROWS).min(body_h);
        let editor_h = body_h - console_h;

        let editor = Rect::new(0, body_y, main_w, editor_h);
        let console = Rect::new(0, body_y + editor_h, main_w, console_h);

        let lexemes_h = body_h / 2 + body_h % 2;
        let side_x = main_w;
        let lexemes = Rect::new(side_x, body_y, side_w, if side_w == 0 { 0 } else { lexemes_h });
        let diagnostics = Rect::new(
            side_x,
            body_y + lexemes_h,
            side_w,
            if side_w == 0 { 0 } else { body_h - lexemes_h },
        );

        Self {
            title,
            editor,
            console,
            lexemes,
            diagnostics,
            status,
        }
    }
}
