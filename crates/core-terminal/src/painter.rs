use crate::frame::{Frame, Style};
use core_highlight::Category;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use tracing::trace;

/// Writes frames to a terminal, repainting only rows that differ from the previous frame.
#[derive(Debug, Default)]
pub struct Painter {
    prev: Option<Frame>,
}

impl Painter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next paint to redraw everything (resize, external clobbering).
    pub fn invalidate(&mut self) {
        self.prev = None;
    }

    /// Paint `frame` and return how many rows were written.
    pub fn paint<W: Write>(&mut self, frame: Frame, out: &mut W) -> io::Result<usize> {
        let full = self
            .prev
            .as_ref()
            .is_none_or(|p| p.width != frame.width || p.height != frame.height);
        if full {
            queue!(out, ResetColor, Clear(ClearType::All))?;
        }

        let mut written = 0;
        for y in 0..frame.height {
            let unchanged = !full && self.prev.as_ref().is_some_and(|p| p.row(y) == frame.row(y));
            if unchanged {
                continue;
            }
            queue!(out, MoveTo(0, y))?;
            for span in frame.spans(y) {
                apply_style(out, span.style)?;
                queue!(out, Print(span.text))?;
            }
            queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
            written += 1;
        }

        match frame.cursor {
            Some((x, y)) => queue!(out, MoveTo(x, y), Show)?,
            None => queue!(out, Hide)?,
        }
        out.flush()?;
        trace!(target: "runtime", rows = written, full, "frame_painted");
        self.prev = Some(frame);
        Ok(written)
    }
}

fn apply_style<W: Write>(out: &mut W, style: Style) -> io::Result<()> {
    let (fg, bg, bold) = colors(style);
    queue!(
        out,
        SetAttribute(if bold { Attribute::Bold } else { Attribute::NormalIntensity }),
        SetForegroundColor(fg),
        SetBackgroundColor(bg)
    )
}

fn colors(style: Style) -> (Color, Color, bool) {
    match style {
        Style::Plain => (Color::Reset, Color::Reset, false),
        Style::Token(category) => (token_color(category), Color::Reset, category == Category::Keyword),
        Style::Gutter => (Color::DarkGrey, Color::Reset, false),
        Style::Border => (Color::DarkGrey, Color::Reset, false),
        Style::Title => (Color::Black, Color::Cyan, true),
        Style::Header => (Color::White, Color::DarkGrey, false),
        Style::Error => (Color::Red, Color::Reset, false),
        Style::Status => (Color::Black, Color::Grey, false),
        Style::Info => (Color::Green, Color::Reset, false),
        Style::Dialog => (Color::White, Color::DarkBlue, true),
    }
}

fn token_color(category: Category) -> Color {
    match category {
        Category::Keyword => Color::Magenta,
        Category::BuiltinFunction => Color::Cyan,
        Category::Comment => Color::DarkGrey,
        Category::Literal => Color::Yellow,
        Category::Operator => Color::Red,
        Category::BracketGroup1 => Color::Blue,
        Category::BracketGroup2 => Color::Green,
        Category::Punctuation => Color::Grey,
        Category::Identifier => Color::Reset,
    }
}
