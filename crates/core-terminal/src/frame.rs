use core_highlight::Category;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Cell style. Kept symbolic; the painter maps styles to terminal colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Plain,
    Token(Category),
    Gutter,
    Border,
    Title,
    Header,
    Error,
    Status,
    Info,
    Dialog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Grapheme cluster for leader cells, empty for continuation cells.
    pub cluster: String,
    /// Visual width in columns; `0` marks a continuation cell.
    pub width: u8,
    pub style: Style,
}

impl Cell {
    fn leader(cluster: &str, width: u16, style: Style) -> Self {
        Self {
            cluster: cluster.to_string(),
            width: width.max(1) as u8,
            style,
        }
    }

    fn continuation(style: Style) -> Self {
        Self {
            cluster: String::new(),
            width: 0,
            style,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.width > 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            cluster: " ".to_string(),
            width: 1,
            style: Style::Plain,
        }
    }
}

/// Run of equally styled text within a row, as handed to the painter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub x: u16,
    pub text: String,
    pub style: Style,
}

pub type Row = [Cell];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    cells: Vec<Cell>,
    /// Visible caret position, if any pane owns the caret.
    pub cursor: Option<(u16, u16)>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
            cursor: None,
        }
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Write `text` at (x, y), clipped to `max_width` columns and the frame edge. Returns the
    /// number of columns used. A wide cluster that would straddle the clip edge is dropped.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, style: Style, max_width: u16) -> u16 {
        if y >= self.height {
            return 0;
        }
        let limit = max_width.min(self.width.saturating_sub(x));
        let mut used = 0u16;
        for cluster in text.graphemes(true) {
            // Tabs are expanded by the caller; a stray one shows as a single blank.
            let (cluster, w) = match cluster {
                "\t" => (" ", 1),
                other => (other, UnicodeWidthStr::width(other) as u16),
            };
            if w == 0 {
                continue;
            }
            if used + w > limit {
                break;
            }
            self.set_cluster(x + used, y, cluster, w, style);
            used += w;
        }
        used
    }

    /// Fill `count` cells starting at (x, y) with styled blanks.
    pub fn fill(&mut self, x: u16, y: u16, count: u16, style: Style) -> u16 {
        let mut done = 0;
        for dx in 0..count {
            if let Some(idx) = self.index(x + dx, y) {
                self.cells[idx] = Cell::leader(" ", 1, style);
                done += 1;
            }
        }
        done
    }

    fn set_cluster(&mut self, x: u16, y: u16, cluster: &str, width: u16, style: Style) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = Cell::leader(cluster, width, style);
        }
        for dx in 1..width {
            if let Some(idx) = self.index(x + dx, y) {
                self.cells[idx] = Cell::continuation(style);
            }
        }
    }

    pub fn row(&self, y: u16) -> &Row {
        let start = y as usize * self.width as usize;
        &self.cells[start..start + self.width as usize]
    }

    /// Merge the leader cells of a row into styled runs.
    pub fn spans(&self, y: u16) -> Vec<Span> {
        let mut out: Vec<Span> = Vec::new();
        let mut x = 0u16;
        for cell in self.row(y) {
            if !cell.is_leader() {
                continue;
            }
            match out.last_mut() {
                Some(last) if last.style == cell.style => last.text.push_str(&cell.cluster),
                _ => out.push(Span {
                    x,
                    text: cell.cluster.clone(),
                    style: cell.style,
                }),
            }
            x += cell.width as u16;
        }
        out
    }

    /// Row text without styling (tests and diagnostics).
    pub fn line_text(&self, y: u16) -> String {
        self.row(y)
            .iter()
            .filter(|c| c.is_leader())
            .map(|c| c.cluster.as_str())
            .collect()
    }
}
