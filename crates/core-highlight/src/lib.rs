//! Token classification for editor highlighting.
//!
//! A static, ordered rule table maps lexical patterns to display categories.
//! At each position the first rule whose pattern matches wins; order encodes
//! precedence (keywords before builtins before the generic identifier rule).
//! Longest-match is never attempted.
//!
//! The only state is [`Mode`]: a fenced ```` ``` ```` comment switches the
//! classifier into block-comment mode until the closing fence, possibly several
//! lines later. Callers that highlight a document line by line carry the mode
//! forward via [`Highlighter`].
//!
//! Invariants:
//! * Classification never fails. Any character no rule recognises falls through
//!   to a single-character [`Category::Punctuation`] lexeme.
//! * Whitespace outside block comments is skipped and never emitted.
//! * Emitted lexemes are non-empty, non-overlapping and in source order.

use regex::Regex;
use std::sync::LazyLock;

pub const COMMENT_FENCE: &str = "```";

/// Closed set of display categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Keyword,
    BuiltinFunction,
    Comment,
    Literal,
    Operator,
    /// `{` `}`
    BracketGroup1,
    /// `(` `)` `[` `]`
    BracketGroup2,
    /// `,` `.`
    Punctuation,
    Identifier,
}

impl Category {
    /// Theme-facing label. Identifiers display as "variable".
    pub fn label(self) -> &'static str {
        match self {
            Category::Keyword => "keyword",
            Category::BuiltinFunction => "builtin",
            Category::Comment => "comment",
            Category::Literal => "literal",
            Category::Operator => "operator",
            Category::BracketGroup1 => "bracket-1",
            Category::BracketGroup2 => "bracket-2",
            Category::Punctuation => "punctuation",
            Category::Identifier => "variable",
        }
    }
}

/// Two-state classification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    BlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Stay,
    EnterBlockComment,
}

struct Rule {
    pattern: Regex,
    category: Category,
    transition: Transition,
}

fn rule(pattern: &str, category: Category, transition: Transition) -> Rule {
    // Anchored at the current position; rules are matched against the unconsumed suffix.
    let anchored = format!("^(?:{pattern})");
    Rule {
        pattern: Regex::new(&anchored).expect("static highlight rule compiles"),
        category,
        transition,
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use Category::*;
    use Transition::*;
    vec![
        rule(
            r"\b(?:gameOver|comms|hp|xp|flag|build|access|immo|if|elif|else|flank|choice|backup|for|while|grind|checkpoint|resume|recall|generate)\b",
            Keyword,
            Stay,
        ),
        rule(
            r"\b(?:play|shoot|shootNxt|load|loadNum|rounds|wipe|join|drop|seek|levelUp|levelDown|toHp|toXp|toComms)\b",
            BuiltinFunction,
            Stay,
        ),
        rule(r"#.*", Comment, Stay),
        rule(r"```", Comment, EnterBlockComment),
        rule(r#""(?:[^\\]|\\.)*?""#, Literal, Stay),
        rule(r"\b\d+(?:\.\d+)?\b", Literal, Stay),
        rule(r"\b(?:true|false|dead)\b", Literal, Stay),
        rule(
            r"[+\-*/<>!%]=|[-+*/<>!%]|==|!=|<=|>=|:|\^|&&|\|\|",
            Operator,
            Stay,
        ),
        rule(r"\b(?:AND|OR)\b", Operator, Stay),
        rule(r"[{}]+", BracketGroup1, Stay),
        rule(r"[()\[\]]+", BracketGroup2, Stay),
        rule(r"[,.]+", Punctuation, Stay),
        rule(r"\w+", Identifier, Stay),
    ]
});

/// One classified lexeme borrowed from the source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<'a> {
    pub lexeme: &'a str,
    /// Byte offset of the lexeme within the line.
    pub start: usize,
    pub category: Category,
}

impl Classified<'_> {
    pub fn end(&self) -> usize {
        self.start + self.lexeme.len()
    }
}

/// Lazy classifier over a single line. After exhaustion, [`LineClassifier::mode`]
/// reports the mode to carry into the next line.
pub struct LineClassifier<'a> {
    line: &'a str,
    pos: usize,
    mode: Mode,
}

impl<'a> LineClassifier<'a> {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn emit(&mut self, len: usize, category: Category) -> Classified<'a> {
        let start = self.pos;
        self.pos += len;
        Classified {
            lexeme: &self.line[start..self.pos],
            start,
            category,
        }
    }
}

impl<'a> Iterator for LineClassifier<'a> {
    type Item = Classified<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.mode == Mode::BlockComment {
            let rest = &self.line[self.pos..];
            if rest.is_empty() {
                return None;
            }
            let len = match rest.find(COMMENT_FENCE) {
                Some(idx) => {
                    self.mode = Mode::Normal;
                    idx + COMMENT_FENCE.len()
                }
                None => rest.len(),
            };
            return Some(self.emit(len, Category::Comment));
        }

        let rest = &self.line[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            return None;
        }

        for r in RULES.iter() {
            if let Some(m) = r.pattern.find(trimmed)
                && !m.is_empty()
            {
                if r.transition == Transition::EnterBlockComment {
                    self.mode = Mode::BlockComment;
                }
                return Some(self.emit(m.end(), r.category));
            }
        }

        // Fallthrough: a single unrecognised character.
        let len = trimmed.chars().next().map(char::len_utf8).unwrap_or(1);
        Some(self.emit(len, Category::Punctuation))
    }
}

/// Classify one line starting in `mode`. Pure apart from the returned iterator's mode.
pub fn classify_line(line: &str, mode: Mode) -> LineClassifier<'_> {
    LineClassifier { line, pos: 0, mode }
}

/// Stateful line-by-line highlighter carrying block-comment mode across lines.
#[derive(Debug, Default, Clone)]
pub struct Highlighter {
    mode: Mode,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.mode = Mode::Normal;
    }

    /// Classify `line` and advance the carried mode.
    pub fn highlight_line<'a>(&mut self, line: &'a str) -> Vec<Classified<'a>> {
        let mut it = classify_line(line, self.mode);
        let out: Vec<_> = it.by_ref().collect();
        self.mode = it.mode();
        out
    }
}

/// Classify every line of `text`, in order.
pub fn classify_document(text: &str) -> Vec<Vec<Classified<'_>>> {
    let mut hl = Highlighter::new();
    let lines: Vec<_> = text.split('\n').map(|l| hl.highlight_line(l)).collect();
    tracing::trace!(target: "highlight", lines = lines.len(), "document_classified");
    lines
}
