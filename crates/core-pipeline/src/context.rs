use core_engine::Stage;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The IDE view currently shown. Decides which stages auto-run on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NavigationContext {
    #[default]
    Overview,
    Lexer,
    Syntax,
    Semantic,
}

impl NavigationContext {
    pub const ALL: [NavigationContext; 4] = [
        NavigationContext::Overview,
        NavigationContext::Lexer,
        NavigationContext::Syntax,
        NavigationContext::Semantic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NavigationContext::Overview => "overview",
            NavigationContext::Lexer => "lexer",
            NavigationContext::Syntax => "syntax",
            NavigationContext::Semantic => "semantic",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            NavigationContext::Overview => "Overview",
            NavigationContext::Lexer => "Lexical Analyzer",
            NavigationContext::Syntax => "Syntax Analyzer",
            NavigationContext::Semantic => "Semantic Analyzer",
        }
    }

    /// Stages issued, in order, when this view is activated. Syntax results render against the
    /// lexeme table, so the syntax view refreshes lexemes right after.
    pub fn stages(self) -> &'static [Stage] {
        match self {
            NavigationContext::Overview => &[Stage::Lexical, Stage::Execute],
            NavigationContext::Lexer => &[Stage::Lexical],
            NavigationContext::Syntax => &[Stage::Syntax, Stage::Lexical],
            NavigationContext::Semantic => &[Stage::Lexical, Stage::Semantic],
        }
    }
}

impl fmt::Display for NavigationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown view `{0}` (expected overview, lexer, syntax or semantic)")]
pub struct ParseContextError(pub String);

impl FromStr for NavigationContext {
    type Err = ParseContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overview" | "home" => Ok(NavigationContext::Overview),
            "lexer" | "lexer-view" | "lexical" => Ok(NavigationContext::Lexer),
            "syntax" | "syntax-view" => Ok(NavigationContext::Syntax),
            "semantic" | "semantic-view" => Ok(NavigationContext::Semantic),
            _ => Err(ParseContextError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stage_table() {
        assert_eq!(NavigationContext::Overview.stages(), &[Stage::Lexical, Stage::Execute]);
        assert_eq!(NavigationContext::Lexer.stages(), &[Stage::Lexical]);
        assert_eq!(NavigationContext::Syntax.stages(), &[Stage::Syntax, Stage::Lexical]);
        assert_eq!(NavigationContext::Semantic.stages(), &[Stage::Lexical, Stage::Semantic]);
    }

    #[test]
    fn parses_names_and_aliases() {
        for ctx in NavigationContext::ALL {
            assert_eq!(ctx.as_str().parse::<NavigationContext>(), Ok(ctx));
        }
        assert_eq!("Lexer-View".parse::<NavigationContext>(), Ok(NavigationContext::Lexer));
        assert!("runtime".parse::<NavigationContext>().is_err());
    }
}
