//! Boundary with the analysis/execution engine.
//!
//! The IDE never blocks on the engine. Requests are handed to an [`EngineTransport`] and the
//! engine's tagged messages come back later as `Event::Engine` on the shared event channel.
//! [`EngineClient`] stamps every request with a [`RequestId`] and drops results that belong to
//! a request superseded by a newer one of the same kind.

mod client;
mod transport;
pub mod wire;

pub use client::{EngineClient, RequestKind};
pub use transport::{EngineTransport, MemoryTransport, StdioTransport};

pub use core_events::{EngineBody, EngineMessage, RequestId};

use std::fmt;
use thiserror::Error;

/// Analysis stages the pipeline can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
    Execute,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Lexical, Stage::Syntax, Stage::Semantic, Stage::Execute];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lexical => "lexical",
            Stage::Syntax => "syntax",
            Stage::Semantic => "semantic",
            Stage::Execute => "execute",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Lexical(String),
    Syntax(String),
    Semantic(String),
    Execute(String),
    SubmitInput(String),
    Reset,
}

impl Request {
    /// Build the request for `stage` carrying the full editor text.
    pub fn for_stage(stage: Stage, source: impl Into<String>) -> Self {
        let source = source.into();
        match stage {
            Stage::Lexical => Request::Lexical(source),
            Stage::Syntax => Request::Syntax(source),
            Stage::Semantic => Request::Semantic(source),
            Stage::Execute => Request::Execute(source),
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Lexical(_) => RequestKind::Stage(Stage::Lexical),
            Request::Syntax(_) => RequestKind::Stage(Stage::Syntax),
            Request::Semantic(_) => RequestKind::Stage(Stage::Semantic),
            Request::Execute(_) => RequestKind::Stage(Stage::Execute),
            Request::SubmitInput(_) => RequestKind::Input,
            Request::Reset => RequestKind::Reset,
        }
    }

    /// Payload length for logs.
    pub fn payload_len(&self) -> usize {
        match self {
            Request::Lexical(s)
            | Request::Syntax(s)
            | Request::Semantic(s)
            | Request::Execute(s)
            | Request::SubmitInput(s) => s.len(),
            Request::Reset => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode engine request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("engine transport closed")]
    Closed,
}
