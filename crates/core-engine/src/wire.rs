//! Newline-delimited JSON framing for the engine process.
//!
//! Requests:  `{"id":3,"op":"lexical","source":"flag x : 5."}`
//! Messages:  `{"id":3,"kind":"lexemes","lexemes":["flag"],"tokens":["FLAG"]}`
//!
//! The engine echoes the id of the request a message answers. Execution output produced after
//! `submit_input` still carries the id of the `execute` request that started the program.

use crate::Request;
use core_events::{EngineBody, EngineMessage, RequestId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WireRequest<'a> {
    Lexical { source: &'a str },
    Syntax { source: &'a str },
    Semantic { source: &'a str },
    Execute { source: &'a str },
    SubmitInput { line: &'a str },
    Reset,
}

#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    id: u64,
    #[serde(flatten)]
    request: WireRequest<'a>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireBody {
    Lexemes {
        #[serde(default)]
        lexemes: Vec<String>,
        #[serde(default)]
        tokens: Vec<String>,
    },
    Diagnostic {
        text: String,
    },
    DiagnosticsCleared,
    Output {
        text: String,
    },
    Prompt {
        text: String,
    },
    Terminal {
        text: String,
    },
    ExecutionFinished,
    ResetComplete,
}

#[derive(Debug, Serialize, Deserialize)]
struct InboundFrame {
    id: u64,
    #[serde(flatten)]
    body: WireBody,
}

impl From<WireBody> for EngineBody {
    fn from(body: WireBody) -> Self {
        match body {
            WireBody::Lexemes { lexemes, tokens } => EngineBody::Lexemes { lexemes, tokens },
            WireBody::Diagnostic { text } => EngineBody::Diagnostic(text),
            WireBody::DiagnosticsCleared => EngineBody::DiagnosticsCleared,
            WireBody::Output { text } => EngineBody::Output(text),
            WireBody::Prompt { text } => EngineBody::Prompt(text),
            WireBody::Terminal { text } => EngineBody::Terminal(text),
            WireBody::ExecutionFinished => EngineBody::ExecutionFinished,
            WireBody::ResetComplete => EngineBody::ResetComplete,
        }
    }
}

impl From<&EngineBody> for WireBody {
    fn from(body: &EngineBody) -> Self {
        match body {
            EngineBody::Lexemes { lexemes, tokens } => WireBody::Lexemes {
                lexemes: lexemes.clone(),
                tokens: tokens.clone(),
            },
            EngineBody::Diagnostic(text) => WireBody::Diagnostic { text: text.clone() },
            EngineBody::DiagnosticsCleared => WireBody::DiagnosticsCleared,
            EngineBody::Output(text) => WireBody::Output { text: text.clone() },
            EngineBody::Prompt(text) => WireBody::Prompt { text: text.clone() },
            EngineBody::Terminal(text) => WireBody::Terminal { text: text.clone() },
            EngineBody::ExecutionFinished => WireBody::ExecutionFinished,
            EngineBody::ResetComplete => WireBody::ResetComplete,
        }
    }
}

/// Encode one request as a single JSON line (no trailing newline).
pub fn encode_request(id: RequestId, request: &Request) -> Result<String, serde_json::Error> {
    let request = match request {
        Request::Lexical(source) => WireRequest::Lexical { source },
        Request::Syntax(source) => WireRequest::Syntax { source },
        Request::Semantic(source) => WireRequest::Semantic { source },
        Request::Execute(source) => WireRequest::Execute { source },
        Request::SubmitInput(line) => WireRequest::SubmitInput { line },
        Request::Reset => WireRequest::Reset,
    };
    serde_json::to_string(&OutboundFrame { id: id.0, request })
}

/// Decode one engine line into a tagged message.
pub fn decode_message(line: &str) -> Result<EngineMessage, serde_json::Error> {
    let frame: InboundFrame = serde_json::from_str(line)?;
    Ok(EngineMessage {
        request: RequestId(frame.id),
        body: frame.body.into(),
    })
}

/// Encode an engine message. Used by in-process engines and tests.
pub fn encode_message(message: &EngineMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(&InboundFrame {
        id: message.request.0,
        body: WireBody::from(&message.body),
    })
}
