//! Core event types and channel helpers for the Ludus IDE runtime.
//!
//! Every producer (terminal input, engine transport, timers, dialog responders)
//! funnels into one bounded channel of [`Event`] consumed by the single-threaded
//! central loop. Handlers run to completion before the next event is taken, which
//! is the only ordering guarantee the rest of the workspace relies on.

use std::fmt;
use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers await `send` and therefore observe
// backpressure instead of dropping events; a closed channel is the universal stop signal for every
// background task.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 4096;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspected by tests and logged at shutdown.
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static ENGINE_MESSAGES_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static ENGINE_MESSAGES_STALE: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STARTS: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_STREAM: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Engine(EngineEvent),
    Pipeline(PipelineEvent),
    Command(CommandEvent),
    /// Periodic monotonic tick used to expire acknowledgements without busy polling.
    Tick,
    Shutdown,
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Each source owns its background task; on channel send failure (consumer dropped) it must
// terminate promptly.
// -------------------------------------------------------------------------------------------------

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors stop when `tx.send(..).await`
    /// returns Err (channel closed) or on their own internal stop condition.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; the registry is drained so a second call spawns nothing.
    ///
    /// During shutdown the caller should drop its final `Sender` clone before awaiting the
    /// returned handles so the sources observe the closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Built-in monotonic tick source. Emits `Event::Tick` every configured interval.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Deliver `event` after `delay` unless the channel closes first.
///
/// Used for the explicit-run settle delay: the loop never sleeps itself, it schedules a
/// follow-up event instead.
pub fn send_after(tx: Sender<Event>, delay: std::time::Duration, event: Event) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                if tx.send(event).await.is_err() {
                    CHANNEL_SEND_FAILURES.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
            }
            _ = tx.closed() => {}
        }
    })
}

// -------------------------------------------------------------------------------------------------
// Engine-originated events
// -------------------------------------------------------------------------------------------------

/// Correlation identifier attached to every engine request and echoed on every message the
/// engine produces in response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Explicitly tagged engine message body. The kind travels with the payload, so no consumer
/// inspects text content to decide what a message is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineBody {
    /// Lexical (or syntax) report: parallel lexeme and token columns.
    Lexemes {
        lexemes: Vec<String>,
        tokens: Vec<String>,
    },
    /// Lexical/syntax/semantic diagnostic text, rendered verbatim.
    Diagnostic(String),
    DiagnosticsCleared,
    /// Structured interpreter message.
    Output(String),
    /// The running program is suspended awaiting one line of input.
    Prompt(String),
    /// Raw program output (`shoot`), appended without separators.
    Terminal(String),
    ExecutionFinished,
    ResetComplete,
}

impl EngineBody {
    /// Stable discriminant label for logs (payloads are never logged).
    pub fn kind(&self) -> &'static str {
        match self {
            EngineBody::Lexemes { .. } => "lexemes",
            EngineBody::Diagnostic(_) => "diagnostic",
            EngineBody::DiagnosticsCleared => "diagnostics_cleared",
            EngineBody::Output(_) => "output",
            EngineBody::Prompt(_) => "prompt",
            EngineBody::Terminal(_) => "terminal",
            EngineBody::ExecutionFinished => "execution_finished",
            EngineBody::ResetComplete => "reset_complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineMessage {
    pub request: RequestId,
    pub body: EngineBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Message(EngineMessage),
    /// The transport stopped (process exit, broken pipe). Carries a human readable reason.
    Disconnected { reason: String },
}

// -------------------------------------------------------------------------------------------------
// Runtime-internal events
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The settle delay of explicit run `run` elapsed.
    SettleElapsed { run: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    Quit,
    /// A confirmation dialog presentation resolved.
    DialogResolved { presentation: u64, accepted: bool },
}

// -------------------------------------------------------------------------------------------------
// Input
// -------------------------------------------------------------------------------------------------

/// Normalized input events.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Synthetic interrupt (Ctrl-C) surfaced distinctly.
    CtrlC,
    /// Bracketed paste payload (never logged verbatim; log lengths only).
    Paste(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyEvent {
    pub const fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::empty())
    }

    /// Printable character carried by this key when no CTRL/ALT chord is involved.
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c)
                if !self
                    .mods
                    .intersects(KeyModifiers::CTRL | KeyModifiers::ALT) =>
            {
                Some(c)
            }
            _ => None,
        }
    }
}

/// Normalized logical key representations consumed by higher layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const CTRL = 0b0000_0001;
        const ALT  = 0b0000_0010;
        const SHIFT= 0b0000_0100;
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.code, self.mods)
    }
}
