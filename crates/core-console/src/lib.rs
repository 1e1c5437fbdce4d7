//! Interactive output console.
//!
//! Bridges the event loop with an engine program that can suspend waiting for one line of
//! input. The console owns the output buffer, at most one pending input request, and the single
//! keyboard listener slot. Keys reach the buffer only while that listener is attached.
//!
//! Protocol:
//! 1. `Prompt(text)` appends the prompt, records the end offset, makes the buffer editable and
//!    re-arms the listener.
//! 2. Typed characters land after the prompt; Backspace never crosses it.
//! 3. Enter submits the trimmed text after the prompt and makes the buffer read-only. A line that
//!    trims to nothing is swallowed and the prompt stays pending.
//! 4. `Output` and `Terminal` messages tear down any pending listener before appending.
//! 5. A new run clears everything.

use core_events::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info, trace};
use unicode_segmentation::UnicodeSegmentation;

/// Append-only text area (until cleared) mirroring engine output and prompts in arrival order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    text: String,
    editable: bool,
    focused: bool,
}

impl OutputBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn len(&self) -> usize {
        self.text.len()
    }
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
    pub fn is_editable(&self) -> bool {
        self.editable
    }
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    fn append(&mut self, s: &str) {
        self.text.push_str(s);
    }

    /// Ensure a blank line separates existing content from what comes next.
    fn separate(&mut self) {
        if self.text.is_empty() || self.text.ends_with("\n\n") {
            return;
        }
        if self.text.ends_with('\n') {
            self.text.push('\n');
        } else {
            self.text.push_str("\n\n");
        }
    }

    fn clear(&mut self) {
        self.text.clear();
        self.editable = false;
        self.focused = false;
    }
}

/// The one prompt currently waiting for a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInputRequest {
    pub prompt_text: String,
    /// Byte offset in the buffer where user input starts.
    pub prompt_end: usize,
}

/// Generation tag of an attached keyboard listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Holds at most one keyboard listener.
#[derive(Debug, Default)]
pub struct ListenerSlot {
    current: Option<ListenerId>,
    generation: u64,
    attached_total: u64,
    detached_total: u64,
}

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detach whatever is attached, then attach a fresh listener.
    pub fn rearm(&mut self) -> ListenerId {
        self.detach();
        self.generation += 1;
        let id = ListenerId(self.generation);
        self.current = Some(id);
        self.attached_total += 1;
        trace!(target: "console", listener = id.0, "listener_attached");
        id
    }

    pub fn detach(&mut self) -> Option<ListenerId> {
        let id = self.current.take()?;
        self.detached_total += 1;
        trace!(target: "console", listener = id.0, "listener_detached");
        Some(id)
    }

    pub fn current(&self) -> Option<ListenerId> {
        self.current
    }

    pub fn is_attached(&self) -> bool {
        self.current.is_some()
    }

    /// Number of listeners attached right now (0 or 1).
    pub fn attached(&self) -> u64 {
        self.attached_total - self.detached_total
    }

    pub fn attached_total(&self) -> u64 {
        self.attached_total
    }

    pub fn detached_total(&self) -> u64 {
        self.detached_total
    }
}

/// Result of offering a key to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// No listener, or a key the console does not handle. The caller may route it elsewhere.
    Ignored,
    Consumed,
    /// Forward this line to the engine.
    Submitted(String),
}

#[derive(Debug, Default)]
pub struct InteractiveChannel {
    buffer: OutputBuffer,
    pending: Option<PendingInputRequest>,
    listener: ListenerSlot,
    swallowed_empty: u64,
}

impl InteractiveChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    pub fn pending(&self) -> Option<&PendingInputRequest> {
        self.pending.as_ref()
    }

    pub fn listener(&self) -> &ListenerSlot {
        &self.listener
    }

    /// Enter presses dropped because the line was blank.
    pub fn swallowed_empty(&self) -> u64 {
        self.swallowed_empty
    }

    pub fn on_input_requested(&mut self, prompt_text: &str) -> ListenerId {
        if self.pending.is_some() {
            debug!(target: "console", "input_request_superseded");
        }
        self.buffer.append(prompt_text);
        let prompt_end = self.buffer.len();
        self.pending = Some(PendingInputRequest {
            prompt_text: prompt_text.to_string(),
            prompt_end,
        });
        self.buffer.editable = true;
        self.buffer.focused = true;
        let id = self.listener.rearm();
        info!(target: "console", listener = id.0, prompt_len = prompt_text.len(), prompt_end, "input_requested");
        id
    }

    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if !self.listener.is_attached() {
            return KeyOutcome::Ignored;
        }
        let Some(prompt_end) = self.pending.as_ref().map(|p| p.prompt_end) else {
            return KeyOutcome::Ignored;
        };
        if let Some(c) = key.printable() {
            self.buffer.text.push(c);
            return KeyOutcome::Consumed;
        }
        if key.mods.intersects(KeyModifiers::CTRL | KeyModifiers::ALT) {
            return KeyOutcome::Ignored;
        }
        match key.code {
            KeyCode::Enter => self.submit(prompt_end),
            KeyCode::Backspace => {
                if self.buffer.len() > prompt_end
                    && let Some((idx, _)) = self.buffer.text[prompt_end..].grapheme_indices(true).next_back()
                {
                    self.buffer.text.truncate(prompt_end + idx);
                }
                KeyOutcome::Consumed
            }
            KeyCode::Tab => {
                self.buffer.text.push('\t');
                KeyOutcome::Consumed
            }
            _ => KeyOutcome::Ignored,
        }
    }

    /// Bracketed paste while a prompt is pending. Newlines are dropped; submission stays on Enter.
    pub fn on_paste(&mut self, text: &str) -> bool {
        if !self.listener.is_attached() || self.pending.is_none() {
            return false;
        }
        self.buffer
            .text
            .extend(text.chars().filter(|c| *c != '\n' && *c != '\r'));
        true
    }

    fn submit(&mut self, prompt_end: usize) -> KeyOutcome {
        let line = self.buffer.text[prompt_end..].trim().to_string();
        if line.is_empty() {
            self.swallowed_empty += 1;
            debug!(target: "console", swallowed = self.swallowed_empty, "empty_input_swallowed");
            return KeyOutcome::Consumed;
        }
        self.pending = None;
        self.listener.detach();
        self.buffer.editable = false;
        self.buffer.focused = false;
        info!(target: "console", line_len = line.len(), "input_submitted");
        KeyOutcome::Submitted(line)
    }

    /// Structured interpreter message. Separated from prior content by a blank line.
    pub fn on_output(&mut self, text: &str) {
        self.teardown("output");
        self.buffer.separate();
        self.buffer.append(text);
        trace!(target: "console", text_len = text.len(), "output_appended");
    }

    /// Raw program output, appended verbatim.
    pub fn on_terminal_output(&mut self, text: &str) {
        self.teardown("terminal");
        self.buffer.append(text);
        trace!(target: "console", text_len = text.len(), "terminal_appended");
    }

    /// Fresh run: tear down any pending prompt and clear the buffer.
    pub fn reset(&mut self) {
        self.teardown("reset");
        self.buffer.clear();
        debug!(target: "console", "console_reset");
    }

    /// Explicit clear command. Same effect as a reset; a prompt cannot outlive its text.
    pub fn clear(&mut self) {
        self.teardown("clear");
        self.buffer.clear();
        debug!(target: "console", "console_cleared");
    }

    fn teardown(&mut self, reason: &'static str) {
        if let Some(id) = self.listener.detach() {
            debug!(target: "console", listener = id.0, reason, "pending_listener_torn_down");
        }
        self.pending = None;
        self.buffer.editable = false;
        self.buffer.focused = false;
    }
}
