use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub kind: AckKind,
    pub text: String,
    expires_at: Instant,
}

/// Non-blocking notices ("Saved: demo.lds", "Open failed: ..."). Expired on `Tick`.
#[derive(Debug)]
pub struct Acknowledgements {
    items: VecDeque<Acknowledgement>,
    ttl: Duration,
}

impl Acknowledgements {
    const MAX_QUEUED: usize = 8;

    pub fn new(ttl: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            ttl,
        }
    }

    pub fn push(&mut self, kind: AckKind, text: impl Into<String>, now: Instant) {
        let text = text.into();
        debug!(target: "dialog", ?kind, text_len = text.len(), "acknowledgement");
        self.items.push_back(Acknowledgement {
            kind,
            text,
            expires_at: now + self.ttl,
        });
        while self.items.len() > Self::MAX_QUEUED {
            self.items.pop_front();
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(AckKind::Info, text, Instant::now());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(AckKind::Error, text, Instant::now());
    }

    /// Drop expired notices. Returns true when anything was removed.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let before = self.items.len();
        self.items.retain(|a| a.expires_at > now);
        before != self.items.len()
    }

    /// Most recent live notice.
    pub fn current(&self) -> Option<&Acknowledgement> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
