use crate::{EngineError, EngineTransport, Request, Stage};
use core_events::{ENGINE_MESSAGES_STALE, ENGINE_MESSAGES_TOTAL, EngineMessage, RequestId};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// What a request id was issued for. Staleness is judged per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Stage(Stage),
    Input,
    Reset,
}

/// Issues correlated requests and filters the engine's replies.
///
/// A message is accepted only when its id is the newest request of its kind. Issuing a
/// `Reset` also retires the current execution so output of a program started before the
/// reset cannot surface afterwards.
pub struct EngineClient<T: EngineTransport> {
    transport: T,
    next_id: u64,
    latest: HashMap<RequestKind, RequestId>,
}

impl<T: EngineTransport> EngineClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: 1,
            latest: HashMap::new(),
        }
    }

    pub fn issue(&mut self, request: Request) -> Result<RequestId, EngineError> {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        let kind = request.kind();
        debug!(
            target: "engine",
            id = id.0,
            kind = ?kind,
            payload_len = request.payload_len(),
            "request_issued"
        );
        self.transport.send(id, &request)?;
        self.latest.insert(kind, id);
        if kind == RequestKind::Reset {
            self.latest.remove(&RequestKind::Stage(Stage::Execute));
            self.latest.remove(&RequestKind::Input);
        }
        Ok(id)
    }

    pub fn issue_stage(&mut self, stage: Stage, source: &str) -> Result<RequestId, EngineError> {
        self.issue(Request::for_stage(stage, source))
    }

    /// Kind of a still-current request id, if any.
    pub fn kind_of(&self, id: RequestId) -> Option<RequestKind> {
        self.latest
            .iter()
            .find_map(|(kind, latest)| (*latest == id).then_some(*kind))
    }

    pub fn latest(&self, kind: RequestKind) -> Option<RequestId> {
        self.latest.get(&kind).copied()
    }

    /// Filter an incoming message. Returns `None` for stale or unknown ids.
    pub fn accept(&mut self, message: EngineMessage) -> Option<EngineMessage> {
        ENGINE_MESSAGES_TOTAL.fetch_add(1, Ordering::Relaxed);
        let Some(kind) = self.kind_of(message.request) else {
            ENGINE_MESSAGES_STALE.fetch_add(1, Ordering::Relaxed);
            trace!(
                target: "engine",
                id = message.request.0,
                body = message.body.kind(),
                "stale_message_dropped"
            );
            return None;
        };
        trace!(target: "engine", id = message.request.0, kind = ?kind, body = message.body.kind(), "message_accepted");
        Some(message)
    }

    /// Forget every outstanding request (transport lost).
    pub fn on_disconnected(&mut self) {
        self.latest.clear();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
