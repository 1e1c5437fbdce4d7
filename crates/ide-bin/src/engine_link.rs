use core_engine::{EngineError, EngineTransport, MemoryTransport, Request, StdioTransport};
use core_events::RequestId;

/// The engine connection actually in use. `Offline` stands in when the engine command could not
/// be started; a closed offline link fails every request so runs never hang waiting.
pub enum EngineLink {
    Stdio(StdioTransport),
    Offline(MemoryTransport),
}

impl EngineLink {
    pub fn offline() -> Self {
        let mut transport = MemoryTransport::new();
        transport.close();
        EngineLink::Offline(transport)
    }

    pub fn shutdown(&mut self) {
        if let EngineLink::Stdio(transport) = std::mem::replace(self, EngineLink::offline()) {
            transport.shutdown();
        }
    }
}

impl EngineTransport for EngineLink {
    fn send(&mut self, id: RequestId, request: &Request) -> Result<(), EngineError> {
        match self {
            EngineLink::Stdio(t) => t.send(id, request),
            EngineLink::Offline(t) => t.send(id, request),
        }
    }
}
