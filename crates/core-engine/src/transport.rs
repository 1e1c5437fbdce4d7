use crate::{EngineError, Request, wire};
use core_events::{CHANNEL_SEND_FAILURES, EngineEvent, Event, RequestId};
use std::process::Stdio;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outbound half of the engine connection. `send` must not block: implementations queue the
/// request and return.
pub trait EngineTransport {
    fn send(&mut self, id: RequestId, request: &Request) -> Result<(), EngineError>;
}

/// Engine running as a child process speaking newline-delimited JSON over stdio.
///
/// A writer task drains queued request lines into the child's stdin. A reader task decodes
/// stdout lines into `Event::Engine` and reports `Disconnected` once the child exits.
pub struct StdioTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl StdioTransport {
    pub fn spawn(command: &str, args: &[String], events: mpsc::Sender<Event>) -> Result<Self, EngineError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let pid = child.id();
        info!(target: "engine.transport", command, pid, "engine_spawned");

        let mut stdin = child.stdin.take().ok_or(EngineError::Closed)?;
        let stdout = child.stdout.take().ok_or(EngineError::Closed)?;
        let stderr = child.stderr.take();

        let (outbound, mut queue) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(mut line) = queue.recv().await {
                line.push('\n');
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    warn!(target: "engine.transport", error = %e, "engine_write_failed");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    warn!(target: "engine.transport", error = %e, "engine_flush_failed");
                    break;
                }
            }
            debug!(target: "engine.transport", "engine_writer_exit");
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "engine.transport", stderr = %line, "engine_stderr");
                }
            });
        }

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut reason = String::from("engine output closed");
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match wire::decode_message(&line) {
                            Ok(message) => {
                                if events
                                    .send(Event::Engine(EngineEvent::Message(message)))
                                    .await
                                    .is_err()
                                {
                                    CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!(target: "engine.transport", error = %e, line_len = line.len(), "engine_message_malformed");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        reason = format!("engine read error: {e}");
                        break;
                    }
                }
            }
            if let Ok(status) = child.wait().await {
                reason = format!("{reason} ({status})");
            }
            info!(target: "engine.transport", reason = %reason, "engine_disconnected");
            if events
                .send(Event::Engine(EngineEvent::Disconnected { reason }))
                .await
                .is_err()
            {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            }
        });

        Ok(Self {
            outbound: Some(outbound),
            writer,
            reader,
        })
    }

    /// Close stdin and stop the reader. Dropping the reader's child handle kills the process.
    pub fn shutdown(mut self) {
        self.outbound.take();
        self.writer.abort();
        self.reader.abort();
        info!(target: "engine.transport", "engine_shutdown");
    }
}

impl EngineTransport for StdioTransport {
    fn send(&mut self, id: RequestId, request: &Request) -> Result<(), EngineError> {
        let line = wire::encode_request(id, request)?;
        let outbound = self.outbound.as_ref().ok_or(EngineError::Closed)?;
        outbound.send(line).map_err(|_| EngineError::Closed)
    }
}

/// In-process transport that records requests. Used by tests and by headless runs without an
/// engine binary.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Vec<(RequestId, Request)>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[(RequestId, Request)] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<(RequestId, Request)> {
        std::mem::take(&mut self.sent)
    }

    /// Make every later `send` fail with [`EngineError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl EngineTransport for MemoryTransport {
    fn send(&mut self, id: RequestId, request: &Request) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        self.sent.push((id, request.clone()));
        Ok(())
    }
}

impl<T: EngineTransport + ?Sized> EngineTransport for Box<T> {
    fn send(&mut self, id: RequestId, request: &Request) -> Result<(), EngineError> {
        (**self).send(id, request)
    }
}
