//! # Mode Handlers
//!
//! The payload-level behavior applied to every decoded packet. A connection
//! gets its own boxed handler instance for the configured mode, so handlers
//! may carry per-connection state (the file sink does) without any sharing.
//!
//! Handlers are synchronous: the only cross-connection effect, chat
//! broadcast, goes through the registry's non-blocking queues, so nothing
//! here ever waits on the network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::server::registry::{ClientRegistry, ConnectionId};

/// Payload that ends a file-mode transfer.
pub const FILE_END_MARKER: &[u8] = b"EOF";

/// Server operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Echo,
    Chat,
    File,
    Ping,
}

impl Mode {
    /// Build a fresh handler instance for one connection.
    pub(crate) fn handler(self, file_sink_limit: usize) -> Box<dyn ModeHandler> {
        match self {
            Self::Echo => Box::new(EchoHandler),
            Self::Chat => Box::new(ChatHandler),
            Self::File => Box::new(FileHandler::new(file_sink_limit)),
            Self::Ping => Box::new(PingHandler),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Chat => "chat",
            Self::File => "file",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "echo" => Ok(Self::Echo),
            "chat" => Ok(Self::Chat),
            "file" => Ok(Self::File),
            "ping" => Ok(Self::Ping),
            other => Err(ProtocolError::ConfigError(format!(
                "unknown mode '{other}' (expected echo, chat, file or ping)"
            ))),
        }
    }
}

/// Per-connection request handler.
pub trait ModeHandler: Send {
    /// Handle one decoded payload and produce the reply payload.
    fn handle(
        &mut self,
        payload: &[u8],
        id: ConnectionId,
        registry: &ClientRegistry,
    ) -> Result<Vec<u8>>;

    /// Called once on every exit path so handlers can release per-connection
    /// resources.
    fn on_disconnect(&mut self) {}
}

/// Replies with the request payload, unchanged.
struct EchoHandler;

impl ModeHandler for EchoHandler {
    fn handle(&mut self, payload: &[u8], _id: ConnectionId, _registry: &ClientRegistry) -> Result<Vec<u8>> {
        debug!(bytes = payload.len(), "echo");
        Ok(payload.to_vec())
    }
}

/// Queues the payload for every other registered connection; the sender gets
/// a small delivery acknowledgement instead of its own message back.
struct ChatHandler;

impl ModeHandler for ChatHandler {
    fn handle(&mut self, payload: &[u8], id: ConnectionId, registry: &ClientRegistry) -> Result<Vec<u8>> {
        let peers = registry.broadcast(id, payload);
        debug!(from = id, peers, "chat broadcast");
        Ok(format!("delivered to {peers} peer(s)").into_bytes())
    }
}

/// Accumulates payload bytes into a per-connection sink until the end marker
/// arrives or the connection closes. Every chunk is acknowledged with the
/// cumulative byte count.
struct FileHandler {
    received: Vec<u8>,
    limit: usize,
    complete: bool,
}

impl FileHandler {
    fn new(limit: usize) -> Self {
        Self {
            received: Vec::new(),
            limit,
            complete: false,
        }
    }
}

impl ModeHandler for FileHandler {
    fn handle(&mut self, payload: &[u8], id: ConnectionId, _registry: &ClientRegistry) -> Result<Vec<u8>> {
        if payload == FILE_END_MARKER {
            self.complete = true;
            let total = self.received.len();
            debug!(conn = id, bytes = total, "file transfer complete");
            return Ok(format!("complete: {total} bytes").into_bytes());
        }
        if self.complete {
            // A new transfer on the same connection starts a fresh sink.
            self.received.clear();
            self.complete = false;
        }
        if self.received.len() + payload.len() > self.limit {
            return Err(ProtocolError::Handler(format!(
                "file sink overflow: {} bytes exceeds limit of {}",
                self.received.len() + payload.len(),
                self.limit
            )));
        }
        self.received.extend_from_slice(payload);
        Ok(format!("received {} bytes", self.received.len()).into_bytes())
    }

    fn on_disconnect(&mut self) {
        if !self.complete && !self.received.is_empty() {
            debug!(bytes = self.received.len(), "discarding incomplete file transfer");
        }
        self.received = Vec::new();
    }
}

/// Replies with the server's receipt time as eight big-endian bytes of
/// microseconds since the Unix epoch, regardless of request size.
struct PingHandler;

impl ModeHandler for PingHandler {
    fn handle(&mut self, payload: &[u8], _id: ConnectionId, _registry: &ClientRegistry) -> Result<Vec<u8>> {
        debug!(bytes = payload.len(), "ping");
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ProtocolError::Handler(format!("system clock error: {e}")))?
            .as_micros() as u64;
        Ok(micros.to_be_bytes().to_vec())
    }
}
