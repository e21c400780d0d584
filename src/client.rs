//! Minimal framed TCP client.
//!
//! Wraps a socket in the packet codec and the stack engine so callers deal
//! only in payloads. Used by the integration tests and by anything that wants
//! to talk to the server programmatically.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::core::codec::PacketCodec;
use crate::core::stack::ProtocolStack;
use crate::error::{ProtocolError, Result};

pub struct Client {
    framed: Framed<TcpStream, PacketCodec>,
    stack: ProtocolStack,
}

impl Client {
    /// Connect with the default packet size limit.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with(addr, PacketCodec::default()).await
    }

    /// Connect with an explicit codec (custom packet size limit).
    pub async fn connect_with<A: ToSocketAddrs>(addr: A, codec: PacketCodec) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, codec),
            stack: ProtocolStack::new(),
        })
    }

    /// Encapsulate `payload` and write it as one packet.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let packet = self.stack.encapsulate(payload);
        debug!(payload = payload.len(), packet = packet.len(), "sending packet");
        self.framed.send(packet).await
    }

    /// Read the next packet and decapsulate it.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        match self.framed.next().await {
            Some(Ok(frame)) => self.stack.decapsulate(&frame),
            Some(Err(e)) => Err(e),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// One request/response exchange.
    pub async fn request(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.send(payload).await?;
        self.recv().await
    }
}
