//! # Frame Reader
//!
//! Re-derives packet boundaries from a continuous byte stream. The transport
//! adds no framing of its own: each packet is self-describing through the
//! outer Ethernet header's length field, so once those first 18 bytes have
//! arrived the decoder knows exactly how many more to wait for.
//!
//! Implemented as a `tokio_util` codec so connections can run through
//! `Framed`. "Need more data" is `Ok(None)` from [`Decoder::decode`]; a
//! declared length above the configured maximum is a fatal
//! [`ProtocolError::FrameTooLarge`], and bytes that can never start a valid
//! outer header are a fatal [`ProtocolError::MalformedHeader`]. There is no
//! resynchronization heuristic; a connection that desyncs is closed.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::spec::{Layer, ETH_OUTER_HEADER_LEN, OUTER_ETH_PREFIX};
use crate::core::stack::declared_frame_len;
use crate::error::ProtocolError;

/// Default cap on a single packet's total size (1 MiB).
///
/// Generous for a protocol whose point is overhead, but it bounds the memory
/// one connection can pin while a frame accumulates.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Codec turning a byte stream into complete encapsulated packets and back.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
        // Reject early if the bytes seen so far already cannot be a valid
        // outer header, instead of waiting for a full header that will never
        // parse.
        let seen = src.len().min(OUTER_ETH_PREFIX.len());
        if src[..seen] != OUTER_ETH_PREFIX[..seen] {
            return Err(ProtocolError::malformed(
                Layer::EthernetOuter,
                "stream does not start with a packet header",
            ));
        }

        if src.len() < ETH_OUTER_HEADER_LEN {
            return Ok(None);
        }

        let total = declared_frame_len(src)?;
        if total > self.max_packet_size {
            return Err(ProtocolError::FrameTooLarge {
                declared: total,
                max: self.max_packet_size,
            });
        }

        if src.len() < total {
            // Reserve what the rest of the frame needs; one allocation
            // instead of many as chunks trickle in.
            src.reserve(total - src.len());
            return Ok(None);
        }

        trace!(bytes = total, "frame complete");
        Ok(Some(src.split_to(total).freeze()))
    }
}

impl Encoder<Bytes> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Bytes, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if packet.len() > self.max_packet_size {
            return Err(ProtocolError::FrameTooLarge {
                declared: packet.len(),
                max: self.max_packet_size,
            });
        }
        dst.extend_from_slice(&packet);
        Ok(())
    }
}

impl Encoder<Vec<u8>> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Vec<u8>, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        self.encode(Bytes::from(packet), dst)
    }
}
