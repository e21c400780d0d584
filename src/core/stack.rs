//! # Stack Engine
//!
//! Applies the layer codec across all eight layers in the fixed order:
//! encapsulation wraps innermost-first, decapsulation strips outermost-first.
//! Both directions are pure functions over immutable byte slices; the engine
//! holds no state and is safe to use from any number of tasks at once.

use crate::core::layer::{decode_layer, encode_layer};
use crate::core::spec::{Layer, LAYERS};
use crate::error::{ProtocolError, Result};

/// The complete eight-layer protocol stack.
///
/// Stateless; `encapsulate` is deterministic down to the byte, so the same
/// payload always produces the identical packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtocolStack;

impl ProtocolStack {
    pub fn new() -> Self {
        Self
    }

    /// Wrap `payload` in all eight headers, innermost first.
    ///
    /// Length fields are 32-bit, so the payload must stay below `u32::MAX`
    /// minus the fixed header total; larger payloads cannot be represented
    /// on the wire.
    pub fn encapsulate(&self, payload: &[u8]) -> Vec<u8> {
        debug_assert!(
            payload.len() as u64 + crate::core::spec::TOTAL_HEADER_LEN as u64 <= u64::from(u32::MAX),
            "payload too large for 32-bit length fields"
        );
        let mut wrapped = payload.to_vec();
        for layer in LAYERS.iter().rev() {
            wrapped = encode_layer(*layer, &wrapped);
        }
        wrapped
    }

    /// Strip all eight headers, outermost first, and return the payload.
    ///
    /// A failure at any layer aborts the whole decapsulation with a
    /// [`ProtocolError::MalformedHeader`] naming that layer; no partial
    /// payload is ever returned. Trailing bytes a layer's length field does
    /// not account for are treated as corruption of that layer.
    pub fn decapsulate(&self, packet: &[u8]) -> Result<Vec<u8>> {
        let mut remaining = packet.to_vec();
        for layer in LAYERS {
            let decoded = decode_layer(layer, &remaining)?;
            if decoded.consumed != remaining.len() {
                return Err(ProtocolError::malformed(layer, "trailing bytes after payload"));
            }
            remaining = decoded.payload;
        }
        Ok(remaining)
    }

    /// Overhead statistics for `payload`, derived from a single encapsulation.
    pub fn overhead_stats(&self, payload: &[u8]) -> OverheadStats {
        let total_size = self.encapsulate(payload).len();
        OverheadStats::from_sizes(payload.len(), total_size)
    }
}

/// Derived size statistics for one encapsulated payload.
///
/// The ratio and efficiency are undefined for an empty payload and reported
/// as `None` rather than defaulted to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverheadStats {
    pub payload_size: usize,
    pub total_size: usize,
    pub header_size: usize,
    /// `header_size / payload_size`; `None` when the payload is empty.
    pub overhead_ratio: Option<f64>,
    /// `payload_size / total_size * 100`; `None` when the payload is empty.
    pub efficiency_percent: Option<f64>,
}

impl OverheadStats {
    fn from_sizes(payload_size: usize, total_size: usize) -> Self {
        let header_size = total_size - payload_size;
        let (overhead_ratio, efficiency_percent) = if payload_size == 0 {
            (None, None)
        } else {
            (
                Some(header_size as f64 / payload_size as f64),
                Some(payload_size as f64 / total_size as f64 * 100.0),
            )
        };
        Self {
            payload_size,
            total_size,
            header_size,
            overhead_ratio,
            efficiency_percent,
        }
    }
}

/// Encapsulate `payload` with the default stack.
pub fn encapsulate(payload: &[u8]) -> Vec<u8> {
    ProtocolStack::new().encapsulate(payload)
}

/// Decapsulate `packet` with the default stack.
pub fn decapsulate(packet: &[u8]) -> Result<Vec<u8>> {
    ProtocolStack::new().decapsulate(packet)
}

/// Overhead statistics for `payload` with the default stack.
pub fn overhead_stats(payload: &[u8]) -> OverheadStats {
    ProtocolStack::new().overhead_stats(payload)
}

/// Expected total frame length once the outer Ethernet header is available.
///
/// `buf` must hold at least the outer header; the value is the header's own
/// size plus its declared enclosed length. Used by the frame reader to know
/// how many bytes to wait for.
pub(crate) fn declared_frame_len(buf: &[u8]) -> Result<usize> {
    debug_assert!(buf.len() >= crate::core::spec::ETH_OUTER_HEADER_LEN);
    if buf[..14] != crate::core::spec::OUTER_ETH_PREFIX {
        return Err(ProtocolError::malformed(Layer::EthernetOuter, "bad frame prefix"));
    }
    let declared = u32::from_be_bytes([buf[14], buf[15], buf[16], buf[17]]) as usize;
    Ok(crate::core::spec::ETH_OUTER_HEADER_LEN + declared)
}
