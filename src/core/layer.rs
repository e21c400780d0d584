//! # Layer Codec
//!
//! Builds and parses one header at a time. Each layer has an `encode` that
//! wraps a payload in that layer's header and a `decode` that validates the
//! header, strips it, and reports how many bytes of the buffer the layer
//! accounts for. Dispatch goes through a static per-layer function table
//! rather than any trait hierarchy; the formats are too rigid to deserve one.
//!
//! Decoding is strict: every fixed field is compared against its wire
//! constant and every length field must match the bytes actually present.
//! A mismatch anywhere in a header fails with [`ProtocolError::MalformedHeader`]
//! naming the layer, which is what lets corruption tests pinpoint exactly
//! which of the eight headers was damaged.

use crate::core::spec::{self, Layer};
use crate::error::{ProtocolError, Result};

/// Result of stripping a single header from the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLayer {
    /// The bytes the header enclosed.
    pub payload: Vec<u8>,
    /// Header bytes plus enclosed bytes; the layer's total footprint.
    pub consumed: usize,
}

struct LayerCodec {
    encode: fn(&[u8]) -> Vec<u8>,
    decode: fn(&[u8]) -> Result<DecodedLayer>,
}

/// Indexed by `Layer::position() - 1`.
static CODECS: [LayerCodec; 8] = [
    LayerCodec {
        encode: encode_ethernet_outer,
        decode: decode_ethernet_outer,
    },
    LayerCodec {
        encode: encode_ip_outer,
        decode: decode_ip_outer,
    },
    LayerCodec {
        encode: encode_tcp_outer,
        decode: decode_tcp_outer,
    },
    LayerCodec {
        encode: encode_dns,
        decode: decode_dns,
    },
    LayerCodec {
        encode: encode_http,
        decode: decode_http,
    },
    LayerCodec {
        encode: encode_tcp_inner,
        decode: decode_tcp_inner,
    },
    LayerCodec {
        encode: encode_ip_inner,
        decode: decode_ip_inner,
    },
    LayerCodec {
        encode: encode_ethernet_inner,
        decode: decode_ethernet_inner,
    },
];

/// Wrap `payload` in `layer`'s header.
pub fn encode_layer(layer: Layer, payload: &[u8]) -> Vec<u8> {
    (CODECS[layer.position() - 1].encode)(payload)
}

/// Validate and strip `layer`'s header from the front of `buf`.
pub fn decode_layer(layer: Layer, buf: &[u8]) -> Result<DecodedLayer> {
    (CODECS[layer.position() - 1].decode)(buf)
}

fn check(ok: bool, layer: Layer, reason: &'static str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(ProtocolError::malformed(layer, reason))
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u32::from_be_bytes(b)
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

// ---------------------------------------------------------------------------
// Ethernet
// ---------------------------------------------------------------------------

fn encode_ethernet_outer(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(spec::ETH_OUTER_HEADER_LEN + payload.len());
    out.extend_from_slice(&spec::OUTER_ETH_PREFIX);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_ethernet_outer(buf: &[u8]) -> Result<DecodedLayer> {
    let layer = Layer::EthernetOuter;
    check(buf.len() >= spec::ETH_OUTER_HEADER_LEN, layer, "truncated header")?;
    check(buf[..14] == spec::OUTER_ETH_PREFIX, layer, "bad frame prefix")?;
    let declared = read_u32(buf, 14) as usize;
    check(
        buf.len() >= spec::ETH_OUTER_HEADER_LEN + declared,
        layer,
        "length field exceeds available bytes",
    )?;
    let end = spec::ETH_OUTER_HEADER_LEN + declared;
    Ok(DecodedLayer {
        payload: buf[spec::ETH_OUTER_HEADER_LEN..end].to_vec(),
        consumed: end,
    })
}

fn encode_ethernet_inner(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(spec::ETH_INNER_HEADER_LEN + payload.len());
    out.extend_from_slice(&spec::INNER_DST_MAC);
    out.extend_from_slice(&spec::INNER_SRC_MAC);
    out.extend_from_slice(&spec::ETHERTYPE_INNER.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_ethernet_inner(buf: &[u8]) -> Result<DecodedLayer> {
    let layer = Layer::EthernetInner;
    check(buf.len() >= spec::ETH_INNER_HEADER_LEN, layer, "truncated header")?;
    check(buf[..6] == spec::INNER_DST_MAC, layer, "bad destination MAC")?;
    check(buf[6..12] == spec::INNER_SRC_MAC, layer, "bad source MAC")?;
    check(read_u16(buf, 12) == spec::ETHERTYPE_INNER, layer, "bad ethertype")?;
    // Innermost layer: no length field, the payload is everything that's left.
    Ok(DecodedLayer {
        payload: buf[spec::ETH_INNER_HEADER_LEN..].to_vec(),
        consumed: buf.len(),
    })
}

// ---------------------------------------------------------------------------
// IP
// ---------------------------------------------------------------------------

fn encode_ip(src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let total = spec::IP_HEADER_LEN + payload.len();
    let mut out = Vec::with_capacity(total);
    out.push(spec::IP_VERSION_IHL);
    out.push(spec::IP_TOS);
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.push(spec::IP_TTL);
    out.push(spec::IP_PROTO_TCP);
    out.extend_from_slice(&src);
    out.extend_from_slice(&dst);
    out.extend_from_slice(payload);
    out
}

fn decode_ip(layer: Layer, src: [u8; 4], dst: [u8; 4], buf: &[u8]) -> Result<DecodedLayer> {
    check(buf.len() >= spec::IP_HEADER_LEN, layer, "truncated header")?;
    check(buf[0] == spec::IP_VERSION_IHL, layer, "bad version/IHL")?;
    check(buf[1] == spec::IP_TOS, layer, "bad TOS")?;
    let total = read_u32(buf, 2) as usize;
    check(buf[6] == spec::IP_TTL, layer, "bad TTL")?;
    check(buf[7] == spec::IP_PROTO_TCP, layer, "bad protocol")?;
    check(buf[8..12] == src, layer, "bad source address")?;
    check(buf[12..16] == dst, layer, "bad destination address")?;
    check(total >= spec::IP_HEADER_LEN, layer, "total length below header size")?;
    check(total <= buf.len(), layer, "length field exceeds available bytes")?;
    Ok(DecodedLayer {
        payload: buf[spec::IP_HEADER_LEN..total].to_vec(),
        consumed: total,
    })
}

fn encode_ip_outer(payload: &[u8]) -> Vec<u8> {
    encode_ip(spec::OUTER_SRC_IP, spec::OUTER_DST_IP, payload)
}

fn decode_ip_outer(buf: &[u8]) -> Result<DecodedLayer> {
    decode_ip(Layer::IpOuter, spec::OUTER_SRC_IP, spec::OUTER_DST_IP, buf)
}

fn encode_ip_inner(payload: &[u8]) -> Vec<u8> {
    encode_ip(spec::INNER_SRC_IP, spec::INNER_DST_IP, payload)
}

fn decode_ip_inner(buf: &[u8]) -> Result<DecodedLayer> {
    decode_ip(Layer::IpInner, spec::INNER_SRC_IP, spec::INNER_DST_IP, buf)
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

fn encode_tcp(sport: u16, dport: u16, seq: u32, ack: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(spec::TCP_HEADER_LEN + payload.len());
    out.extend_from_slice(&sport.to_be_bytes());
    out.extend_from_slice(&dport.to_be_bytes());
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&ack.to_be_bytes());
    out.push(spec::TCP_FLAGS);
    out.extend_from_slice(&spec::TCP_WINDOW.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_tcp(layer: Layer, sport: u16, dport: u16, seq: u32, ack: u32, buf: &[u8]) -> Result<DecodedLayer> {
    check(buf.len() >= spec::TCP_HEADER_LEN, layer, "truncated header")?;
    check(read_u16(buf, 0) == sport, layer, "bad source port")?;
    check(read_u16(buf, 2) == dport, layer, "bad destination port")?;
    check(read_u32(buf, 4) == seq, layer, "bad sequence number")?;
    check(read_u32(buf, 8) == ack, layer, "bad acknowledgement number")?;
    check(buf[12] == spec::TCP_FLAGS, layer, "bad flags")?;
    check(read_u16(buf, 13) == spec::TCP_WINDOW, layer, "bad window")?;
    let declared = read_u32(buf, 15) as usize;
    check(
        buf.len() >= spec::TCP_HEADER_LEN + declared,
        layer,
        "length field exceeds available bytes",
    )?;
    let end = spec::TCP_HEADER_LEN + declared;
    Ok(DecodedLayer {
        payload: buf[spec::TCP_HEADER_LEN..end].to_vec(),
        consumed: end,
    })
}

fn encode_tcp_outer(payload: &[u8]) -> Vec<u8> {
    encode_tcp(
        spec::OUTER_SRC_PORT,
        spec::OUTER_DST_PORT,
        spec::OUTER_TCP_SEQ,
        spec::OUTER_TCP_ACK,
        payload,
    )
}

fn decode_tcp_outer(buf: &[u8]) -> Result<DecodedLayer> {
    decode_tcp(
        Layer::TcpOuter,
        spec::OUTER_SRC_PORT,
        spec::OUTER_DST_PORT,
        spec::OUTER_TCP_SEQ,
        spec::OUTER_TCP_ACK,
        buf,
    )
}

fn encode_tcp_inner(payload: &[u8]) -> Vec<u8> {
    encode_tcp(
        spec::INNER_SRC_PORT,
        spec::INNER_DST_PORT,
        spec::INNER_TCP_SEQ,
        spec::INNER_TCP_ACK,
        payload,
    )
}

fn decode_tcp_inner(buf: &[u8]) -> Result<DecodedLayer> {
    decode_tcp(
        Layer::TcpInner,
        spec::INNER_SRC_PORT,
        spec::INNER_DST_PORT,
        spec::INNER_TCP_SEQ,
        spec::INNER_TCP_ACK,
        buf,
    )
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

fn encode_dns(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(spec::DNS_HEADER_LEN + payload.len());
    out.extend_from_slice(&spec::DNS_ID.to_be_bytes());
    out.extend_from_slice(&spec::DNS_FLAGS.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    out.extend_from_slice(&1u16.to_be_bytes()); // ANCOUNT
    out.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    out.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT
    out.extend_from_slice(spec::DNS_QNAME);
    out.extend_from_slice(&spec::DNS_TYPE_TXT.to_be_bytes());
    out.extend_from_slice(&spec::DNS_CLASS_IN.to_be_bytes());
    out.extend_from_slice(&spec::DNS_NAME_PTR.to_be_bytes());
    out.extend_from_slice(&spec::DNS_TYPE_TXT.to_be_bytes());
    out.extend_from_slice(&spec::DNS_CLASS_IN.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // TTL
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_dns(buf: &[u8]) -> Result<DecodedLayer> {
    let layer = Layer::Dns;
    check(buf.len() >= spec::DNS_HEADER_LEN, layer, "truncated header")?;
    check(read_u16(buf, 0) == spec::DNS_ID, layer, "bad transaction id")?;
    check(read_u16(buf, 2) == spec::DNS_FLAGS, layer, "bad flags")?;
    check(read_u16(buf, 4) == 1, layer, "bad question count")?;
    check(read_u16(buf, 6) == 1, layer, "bad answer count")?;
    check(read_u16(buf, 8) == 0, layer, "bad authority count")?;
    check(read_u16(buf, 10) == 0, layer, "bad additional count")?;
    check(&buf[12..37] == spec::DNS_QNAME, layer, "bad question name")?;
    check(read_u16(buf, 37) == spec::DNS_TYPE_TXT, layer, "bad question type")?;
    check(read_u16(buf, 39) == spec::DNS_CLASS_IN, layer, "bad question class")?;
    check(read_u16(buf, 41) == spec::DNS_NAME_PTR, layer, "bad answer name pointer")?;
    check(read_u16(buf, 43) == spec::DNS_TYPE_TXT, layer, "bad answer type")?;
    check(read_u16(buf, 45) == spec::DNS_CLASS_IN, layer, "bad answer class")?;
    check(read_u32(buf, 47) == 0, layer, "bad TTL")?;
    let rdlength = read_u32(buf, 51) as usize;
    check(
        buf.len() >= spec::DNS_HEADER_LEN + rdlength,
        layer,
        "rdlength exceeds available bytes",
    )?;
    let end = spec::DNS_HEADER_LEN + rdlength;
    Ok(DecodedLayer {
        payload: buf[spec::DNS_HEADER_LEN..end].to_vec(),
        consumed: end,
    })
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn http_header(content_length: usize) -> String {
    format!(
        "{}{}{}Content-Length: {:010}\r\n{}\r\n",
        spec::HTTP_REQUEST_LINE,
        spec::HTTP_HOST_LINE,
        spec::HTTP_CONTENT_TYPE_LINE,
        content_length,
        spec::HTTP_CONNECTION_LINE,
    )
}

fn encode_http(payload: &[u8]) -> Vec<u8> {
    let header = http_header(payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_http(buf: &[u8]) -> Result<DecodedLayer> {
    let layer = Layer::Http;
    check(buf.len() >= spec::HTTP_HEADER_LEN, layer, "truncated header")?;
    let header = &buf[..spec::HTTP_HEADER_LEN];

    // Content-Length sits at a fixed offset because every other header line
    // is constant text and the value is zero-padded to ten digits.
    let cl_start = spec::HTTP_REQUEST_LINE.len()
        + spec::HTTP_HOST_LINE.len()
        + spec::HTTP_CONTENT_TYPE_LINE.len()
        + "Content-Length: ".len();
    let digits = &header[cl_start..cl_start + 10];
    check(digits.iter().all(u8::is_ascii_digit), layer, "bad Content-Length")?;
    // Ten digits reach 9,999,999,999, past usize on 32-bit targets, so the
    // value is accumulated in u64 and range-checked before use.
    let mut value: u64 = 0;
    for d in digits {
        value = value * 10 + u64::from(d - b'0');
    }
    let declared = usize::try_from(value)
        .map_err(|_| ProtocolError::malformed(layer, "Content-Length out of range"))?;

    // Everything else must match the canonical header byte for byte.
    let expected = http_header(declared);
    check(header == expected.as_bytes(), layer, "bad header field")?;
    check(
        buf.len() >= spec::HTTP_HEADER_LEN + declared,
        layer,
        "Content-Length exceeds available bytes",
    )?;
    let end = spec::HTTP_HEADER_LEN + declared;
    Ok(DecodedLayer {
        payload: buf[spec::HTTP_HEADER_LEN..end].to_vec(),
        consumed: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::{header_spec, LAYERS};

    #[test]
    fn every_layer_round_trips() {
        for layer in LAYERS {
            for payload in [&b""[..], b"x", b"some longer test payload 1234567890"] {
                let encoded = encode_layer(layer, payload);
                let decoded = decode_layer(layer, &encoded)
                    .unwrap_or_else(|e| panic!("layer {layer}: {e}"));
                assert_eq!(decoded.payload, payload, "layer {layer}");
                assert_eq!(decoded.consumed, encoded.len(), "layer {layer}");
            }
        }
    }

    #[test]
    fn header_sizes_match_spec_table() {
        for layer in LAYERS {
            let encoded = encode_layer(layer, b"");
            assert_eq!(encoded.len(), header_spec(layer).min_len, "layer {layer}");
        }
    }

    #[test]
    fn truncated_buffers_name_the_layer() {
        for layer in LAYERS {
            let encoded = encode_layer(layer, b"payload");
            let short = &encoded[..header_spec(layer).min_len - 1];
            let err = decode_layer(layer, short).unwrap_err();
            assert_eq!(err.layer(), Some(layer));
        }
    }

    #[test]
    fn length_field_beyond_available_bytes_is_rejected() {
        // Encode with payload, then chop the payload off; the length field
        // now promises more bytes than the buffer holds.
        for layer in LAYERS {
            if layer == Layer::EthernetInner {
                continue; // no length field on the innermost layer
            }
            let encoded = encode_layer(layer, b"0123456789");
            let chopped = &encoded[..encoded.len() - 5];
            let err = decode_layer(layer, chopped).unwrap_err();
            assert_eq!(err.layer(), Some(layer), "layer {layer}");
        }
    }

    #[test]
    fn http_content_length_is_fixed_width() {
        let small = encode_layer(Layer::Http, b"a");
        let large = encode_layer(Layer::Http, &vec![0u8; 100_000]);
        assert_eq!(small.len() - 1, large.len() - 100_000);
    }

    #[test]
    fn maximal_content_length_is_rejected_not_overflowed() {
        // All-nines is the largest value ten digits can spell; it must come
        // back as a clean decode error on every target width.
        let mut encoded = encode_layer(Layer::Http, b"x");
        let cl_start = spec::HTTP_REQUEST_LINE.len()
            + spec::HTTP_HOST_LINE.len()
            + spec::HTTP_CONTENT_TYPE_LINE.len()
            + "Content-Length: ".len();
        encoded[cl_start..cl_start + 10].copy_from_slice(b"9999999999");
        let err = decode_layer(Layer::Http, &encoded).unwrap_err();
        assert_eq!(err.layer(), Some(Layer::Http));
    }

    #[test]
    fn dns_header_offsets_line_up() {
        let encoded = encode_layer(Layer::Dns, b"rdata");
        assert_eq!(&encoded[12..37], spec::DNS_QNAME);
        assert_eq!(encoded.len(), spec::DNS_HEADER_LEN + 5);
    }

    #[test]
    fn flipped_marker_bytes_are_detected() {
        for layer in LAYERS {
            let encoded = encode_layer(layer, b"marker corruption probe");
            // Flip the first header byte; always part of a fixed field.
            let mut corrupted = encoded.clone();
            corrupted[0] ^= 0xFF;
            let err = decode_layer(layer, &corrupted).unwrap_err();
            assert_eq!(err.layer(), Some(layer), "layer {layer}");
        }
    }
}
