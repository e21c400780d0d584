//! # Header Specification Table
//!
//! Static description of all eight header formats: the layer ordering, every
//! field with its byte width or variable-length rule, and the wire constants
//! each layer stamps into its fixed fields.
//!
//! The table is the single source of truth shared by the encoder, the decoder
//! and the frame reader. Nothing here is negotiated or derived at runtime;
//! every identifier-looking field (MAC addresses, IPs, ports, sequence
//! numbers, the DNS transaction id) is a compile-time constant so that
//! encapsulating the same payload twice yields byte-identical packets.

use std::fmt;

/// One of the eight fixed encapsulation stages, in outermost-first order.
///
/// The ordering is the contract between `encapsulate` and `decapsulate`:
/// encapsulation wraps innermost-first (`EthernetInner` around the raw
/// payload, then `IpInner`, ...), decapsulation strips outermost-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    EthernetOuter,
    IpOuter,
    TcpOuter,
    Dns,
    Http,
    TcpInner,
    IpInner,
    EthernetInner,
}

/// All eight layers, outermost first. Decapsulation order.
pub const LAYERS: [Layer; 8] = [
    Layer::EthernetOuter,
    Layer::IpOuter,
    Layer::TcpOuter,
    Layer::Dns,
    Layer::Http,
    Layer::TcpInner,
    Layer::IpInner,
    Layer::EthernetInner,
];

impl Layer {
    /// Position in the decapsulation order, 1-based (outermost = 1).
    pub fn position(self) -> usize {
        match self {
            Self::EthernetOuter => 1,
            Self::IpOuter => 2,
            Self::TcpOuter => 3,
            Self::Dns => 4,
            Self::Http => 5,
            Self::TcpInner => 6,
            Self::IpInner => 7,
            Self::EthernetInner => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::EthernetOuter => "outer Ethernet",
            Self::IpOuter => "outer IP",
            Self::TcpOuter => "outer TCP",
            Self::Dns => "DNS",
            Self::Http => "HTTP",
            Self::TcpInner => "inner TCP",
            Self::IpInner => "inner IP",
            Self::EthernetInner => "inner Ethernet",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte-width rule for one header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    /// Fixed-width field holding a wire constant.
    Fixed(usize),
    /// Fixed-width big-endian integer declaring the byte count of everything
    /// the layer encloses.
    Length(usize),
    /// Textual field with a format-specific rule (HTTP header lines).
    Text,
}

/// One field of a header, as listed in the static format tables.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: FieldWidth,
}

/// Static format description for one layer.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSpec {
    pub layer: Layer,
    pub fields: &'static [FieldSpec],
    /// Minimum number of header bytes before any enclosed payload.
    pub min_len: usize,
}

const fn fixed(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width: FieldWidth::Fixed(width),
    }
}

const fn length(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width: FieldWidth::Length(width),
    }
}

static ETHERNET_OUTER_FIELDS: [FieldSpec; 4] = [
    fixed("dst_mac", 6),
    fixed("src_mac", 6),
    fixed("ethertype", 2),
    length("length", 4),
];

static ETHERNET_INNER_FIELDS: [FieldSpec; 3] = [
    fixed("dst_mac", 6),
    fixed("src_mac", 6),
    fixed("ethertype", 2),
];

static IP_FIELDS: [FieldSpec; 7] = [
    fixed("version_ihl", 1),
    fixed("tos", 1),
    length("total_length", 4),
    fixed("ttl", 1),
    fixed("protocol", 1),
    fixed("src_addr", 4),
    fixed("dst_addr", 4),
];

static TCP_FIELDS: [FieldSpec; 7] = [
    fixed("src_port", 2),
    fixed("dst_port", 2),
    fixed("seq", 4),
    fixed("ack", 4),
    fixed("flags", 1),
    fixed("window", 2),
    length("length", 4),
];

static DNS_FIELDS: [FieldSpec; 9] = [
    fixed("id", 2),
    fixed("flags", 2),
    fixed("counts", 8),
    fixed("qname", 25),
    fixed("qtype", 2),
    fixed("qclass", 2),
    fixed("answer_name", 2),
    fixed("answer_meta", 8),
    length("rdlength", 4),
];

static HTTP_FIELDS: [FieldSpec; 6] = [
    FieldSpec {
        name: "request_line",
        width: FieldWidth::Text,
    },
    FieldSpec {
        name: "host",
        width: FieldWidth::Text,
    },
    FieldSpec {
        name: "content_type",
        width: FieldWidth::Text,
    },
    length("content_length", 10),
    FieldSpec {
        name: "connection",
        width: FieldWidth::Text,
    },
    FieldSpec {
        name: "blank_line",
        width: FieldWidth::Text,
    },
];

/// Look up the static format description for a layer.
pub fn header_spec(layer: Layer) -> HeaderSpec {
    let (fields, min_len): (&'static [FieldSpec], usize) = match layer {
        Layer::EthernetOuter => (&ETHERNET_OUTER_FIELDS, ETH_OUTER_HEADER_LEN),
        Layer::EthernetInner => (&ETHERNET_INNER_FIELDS, ETH_INNER_HEADER_LEN),
        Layer::IpOuter | Layer::IpInner => (&IP_FIELDS, IP_HEADER_LEN),
        Layer::TcpOuter | Layer::TcpInner => (&TCP_FIELDS, TCP_HEADER_LEN),
        Layer::Dns => (&DNS_FIELDS, DNS_HEADER_LEN),
        Layer::Http => (&HTTP_FIELDS, HTTP_HEADER_LEN),
    };
    HeaderSpec {
        layer,
        fields,
        min_len,
    }
}

// ---------------------------------------------------------------------------
// Header sizes
// ---------------------------------------------------------------------------

pub const ETH_OUTER_HEADER_LEN: usize = 18;
pub const ETH_INNER_HEADER_LEN: usize = 14;
pub const IP_HEADER_LEN: usize = 16;
pub const TCP_HEADER_LEN: usize = 19;
/// 12-byte message header + 29-byte question + 14-byte answer preamble.
pub const DNS_HEADER_LEN: usize = 55;
/// Every HTTP header line is fixed text; Content-Length is zero-padded to ten
/// digits so the header size never varies with the payload.
pub const HTTP_HEADER_LEN: usize = 146;

/// Total header bytes added by a full eight-layer encapsulation.
pub const TOTAL_HEADER_LEN: usize = ETH_OUTER_HEADER_LEN
    + IP_HEADER_LEN
    + TCP_HEADER_LEN
    + DNS_HEADER_LEN
    + HTTP_HEADER_LEN
    + TCP_HEADER_LEN
    + IP_HEADER_LEN
    + ETH_INNER_HEADER_LEN;

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

pub const OUTER_DST_MAC: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
pub const OUTER_SRC_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
pub const INNER_DST_MAC: [u8; 6] = [0xFE, 0xED, 0xFA, 0xCE, 0xDE, 0xAD];
pub const INNER_SRC_MAC: [u8; 6] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE];

/// Private ethertypes marking the tunnel's outer and inner frames.
pub const ETHERTYPE_OUTER: u16 = 0xEEAA;
pub const ETHERTYPE_INNER: u16 = 0xEEBB;

/// First 14 bytes of every valid packet: outer dst MAC, src MAC, ethertype.
/// The frame reader matches arriving bytes against this prefix to reject
/// streams that can never become a valid packet.
pub const OUTER_ETH_PREFIX: [u8; 14] = [
    0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
    0xEE, 0xAA, // ethertype
];

pub const IP_VERSION_IHL: u8 = 0x45;
pub const IP_TOS: u8 = 0;
pub const IP_TTL: u8 = 64;
pub const IP_PROTO_TCP: u8 = 6;

pub const OUTER_SRC_IP: [u8; 4] = [192, 168, 1, 100];
pub const OUTER_DST_IP: [u8; 4] = [192, 168, 1, 200];
pub const INNER_SRC_IP: [u8; 4] = [10, 255, 255, 1];
pub const INNER_DST_IP: [u8; 4] = [10, 255, 255, 2];

pub const OUTER_SRC_PORT: u16 = 54321;
pub const OUTER_DST_PORT: u16 = 9999;
pub const OUTER_TCP_SEQ: u32 = 2000;
pub const OUTER_TCP_ACK: u32 = 2000;
pub const INNER_SRC_PORT: u16 = 31337;
pub const INNER_DST_PORT: u16 = 31338;
pub const INNER_TCP_SEQ: u32 = 1000;
pub const INNER_TCP_ACK: u32 = 1000;

/// PSH | ACK
pub const TCP_FLAGS: u8 = 0x18;
pub const TCP_WINDOW: u16 = 8192;

pub const DNS_ID: u16 = 0x1337;
/// QR + AA + RD + RA, NOERROR.
pub const DNS_FLAGS: u16 = 0x8580;
/// `data.tunnel.example.com` in DNS label encoding (25 bytes).
pub const DNS_QNAME: &[u8] = b"\x04data\x06tunnel\x07example\x03com\x00";
/// TXT
pub const DNS_TYPE_TXT: u16 = 16;
/// IN
pub const DNS_CLASS_IN: u16 = 1;
/// Compression pointer back to the question name at offset 12.
pub const DNS_NAME_PTR: u16 = 0xC00C;

pub const HTTP_REQUEST_LINE: &str = "POST /tunnel/v1 HTTP/1.1\r\n";
pub const HTTP_HOST_LINE: &str = "Host: tunnel.example.com\r\n";
pub const HTTP_CONTENT_TYPE_LINE: &str = "Content-Type: application/octet-stream\r\n";
pub const HTTP_CONNECTION_LINE: &str = "Connection: keep-alive\r\n";
