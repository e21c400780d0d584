//! # matryoshka-protocol
//!
//! A deliberately maximal-overhead encapsulation protocol: every payload is
//! wrapped in eight nested headers — an emulated Ethernet frame, an IP
//! datagram, a TCP segment, a DNS message, an HTTP request, and then a
//! second TCP segment, IP datagram and Ethernet frame — and unwrapped
//! exactly. The crate pairs that codec with the TCP server that speaks it:
//! framing over a real byte stream, per-connection handler tasks, and the
//! echo / chat / file / ping payload modes.
//!
//! The headers are synthetic. They do not interoperate with a genuine
//! IP/TCP/DNS/HTTP stack and are not meant to; efficiency is explicitly an
//! anti-goal. What the crate does guarantee:
//!
//! - **Round-trip**: `decapsulate(encapsulate(p)) == p` for every payload
//! - **Determinism**: the same payload always encodes to identical bytes
//! - **Strict validation**: a corrupted header fails decode naming its layer
//!
//! ## Quick Start
//!
//! ```rust
//! use matryoshka_protocol::core::stack::ProtocolStack;
//!
//! let stack = ProtocolStack::new();
//! let packet = stack.encapsulate(b"Hello!");
//! assert_eq!(stack.decapsulate(&packet)?, b"Hello!");
//!
//! let stats = stack.overhead_stats(b"Hello!");
//! assert_eq!(stats.payload_size, 6);
//! assert!(stats.total_size > stats.payload_size);
//! # Ok::<(), matryoshka_protocol::error::ProtocolError>(())
//! ```
//!
//! ## Wire Format
//! ```text
//! [EthOuter(18)] [IpOuter(16)] [TcpOuter(19)] [DNS(55)] [HTTP(146)]
//! [TcpInner(19)] [IpInner(16)] [EthInner(14)] [Payload(N)]
//! ```
//!
//! Packets are self-delimiting on a byte stream: the outer Ethernet header
//! carries the total enclosed length, so no extra framing is added outside
//! the eight layers.

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use client::Client;
pub use config::ServerConfig;
pub use core::codec::{PacketCodec, DEFAULT_MAX_PACKET_SIZE};
pub use core::spec::{Layer, LAYERS};
pub use core::stack::{decapsulate, encapsulate, overhead_stats, OverheadStats, ProtocolStack};
pub use error::{ProtocolError, Result};
pub use server::handler::Mode;
pub use server::registry::{ClientRegistry, ConnectionId};
pub use server::{Server, ServerStats, StatsSnapshot};
