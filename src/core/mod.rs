//! # Core Protocol Components
//!
//! The layer codec, stack engine and stream framing.
//!
//! ## Components
//! - **spec**: static table of all eight header formats and wire constants
//! - **layer**: per-layer header construction and strict parsing
//! - **stack**: eight-layer encapsulate / decapsulate / overhead statistics
//! - **codec**: tokio codec re-deriving packet boundaries from a byte stream
//!
//! ## Wire Format
//! ```text
//! [EthOuter(18)] [IpOuter(16)] [TcpOuter(19)] [DNS(55)] [HTTP(146)]
//! [TcpInner(19)] [IpInner(16)] [EthInner(14)] [Payload(N)]
//! ```
//! Each bracket is one nested header; every layer except the innermost
//! Ethernet frame declares the exact byte count of everything it encloses.
//!
//! ## Properties
//! - Round-trip exact for every payload, including empty
//! - Byte-identical re-encapsulation (no clocks, no randomness in headers)
//! - A corrupted header names its layer; payload bytes are never "headers"

pub mod codec;
pub mod layer;
pub mod spec;
pub mod stack;
