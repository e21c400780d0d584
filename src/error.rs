//! # Error Types
//!
//! Error handling for the encapsulation protocol.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O errors to per-layer decoding failures.
//!
//! ## Error Categories
//! - **I/O Errors**: Network and file system failures
//! - **Codec Errors**: Malformed headers (always naming the failing layer)
//! - **Framing Errors**: Declared frame sizes exceeding the configured limit
//! - **Handler Errors**: Mode-specific failures inside a connection handler
//!
//! Codec errors never escape a single decapsulation call; the connection
//! handler that hit them logs the error and closes only its own connection.
//! The one "need more bytes" condition of stream framing is not an error at
//! all here: the frame decoder reports it as `Ok(None)` and is simply polled
//! again once more data has arrived.

use std::io;
use thiserror::Error;

use crate::core::spec::Layer;

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed {layer} header: {reason}")]
    MalformedHeader { layer: Layer, reason: &'static str },

    #[error("frame too large: declared {declared} bytes, limit is {max}")]
    FrameTooLarge { declared: usize, max: usize },

    #[error("handler error: {0}")]
    Handler(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Shorthand used throughout the layer codecs.
    pub(crate) fn malformed(layer: Layer, reason: &'static str) -> Self {
        Self::MalformedHeader { layer, reason }
    }

    /// The layer a decode failure occurred at, if this is a codec error.
    pub fn layer(&self) -> Option<Layer> {
        match self {
            Self::MalformedHeader { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
