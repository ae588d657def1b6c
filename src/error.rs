//! # Error Types
//!
//! This module defines error types used throughout the qlprint library.
//!
//! Timeouts while waiting for a status frame are deliberately absent: the
//! status-wait primitive reports them as a `false` result.

use thiserror::Error;

/// Main error type for qlprint operations
#[derive(Debug, Error)]
pub enum QlError {
    /// No opcode signature (or more than one) matches the stream head
    #[error("Unknown opcode at offset {offset} starting with {head}...")]
    UnknownOpcode { offset: usize, head: String },

    /// An instruction's declared length runs past the end of the stream
    #[error("Truncated {kind} instruction: needs {needed} bytes, {available} available")]
    Truncated {
        kind: &'static str,
        needed: usize,
        available: usize,
    },

    /// Status frame shorter than 32 bytes
    #[error("Insufficient amount of data received ({len} bytes)")]
    ShortFrame { len: usize },

    /// Status frame does not start with 80 20 42
    #[error("Printer response doesn't start with the usual header (80:20:42): {head}")]
    BadMagic { head: String },

    /// Unknown media type code, only raised under the strict media policy
    #[error("Unknown media type 0x{code:02X}")]
    UnknownMedia { code: u8 },

    /// RLE payload that does not align with the control-byte scheme
    #[error("Malformed compressed row at payload offset {offset}")]
    MalformedRow { offset: usize },

    /// Two-color raster row with a color byte other than 0x01/0x02
    #[error("Unknown raster color channel 0x{0:02X}")]
    UnknownColorChannel(u8),

    /// API misuse (queuing while printing, bad arguments)
    #[error("Usage error: {0}")]
    Usage(String),

    /// The printer answered with a different status type than requested
    #[error("Printer reported status type 0x{got:02X}, expected 0x{expected:02X}")]
    UnexpectedStatus { expected: u8, got: u8 },

    /// Transport-level errors (connection, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for qlprint operations
pub type Result<T> = std::result::Result<T, QlError>;
