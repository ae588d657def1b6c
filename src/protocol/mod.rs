//! # Raster Protocol Implementation
//!
//! This module provides the codec for the binary command/status protocol
//! spoken by Brother QL and PT series label printers.
//!
//! ## Module Structure
//!
//! - [`opcodes`]: Static opcode table (signature, kind, length rule)
//! - [`chunker`]: Splits a raw byte stream into whole instructions
//! - [`rle`]: Run-length codec for raster row payloads
//! - [`status`]: 32-byte status frame decoder
//! - [`commands`]: Builders for control blocks and raster rows
//! - [`merge`]: Joins adjacent preamble/raster instructions for analysis
//!
//! ## Usage Example
//!
//! ```
//! use qlprint::protocol::{chunker, commands, status};
//!
//! // Build a tiny single-row job
//! let mut data = commands::invalidate(200);
//! data.extend(commands::initialize());
//! data.extend(commands::raster_mode());
//! data.extend(commands::raster_row_ql(&[0xFF; 90]));
//! data.extend(commands::print_page(true));
//!
//! let instructions = chunker::chunk(&data, chunker::UnknownOpcodePolicy::Abort)?;
//! assert_eq!(instructions.len(), 200 + 4);
//!
//! // Decode a status frame read back from the printer
//! let mut frame = [0u8; 32];
//! frame[..3].copy_from_slice(&status::MAGIC);
//! let decoded = status::decode(&frame)?;
//! assert!(decoded.errors.is_empty());
//! # Ok::<(), qlprint::QlError>(())
//! ```

pub mod chunker;
pub mod commands;
pub mod merge;
pub mod opcodes;
pub mod rle;
pub mod status;

/// Format bytes as space separated upper-case hex, e.g. `80 20 42`.
pub fn hex_format(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
