//! # Opcode Table
//!
//! Static registry of every instruction the raster command set knows about.
//! Each entry maps a byte signature to an [`InstructionKind`], a rule for
//! computing the instruction's total length, and a human-readable label.
//!
//! ## Length Rules
//!
//! | Rule | Total length |
//! |------|--------------|
//! | `Fixed(n)` | `len(signature) + n` |
//! | `Open` | `len(signature)` (payload is not self-describing) |
//! | `RasterQl` | `len(signature) + data[2] + 2` |
//! | `RasterPTouch` | `len(signature) + data[1] + data[2] * 256 + 2` |
//!
//! Offsets in the raster rules are relative to the first byte of the
//! instruction (the opcode itself), matching the wire layout:
//!
//! ```text
//! 67 00 nn d1..dnn      raster QL
//! 77 cc nn d1..dnn      2-color raster QL (cc = 01 black, 02 red)
//! 47 lo hi d1..d(hi:lo) raster P-touch
//! ```
//!
//! The table is prefix-free: no signature is a prefix of another, so any
//! stream head matches at most one entry. [`verify_table`] checks this.

/// Kind of a protocol instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Preamble,
    Compression,
    RasterQl,
    RasterPTouch,
    TwoColorRasterQl,
    ZeroRaster,
    PrintIntermediate,
    PrintFinal,
    Init,
    ModeSetting,
    AutoStatusNotify,
    MediaQuality,
    VariousFlags,
    CutEvery,
    Expanded,
    Margins,
    AdditionalMedia,
    AutoPowerOff,
    JobId,
    AutoPowerOn,
    RequestConfig,
    NumberOfCopies,
    StatusRequest,
    StatusResponse,
}

impl InstructionKind {
    /// Whether this instruction carries (or stands for) one raster row.
    pub fn is_raster(self) -> bool {
        matches!(
            self,
            Self::RasterQl | Self::RasterPTouch | Self::TwoColorRasterQl | Self::ZeroRaster
        )
    }

    /// Whether this instruction ejects a page.
    pub fn is_print(self) -> bool {
        matches!(self, Self::PrintIntermediate | Self::PrintFinal)
    }
}

/// How the total byte length of an instruction is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Fixed number of payload bytes after the signature
    Fixed(usize),
    /// Variable-length payload without a length header; only the signature is consumed
    Open,
    /// One-byte row length at offset 2
    RasterQl,
    /// Little-endian two-byte row length at offsets 1-2
    RasterPTouch,
}

/// One entry of the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    pub signature: &'static [u8],
    pub kind: InstructionKind,
    pub name: &'static str,
    pub length: LengthRule,
    pub description: &'static str,
}

impl OpcodeDescriptor {
    /// Declared payload length, `-1` when the payload is variable.
    pub fn fixed_len(&self) -> i32 {
        match self.length {
            LengthRule::Fixed(n) => n as i32,
            _ => -1,
        }
    }

    /// Total instruction length for an instruction starting at `data[0]`.
    ///
    /// Returns `None` when the length header itself is not yet available.
    pub fn instruction_len(&self, data: &[u8]) -> Option<usize> {
        let sig = self.signature.len();
        match self.length {
            LengthRule::Fixed(n) => Some(sig + n),
            LengthRule::Open => Some(sig),
            LengthRule::RasterQl => data.get(2).map(|&n| sig + n as usize + 2),
            LengthRule::RasterPTouch => match (data.get(1), data.get(2)) {
                (Some(&lo), Some(&hi)) => Some(sig + lo as usize + hi as usize * 256 + 2),
                _ => None,
            },
        }
    }
}

const fn op(
    signature: &'static [u8],
    kind: InstructionKind,
    name: &'static str,
    length: LengthRule,
    description: &'static str,
) -> OpcodeDescriptor {
    OpcodeDescriptor {
        signature,
        kind,
        name,
        length,
        description,
    }
}

use InstructionKind as K;
use LengthRule::{Fixed, Open};

/// All known opcodes, one row per [`InstructionKind`] in declaration order.
pub const OPCODES: &[OpcodeDescriptor] = &[
    op(b"\x00", K::Preamble, "preamble", Open, "Preamble, 200-300x 0x00 to clear command buffer"),
    op(b"\x4D", K::Compression, "compression", Fixed(1), ""),
    op(b"\x67", K::RasterQl, "raster QL", LengthRule::RasterQl, ""),
    op(b"\x47", K::RasterPTouch, "raster P-touch", LengthRule::RasterPTouch, ""),
    op(b"\x77", K::TwoColorRasterQl, "2-color raster QL", LengthRule::RasterQl, ""),
    op(b"\x5A", K::ZeroRaster, "zero raster", Fixed(0), "empty raster line"),
    op(b"\x0C", K::PrintIntermediate, "print", Fixed(0), "print intermediate page"),
    op(b"\x1A", K::PrintFinal, "print", Fixed(0), "print final page"),
    op(b"\x1B\x40", K::Init, "init", Fixed(0), "initialization"),
    op(b"\x1B\x69\x61", K::ModeSetting, "mode setting", Fixed(1), ""),
    op(b"\x1B\x69\x21", K::AutoStatusNotify, "automatic status", Fixed(1), ""),
    op(b"\x1B\x69\x7A", K::MediaQuality, "media/quality", Fixed(10), "print-media and print-quality"),
    op(b"\x1B\x69\x4D", K::VariousFlags, "various", Fixed(1), "Auto cut flag in bit 6"),
    op(b"\x1B\x69\x41", K::CutEvery, "cut-every", Fixed(1), "cut every n-th page"),
    op(b"\x1B\x69\x4B", K::Expanded, "expanded", Fixed(1), ""),
    op(b"\x1B\x69\x64", K::Margins, "margins", Fixed(2), ""),
    op(b"\x1B\x69\x55\x77\x01", K::AdditionalMedia, "amedia", Fixed(127), "Additional media information command"),
    op(b"\x1B\x69\x55\x41", K::AutoPowerOff, "auto_power_off", Open, "Auto power off setting command"),
    op(b"\x1B\x69\x55\x4A", K::JobId, "jobid", Fixed(14), "Job ID setting command"),
    op(b"\x1B\x69\x55\x70", K::AutoPowerOn, "auto_power_on", Open, "Auto power on setting command"),
    op(b"\x1B\x69\x58\x47", K::RequestConfig, "request_config", Fixed(0), "Request transmission of .ini config file of printer"),
    op(b"\x1B\x69\x6B\x63", K::NumberOfCopies, "number_of_copies", Fixed(2), "Internal specification commands"),
    op(b"\x1B\x69\x53", K::StatusRequest, "status request", Fixed(0), "A status information request sent to the printer"),
    op(b"\x80\x20\x42", K::StatusResponse, "status response", Fixed(29), "A status response received from the printer"),
];

/// Find the single opcode whose signature prefixes `data`.
///
/// Returns `None` for zero matches and for ambiguous matches.
pub fn match_opcode(data: &[u8]) -> Option<&'static OpcodeDescriptor> {
    let mut found = None;
    for desc in OPCODES {
        if data.starts_with(desc.signature) {
            if found.is_some() {
                return None;
            }
            found = Some(desc);
        }
    }
    found
}

/// Look up the descriptor for an instruction kind.
pub fn descriptor(kind: InstructionKind) -> &'static OpcodeDescriptor {
    // OPCODES is laid out in InstructionKind declaration order
    &OPCODES[kind as usize]
}

/// Check that no signature in [`OPCODES`] is a prefix of another.
pub fn verify_table() -> Result<(), String> {
    for (i, a) in OPCODES.iter().enumerate() {
        if a.signature.is_empty() {
            return Err(format!("empty signature for {}", a.name));
        }
        for b in &OPCODES[i + 1..] {
            if a.signature.starts_with(b.signature) || b.signature.starts_with(a.signature) {
                return Err(format!(
                    "signatures of '{}' and '{}' overlap",
                    a.name, b.name
                ));
            }
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
