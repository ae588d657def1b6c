//! # Instruction Chunker
//!
//! Splits a raw instruction stream into whole instructions using the
//! [opcode table](super::opcodes).
//!
//! The chunker is a lazy iterator over a borrowed buffer. It never blocks
//! and has no side effects besides logging. At each step exactly one
//! signature must prefix the remaining bytes; otherwise the stream is out of
//! sync and the configured [`UnknownOpcodePolicy`] decides whether to skip a
//! byte or stop.
//!
//! ```
//! use qlprint::protocol::chunker::{chunk, UnknownOpcodePolicy};
//! use qlprint::protocol::opcodes::InstructionKind;
//!
//! let stream = [0x1B, 0x40, 0x5A, 0x67, 0x00, 0x02, 0xAA, 0x55, 0x1A];
//! let instructions = chunk(&stream, UnknownOpcodePolicy::Abort)?;
//! let kinds: Vec<_> = instructions.iter().map(|i| i.kind()).collect();
//! assert_eq!(kinds, [
//!     InstructionKind::Init,
//!     InstructionKind::ZeroRaster,
//!     InstructionKind::RasterQl,
//!     InstructionKind::PrintFinal,
//! ]);
//! # Ok::<(), qlprint::QlError>(())
//! ```

use log::warn;

use super::hex_format;
use super::opcodes::{InstructionKind, OpcodeDescriptor, match_opcode};
use crate::error::{QlError, Result};

/// What to do when the stream head matches no opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOpcodePolicy {
    /// Log a warning, drop one byte and try again
    #[default]
    Skip,
    /// Yield [`QlError::UnknownOpcode`] and end the sequence
    Abort,
}

/// A single decoded protocol instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    descriptor: &'static OpcodeDescriptor,
    bytes: Vec<u8>,
}

impl Instruction {
    /// Parse one instruction occupying all of `bytes`.
    ///
    /// Fails if the bytes do not start with a known signature or their
    /// length disagrees with the opcode's length rule.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let descriptor = match_opcode(&bytes).ok_or_else(|| QlError::UnknownOpcode {
            offset: 0,
            head: hex_format(&bytes[..bytes.len().min(4)]),
        })?;
        let expected = descriptor.instruction_len(&bytes);
        if expected != Some(bytes.len()) {
            return Err(QlError::Truncated {
                kind: descriptor.name,
                needed: expected.unwrap_or(descriptor.signature.len() + 3),
                available: bytes.len(),
            });
        }
        Ok(Self { descriptor, bytes })
    }

    pub fn kind(&self) -> InstructionKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &'static OpcodeDescriptor {
        self.descriptor
    }

    pub fn signature(&self) -> &'static [u8] {
        self.descriptor.signature
    }

    /// Bytes following the signature.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.descriptor.signature.len()..]
    }

    /// Full instruction bytes, signature included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Instruction {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Lazy iterator of instructions over a byte buffer.
///
/// Consumes its input: once exhausted (or after an error) it yields `None`.
#[derive(Debug, Clone)]
pub struct Chunker<'a> {
    data: &'a [u8],
    pos: usize,
    policy: UnknownOpcodePolicy,
    done: bool,
}

impl<'a> Chunker<'a> {
    pub fn new(data: &'a [u8], policy: UnknownOpcodePolicy) -> Self {
        debug_assert!(super::opcodes::verify_table().is_ok());
        Self {
            data,
            pos: 0,
            policy,
            done: false,
        }
    }

    /// Byte offset of the next unread instruction.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Chunker<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.pos < self.data.len() {
            let rest = &self.data[self.pos..];

            let Some(desc) = match_opcode(rest) else {
                let head = hex_format(&rest[..rest.len().min(4)]);
                match self.policy {
                    UnknownOpcodePolicy::Skip => {
                        warn!("unknown opcode starting with {}...", head);
                        self.pos += 1;
                        continue;
                    }
                    UnknownOpcodePolicy::Abort => {
                        self.done = true;
                        return Some(Err(QlError::UnknownOpcode {
                            offset: self.pos,
                            head,
                        }));
                    }
                }
            };

            let needed = desc
                .instruction_len(rest)
                .unwrap_or(desc.signature.len() + 3);
            if needed > rest.len() {
                self.done = true;
                return Some(Err(QlError::Truncated {
                    kind: desc.name,
                    needed,
                    available: rest.len(),
                }));
            }

            self.pos += needed;
            return Some(Ok(Instruction {
                descriptor: desc,
                bytes: rest[..needed].to_vec(),
            }));
        }
        None
    }
}

/// Split a whole stream into instructions, stopping at the first error.
pub fn chunk(data: &[u8], policy: UnknownOpcodePolicy) -> Result<Vec<Instruction>> {
    Chunker::new(data, policy).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn kinds(data: &[u8]) -> Vec<InstructionKind> {
        chunk(data, UnknownOpcodePolicy::Abort)
            .unwrap()
            .iter()
            .map(Instruction::kind)
            .collect()
    }

    #[test]
    fn test_empty_stream() {
        assert!(chunk(&[], UnknownOpcodePolicy::Abort).unwrap().is_empty());
    }

    #[test]
    fn test_preamble_is_one_instruction_per_byte() {
        let data = commands::invalidate(5);
        assert_eq!(kinds(&data), vec![InstructionKind::Preamble; 5]);
    }

    #[test]
    fn test_control_sequence() {
        let mut data = commands::initialize();
        data.extend(commands::raster_mode());
        data.extend(commands::expanded_mode(true, true, false));
        data.extend(commands::margins(35));
        data.extend(commands::compression(true));
        data.extend(commands::print_page(true));
        assert_eq!(
            kinds(&data),
            vec![
                InstructionKind::Init,
                InstructionKind::ModeSetting,
                InstructionKind::Expanded,
                InstructionKind::Margins,
                InstructionKind::Compression,
                InstructionKind::PrintFinal,
            ]
        );
    }

    #[test]
    fn test_raster_payload_slicing() {
        let mut data = commands::raster_row_ql(&[0x01, 0x02, 0x03]);
        data.extend(commands::raster_row_ptouch(&[0xFF; 300]));
        data.extend(commands::zero_raster());

        let instrs = chunk(&data, UnknownOpcodePolicy::Abort).unwrap();
        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[0].as_bytes(), &[0x67, 0x00, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(instrs[0].payload(), &[0x00, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(instrs[1].len(), 3 + 300);
        assert_eq!(instrs[2].kind(), InstructionKind::ZeroRaster);
    }

    #[test]
    fn test_status_response_is_32_bytes() {
        let mut frame = vec![0u8; 32];
        frame[..3].copy_from_slice(&[0x80, 0x20, 0x42]);
        frame.extend(commands::status_request());
        let instrs = chunk(&frame, UnknownOpcodePolicy::Abort).unwrap();
        assert_eq!(instrs[0].kind(), InstructionKind::StatusResponse);
        assert_eq!(instrs[0].len(), 32);
        assert_eq!(instrs[1].kind(), InstructionKind::StatusRequest);
    }

    #[test]
    fn test_unknown_opcode_skip() {
        let data = [0xFF, 0xFE, 0x1B, 0x40];
        let instrs = chunk(&data, UnknownOpcodePolicy::Skip).unwrap();
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].kind(), InstructionKind::Init);
    }

    #[test]
    fn test_unknown_opcode_abort() {
        let data = [0x1B, 0x40, 0xFF, 0x1B, 0x40];
        let mut chunker = Chunker::new(&data, UnknownOpcodePolicy::Abort);
        assert!(chunker.next().unwrap().is_ok());
        match chunker.next() {
            Some(Err(QlError::UnknownOpcode { offset, head })) => {
                assert_eq!(offset, 2);
                assert_eq!(head, "FF 1B 40");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(chunker.next().is_none());
    }

    #[test]
    fn test_truncated_raster() {
        let data = [0x67, 0x00, 0x05, 0x01];
        let err = chunk(&data, UnknownOpcodePolicy::Skip).unwrap_err();
        assert!(matches!(err, QlError::Truncated { needed: 8, available: 4, .. }));
    }

    #[test]
    fn test_instruction_parse() {
        let instr = Instruction::parse(vec![0x1B, 0x69, 0x41, 0x01]).unwrap();
        assert_eq!(instr.kind(), InstructionKind::CutEvery);
        assert!(Instruction::parse(vec![0x1B, 0x69, 0x41]).is_err());
        assert!(Instruction::parse(vec![0xEE]).is_err());
    }

    fn instruction_strategy() -> impl Strategy<Value = Vec<u8>> {
        prop_oneof![
            Just(commands::initialize()),
            Just(commands::zero_raster()),
            Just(commands::status_request()),
            Just(commands::print_page(false)),
            any::<u8>().prop_map(commands::cut_every),
            any::<u16>().prop_map(commands::margins),
            proptest::collection::vec(any::<u8>(), 0..=255)
                .prop_map(|row| commands::raster_row_ql(&row)),
            proptest::collection::vec(any::<u8>(), 0..600)
                .prop_map(|row| commands::raster_row_ptouch(&row)),
        ]
    }

    proptest! {
        #[test]
        fn prop_chunk_recovers_concatenation(parts in proptest::collection::vec(instruction_strategy(), 0..20)) {
            let stream: Vec<u8> = parts.concat();
            let instrs = chunk(&stream, UnknownOpcodePolicy::Abort).unwrap();
            prop_assert_eq!(instrs.len(), parts.len());
            for (instr, part) in instrs.iter().zip(&parts) {
                prop_assert_eq!(instr.as_bytes(), part.as_slice());
            }
        }
    }
}
