//! # Instruction Merger
//!
//! Coalesces runs of adjacent preamble bytes and adjacent raster rows into
//! single blocks, which makes a chunked stream much easier to read when
//! dumped for analysis. Order is preserved; every other instruction stays a
//! block of its own.
//!
//! Blocks are classified by the opcode at their start, so the merger can be
//! fed its own output: an already merged stream has no two adjacent blocks of
//! the same joinable class and comes back unchanged.

use super::opcodes::{InstructionKind, match_opcode};

/// Which classes of instructions to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub join_preamble: bool,
    pub join_raster: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            join_preamble: true,
            join_raster: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinClass {
    Preamble,
    Raster,
}

fn join_class(block: &[u8], options: MergeOptions) -> Option<JoinClass> {
    let kind = match_opcode(block)?.kind;
    if options.join_preamble && kind == InstructionKind::Preamble {
        Some(JoinClass::Preamble)
    } else if options.join_raster && kind.is_raster() {
        Some(JoinClass::Raster)
    } else {
        None
    }
}

/// Merge adjacent joinable blocks.
pub fn merge_instructions<B: AsRef<[u8]>>(blocks: &[B], options: MergeOptions) -> Vec<Vec<u8>> {
    let mut merged = Vec::new();
    let mut buffer: Vec<u8> = Vec::new();
    let mut last: Option<JoinClass> = None;

    for block in blocks {
        let block = block.as_ref();
        let class = join_class(block, options);

        if class.is_some() && class == last {
            buffer.extend_from_slice(block);
        } else {
            if !buffer.is_empty() {
                merged.push(std::mem::take(&mut buffer));
            }
            buffer.extend_from_slice(block);
        }
        last = class;
    }
    if !buffer.is_empty() {
        merged.push(buffer);
    }

    merged
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::chunker::{UnknownOpcodePolicy, chunk};
    use crate::protocol::commands;
    use pretty_assertions::assert_eq;

    fn sample_stream() -> Vec<u8> {
        let mut data = commands::invalidate(4);
        data.extend(commands::initialize());
        data.extend(commands::raster_row_ql(&[0x01, 0x02]));
        data.extend(commands::zero_raster());
        data.extend(commands::raster_row_ql(&[0x03]));
        data.extend(commands::compression(true));
        data.extend(commands::raster_row_ql(&[0x04]));
        data.extend(commands::print_page(true));
        data
    }

    #[test]
    fn test_merge_joins_runs() {
        let instrs = chunk(&sample_stream(), UnknownOpcodePolicy::Abort).unwrap();
        let merged = merge_instructions(&instrs, MergeOptions::default());
        assert_eq!(
            merged,
            vec![
                vec![0, 0, 0, 0],
                vec![0x1B, 0x40],
                vec![0x67, 0x00, 2, 0x01, 0x02, 0x5A, 0x67, 0x00, 1, 0x03],
                vec![0x4D, 0x02],
                vec![0x67, 0x00, 1, 0x04],
                vec![0x1A],
            ]
        );
    }

    #[test]
    fn test_merge_preserves_bytes() {
        let data = sample_stream();
        let instrs = chunk(&data, UnknownOpcodePolicy::Abort).unwrap();
        let merged = merge_instructions(&instrs, MergeOptions::default());
        assert_eq!(merged.concat(), data);
    }

    #[test]
    fn test_merge_disabled() {
        let instrs = chunk(&sample_stream(), UnknownOpcodePolicy::Abort).unwrap();
        let options = MergeOptions {
            join_preamble: false,
            join_raster: false,
        };
        let merged = merge_instructions(&instrs, options);
        assert_eq!(merged.len(), instrs.len());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let instrs = chunk(&sample_stream(), UnknownOpcodePolicy::Abort).unwrap();
        let once = merge_instructions(&instrs, MergeOptions::default());
        let twice = merge_instructions(&once, MergeOptions::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_empty() {
        let blocks: Vec<Vec<u8>> = Vec::new();
        assert!(merge_instructions(&blocks, MergeOptions::default()).is_empty());
    }
}
