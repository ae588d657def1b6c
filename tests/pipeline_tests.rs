//! # Pipeline Tests
//!
//! Build jobs with the page builder and read them back through the chunker,
//! merger and reconstructor.

use pretty_assertions::assert_eq;

use qlprint::printer::Model;
use qlprint::protocol::chunker::{Chunker, UnknownOpcodePolicy, chunk};
use qlprint::protocol::merge::{MergeOptions, merge_instructions};
use qlprint::protocol::opcodes::{InstructionKind, match_opcode};
use qlprint::raster::{RasterBuilder, RasterPage};
use qlprint::reader;

fn model(identifier: &str) -> &'static Model {
    Model::by_identifier(identifier).unwrap()
}

/// A diagonal stripe, 4 bytes wide.
fn stripe(rows: usize) -> Vec<Vec<u8>> {
    (0..rows)
        .map(|y| {
            let mut row = vec![0u8; 4];
            row[(y / 8) % 4] = 0x80 >> (y % 8);
            row
        })
        .collect()
}

#[test]
fn test_job_chunks_back_to_its_bytes() {
    let mut builder = RasterBuilder::new(model("QL-710W"));
    let pages = vec![
        RasterPage::new(stripe(32)).with_compression(true),
        RasterPage::new(stripe(8)),
    ];
    let job = builder.build_job(&pages).unwrap();

    let instructions = chunk(&job, UnknownOpcodePolicy::Abort).unwrap();
    let joined: Vec<u8> = instructions.iter().flat_map(|i| i.as_bytes().to_vec()).collect();
    assert_eq!(joined, job);

    let prints: Vec<_> = instructions
        .iter()
        .map(|i| i.kind())
        .filter(|k| k.is_print())
        .collect();
    assert_eq!(
        prints,
        vec![InstructionKind::PrintIntermediate, InstructionKind::PrintFinal]
    );
}

#[test]
fn test_merged_job_is_compact_and_stable() {
    let mut builder = RasterBuilder::new(model("QL-710W"));
    let job = builder
        .build_job(&[RasterPage::new(stripe(20)).with_compression(true)])
        .unwrap();
    let instructions = chunk(&job, UnknownOpcodePolicy::Abort).unwrap();

    let merged = merge_instructions(&instructions, MergeOptions::default());
    assert_eq!(merged.concat(), job);

    let kinds: Vec<_> = merged
        .iter()
        .map(|b| match_opcode(b).unwrap().kind)
        .collect();
    assert_eq!(kinds.first(), Some(&InstructionKind::Preamble));
    assert_eq!(kinds.iter().filter(|k| **k == InstructionKind::Preamble).count(), 1);
    assert_eq!(kinds.iter().filter(|k| k.is_raster()).count(), 1);

    assert_eq!(merge_instructions(&merged, MergeOptions::default()), merged);
}

#[test]
fn test_reconstruct_built_pages() {
    let mut builder = RasterBuilder::new(model("QL-710W"));
    let job = builder
        .build_job(&[
            RasterPage::new(stripe(32)).with_compression(true),
            RasterPage::new(stripe(16)),
        ])
        .unwrap();

    let pages = reader::reconstruct(Chunker::new(&job, UnknownOpcodePolicy::Abort)).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].number, 1);
    assert_eq!(pages[1].number, 2);

    // rows are padded to the full print head
    let width = model("QL-710W").width_dots();
    assert_eq!((pages[0].width(), pages[0].height()), (width, 32));
    assert_eq!(pages[0].declared_rows, Some(32));
    assert_eq!((pages[1].width(), pages[1].height()), (width, 16));

    // wire dot x lands at width - 1 - x after mirroring
    for y in 0..32u32 {
        let x = width - 1 - y;
        assert_eq!(pages[0].image.get_pixel(x, y).0, [0, 0, 0, 255], "row {}", y);
        assert_eq!(pages[0].image.get_pixel(x - 1, y).0, [255, 255, 255, 255]);
    }
}

#[test]
fn test_reconstruct_two_color_page() {
    let mut builder = RasterBuilder::new(model("QL-820NWB"));
    let black = vec![vec![0x80], vec![0x00]];
    let red = vec![vec![0x40], vec![0x00]];
    let job = builder
        .build_job(&[RasterPage::new(black)
            .with_red(red)
            .with_compression(true)])
        .unwrap();

    let pages = reader::reconstruct_stream(&job, UnknownOpcodePolicy::Abort).unwrap();
    let page = &pages[0];
    assert!(page.two_color);
    let width = page.width();
    assert_eq!(page.height(), 2);
    assert_eq!(page.image.get_pixel(width - 1, 0).0, [0, 0, 0, 255]);
    assert_eq!(page.image.get_pixel(width - 2, 0).0, [255, 0, 0, 255]);
    assert_eq!(page.image.get_pixel(width - 1, 1).0, [255, 255, 255, 255]);
}

#[test]
fn test_skip_policy_recovers_from_garbage() {
    let mut builder = RasterBuilder::new(model("QL-710W"));
    let job = builder.build_job(&[RasterPage::new(stripe(4))]).unwrap();

    let mut noisy = vec![0xEE, 0xEE];
    noisy.extend(&job);

    assert!(reader::reconstruct_stream(&noisy, UnknownOpcodePolicy::Abort).is_err());
    let pages = reader::reconstruct_stream(&noisy, UnknownOpcodePolicy::Skip).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].height(), 4);
}

#[test]
fn test_saved_page_file_name() {
    let mut builder = RasterBuilder::new(model("QL-710W"));
    let job = builder.build_job(&[RasterPage::new(stripe(4))]).unwrap();
    let pages = reader::reconstruct_stream(&job, UnknownOpcodePolicy::Abort).unwrap();

    let dir = std::env::temp_dir().join(format!("qlprint-pipeline-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let pattern = format!("{}/label{{counter:04}}.png", dir.display());
    let name = reader::filename_for(&pattern, pages[0].number).unwrap();
    pages[0].save(&name).unwrap();

    assert!(name.ends_with("label0001.png"));
    let saved = image::open(&name).unwrap();
    assert_eq!(saved.width(), pages[0].width());
    std::fs::remove_dir_all(&dir).unwrap();
}
