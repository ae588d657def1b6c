//! # Raster Image Reconstructor
//!
//! Replays an instruction stream and renders every printed page, the way
//! the printer would have put it on the label. Useful for checking what a
//! job file will print without wasting labels.
//!
//! State lives in a [`ReconstructorState`] value that is threaded through a
//! fold over the instructions:
//!
//! - `ESC @` clears the accumulated rows and media information
//! - `M` switches compression on (`0x02`) or off for following rows
//! - `ESC i K` sets two-color, cut-at-end and high-resolution mode
//! - `g` / `G` / `w` / `Z` append rows
//! - `FF` / `SUB` render the accumulated rows as the next page
//!
//! ## Rendering
//!
//! Rows are zero-padded to the widest row. A set wire bit is a printed
//! (black) dot. In two-color mode the black channel is drawn over the red
//! channel over white. The page is mirrored horizontally at the end since
//! rows travel in print-head order.

use std::path::Path;

use image::{Rgba, RgbaImage, imageops};
use log::{debug, info, warn};

use crate::error::{QlError, Result};
use crate::protocol::chunker::{Chunker, Instruction, UnknownOpcodePolicy};
use crate::protocol::commands::{COMPRESSION_RLE, ColorChannel};
use crate::protocol::hex_format;
use crate::protocol::opcodes::InstructionKind;
use crate::protocol::rle;

/// Default output file name pattern.
pub const DEFAULT_FILENAME_FORMAT: &str = "label{counter:04}.png";

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// One rendered page.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number, counting every print instruction
    pub number: usize,
    pub image: RgbaImage,
    pub two_color: bool,
    pub cut_at_end: bool,
    pub high_resolution: bool,
    /// Row count declared by the media/quality instruction
    pub declared_rows: Option<u32>,
    pub media_width_mm: Option<u8>,
    pub media_length_mm: Option<u8>,
}

impl Page {
    /// Rows actually rendered.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Width in dots.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save(path.as_ref())
            .map_err(|e| QlError::Image(format!("{}: {}", path.as_ref().display(), e)))
    }
}

/// Accumulated decoder state between print instructions.
#[derive(Debug, Clone)]
pub struct ReconstructorState {
    compression: bool,
    two_color: bool,
    cut_at_end: bool,
    high_resolution: bool,
    black_rows: Vec<Vec<u8>>,
    red_rows: Vec<Vec<u8>>,
    declared_rows: Option<u32>,
    media_width_mm: Option<u8>,
    media_length_mm: Option<u8>,
    next_page: usize,
}

impl Default for ReconstructorState {
    fn default() -> Self {
        Self {
            compression: false,
            two_color: false,
            cut_at_end: false,
            high_resolution: false,
            black_rows: Vec::new(),
            red_rows: Vec::new(),
            declared_rows: None,
            media_width_mm: None,
            media_length_mm: None,
            next_page: 1,
        }
    }
}

impl ReconstructorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn two_color(&self) -> bool {
        self.two_color
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    /// Number of the page the next print instruction produces.
    pub fn next_page(&self) -> usize {
        self.next_page
    }

    /// Apply one instruction, returning the new state and the page it
    /// finished, if any.
    pub fn apply(mut self, instruction: &Instruction) -> Result<(Self, Option<Page>)> {
        let payload = instruction.payload();
        debug!(
            " {} ({}) --> found! (payload: {})",
            instruction.descriptor().name,
            hex_format(instruction.signature()),
            hex_format(payload)
        );

        match instruction.kind() {
            InstructionKind::Init => {
                self.clear_page();
            }
            InstructionKind::Compression => {
                self.compression = payload.first() == Some(&COMPRESSION_RLE);
            }
            InstructionKind::ZeroRaster => {
                self.black_rows.push(Vec::new());
                if self.two_color {
                    self.red_rows.push(Vec::new());
                }
            }
            InstructionKind::RasterQl | InstructionKind::RasterPTouch => {
                let row = self.row_data(payload)?;
                self.black_rows.push(row);
            }
            InstructionKind::TwoColorRasterQl => {
                let channel = payload.first().copied().unwrap_or_default();
                let row = self.row_data(payload)?;
                match channel {
                    c if c == ColorChannel::Black as u8 => self.black_rows.push(row),
                    c if c == ColorChannel::Red as u8 => self.red_rows.push(row),
                    other => return Err(QlError::UnknownColorChannel(other)),
                }
            }
            InstructionKind::Expanded => {
                let flags = payload.first().copied().unwrap_or_default();
                self.two_color = flags & (1 << 0) != 0;
                self.cut_at_end = flags & (1 << 3) != 0;
                self.high_resolution = flags & (1 << 6) != 0;
            }
            InstructionKind::MediaQuality => {
                if let Some(rows) = payload.get(4..8) {
                    self.declared_rows = Some(u32::from_le_bytes([rows[0], rows[1], rows[2], rows[3]]));
                }
                self.media_width_mm = payload.get(2).copied();
                self.media_length_mm = payload.get(3).copied();
                info!(
                    " media width: {} mm, media length: {} mm, raster no: {} rows",
                    self.media_width_mm.unwrap_or_default(),
                    self.media_length_mm.unwrap_or_default(),
                    self.declared_rows.unwrap_or_default()
                );
            }
            kind if kind.is_print() => {
                let page = self.render_page();
                self.next_page += 1;
                self.black_rows.clear();
                self.red_rows.clear();
                return Ok((self, page));
            }
            _ => {}
        }

        Ok((self, None))
    }

    fn clear_page(&mut self) {
        self.black_rows.clear();
        self.red_rows.clear();
        self.declared_rows = None;
        self.media_width_mm = None;
        self.media_length_mm = None;
    }

    /// Raster data past the two header bytes, decompressed if needed.
    fn row_data(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let data = payload.get(2..).unwrap_or_default();
        if self.compression {
            rle::decode_row(data)
        } else {
            Ok(data.to_vec())
        }
    }

    fn render_page(&self) -> Option<Page> {
        info!("Len of black rows: {}", self.black_rows.len());
        info!("Len of red   rows: {}", self.red_rows.len());

        let red_rows: &[Vec<u8>] = if self.two_color { &self.red_rows } else { &[] };
        let width_bytes = self
            .black_rows
            .iter()
            .chain(red_rows)
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let height = self.black_rows.len().max(red_rows.len());

        if width_bytes == 0 || height == 0 {
            warn!("Page {} has no raster data, skipping", self.next_page);
            return None;
        }

        let mut image = RgbaImage::from_pixel(width_bytes as u32 * 8, height as u32, WHITE);
        if self.two_color {
            paint(&mut image, red_rows, RED);
        }
        paint(&mut image, &self.black_rows, BLACK);

        Some(Page {
            number: self.next_page,
            image: imageops::flip_horizontal(&image),
            two_color: self.two_color,
            cut_at_end: self.cut_at_end,
            high_resolution: self.high_resolution,
            declared_rows: self.declared_rows,
            media_width_mm: self.media_width_mm,
            media_length_mm: self.media_length_mm,
        })
    }
}

/// Paint every set bit of `rows` with `color`; missing bytes stay untouched.
fn paint(image: &mut RgbaImage, rows: &[Vec<u8>], color: Rgba<u8>) {
    for (y, row) in rows.iter().enumerate() {
        for (i, byte) in row.iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    image.put_pixel((i * 8 + bit) as u32, y as u32, color);
                }
            }
        }
    }
}

/// Render every page of an instruction sequence.
///
/// Fails without pages on the first bad instruction; use
/// [`reconstruct_with`] to keep the pages finished before it.
pub fn reconstruct<I>(instructions: I) -> Result<Vec<Page>>
where
    I: IntoIterator<Item = Result<Instruction>>,
{
    let mut pages = Vec::new();
    reconstruct_with(instructions, |page| {
        pages.push(page);
        Ok(())
    })?;
    Ok(pages)
}

/// Render pages and hand each one to `on_page` as soon as its print
/// instruction arrives. Pages finished before an error have already been
/// delivered when the error is returned.
///
/// Returns the number of pages delivered.
pub fn reconstruct_with<I, F>(instructions: I, mut on_page: F) -> Result<usize>
where
    I: IntoIterator<Item = Result<Instruction>>,
    F: FnMut(Page) -> Result<()>,
{
    let (_, delivered) = instructions.into_iter().try_fold(
        (ReconstructorState::new(), 0usize),
        |(state, delivered), instruction| {
            let (state, page) = state.apply(&instruction?)?;
            match page {
                Some(page) => {
                    on_page(page)?;
                    Ok::<_, QlError>((state, delivered + 1))
                }
                None => Ok((state, delivered)),
            }
        },
    )?;
    Ok(delivered)
}

/// Chunk a raw stream and render its pages.
pub fn reconstruct_stream(data: &[u8], policy: UnknownOpcodePolicy) -> Result<Vec<Page>> {
    reconstruct(Chunker::new(data, policy))
}

/// Chunk a raw stream and deliver its pages one by one.
pub fn reconstruct_stream_with<F>(
    data: &[u8],
    policy: UnknownOpcodePolicy,
    on_page: F,
) -> Result<usize>
where
    F: FnMut(Page) -> Result<()>,
{
    reconstruct_with(Chunker::new(data, policy), on_page)
}

/// Expand a file name pattern for page `counter`.
///
/// Supports `{counter}` and zero-padded `{counter:04}`.
pub fn filename_for(pattern: &str, counter: usize) -> Result<String> {
    let Some(start) = pattern.find("{counter") else {
        return Err(QlError::Usage(format!(
            "File name format '{}' has no {{counter}} placeholder",
            pattern
        )));
    };
    let rest = &pattern[start + "{counter".len()..];
    let end = rest
        .find('}')
        .ok_or_else(|| QlError::Usage(format!("Unclosed placeholder in '{}'", pattern)))?;

    let placeholder = &rest[..end];
    let number = match placeholder.strip_prefix(':') {
        None if placeholder.is_empty() => counter.to_string(),
        Some(width) => {
            let zero_pad = width.starts_with('0');
            let width: usize = width
                .trim_end_matches('d')
                .parse()
                .map_err(|_| QlError::Usage(format!("Invalid counter width in '{}'", pattern)))?;
            if zero_pad {
                format!("{:0width$}", counter, width = width)
            } else {
                format!("{:width$}", counter, width = width)
            }
        }
        None => {
            return Err(QlError::Usage(format!(
                "Invalid counter placeholder in '{}'",
                pattern
            )));
        }
    };

    Ok(format!("{}{}{}", &pattern[..start], number, &rest[end + 1..]))
}

// ============================================================================
// TESTS
// ============================================================================
