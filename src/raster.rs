//! # Page Builders
//!
//! Turn prepared raster rows into the per-page instruction blocks the
//! [print queue](crate::queue) writes to the printer.
//!
//! Rows are given in wire order: one byte per 8 dots, a set bit prints a
//! dot, and the dot order is the one the print head expects (the mirror
//! image of the label as read). Converting pictures into rows is left to
//! the caller.
//!
//! ## Page Layout
//!
//! ```text
//! [ESC i a 01]            raster mode (models with mode setting)
//! ESC i z ...             media, quality, row count, page index
//! [ESC i M / ESC i A]     auto cut, cut every N (models with a cutter)
//! [ESC i K]               expanded mode (models that understand it)
//! ESC i d                 margins
//! [M 02]                  compression (models that support it)
//! g / w / G / Z ...       one instruction per row (two for two-color rows)
//! FF | SUB                print
//! ```
//!
//! Invalidate and initialize are job-level and not part of a page block.

use log::{debug, warn};

use crate::error::{QlError, Result};
use crate::printer::{Model, RasterCommand};
use crate::protocol::commands::{self, ColorChannel, MediaInfo};
use crate::protocol::rle;

/// Builds page blocks for a [`PrintQueue`](crate::queue::PrintQueue).
pub trait PageBuilder {
    /// Whatever the builder turns into pages.
    type Job;

    /// Drop any state carried over from earlier pages.
    fn reset(&mut self);

    /// Bytes that flush the printer's command buffer.
    fn invalidate(&self) -> Vec<u8>;

    /// Set the index of the next page built. Page 0 is the first page of
    /// a job.
    fn seek_page(&mut self, page_number: usize);

    /// Build one block per page. Each block ends with a print instruction.
    fn build_pages(&mut self, job: Self::Job) -> Result<Vec<Vec<u8>>>;
}

// ============================================================================
// RASTER PAGE
// ============================================================================

/// One label worth of raster rows plus its print settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    /// Black (or only) channel rows
    pub black: Vec<Vec<u8>>,
    /// Red channel rows for two-color printing, one per black row
    pub red: Option<Vec<Vec<u8>>>,
    pub media: MediaInfo,
    /// Cut after this page
    pub cut: bool,
    /// Cut every N labels when `cut` is set
    pub cut_every: u8,
    pub high_resolution: bool,
    pub high_quality: bool,
    /// Feed margin in dots
    pub margin: u16,
    /// Run-length compress rows
    pub compress: bool,
}

impl RasterPage {
    pub fn new(black: Vec<Vec<u8>>) -> Self {
        Self {
            black,
            red: None,
            media: MediaInfo::default(),
            cut: true,
            cut_every: 1,
            high_resolution: false,
            high_quality: true,
            margin: 35,
            compress: false,
        }
    }

    pub fn with_red(mut self, red: Vec<Vec<u8>>) -> Self {
        self.red = Some(red);
        self
    }

    pub fn with_media(mut self, media: MediaInfo) -> Self {
        self.media = media;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_cut(mut self, cut: bool) -> Self {
        self.cut = cut;
        self
    }

    pub fn with_margin(mut self, dots: u16) -> Self {
        self.margin = dots;
        self
    }

    pub fn with_high_resolution(mut self, high_resolution: bool) -> Self {
        self.high_resolution = high_resolution;
        self
    }

    pub fn rows(&self) -> usize {
        self.black.len()
    }
}

// ============================================================================
// RASTER BUILDER
// ============================================================================

/// Encodes [`RasterPage`]s for one printer model.
#[derive(Debug, Clone)]
pub struct RasterBuilder {
    model: &'static Model,
    page_number: usize,
}

impl RasterBuilder {
    pub fn new(model: &'static Model) -> Self {
        Self {
            model,
            page_number: 0,
        }
    }

    pub fn model(&self) -> &'static Model {
        self.model
    }

    /// Encode a whole job as one stream: invalidate, initialize, then every
    /// page. All pages but the last end with FF, the last one with SUB.
    pub fn build_job(&mut self, pages: &[RasterPage]) -> Result<Vec<u8>> {
        let mut out = self.invalidate();
        out.extend(commands::initialize());
        self.page_number = 0;
        for (i, page) in pages.iter().enumerate() {
            let last = i + 1 == pages.len();
            out.extend(self.encode_page(page, last)?);
        }
        Ok(out)
    }

    /// Encode one page and advance the page counter.
    pub fn encode_page(&mut self, page: &RasterPage, last: bool) -> Result<Vec<u8>> {
        let model = self.model;
        let two_color = page.red.is_some();
        if two_color && !model.two_color {
            return Err(QlError::Usage(format!(
                "{} does not support two-color printing",
                model.identifier
            )));
        }
        if let Some(red) = &page.red {
            if red.len() != page.black.len() {
                return Err(QlError::Usage(format!(
                    "Two-color page needs as many red rows as black rows ({} vs {})",
                    red.len(),
                    page.black.len()
                )));
            }
        }

        let compress = if page.compress && !model.compression_support {
            warn!(
                "{} does not support compression, sending rows uncompressed",
                model.identifier
            );
            false
        } else {
            page.compress
        };

        let rows = u32::try_from(page.rows())
            .map_err(|_| QlError::Usage("Too many raster rows".into()))?;

        let mut out = Vec::new();
        if model.mode_setting {
            out.extend(commands::raster_mode());
        }
        out.extend(commands::media_and_quality(
            page.media,
            page.high_quality,
            rows,
            self.page_number == 0,
        ));
        if model.cutting {
            out.extend(commands::various_mode(page.cut));
            if page.cut {
                out.extend(commands::cut_every(page.cut_every));
            }
        }
        if model.expanded_mode {
            out.extend(commands::expanded_mode(
                two_color,
                page.cut,
                page.high_resolution,
            ));
        }
        out.extend(commands::margins(page.margin));
        if model.compression_support {
            out.extend(commands::compression(compress));
        }

        for (i, black) in page.black.iter().enumerate() {
            let black = self.pad_row(black)?;
            match &page.red {
                Some(red) => {
                    let red = self.pad_row(&red[i])?;
                    if compress && is_blank(&black) && is_blank(&red) {
                        out.extend(commands::zero_raster());
                        continue;
                    }
                    out.extend(commands::raster_row_two_color(
                        ColorChannel::Black,
                        &encode(&black, compress),
                    ));
                    out.extend(commands::raster_row_two_color(
                        ColorChannel::Red,
                        &encode(&red, compress),
                    ));
                }
                None => {
                    if compress && is_blank(&black) {
                        out.extend(commands::zero_raster());
                        continue;
                    }
                    let data = encode(&black, compress);
                    out.extend(match model.raster_command {
                        RasterCommand::Ql => commands::raster_row_ql(&data),
                        RasterCommand::PTouch => commands::raster_row_ptouch(&data),
                    });
                }
            }
        }

        out.extend(commands::print_page(last));
        debug!(
            "Built page {} ({} rows, {} bytes)",
            self.page_number + 1,
            rows,
            out.len()
        );
        self.page_number += 1;
        Ok(out)
    }

    fn pad_row(&self, row: &[u8]) -> Result<Vec<u8>> {
        let width = self.model.bytes_per_row as usize;
        if row.len() > width {
            return Err(QlError::Usage(format!(
                "Raster row of {} bytes exceeds the {} bytes per row of {}",
                row.len(),
                width,
                self.model.identifier
            )));
        }
        let mut padded = row.to_vec();
        padded.resize(width, 0);
        Ok(padded)
    }
}

impl PageBuilder for RasterBuilder {
    type Job = Vec<RasterPage>;

    fn reset(&mut self) {
        self.page_number = 0;
    }

    fn invalidate(&self) -> Vec<u8> {
        commands::invalidate(self.model.num_invalidate_bytes)
    }

    fn seek_page(&mut self, page_number: usize) {
        self.page_number = page_number;
    }

    /// Every block ends with SUB: the queue confirms each page on its own.
    fn build_pages(&mut self, job: Vec<RasterPage>) -> Result<Vec<Vec<u8>>> {
        job.iter().map(|page| self.encode_page(page, true)).collect()
    }
}

fn is_blank(row: &[u8]) -> bool {
    row.iter().all(|&b| b == 0)
}

fn encode(row: &[u8], compress: bool) -> Vec<u8> {
    if compress {
        rle::encode_row(row)
    } else {
        row.to_vec()
    }
}

// ============================================================================
// RAW PAGE BUILDER
// ============================================================================

/// Queues already encoded page blocks as they are.
#[derive(Debug, Clone)]
pub struct RawPageBuilder {
    invalidate_len: usize,
}

impl RawPageBuilder {
    pub fn new(model: &Model) -> Self {
        Self {
            invalidate_len: model.num_invalidate_bytes,
        }
    }
}

impl PageBuilder for RawPageBuilder {
    type Job = Vec<u8>;

    fn reset(&mut self) {}

    fn invalidate(&self) -> Vec<u8> {
        commands::invalidate(self.invalidate_len)
    }

    fn seek_page(&mut self, _page_number: usize) {}

    fn build_pages(&mut self, job: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        if job.is_empty() {
            return Err(QlError::Usage("Empty page block".into()));
        }
        Ok(vec![job])
    }
}

// ============================================================================
// TESTS
// ============================================================================
