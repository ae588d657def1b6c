//! # Raster Command Builders
//!
//! Builders for the control blocks and raster instructions sent to QL and
//! PT series printers. Every function returns the exact bytes of one
//! instruction (or, for [`invalidate`], a run of preamble bytes).
//!
//! ## Escape Sequence Structure
//!
//! - Single byte: `Z` (zero raster), `FF` (print page), `SUB` (print last page)
//! - `ESC @`: initialize
//! - `ESC i x ...`: most job and mode settings
//! - `ESC i U x ...`: printer settings (read/write)
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding.

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// FF (Form Feed) - print page, more pages follow
pub const FF: u8 = 0x0C;

/// SUB - print the last page of a job
pub const SUB: u8 = 0x1A;

/// Compression mode byte selecting the run-length scheme
pub const COMPRESSION_RLE: u8 = 0x02;

/// Two-color raster channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Black = 0x01,
    Red = 0x02,
}

/// Little-endian bytes of a u16
#[inline]
pub fn u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

// ============================================================================
// JOB CONTROL
// ============================================================================

/// # Invalidate
///
/// A run of NUL bytes that flushes whatever is left in the printer's command
/// buffer. QL-8xx models need 400 bytes, most others 200.
pub fn invalidate(count: usize) -> Vec<u8> {
    vec![0x00; count]
}

/// # Initialize (ESC @)
///
/// | Format | Bytes |
/// |--------|-------|
/// | ASCII  | ESC @ |
/// | Hex    | 1B 40 |
///
/// ```
/// use qlprint::protocol::commands;
/// assert_eq!(commands::initialize(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn initialize() -> Vec<u8> {
    vec![ESC, b'@']
}

/// # Status Information Request (ESC i S)
///
/// The printer answers with one 32-byte status frame.
#[inline]
pub fn status_request() -> Vec<u8> {
    vec![ESC, b'i', b'S']
}

/// # Switch to Raster Mode (ESC i a 01)
#[inline]
pub fn raster_mode() -> Vec<u8> {
    vec![ESC, b'i', b'a', 0x01]
}

/// # Automatic Status Notification (ESC i !)
///
/// `0x00` enables notifications, `0x01` disables them.
#[inline]
pub fn automatic_status(enabled: bool) -> Vec<u8> {
    vec![ESC, b'i', b'!', if enabled { 0x00 } else { 0x01 }]
}

/// # Read Printer Setting (ESC i U id 01 [payload])
///
/// The printer answers with a settings report status frame carrying the
/// value in byte 30.
pub fn read_setting(setting: u8, payload: &[u8]) -> Vec<u8> {
    let mut cmd = vec![ESC, b'i', b'U', setting, 0x01];
    cmd.extend_from_slice(payload);
    cmd
}

/// # Write Printer Setting (ESC i U id 00 payload)
pub fn write_setting(setting: u8, payload: &[u8]) -> Vec<u8> {
    let mut cmd = vec![ESC, b'i', b'U', setting, 0x00];
    cmd.extend_from_slice(payload);
    cmd
}

// ============================================================================
// PAGE SETUP
// ============================================================================

/// Media information carried by the media/quality instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaInfo {
    /// Media type code (`0x0A` continuous, `0x0B` die-cut, ...)
    pub media_type: Option<u8>,
    /// Media width in mm
    pub width_mm: Option<u8>,
    /// Media length in mm (0 for continuous tape)
    pub length_mm: Option<u8>,
}

/// # Print Media and Quality (ESC i z)
///
/// ## Payload (10 bytes)
///
/// | Byte | Meaning |
/// |------|---------|
/// | 0 | Valid flags: 0x80 always, 0x02 type, 0x04 width, 0x08 length, 0x40 quality |
/// | 1 | Media type |
/// | 2 | Media width (mm) |
/// | 3 | Media length (mm) |
/// | 4-7 | Raster row count (u32 LE) |
/// | 8 | 0 for the first page, 1 otherwise |
/// | 9 | Reserved (0) |
pub fn media_and_quality(media: MediaInfo, high_quality: bool, rows: u32, first_page: bool) -> Vec<u8> {
    let mut flags = 0x80u8;
    if media.media_type.is_some() {
        flags |= 0x02;
    }
    if media.width_mm.is_some() {
        flags |= 0x04;
    }
    if media.length_mm.is_some() {
        flags |= 0x08;
    }
    if high_quality {
        flags |= 0x40;
    }

    let mut cmd = vec![ESC, b'i', b'z', flags];
    cmd.push(media.media_type.unwrap_or(0));
    cmd.push(media.width_mm.unwrap_or(0));
    cmd.push(media.length_mm.unwrap_or(0));
    cmd.extend_from_slice(&rows.to_le_bytes());
    cmd.push(if first_page { 0 } else { 1 });
    cmd.push(0);
    cmd
}

/// # Various Mode Settings (ESC i M)
///
/// Bit 6 enables the automatic cutter.
#[inline]
pub fn various_mode(autocut: bool) -> Vec<u8> {
    vec![ESC, b'i', b'M', if autocut { 1 << 6 } else { 0 }]
}

/// # Cut Every N Labels (ESC i A n)
#[inline]
pub fn cut_every(n: u8) -> Vec<u8> {
    vec![ESC, b'i', b'A', n]
}

/// # Expanded Mode (ESC i K)
///
/// | Bit | Meaning |
/// |-----|---------|
/// | 0 | Two-color printing |
/// | 3 | Cut at end |
/// | 6 | High resolution (600 dpi feed direction) |
pub fn expanded_mode(two_color: bool, cut_at_end: bool, high_resolution: bool) -> Vec<u8> {
    let mut flags = 0u8;
    if two_color {
        flags |= 1 << 0;
    }
    if cut_at_end {
        flags |= 1 << 3;
    }
    if high_resolution {
        flags |= 1 << 6;
    }
    vec![ESC, b'i', b'K', flags]
}

/// # Margin Amount (ESC i d nL nH)
///
/// Feed margin in dots.
pub fn margins(dots: u16) -> Vec<u8> {
    let [lo, hi] = u16_le(dots);
    vec![ESC, b'i', b'd', lo, hi]
}

/// # Compression Mode (M n)
///
/// `0x02` enables the run-length scheme for all following raster rows.
#[inline]
pub fn compression(enabled: bool) -> Vec<u8> {
    vec![b'M', if enabled { COMPRESSION_RLE } else { 0x00 }]
}

// ============================================================================
// RASTER DATA
// ============================================================================

/// # Raster Graphics Transfer, QL series (g 00 n d1...dn)
///
/// `row` is sent as-is (already compressed, if compression is on) and must
/// fit in 255 bytes.
pub fn raster_row_ql(row: &[u8]) -> Vec<u8> {
    debug_assert!(row.len() <= u8::MAX as usize);
    let mut cmd = Vec::with_capacity(3 + row.len());
    cmd.push(b'g');
    cmd.push(0x00);
    cmd.push(row.len() as u8);
    cmd.extend_from_slice(row);
    cmd
}

/// # Two-Color Raster Graphics Transfer (w c n d1...dn)
pub fn raster_row_two_color(channel: ColorChannel, row: &[u8]) -> Vec<u8> {
    debug_assert!(row.len() <= u8::MAX as usize);
    let mut cmd = Vec::with_capacity(3 + row.len());
    cmd.push(b'w');
    cmd.push(channel as u8);
    cmd.push(row.len() as u8);
    cmd.extend_from_slice(row);
    cmd
}

/// # Raster Graphics Transfer, PT series (G nL nH d1...dk)
pub fn raster_row_ptouch(row: &[u8]) -> Vec<u8> {
    debug_assert!(row.len() <= u16::MAX as usize);
    let [lo, hi] = u16_le(row.len() as u16);
    let mut cmd = Vec::with_capacity(3 + row.len());
    cmd.push(b'G');
    cmd.push(lo);
    cmd.push(hi);
    cmd.extend_from_slice(row);
    cmd
}

/// # Zero Raster (Z)
///
/// An all-white row; only valid while compression is enabled.
#[inline]
pub fn zero_raster() -> Vec<u8> {
    vec![b'Z']
}

/// # Print Page (FF / SUB)
///
/// `last` selects SUB (print and end the job) over FF (more pages follow).
#[inline]
pub fn print_page(last: bool) -> Vec<u8> {
    vec![if last { SUB } else { FF }]
}

// ============================================================================
// TESTS
// ============================================================================
