//! # Status Frame Decoder
//!
//! The printer answers status requests (and reports progress on its own)
//! with a fixed 32-byte frame:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0-2 | Magic `80 20 42` |
//! | 3 | Series code |
//! | 4 | Model code |
//! | 8 | Error information 1 (bitmask) |
//! | 9 | Error information 2 (bitmask) |
//! | 10 | Media width (mm) |
//! | 11 | Media type |
//! | 17 | Media length (mm) |
//! | 18 | Status type |
//! | 19 | Phase type |
//! | 24 | Tape color |
//! | 25 | Text color |
//! | 30 | Requested setting (settings report only) |
//!
//! Decoding fails only for short frames and a wrong magic. Unknown status,
//! phase and media codes degrade to `Unknown` values with a logged warning;
//! unknown tape/text colors on TZe media are kept as
//! [`ColorInfo::Unrecognized`] so the failed lookup stays visible.

use log::{debug, error, log_enabled, warn};
use serde::Serialize;

use super::hex_format;
use crate::error::{QlError, Result};
use crate::printer::models::{ALL_MODELS, Model};

/// Length of a status frame in bytes.
pub const FRAME_LEN: usize = 32;

/// First three bytes of every status frame.
pub const MAGIC: [u8; 3] = [0x80, 0x20, 0x42];

/// Model name reported when series/model codes match no known model.
pub const UNKNOWN_MODEL: &str = "Unknown";

const OFF_SERIES: usize = 3;
const OFF_MODEL: usize = 4;
const OFF_ERROR_1: usize = 8;
const OFF_ERROR_2: usize = 9;
const OFF_MEDIA_WIDTH: usize = 10;
const OFF_MEDIA_TYPE: usize = 11;
const OFF_MEDIA_LENGTH: usize = 17;
const OFF_STATUS: usize = 18;
const OFF_PHASE: usize = 19;
const OFF_TAPE_COLOR: usize = 24;
const OFF_TEXT_COLOR: usize = 25;
const OFF_SETTING: usize = 30;

const BYTE_NAMES: [&str; FRAME_LEN] = [
    "Print head mark (0x80)",
    "Size (0x20)",
    "Brother code (B=0x42)",
    "Series code",
    "Model code",
    "Country code",
    "Power status",
    "Reserved",
    "Error information 1",
    "Error information 2",
    "Media width",
    "Media type",
    "Number of colors",
    "Media length (high)",
    "Media sensor value",
    "Mode",
    "Density",
    "Media length (low)",
    "Status type",
    "Phase type",
    "Phase number (high)",
    "Phase number (low)",
    "Notification number",
    "Expansion area",
    "Tape color information",
    "Text color information",
    "Hardware settings 1",
    "Hardware settings 2",
    "Hardware settings 3",
    "Hardware settings 4",
    "Requested setting",
    "Reserved",
];

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Error information 1, indexed by bit.
pub const ERROR_INFORMATION_1: [&str; 8] = [
    "No media when printing",
    "End of media (die-cut size only)",
    "Tape cutter jam",
    "Weak batteries",
    "Main unit in use (QL-560/650TD/1050)",
    "Printer turned off",
    "High-voltage adapter (not used)",
    "Fan doesn't work (QL-1050/1060N)",
];

/// Error information 2, indexed by bit.
pub const ERROR_INFORMATION_2: [&str; 8] = [
    "Replace media error",
    "Expansion buffer full error",
    "Transmission / Communication error",
    "Communication buffer full error (not used)",
    "Cover opened while printing (Except QL-500)",
    "Cancel key (not used) or Overheating error (PT-E550W/P750W/P710BT)",
    "Media cannot be fed (also when the media end is detected)",
    "System error",
];

const MEDIA_TYPES: &[(u8, &str, MediaCategory)] = &[
    (0x00, "No media", MediaCategory::None),
    (0x01, "Laminated tape", MediaCategory::TZe),
    (0x03, "Non-laminated type", MediaCategory::TZe),
    (0x11, "Heat-Shrink Tube (HS 2:1)", MediaCategory::TZe),
    (0x17, "Heat-Shrink Tube (HS 3:1)", MediaCategory::TZe),
    (0x0A, "Continuous length tape", MediaCategory::DK),
    (0x0B, "Die-cut labels", MediaCategory::DK),
    (0x4A, "Continuous length tape", MediaCategory::RD),
    (0x4B, "Die-cut labels", MediaCategory::RD),
    (0xFF, "Incompatible tape", MediaCategory::Incompatible),
];

/// TZe tape colors. 0xF0 is reported as "Cleaning"; some older tools spell
/// it "Clearning", so serialized status output differs from theirs there.
const TAPE_COLORS: &[(u8, &str)] = &[
    (0x01, "White"),
    (0x02, "Other"),
    (0x03, "Clear"),
    (0x04, "Red"),
    (0x05, "Blue"),
    (0x06, "Yellow"),
    (0x07, "Green"),
    (0x08, "Black"),
    (0x09, "Clear(White text)"),
    (0x20, "Matte White"),
    (0x21, "Matte Clear"),
    (0x22, "Matte Silver"),
    (0x23, "Satin Gold"),
    (0x24, "Satin Silver"),
    (0x30, "Blue(D)"),
    (0x31, "Red(D)"),
    (0x40, "Fluorescent Orange"),
    (0x41, "Fluorescent Yellow"),
    (0x50, "Berry Pink(S)"),
    (0x51, "Light Gray(S)"),
    (0x52, "Lime Green(S)"),
    (0x60, "Yellow(F)"),
    (0x61, "Pink(F)"),
    (0x62, "Blue(F)"),
    (0x70, "White(Heat-shrink Tube)"),
    (0x90, "White(Flex. ID)"),
    (0x91, "Yellow(Flex. ID)"),
    (0xF0, "Cleaning"),
    (0xF1, "Stencil"),
    (0xFF, "Incompatible"),
];

const TEXT_COLORS: &[(u8, &str)] = &[
    (0x01, "White"),
    (0x02, "Other"),
    (0x04, "Red"),
    (0x05, "Blue"),
    (0x08, "Black"),
    (0x0A, "Gold"),
    (0x62, "Blue(F)"),
    (0xF0, "Cleaning"),
    (0xF1, "Stencil"),
    (0xFF, "Incompatible"),
];

fn lookup(table: &[(u8, &'static str)], code: u8) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

// ============================================================================
// STATUS / PHASE / MEDIA TYPES
// ============================================================================

/// Status type (byte 18).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusType {
    ReplyToStatus,
    PrintingCompleted,
    ErrorOccurred,
    ExitIFMode,
    TurnedOff,
    Notification,
    PhaseChange,
    SettingsReport,
    Unknown,
}

impl StatusType {
    pub const REPLY_TO_STATUS: u8 = 0x00;
    pub const PRINTING_COMPLETED: u8 = 0x01;
    pub const PHASE_CHANGE: u8 = 0x06;
    pub const SETTINGS_REPORT: u8 = 0xF0;

    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::ReplyToStatus,
            0x01 => Self::PrintingCompleted,
            0x02 => Self::ErrorOccurred,
            0x03 => Self::ExitIFMode,
            0x04 => Self::TurnedOff,
            0x05 => Self::Notification,
            0x06 => Self::PhaseChange,
            0xF0 => Self::SettingsReport,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ReplyToStatus => "Reply to status request",
            Self::PrintingCompleted => "Printing completed",
            Self::ErrorOccurred => "Error occurred",
            Self::ExitIFMode => "Exit IF mode",
            Self::TurnedOff => "Turned off",
            Self::Notification => "Notification",
            Self::PhaseChange => "Phase change",
            Self::SettingsReport => "Settings report",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Phase type (byte 19).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhaseType {
    WaitingToReceive,
    PrintingState,
    Unknown,
}

impl PhaseType {
    pub const WAITING_TO_RECEIVE: u8 = 0x00;
    pub const PRINTING_STATE: u8 = 0x01;

    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::WaitingToReceive,
            0x01 => Self::PrintingState,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::WaitingToReceive => "Waiting to receive",
            Self::PrintingState => "Printing state",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PhaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Media family reported by the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaCategory {
    None,
    TZe,
    DK,
    RD,
    Incompatible,
    Unknown,
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "No media",
            Self::TZe => "TZe",
            Self::DK => "DK",
            Self::RD => "RD",
            Self::Incompatible => "Incompatible",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Result of a tape or text color lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorInfo {
    Named(&'static str),
    /// The color code is not in the table
    Unrecognized(u8),
}

impl std::fmt::Display for ColorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Unrecognized(code) => write!(f, "Unrecognized (0x{:02X})", code),
        }
    }
}

/// How an unknown media type code is treated during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownMediaPolicy {
    /// Log an error and return the frame with media type `None`
    #[default]
    Lenient,
    /// Fail with [`QlError::UnknownMedia`]
    Strict,
}

// ============================================================================
// STATUS FRAME
// ============================================================================

/// A decoded status frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFrame {
    pub series_code: u8,
    pub model_code: u8,
    pub model: &'static str,
    pub status_code: u8,
    pub status_type: StatusType,
    pub phase_code: u8,
    pub phase_type: PhaseType,
    pub errors: Vec<&'static str>,
    pub media_width: u8,
    pub media_length: u8,
    pub media_type_code: u8,
    pub media_type: Option<&'static str>,
    pub media_category: MediaCategory,
    pub tape_color: Option<ColorInfo>,
    pub text_color: Option<ColorInfo>,
    pub setting: Option<u8>,
}

impl StatusFrame {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Status frame decoder.
///
/// Carries the model table used for name resolution and the policy for
/// unknown media codes.
#[derive(Debug, Clone, Copy)]
pub struct StatusDecoder<'m> {
    models: &'m [Model],
    media_policy: UnknownMediaPolicy,
}

impl Default for StatusDecoder<'static> {
    fn default() -> Self {
        Self {
            models: ALL_MODELS,
            media_policy: UnknownMediaPolicy::Lenient,
        }
    }
}

impl<'m> StatusDecoder<'m> {
    pub fn with_models(models: &'m [Model]) -> Self {
        Self {
            models,
            media_policy: UnknownMediaPolicy::Lenient,
        }
    }

    pub fn media_policy(mut self, policy: UnknownMediaPolicy) -> Self {
        self.media_policy = policy;
        self
    }

    /// Decode a status frame. Bytes past offset 31 are ignored.
    pub fn decode(&self, data: &[u8]) -> Result<StatusFrame> {
        if data.len() < FRAME_LEN {
            return Err(QlError::ShortFrame { len: data.len() });
        }
        if data[..3] != MAGIC {
            return Err(QlError::BadMagic {
                head: hex_format(&data[..3]),
            });
        }

        if log_enabled!(log::Level::Debug) {
            for (i, name) in BYTE_NAMES.iter().enumerate() {
                debug!("Byte {:2} {:>24} {:02X}", i, format!("{}:", name), data[i]);
            }
        }

        let series_code = data[OFF_SERIES];
        let model_code = data[OFF_MODEL];

        let mut errors = Vec::new();
        for (mask, table) in [
            (data[OFF_ERROR_1], &ERROR_INFORMATION_1),
            (data[OFF_ERROR_2], &ERROR_INFORMATION_2),
        ] {
            for (bit, text) in table.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    error!("Error: {}", text);
                    errors.push(*text);
                }
            }
        }

        let media_type_code = data[OFF_MEDIA_TYPE];
        let (media_type, media_category) =
            match MEDIA_TYPES.iter().find(|(code, _, _)| *code == media_type_code) {
                Some((_, name, category)) => {
                    debug!("Media type: {}", name);
                    (Some(*name), *category)
                }
                None => {
                    if self.media_policy == UnknownMediaPolicy::Strict {
                        return Err(QlError::UnknownMedia {
                            code: media_type_code,
                        });
                    }
                    error!("Unknown media type {:02X}", media_type_code);
                    (None, MediaCategory::Unknown)
                }
            };

        let (tape_color, text_color) = if media_category == MediaCategory::TZe {
            (
                Some(color(TAPE_COLORS, data[OFF_TAPE_COLOR], "tape")),
                Some(color(TEXT_COLORS, data[OFF_TEXT_COLOR], "text")),
            )
        } else {
            (None, None)
        };

        let status_code = data[OFF_STATUS];
        let status_type = StatusType::from_code(status_code);
        if status_type == StatusType::Unknown {
            warn!("Unknown status type {:02X}", status_code);
        } else {
            debug!("Status type: {}", status_type);
        }

        let phase_code = data[OFF_PHASE];
        let phase_type = PhaseType::from_code(phase_code);
        if phase_type == PhaseType::Unknown {
            warn!("Unknown phase type {:02X}", phase_code);
        } else {
            debug!("Phase type: {}", phase_type);
        }

        let setting = if status_code == StatusType::SETTINGS_REPORT {
            debug!("Settings report detected");
            Some(data[OFF_SETTING])
        } else {
            None
        };

        let model = self
            .models
            .iter()
            .find(|m| m.series_code == series_code && m.model_code == model_code)
            .map_or(UNKNOWN_MODEL, |m| m.identifier);

        Ok(StatusFrame {
            series_code,
            model_code,
            model,
            status_code,
            status_type,
            phase_code,
            phase_type,
            errors,
            media_width: data[OFF_MEDIA_WIDTH],
            media_length: data[OFF_MEDIA_LENGTH],
            media_type_code,
            media_type,
            media_category,
            tape_color,
            text_color,
            setting,
        })
    }
}

fn color(table: &[(u8, &'static str)], code: u8, what: &str) -> ColorInfo {
    match lookup(table, code) {
        Some(name) => ColorInfo::Named(name),
        None => {
            error!("Unknown {} color {:02X}", what, code);
            ColorInfo::Unrecognized(code)
        }
    }
}

/// Decode with the built-in model table and lenient media handling.
pub fn decode(data: &[u8]) -> Result<StatusFrame> {
    StatusDecoder::default().decode(data)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn frame() -> [u8; FRAME_LEN] {
        let mut f = [0u8; FRAME_LEN];
        f[..3].copy_from_slice(&MAGIC);
        f
    }

    #[test]
    fn test_ql800_idle_fixture() {
        let mut f = frame();
        f[3] = 0x34;
        f[4] = 0x38;
        let status = decode(&f).unwrap();
        assert_eq!(status.status_type.label(), "Reply to status request");
        assert_eq!(status.phase_type.label(), "Waiting to receive");
        assert!(status.errors.is_empty());
        assert_eq!(status.model, "QL-800");
        assert_eq!(status.media_type, Some("No media"));
        assert_eq!(status.media_category, MediaCategory::None);
        assert_eq!(status.tape_color, None);
        assert_eq!(status.setting, None);
    }

    #[test]
    fn test_error_bit_fixture() {
        let mut f = frame();
        f[8] = 0x01;
        assert_eq!(decode(&f).unwrap().errors, vec!["No media when printing"]);
    }

    #[test]
    fn test_error_order_info1_before_info2() {
        let mut f = frame();
        f[8] = 0b1000_0100;
        f[9] = 0b0001_0001;
        assert_eq!(
            decode(&f).unwrap().errors,
            vec![
                "Tape cutter jam",
                "Fan doesn't work (QL-1050/1060N)",
                "Replace media error",
                "Cover opened while printing (Except QL-500)",
            ]
        );
    }

    #[test]
    fn test_short_frame() {
        let err = decode(&frame()[..31]).unwrap_err();
        assert!(matches!(err, QlError::ShortFrame { len: 31 }));
    }

    #[test]
    fn test_bad_magic() {
        let mut f = frame();
        f[2] = 0x43;
        let err = decode(&f).unwrap_err();
        assert!(matches!(err, QlError::BadMagic { ref head } if head == "80 20 43"));
    }

    #[test]
    fn test_longer_buffer_is_accepted() {
        let mut data = frame().to_vec();
        data.extend([0xAA; 8]);
        assert!(decode(&data).is_ok());
    }

    #[test]
    fn test_media_fields() {
        let mut f = frame();
        f[10] = 62;
        f[11] = 0x0A;
        f[17] = 0;
        let status = decode(&f).unwrap();
        assert_eq!(status.media_width, 62);
        assert_eq!(status.media_type, Some("Continuous length tape"));
        assert_eq!(status.media_category, MediaCategory::DK);
        assert_eq!(status.text_color, None);
    }

    #[test]
    fn test_tze_colors() {
        let mut f = frame();
        f[11] = 0x01;
        f[24] = 0x06;
        f[25] = 0x08;
        let status = decode(&f).unwrap();
        assert_eq!(status.media_category, MediaCategory::TZe);
        assert_eq!(status.tape_color, Some(ColorInfo::Named("Yellow")));
        assert_eq!(status.text_color, Some(ColorInfo::Named("Black")));
    }

    #[test]
    fn test_tze_unrecognized_color() {
        let mut f = frame();
        f[11] = 0x03;
        f[24] = 0x77;
        f[25] = 0x01;
        let status = decode(&f).unwrap();
        assert_eq!(status.tape_color, Some(ColorInfo::Unrecognized(0x77)));
        assert_eq!(status.text_color, Some(ColorInfo::Named("White")));
    }

    #[test]
    fn test_unknown_media_lenient() {
        let mut f = frame();
        f[11] = 0x42;
        let status = decode(&f).unwrap();
        assert_eq!(status.media_type, None);
        assert_eq!(status.media_category, MediaCategory::Unknown);
    }

    #[test]
    fn test_unknown_media_strict() {
        let mut f = frame();
        f[11] = 0x42;
        let err = StatusDecoder::default()
            .media_policy(UnknownMediaPolicy::Strict)
            .decode(&f)
            .unwrap_err();
        assert!(matches!(err, QlError::UnknownMedia { code: 0x42 }));
    }

    #[test]
    fn test_settings_report() {
        let mut f = frame();
        f[18] = StatusType::SETTINGS_REPORT;
        f[30] = 0x03;
        let status = decode(&f).unwrap();
        assert_eq!(status.status_type, StatusType::SettingsReport);
        assert_eq!(status.setting, Some(0x03));

        f[18] = 0x00;
        assert_eq!(decode(&f).unwrap().setting, None);
    }

    #[test]
    fn test_unknown_status_and_phase() {
        let mut f = frame();
        f[18] = 0x44;
        f[19] = 0x09;
        let status = decode(&f).unwrap();
        assert_eq!(status.status_type, StatusType::Unknown);
        assert_eq!(status.status_code, 0x44);
        assert_eq!(status.phase_type, PhaseType::Unknown);
        assert_eq!(status.phase_code, 0x09);
    }

    #[test]
    fn test_unknown_model() {
        let mut f = frame();
        f[3] = 0x99;
        assert_eq!(decode(&f).unwrap().model, UNKNOWN_MODEL);
    }

    #[test]
    fn test_custom_model_table() {
        let mut f = frame();
        f[3] = 0x34;
        f[4] = 0x38;
        let decoder = StatusDecoder::with_models(&[]);
        assert_eq!(decoder.decode(&f).unwrap().model, UNKNOWN_MODEL);
    }

    proptest! {
        #[test]
        fn prop_decode_is_total(rest in proptest::collection::vec(any::<u8>(), 29..64)) {
            let mut data = MAGIC.to_vec();
            data.extend(rest);
            prop_assert!(decode(&data).is_ok());
        }

        #[test]
        fn prop_short_frames_fail(data in proptest::collection::vec(any::<u8>(), 0..32)) {
            let is_short = matches!(decode(&data), Err(QlError::ShortFrame { .. }));
            prop_assert!(is_short);
        }
    }
}
