//! # Printer Models
//!
//! Hardware capabilities of the supported label printers.
//!
//! ## Usage
//!
//! ```
//! use qlprint::printer::Model;
//!
//! let model = Model::by_identifier("QL-820NWB").unwrap();
//! assert!(model.two_color);
//! println!("{} bytes per row, {} dots wide", model.bytes_per_row, model.width_dots());
//! ```

/// Raster instruction used by a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterCommand {
    /// `g 00 n ...` (QL series)
    Ql,
    /// `G nL nH ...` (PT series)
    PTouch,
}

/// # Printer Model
///
/// Defines the characteristics of one printer model.
///
/// ## Physical Properties
///
/// - **min_max_length_dots**: Printable length range in dots; together with
///   the 300 dpi resolution this bounds continuous tape labels
/// - **min_max_feed**: Feed margin range in dots
/// - **bytes_per_row**: Raster row width in bytes (print head dots / 8)
/// - **additional_offset_r**: Extra offset from the right edge in dots
///
/// ## Protocol Capabilities
///
/// - **mode_setting**: Each page starts by switching to raster mode with
///   `ESC i a`
/// - **cutting**: Has an automatic cutter
/// - **expanded_mode**: Understands `ESC i K`
/// - **compression_support**: Accepts run-length compressed rows
/// - **two_color**: Black/red printing on DK-22251 tape
/// - **num_invalidate_bytes**: Length of the invalidate preamble
///
/// ## Identification
///
/// `series_code`/`model_code` are reported in status frames bytes 3 and 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub identifier: &'static str,
    pub min_max_length_dots: (u32, u32),
    pub min_max_feed: (u16, u16),
    pub bytes_per_row: u16,
    pub additional_offset_r: u16,
    pub mode_setting: bool,
    pub cutting: bool,
    pub expanded_mode: bool,
    pub compression_support: bool,
    pub two_color: bool,
    pub num_invalidate_bytes: usize,
    pub raster_command: RasterCommand,
    pub series_code: u8,
    pub model_code: u8,
    pub product_id: u16,
}

impl Model {
    const BASE: Self = Self {
        identifier: "",
        min_max_length_dots: (150, 11811),
        min_max_feed: (35, 1500),
        bytes_per_row: 90,
        additional_offset_r: 0,
        mode_setting: true,
        cutting: true,
        expanded_mode: true,
        compression_support: true,
        two_color: false,
        num_invalidate_bytes: 200,
        raster_command: RasterCommand::Ql,
        series_code: 0xFF,
        model_code: 0xFF,
        product_id: 0xFFFF,
    };

    /// Print head width in dots
    #[inline]
    pub fn width_dots(&self) -> u32 {
        self.bytes_per_row as u32 * 8
    }

    /// Find a model by its identifier (case-insensitive).
    pub fn by_identifier(identifier: &str) -> Option<&'static Model> {
        ALL_MODELS
            .iter()
            .find(|m| m.identifier.eq_ignore_ascii_case(identifier))
    }

    /// Find the first model reporting these codes in its status frames.
    pub fn by_codes(series_code: u8, model_code: u8) -> Option<&'static Model> {
        ALL_MODELS
            .iter()
            .find(|m| m.series_code == series_code && m.model_code == model_code)
    }

    /// All model identifiers, in table order.
    pub fn identifiers() -> impl Iterator<Item = &'static str> {
        ALL_MODELS.iter().map(|m| m.identifier)
    }
}

impl Default for Model {
    fn default() -> Self {
        ALL_MODELS[0]
    }
}

const QL_LEGACY: Model = Model {
    compression_support: false,
    mode_setting: false,
    ..Model::BASE
};

const QL_WIDE: Model = Model {
    min_max_length_dots: (295, 35433),
    bytes_per_row: 162,
    additional_offset_r: 44,
    ..Model::BASE
};

const QL_8XX: Model = Model {
    two_color: true,
    num_invalidate_bytes: 400,
    ..Model::BASE
};

const PT: Model = Model {
    bytes_per_row: 16,
    raster_command: RasterCommand::PTouch,
    ..Model::BASE
};

/// The model table.
///
/// Some models share series/model codes (QL-500/QL-550, PT-E550W/PT-P750W);
/// status decoding reports the first match.
pub const ALL_MODELS: &[Model] = &[
    Model {
        identifier: "QL-500",
        min_max_length_dots: (295, 11811),
        expanded_mode: false,
        cutting: false,
        series_code: 0x30,
        model_code: 0x4F,
        product_id: 0x2015,
        ..QL_LEGACY
    },
    Model {
        identifier: "QL-550",
        min_max_length_dots: (295, 11811),
        series_code: 0x30,
        model_code: 0x4F,
        product_id: 0x2016,
        ..QL_LEGACY
    },
    Model {
        identifier: "QL-560",
        min_max_length_dots: (295, 11811),
        series_code: 0x34,
        model_code: 0x31,
        product_id: 0x2027,
        ..QL_LEGACY
    },
    Model {
        identifier: "QL-570",
        series_code: 0x34,
        model_code: 0x32,
        product_id: 0x2028,
        ..QL_LEGACY
    },
    Model {
        identifier: "QL-580N",
        series_code: 0x34,
        model_code: 0x33,
        product_id: 0x2029,
        ..Model::BASE
    },
    Model {
        identifier: "QL-600",
        series_code: 0x34,
        model_code: 0x47,
        product_id: 0x20C0,
        ..Model::BASE
    },
    Model {
        identifier: "QL-650TD",
        min_max_length_dots: (295, 11811),
        series_code: 0x30,
        model_code: 0x51,
        product_id: 0x201B,
        ..Model::BASE
    },
    Model {
        identifier: "QL-700",
        series_code: 0x34,
        model_code: 0x35,
        product_id: 0x2042,
        ..QL_LEGACY
    },
    Model {
        identifier: "QL-710W",
        series_code: 0x34,
        model_code: 0x36,
        product_id: 0x2043,
        ..Model::BASE
    },
    Model {
        identifier: "QL-720NW",
        series_code: 0x34,
        model_code: 0x37,
        product_id: 0x2044,
        ..Model::BASE
    },
    Model {
        identifier: "QL-800",
        compression_support: false,
        series_code: 0x34,
        model_code: 0x38,
        product_id: 0x209B,
        ..QL_8XX
    },
    Model {
        identifier: "QL-810W",
        series_code: 0x34,
        model_code: 0x39,
        product_id: 0x209C,
        ..QL_8XX
    },
    Model {
        identifier: "QL-820NWB",
        series_code: 0x34,
        model_code: 0x41,
        product_id: 0x209D,
        ..QL_8XX
    },
    Model {
        identifier: "QL-1050",
        series_code: 0x30,
        model_code: 0x50,
        product_id: 0x2020,
        ..QL_WIDE
    },
    Model {
        identifier: "QL-1060N",
        series_code: 0x34,
        model_code: 0x34,
        product_id: 0x202A,
        ..QL_WIDE
    },
    Model {
        identifier: "QL-1100",
        min_max_length_dots: (301, 35434),
        series_code: 0x34,
        model_code: 0x43,
        product_id: 0x20A7,
        ..QL_WIDE
    },
    Model {
        identifier: "QL-1110NWB",
        min_max_length_dots: (301, 35434),
        series_code: 0x34,
        model_code: 0x44,
        product_id: 0x20A8,
        ..QL_WIDE
    },
    Model {
        identifier: "QL-1115NWB",
        min_max_length_dots: (301, 35434),
        series_code: 0x34,
        model_code: 0x45,
        product_id: 0x20AB,
        ..QL_WIDE
    },
    Model {
        identifier: "PT-E550W",
        min_max_length_dots: (31, 14172),
        series_code: 0x30,
        model_code: 0x68,
        product_id: 0x2060,
        ..PT
    },
    Model {
        identifier: "PT-P700",
        min_max_length_dots: (31, 7086),
        series_code: 0x30,
        model_code: 0x67,
        product_id: 0x2061,
        ..PT
    },
    Model {
        identifier: "PT-P750W",
        min_max_length_dots: (31, 7086),
        series_code: 0x30,
        model_code: 0x68,
        product_id: 0x2062,
        ..PT
    },
    Model {
        identifier: "PT-P900W",
        min_max_length_dots: (57, 28346),
        bytes_per_row: 70,
        series_code: 0x30,
        model_code: 0x69,
        product_id: 0x2085,
        ..PT
    },
    Model {
        identifier: "PT-P950NW",
        min_max_length_dots: (57, 28346),
        bytes_per_row: 70,
        series_code: 0x30,
        model_code: 0x70,
        product_id: 0x2086,
        ..PT
    },
];

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_identifier() {
        let model = Model::by_identifier("ql-800").unwrap();
        assert_eq!(model.identifier, "QL-800");
        assert!(model.two_color);
        assert!(!model.compression_support);
        assert_eq!(model.num_invalidate_bytes, 400);
        assert!(Model::by_identifier("QL-9999").is_none());
    }

    #[test]
    fn test_lookup_by_codes_returns_first_match() {
        assert_eq!(Model::by_codes(0x30, 0x4F).unwrap().identifier, "QL-500");
        assert_eq!(Model::by_codes(0x30, 0x68).unwrap().identifier, "PT-E550W");
        assert!(Model::by_codes(0x00, 0x00).is_none());
    }

    #[test]
    fn test_wide_models() {
        let model = Model::by_identifier("QL-1100").unwrap();
        assert_eq!(model.bytes_per_row, 162);
        assert_eq!(model.width_dots(), 1296);
        assert_eq!(model.additional_offset_r, 44);
    }

    #[test]
    fn test_ptouch_models_use_g_raster() {
        for model in ALL_MODELS.iter().filter(|m| m.identifier.starts_with("PT-")) {
            assert_eq!(model.raster_command, RasterCommand::PTouch);
        }
        assert_eq!(Model::default().raster_command, RasterCommand::Ql);
    }

    #[test]
    fn test_identifiers_unique() {
        let ids: Vec<_> = Model::identifiers().collect();
        for (i, id) in ids.iter().enumerate() {
            assert!(!ids[i + 1..].contains(id), "duplicate {}", id);
        }
    }
}
