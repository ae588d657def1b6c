//! # Printer Module
//!
//! Printer-specific capability tables.
//!
//! ## Modules
//!
//! - [`models`]: Model capabilities and status frame identification codes

pub mod models;

pub use models::{ALL_MODELS, Model, RasterCommand};
