//! # qlprint - Brother QL / PT Label Printer Library
//!
//! qlprint speaks the raster command protocol of Brother QL and PT label
//! printers. It provides:
//!
//! - **Protocol codec**: opcode table, instruction chunker, RLE rows, status frames
//! - **Page building**: raster rows to per-page instruction blocks
//! - **Reconstruction**: instruction streams back to page images
//! - **Print queue**: page-by-page submission with status confirmation
//! - **Transport**: kernel USB printer devices and raw TCP
//!
//! ## Quick Start
//!
//! ```no_run
//! use qlprint::{
//!     PrintQueue,
//!     printer::Model,
//!     raster::{RasterBuilder, RasterPage},
//!     transport::DeviceTransport,
//! };
//!
//! let transport = DeviceTransport::open("/dev/usb/lp0")?;
//! let model = Model::by_identifier("QL-820NWB").unwrap();
//!
//! let mut queue = PrintQueue::new(transport, RasterBuilder::new(model));
//!
//! // 100 rows with a solid bar on the leading edge
//! let rows = vec![vec![0xFF; 4]; 100];
//! queue.queue_page(vec![RasterPage::new(rows).with_compression(true)])?;
//!
//! let completed = queue.submit(false)?;
//! println!("completed: {}", completed);
//!
//! # Ok::<(), qlprint::error::QlError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Opcodes, chunker, RLE, status frames, command builders, merger |
//! | [`printer`] | Printer model capabilities |
//! | [`raster`] | Page builders |
//! | [`reader`] | Page image reconstruction |
//! | [`transport`] | Communication backends |
//! | [`device`] | Status waits and printer diagnostics |
//! | [`queue`] | Print queue state machine |
//! | [`error`] | Error types |

pub mod device;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod queue;
pub mod raster;
pub mod reader;
pub mod transport;

// Re-exports for convenience
pub use error::QlError;
pub use printer::Model;
pub use queue::PrintQueue;
pub use transport::Transport;
