//! # Printer Transport Layer
//!
//! This module provides the byte pipes used to talk to printers.
//!
//! A [`Transport`] only knows how to write bytes and to read whatever the
//! printer has sent back. Reads never block for long: when nothing is
//! available they return an empty buffer and the caller decides whether to
//! retry.
//!
//! ## Available Transports
//!
//! - [`device`]: Linux kernel USB printer device (`/dev/usb/lp0`)
//! - [`network`]: Raw TCP on port 9100 (write only)
//! - [`scripted`]: In-memory transport with canned responses, for tests and dry runs
//!
//! ## Identifiers
//!
//! [`open`] accepts the same printer identifiers as the CLI:
//!
//! | Identifier | Transport |
//! |------------|-----------|
//! | `file:///dev/usb/lp0` | kernel device |
//! | `/dev/usb/lp0` | kernel device |
//! | `tcp://192.168.1.21:9100` | network |
//! | `tcp://192.168.1.21` | network, default port |

pub mod device;
pub mod network;
pub mod scripted;

pub use device::DeviceTransport;
pub use network::NetworkTransport;
pub use scripted::ScriptedTransport;

use crate::error::{QlError, Result};

/// Default number of bytes requested per read (one status frame).
pub const DEFAULT_READ_LEN: usize = 32;

/// A bidirectional byte pipe to a printer.
pub trait Transport {
    /// Write all of `data`, failing on I/O errors.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `max_len` bytes. An empty buffer means no data right now.
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>>;

    /// Whether the printer can answer on this transport at all.
    fn supports_read(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>> {
        (**self).read(max_len)
    }

    fn supports_read(&self) -> bool {
        (**self).supports_read()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>> {
        (**self).read(max_len)
    }

    fn supports_read(&self) -> bool {
        (**self).supports_read()
    }
}

/// Parsed printer identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Device(String),
    Network { host: String, port: u16 },
}

impl Identifier {
    pub fn parse(identifier: &str) -> Result<Self> {
        if let Some(rest) = identifier.strip_prefix("tcp://") {
            let rest = rest.trim_end_matches('/');
            let (host, port) = match rest.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| {
                        QlError::Usage(format!("Invalid port in printer identifier: {}", identifier))
                    })?;
                    (host, port)
                }
                None => (rest, network::DEFAULT_PORT),
            };
            if host.is_empty() {
                return Err(QlError::Usage(format!(
                    "Missing host in printer identifier: {}",
                    identifier
                )));
            }
            return Ok(Self::Network {
                host: host.to_string(),
                port,
            });
        }

        let path = identifier.strip_prefix("file://").unwrap_or(identifier);
        if path.starts_with('/') {
            Ok(Self::Device(path.to_string()))
        } else {
            Err(QlError::Usage(format!(
                "Unsupported printer identifier '{}'. Use file:///dev/usb/lpN or tcp://host[:port]",
                identifier
            )))
        }
    }
}

/// Open a transport for a printer identifier.
pub fn open(identifier: &str) -> Result<Box<dyn Transport>> {
    match Identifier::parse(identifier)? {
        Identifier::Device(path) => Ok(Box::new(DeviceTransport::open(path)?)),
        Identifier::Network { host, port } => {
            Ok(Box::new(NetworkTransport::connect(&host, port)?))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
