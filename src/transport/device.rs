//! # Kernel USB Printer Device Transport
//!
//! Talks to a printer through the Linux `usblp` driver, which exposes each
//! USB printer as a character device (`/dev/usb/lp0`, `/dev/usb/lp1`, ...).
//!
//! ## Permissions
//!
//! The device nodes belong to the `lp` group:
//!
//! ```bash
//! $ ls -l /dev/usb/lp0
//! crw-rw---- 1 root lp 180, 0 Jan  1 12:00 /dev/usb/lp0
//! $ sudo usermod -aG lp $USER
//! ```
//!
//! ## Reads
//!
//! The driver blocks on `read()` while the printer has nothing to say, so
//! reads first `poll()` the descriptor for a short window and return an
//! empty buffer when it stays quiet.
//!
//! ## Chunked Writes
//!
//! Large page blocks are written in chunks. The default chunk size is
//! 16 KiB with no delay between chunks.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::Transport;
use crate::error::{QlError, Result};

/// Default kernel printer device path
pub const DEFAULT_DEVICE: &str = "/dev/usb/lp0";

/// Default chunk size for writes (bytes)
const CHUNK_SIZE: usize = 16 * 1024;

/// How long a read waits for the printer before giving up (milliseconds)
const READ_WINDOW_MS: u64 = 10;

/// # Kernel Device Transport
///
/// ## Example
///
/// ```no_run
/// use qlprint::transport::{DeviceTransport, Transport};
/// use qlprint::protocol::commands;
///
/// let mut transport = DeviceTransport::open("/dev/usb/lp0")?;
/// transport.write(&commands::status_request())?;
/// let frame = transport.read(32)?;
///
/// # Ok::<(), qlprint::error::QlError>(())
/// ```
pub struct DeviceTransport {
    file: File,
    chunk_size: usize,
    chunk_delay: Duration,
    read_window: Duration,
}

impl DeviceTransport {
    /// Open a kernel printer device for reading and writing.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The device doesn't exist
    /// - Permission denied (user not in the `lp` group)
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self> {
        let path = device.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| QlError::Transport(format!("Failed to open {}: {}", path.display(), e)))?;

        debug!("Opened printer device {}", path.display());

        Ok(Self {
            file,
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::ZERO,
            read_window: Duration::from_millis(READ_WINDOW_MS),
        })
    }

    /// Open with default device path (/dev/usb/lp0)
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_DEVICE)
    }

    /// Set the chunk size for large writes.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    /// Set the delay between chunks.
    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }

    /// Set how long a single read waits for data.
    pub fn set_read_window(&mut self, window: Duration) {
        self.read_window = window;
    }

    /// Wait until the descriptor is readable or the read window closes.
    #[cfg(unix)]
    fn readable(&self) -> Result<bool> {
        use std::os::unix::io::AsRawFd;

        let deadline = Instant::now() + self.read_window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut pfd = libc::pollfd {
                fd: self.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let timeout_ms = remaining.as_millis().min(i32::MAX as u128) as libc::c_int;
            let result = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            if result < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted && !remaining.is_zero() {
                    continue;
                }
                return Err(QlError::Transport(format!("poll failed: {}", err)));
            }
            return Ok(result > 0 && pfd.revents & libc::POLLIN != 0);
        }
    }

    #[cfg(not(unix))]
    fn readable(&self) -> Result<bool> {
        thread::sleep(self.read_window);
        Ok(true)
    }
}

impl Transport for DeviceTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        debug!("Writing {} bytes.", data.len());

        for chunk in data.chunks(self.chunk_size) {
            self.file
                .write_all(chunk)
                .map_err(|e| QlError::Transport(format!("Write failed: {}", e)))?;

            if !self.chunk_delay.is_zero() && chunk.len() == self.chunk_size {
                thread::sleep(self.chunk_delay);
            }
        }

        self.file
            .flush()
            .map_err(|e| QlError::Transport(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>> {
        if !self.readable()? {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; max_len];
        let n = self
            .file
            .read(&mut buf)
            .map_err(|e| QlError::Transport(format!("Read failed: {}", e)))?;
        buf.truncate(n);

        if n > 0 {
            debug!("Read {} bytes.", n);
        }
        Ok(buf)
    }
}

// ============================================================================
// TESTS
// ============================================================================
