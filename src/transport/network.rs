//! # Network Transport
//!
//! Raw TCP printing on port 9100. The printers do not send status frames
//! back over this channel, so reads always come back empty and callers
//! should not wait for confirmations.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use super::Transport;
use crate::error::{QlError, Result};

/// Default raw printing port
pub const DEFAULT_PORT: u16 = 9100;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct NetworkTransport {
    stream: TcpStream,
}

impl NetworkTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| QlError::Transport(format!("Failed to resolve {}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| QlError::Transport(format!("No address for {}:{}", host, port)))?;

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| QlError::Transport(format!("Failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);
        Ok(Self { stream })
    }
}

impl Transport for NetworkTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        debug!("Writing {} bytes.", data.len());
        self.stream
            .write_all(data)
            .and_then(|_| self.stream.flush())
            .map_err(|e| QlError::Transport(format!("Write failed: {}", e)))
    }

    fn read(&mut self, _max_len: usize) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn supports_read(&self) -> bool {
        false
    }
}
