//! # Scripted Transport
//!
//! An in-memory transport that records every write and answers reads from
//! a queue of canned responses. Once the script runs dry every read returns
//! an empty buffer, which looks to callers like a silent printer.
//!
//! ```
//! use qlprint::transport::{ScriptedTransport, Transport};
//!
//! let mut transport = ScriptedTransport::new();
//! transport.push_response(vec![0x80, 0x20, 0x42]);
//! transport.push_silence(1);
//!
//! transport.write(&[0x1B, 0x69, 0x53])?;
//! assert_eq!(transport.read(32)?, vec![0x80, 0x20, 0x42]);
//! assert!(transport.read(32)?.is_empty());
//! assert_eq!(transport.written(), &[vec![0x1B, 0x69, 0x53]]);
//! # Ok::<(), qlprint::QlError>(())
//! ```

use std::collections::VecDeque;

use super::Transport;
use crate::error::{QlError, Result};

#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    responses: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    fail_writes: bool,
    write_only: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one read response. Responses longer than the read size are
    /// split across reads.
    pub fn push_response(&mut self, data: impl Into<Vec<u8>>) {
        self.responses.push_back(data.into());
    }

    /// Queue `count` empty reads.
    pub fn push_silence(&mut self, count: usize) {
        for _ in 0..count {
            self.responses.push_back(Vec::new());
        }
    }

    /// Make every following write fail.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Report the link as write-only, like a raw network socket.
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Every write so far, one entry per call.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Responses not consumed yet.
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(QlError::Transport("Write failed: scripted failure".into()));
        }
        self.written.push(data.to_vec());
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let Some(mut data) = self.responses.pop_front() else {
            return Ok(Vec::new());
        };
        if data.len() > max_len {
            let rest = data.split_off(max_len);
            self.responses.push_front(rest);
        }
        Ok(data)
    }

    fn supports_read(&self) -> bool {
        !self.write_only
    }
}
