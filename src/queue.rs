//! # Print Queue
//!
//! Sends pages one at a time and waits for the printer to confirm each of
//! them before moving on.
//!
//! ## States
//!
//! ```text
//! NotReady --initialize--> Ready --submit--> Printing --> Ready | NotReady
//! ```
//!
//! ## Per-Page Confirmation
//!
//! After a page block is written the printer must report, in order:
//!
//! | Step | Status | Phase | Timeout |
//! |------|--------|-------|---------|
//! | started | 0x06 phase change | 0x01 printing | 2 s |
//! | completed | 0x01 printing completed | 0x01 printing | 10 s |
//! | ready | 0x06 phase change | 0x00 waiting to receive | 2 s |
//!
//! The first missed confirmation ends the submission. Pages that were not
//! confirmed stay queued unless the caller asks for them to be cleared.

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::device::{DEFAULT_BACKOFF, StatusExpectation, StatusMonitor};
use crate::error::{QlError, Result};
use crate::protocol::commands;
use crate::protocol::hex_format;
use crate::protocol::status::{PhaseType, StatusFrame, StatusType};
use crate::raster::PageBuilder;
use crate::transport::Transport;

/// Timeouts for the status waits of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTimeouts {
    /// Waiting for "printing started" after a page is written
    pub started: Duration,
    /// Waiting for "printing completed"
    pub completed: Duration,
    /// Waiting for the printer to accept the next page
    pub ready: Duration,
    /// Status requests during initialize and after a submission
    pub request: Duration,
    /// Sleep between empty reads
    pub backoff: Duration,
}

impl Default for QueueTimeouts {
    fn default() -> Self {
        Self {
            started: Duration::from_secs(2),
            completed: Duration::from_secs(10),
            ready: Duration::from_secs(2),
            request: Duration::from_secs(2),
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// A print session on one transport.
pub struct PrintQueue<T: Transport, B: PageBuilder> {
    transport: T,
    builder: B,
    pages: VecDeque<Vec<u8>>,
    monitor: StatusMonitor,
    timeouts: QueueTimeouts,
    printing: bool,
    ready: bool,
}

impl<T: Transport, B: PageBuilder> PrintQueue<T, B> {
    /// Create a queue. The printer is not touched until [`initialize`]
    /// or [`submit`] is called.
    ///
    /// [`initialize`]: Self::initialize
    /// [`submit`]: Self::submit
    pub fn new(transport: T, builder: B) -> Self {
        Self {
            transport,
            builder,
            pages: VecDeque::new(),
            monitor: StatusMonitor::new(),
            timeouts: QueueTimeouts::default(),
            printing: false,
            ready: false,
        }
    }

    pub fn with_timeouts(mut self, timeouts: QueueTimeouts) -> Self {
        self.monitor = self.monitor.with_backoff(timeouts.backoff);
        self.timeouts = timeouts;
        self
    }

    /// Reset the printer and check that it is waiting for data.
    ///
    /// Sends invalidate and initialize as two separate writes, then
    /// requests a status. Returns whether the printer is ready.
    pub fn initialize(&mut self) -> Result<bool> {
        self.require_status()?;
        self.builder.reset();

        self.transport.write(&self.builder.invalidate())?;
        self.transport.write(&commands::initialize())?;

        self.ready = self.monitor.wait(
            &mut self.transport,
            StatusExpectation::phase(PhaseType::WAITING_TO_RECEIVE),
            self.timeouts.request,
            true,
        )?;
        self.printing = false;
        Ok(self.ready)
    }

    /// Build pages from `job` and append them to the queue.
    pub fn queue_page(&mut self, job: B::Job) -> Result<usize> {
        if self.printing {
            return Err(QlError::Usage("Can't queue pages while printing".into()));
        }

        self.builder.seek_page(self.pages.len());
        let blocks = self.builder.build_pages(job)?;
        let added = blocks.len();
        for block in blocks {
            debug!("Queued page block of {} bytes", block.len());
            self.pages.push_back(block);
        }
        Ok(added)
    }

    /// Print every queued page.
    ///
    /// Returns `true` when the queue ended empty. On failure the remaining
    /// pages are kept for another `submit` unless `clear_on_failure` is set.
    /// Transport errors are returned as errors; the printing flag is
    /// cleared either way.
    pub fn submit(&mut self, clear_on_failure: bool) -> Result<bool> {
        self.require_status()?;
        if !self.ready {
            debug!("Printing has failed previously, initializing printer");
            self.initialize()?;
        }

        self.printing = true;
        let result = self.submit_pages(clear_on_failure);
        self.printing = false;
        result
    }

    fn submit_pages(&mut self, clear_on_failure: bool) -> Result<bool> {
        let total = self.pages.len();
        info!("Submitting print queue with {} pages", total);

        let mut count = 0;
        while !self.pages.is_empty() {
            count += 1;
            info!("Submitting page {} of {}", count, total);
            if !self.submit_page()? {
                warn!("Page submission failed, giving up");
                break;
            }
        }
        debug!("Queue processing complete");

        let remaining = self.pages.len();
        let completed = remaining == 0;
        if !completed {
            debug!("There are {} pages remaining in the queue", remaining);
            if clear_on_failure {
                debug!("Clearing queue with failed {} pages", remaining);
                self.pages.clear();
            }
        }

        self.ready = self.monitor.wait(
            &mut self.transport,
            StatusExpectation::phase(PhaseType::WAITING_TO_RECEIVE),
            self.timeouts.request,
            true,
        )?;
        if self.ready {
            debug!("Printer is ready to receive data");
        } else {
            error!("Printer is not ready");
            debug!("{:?}", self.monitor.last_status());
        }

        Ok(completed)
    }

    /// Pages are only confirmed through status frames, so a write-only
    /// link would resend the same page on every submit.
    fn require_status(&self) -> Result<()> {
        if self.transport.supports_read() {
            Ok(())
        } else {
            Err(QlError::Usage(
                "The print queue needs a transport that can read printer status".into(),
            ))
        }
    }

    /// Write the head page and wait for its three confirmations.
    fn submit_page(&mut self) -> Result<bool> {
        let Some(block) = self.pages.front() else {
            return Ok(true);
        };
        debug!("Command data: {}", hex_format(block));
        self.transport.write(block)?;

        debug!("Waiting for the printer to start printing");
        let started = self.monitor.wait(
            &mut self.transport,
            StatusExpectation::new(StatusType::PHASE_CHANGE, PhaseType::PRINTING_STATE),
            self.timeouts.started,
            false,
        )?;
        if !started {
            warn!("Printing failed to start");
            return Ok(false);
        }

        debug!("Printing started, waiting for completion");
        let printed = self.monitor.wait(
            &mut self.transport,
            StatusExpectation::new(StatusType::PRINTING_COMPLETED, PhaseType::PRINTING_STATE),
            self.timeouts.completed,
            false,
        )?;
        if !printed {
            warn!("Printing started but did not finish");
            return Ok(false);
        }

        debug!("Printing completed, waiting for ready status");
        let ready = self.monitor.wait(
            &mut self.transport,
            StatusExpectation::new(StatusType::PHASE_CHANGE, PhaseType::WAITING_TO_RECEIVE),
            self.timeouts.ready,
            false,
        )?;
        if !ready {
            return Ok(false);
        }

        debug!("Printer is ready to receive data");
        self.pages.pop_front();
        Ok(true)
    }

    /// Drop every queued page.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> impl Iterator<Item = &[u8]> {
        self.pages.iter().map(Vec::as_slice)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_printing(&self) -> bool {
        self.printing
    }

    /// Most recent status frame seen by any wait.
    pub fn last_status(&self) -> Option<&StatusFrame> {
        self.monitor.last_status()
    }

    /// Errors of the most recent frame that reported any.
    pub fn last_errors(&self) -> &[&'static str] {
        self.monitor.last_errors()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

// ============================================================================
// TESTS
// ============================================================================
