//! # Device Conversations
//!
//! Request/response exchanges with a connected printer, built on top of a
//! [`Transport`] and the [status decoder](crate::protocol::status).
//!
//! ## Status Waits
//!
//! [`StatusMonitor::wait`] is the primitive behind every confirmation:
//!
//! 1. Optionally send a status request (`ESC i S`).
//! 2. Read until a frame decodes or the deadline passes. Empty reads sleep
//!    for the backoff interval and retry; undecodable data is noise and is
//!    retried immediately.
//! 3. Compare the frame's status and phase codes with the expectation.
//!
//! The deadline is measured from entry into the wait and checked once per
//! iteration. A timeout is a `false` result, never an error.
//!
//! ## Diagnostics
//!
//! - [`get_status`]: one status round trip
//! - [`get_setting`] / [`write_setting`] / [`configure`]: printer settings
//! - [`send`]: write a finished instruction stream and watch it print

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::error::{QlError, Result};
use crate::protocol::commands;
use crate::protocol::hex_format;
use crate::protocol::status::{PhaseType, StatusDecoder, StatusFrame, StatusType};
use crate::transport::{DEFAULT_READ_LEN, Transport};

/// Default sleep between empty reads.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Timeout for one diagnostic status round trip.
pub const DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(2);

/// How long [`send`] watches the printer after writing.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

const SEND_BACKOFF: Duration = Duration::from_millis(5);

// ============================================================================
// STATUS EXPECTATION
// ============================================================================

/// Expected status and phase codes; `None` accepts any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusExpectation {
    pub status: Option<u8>,
    pub phase: Option<u8>,
}

impl StatusExpectation {
    /// Accept any frame.
    pub const ANY: Self = Self {
        status: None,
        phase: None,
    };

    pub const fn new(status: u8, phase: u8) -> Self {
        Self {
            status: Some(status),
            phase: Some(phase),
        }
    }

    pub const fn phase(phase: u8) -> Self {
        Self {
            status: None,
            phase: Some(phase),
        }
    }

    pub fn matches(&self, frame: &StatusFrame) -> bool {
        self.status.is_none_or(|s| s == frame.status_code)
            && self.phase.is_none_or(|p| p == frame.phase_code)
    }
}

impl std::fmt::Display for StatusExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "status type 0x{:02X}", s)?,
            None => f.write_str("any status type")?,
        }
        match self.phase {
            Some(p) => write!(f, ", phase type 0x{:02X}", p),
            None => f.write_str(", any phase type"),
        }
    }
}

// ============================================================================
// STATUS MONITOR
// ============================================================================

/// Reads status frames and remembers the most recent one.
#[derive(Debug, Clone)]
pub struct StatusMonitor {
    decoder: StatusDecoder<'static>,
    backoff: Duration,
    last_status: Option<StatusFrame>,
    last_errors: Vec<&'static str>,
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMonitor {
    pub fn new() -> Self {
        Self {
            decoder: StatusDecoder::default(),
            backoff: DEFAULT_BACKOFF,
            last_status: None,
            last_errors: Vec::new(),
        }
    }

    pub fn with_decoder(mut self, decoder: StatusDecoder<'static>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Most recently decoded frame, whether or not it matched.
    pub fn last_status(&self) -> Option<&StatusFrame> {
        self.last_status.as_ref()
    }

    /// Errors of the most recent frame that reported any.
    pub fn last_errors(&self) -> &[&'static str] {
        &self.last_errors
    }

    /// Read until one frame decodes or `timeout` elapses.
    pub fn read_frame<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<Option<StatusFrame>> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            let data = transport.read(DEFAULT_READ_LEN)?;
            if data.is_empty() {
                thread::sleep(self.backoff);
                continue;
            }

            match self.decoder.decode(&data) {
                Ok(frame) => {
                    if frame.has_errors() {
                        self.last_errors = frame.errors.clone();
                    }
                    self.last_status = Some(frame.clone());
                    return Ok(Some(frame));
                }
                Err(e) => {
                    debug!("Ignoring undecodable response ({}): {}", e, hex_format(&data));
                }
            }
        }

        Ok(None)
    }

    /// Wait for a frame and check it against `expect`.
    ///
    /// With `request` set a status request is written first and the frame
    /// must be a status reply (status type 0x00); asking for any other
    /// status type together with a request is a usage error.
    pub fn wait<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        expect: StatusExpectation,
        timeout: Duration,
        request: bool,
    ) -> Result<bool> {
        let mut expect = expect;
        if request {
            if expect.status.is_some_and(|s| s != StatusType::REPLY_TO_STATUS) {
                return Err(QlError::Usage(
                    "Specifying an expected status type is not allowed for requests".into(),
                ));
            }
            expect.status = Some(StatusType::REPLY_TO_STATUS);
            debug!("Requesting status");
            transport.write(&commands::status_request())?;
        }

        debug!("Waiting for response");
        if expect != StatusExpectation::ANY {
            debug!("Expecting {}, timeout {:?}", expect, timeout);
        }

        let Some(frame) = self.read_frame(transport, timeout)? else {
            warn!(
                "Did not receive a response from printer within {:?} (expected {})",
                timeout, expect
            );
            return Ok(false);
        };

        debug!(
            "Got status 0x{:02X}, phase 0x{:02X}",
            frame.status_code, frame.phase_code
        );
        let matched = expect.matches(&frame);
        if matched {
            debug!("Response matches expected status");
        } else {
            debug!("Response does not match expected status ({})", expect);
        }
        Ok(matched)
    }
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// One status round trip.
///
/// Sends a status request unless `receive_only`, then waits for a frame.
/// With `target_status` set, a frame reporting another status type fails
/// with [`QlError::UnexpectedStatus`].
pub fn get_status<T: Transport + ?Sized>(
    transport: &mut T,
    receive_only: bool,
    target_status: Option<u8>,
) -> Result<StatusFrame> {
    if !receive_only {
        transport.write(&commands::status_request())?;
    }

    let frame = StatusMonitor::new()
        .read_frame(transport, DIAGNOSTIC_TIMEOUT)?
        .ok_or_else(|| QlError::Transport("No status response from printer".into()))?;

    if let Some(target) = target_status {
        if frame.status_code != target {
            return Err(QlError::UnexpectedStatus {
                expected: target,
                got: frame.status_code,
            });
        }
    }
    Ok(frame)
}

/// Read one printer setting.
///
/// The printer must be idle and error free. It is switched to raster mode,
/// sent the read command, and must answer with a settings report.
pub fn get_setting<T: Transport + ?Sized>(
    transport: &mut T,
    setting: u8,
    payload: &[u8],
) -> Result<Option<u8>> {
    get_status(transport, false, Some(StatusType::REPLY_TO_STATUS))?;
    transport.write(&commands::raster_mode())?;
    transport.write(&commands::read_setting(setting, payload))?;
    let frame = get_status(transport, true, Some(StatusType::SETTINGS_REPORT))?;
    Ok(frame.setting)
}

/// Write one printer setting and confirm the printer reports no error.
pub fn write_setting<T: Transport + ?Sized>(
    transport: &mut T,
    setting: u8,
    payload: &[u8],
) -> Result<StatusFrame> {
    transport.write(&commands::raster_mode())?;
    transport.write(&commands::write_setting(setting, payload))?;
    let frame = get_status(transport, false, None)?;
    if frame.status_code != StatusType::REPLY_TO_STATUS {
        error!("Failed to modify settings");
        return Err(QlError::UnexpectedStatus {
            expected: StatusType::REPLY_TO_STATUS,
            got: frame.status_code,
        });
    }
    Ok(frame)
}

/// Configurable printer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// Minutes of inactivity before the printer turns itself off
    PowerOffDelay,
    /// Turn on automatically when power is connected
    AutoPowerOn,
}

impl SettingKey {
    pub fn code(self) -> u8 {
        match self {
            Self::PowerOffDelay => 0x41,
            Self::AutoPowerOn => 0x70,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PowerOffDelay => "power-off-delay",
            Self::AutoPowerOn => "auto-power-on",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "power-off-delay" => Ok(Self::PowerOffDelay),
            "auto-power-on" => Ok(Self::AutoPowerOn),
            other => Err(QlError::Usage(format!("Invalid key '{}'", other))),
        }
    }

    /// Extra bytes preceding the value; the 0x30 series needs one for the
    /// power-off delay.
    fn prefix(self, series_code: u8) -> &'static [u8] {
        match (self, series_code) {
            (Self::PowerOffDelay, 0x30) => &[0x00],
            _ => &[],
        }
    }
}

/// Read a setting, or write it first when `value` is given.
///
/// Returns the value reported back by the printer.
pub fn configure<T: Transport + ?Sized>(
    transport: &mut T,
    key: SettingKey,
    value: Option<u8>,
) -> Result<Option<u8>> {
    let series_code = get_status(transport, false, Some(StatusType::REPLY_TO_STATUS))?.series_code;
    let prefix = key.prefix(series_code);

    if let Some(value) = value {
        let mut payload = prefix.to_vec();
        payload.push(value);
        write_setting(transport, key.code(), &payload)?;
    }

    let retrieved = get_setting(transport, key.code(), prefix)?;
    match retrieved {
        Some(v) => info!("{}: {}", key.name(), v),
        None => info!("{}: not reported", key.name()),
    }

    let idle = StatusMonitor::new().wait(
        transport,
        StatusExpectation::phase(PhaseType::WAITING_TO_RECEIVE),
        DIAGNOSTIC_TIMEOUT,
        true,
    )?;
    if !idle {
        warn!("Printer did not return to the waiting phase");
    }
    Ok(retrieved)
}

// ============================================================================
// SEND
// ============================================================================

/// Outcome of [`send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SendOutcome {
    Unknown,
    Sent,
    Printed,
    Error,
}

/// What is known after sending an instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SendReport {
    pub instructions_sent: bool,
    pub outcome: SendOutcome,
    /// Last status frame seen, if the transport can read
    pub printer_state: Option<StatusFrame>,
    pub did_print: bool,
    pub ready_for_next_job: bool,
}

/// Write an instruction stream and, when `blocking`, watch the printer
/// until it reports completion, an error, or [`SEND_TIMEOUT`] passes.
pub fn send<T: Transport + ?Sized>(
    transport: &mut T,
    instructions: &[u8],
    blocking: bool,
) -> Result<SendReport> {
    let mut report = SendReport {
        instructions_sent: false,
        outcome: SendOutcome::Unknown,
        printer_state: None,
        did_print: false,
        ready_for_next_job: false,
    };

    info!(
        "Sending instructions to the printer. Total: {} bytes.",
        instructions.len()
    );
    transport.write(instructions)?;
    report.instructions_sent = true;
    report.outcome = SendOutcome::Sent;

    if !blocking || !transport.supports_read() {
        return Ok(report);
    }

    let start = Instant::now();
    let mut monitor = StatusMonitor::new().with_backoff(SEND_BACKOFF);
    while let Some(remaining) = SEND_TIMEOUT.checked_sub(start.elapsed()) {
        let Some(frame) = monitor.read_frame(transport, remaining)? else {
            break;
        };
        debug!("TIME {:.3} - result: {:?}", start.elapsed().as_secs_f64(), frame);

        let has_errors = frame.has_errors();
        let status_type = frame.status_type;
        let phase_type = frame.phase_type;
        report.printer_state = Some(frame);

        if has_errors {
            error!("Errors occurred: {:?}", monitor.last_errors());
            report.outcome = SendOutcome::Error;
            break;
        }
        if status_type == StatusType::PrintingCompleted {
            report.did_print = true;
            report.outcome = SendOutcome::Printed;
        }
        if status_type == StatusType::PhaseChange && phase_type == PhaseType::WaitingToReceive {
            report.ready_for_next_job = true;
        }
        if report.did_print && report.ready_for_next_job {
            break;
        }
    }

    if !report.did_print {
        warn!("'printing completed' status not received.");
    }
    if !report.ready_for_next_job {
        warn!("'waiting to receive' status not received.");
    }
    if report.did_print && report.ready_for_next_job {
        info!("Printing was successful. Waiting for the next job.");
    } else {
        warn!("Printing potentially not successful?");
    }

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status::MAGIC;
    use crate::transport::ScriptedTransport;

    fn frame(status: u8, phase: u8) -> Vec<u8> {
        let mut f = vec![0u8; 32];
        f[..3].copy_from_slice(&MAGIC);
        f[3] = 0x34;
        f[4] = 0x38;
        f[18] = status;
        f[19] = phase;
        f
    }

    fn fast_monitor() -> StatusMonitor {
        StatusMonitor::new().with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_expectation_matching() {
        let f = crate::protocol::status::decode(&frame(6, 1)).unwrap();
        assert!(StatusExpectation::ANY.matches(&f));
        assert!(StatusExpectation::new(6, 1).matches(&f));
        assert!(StatusExpectation::phase(1).matches(&f));
        assert!(!StatusExpectation::new(1, 1).matches(&f));
        assert!(!StatusExpectation::phase(0).matches(&f));
    }

    #[test]
    fn test_expectation_display() {
        assert_eq!(
            StatusExpectation::new(6, 1).to_string(),
            "status type 0x06, phase type 0x01"
        );
        assert_eq!(
            StatusExpectation::phase(0).to_string(),
            "any status type, phase type 0x00"
        );
    }

    #[test]
    fn test_wait_skips_silence_and_noise() {
        let mut transport = ScriptedTransport::new();
        transport.push_silence(3);
        transport.push_response(vec![0x12, 0x34]);
        transport.push_response(frame(6, 1));

        let mut monitor = fast_monitor();
        let ok = monitor
            .wait(&mut transport, StatusExpectation::new(6, 1), Duration::from_secs(1), false)
            .unwrap();
        assert!(ok);
        assert_eq!(monitor.last_status().unwrap().status_code, 6);
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_wait_mismatch_still_records_status() {
        let mut transport = ScriptedTransport::new();
        let mut f = frame(2, 0);
        f[9] = 1 << 4;
        transport.push_response(f);

        let mut monitor = fast_monitor();
        let ok = monitor
            .wait(&mut transport, StatusExpectation::new(1, 1), Duration::from_secs(1), false)
            .unwrap();
        assert!(!ok);
        assert_eq!(monitor.last_status().unwrap().status_type, StatusType::ErrorOccurred);
        assert_eq!(
            monitor.last_errors(),
            &["Cover opened while printing (Except QL-500)"]
        );
    }

    #[test]
    fn test_wait_timeout_is_false() {
        let mut transport = ScriptedTransport::new();
        let mut monitor = fast_monitor();
        let start = Instant::now();
        let ok = monitor
            .wait(&mut transport, StatusExpectation::ANY, Duration::from_millis(30), false)
            .unwrap();
        assert!(!ok);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(monitor.last_status().is_none());
    }

    #[test]
    fn test_wait_with_request() {
        let mut transport = ScriptedTransport::new();
        transport.push_response(frame(0, 0));
        let mut monitor = fast_monitor();
        let ok = monitor
            .wait(&mut transport, StatusExpectation::phase(0), Duration::from_secs(1), true)
            .unwrap();
        assert!(ok);
        assert_eq!(transport.written(), &[vec![0x1B, 0x69, 0x53]]);
    }

    #[test]
    fn test_wait_request_rejects_status_expectation() {
        let mut transport = ScriptedTransport::new();
        let err = fast_monitor()
            .wait(&mut transport, StatusExpectation::new(6, 0), Duration::from_secs(1), true)
            .unwrap_err();
        assert!(matches!(err, QlError::Usage(_)));
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_get_status_target() {
        let mut transport = ScriptedTransport::new();
        transport.push_response(frame(0, 0));
        let status = get_status(&mut transport, false, Some(0)).unwrap();
        assert_eq!(status.model, "QL-800");

        transport.push_response(frame(2, 0));
        let err = get_status(&mut transport, true, Some(0)).unwrap_err();
        assert!(matches!(err, QlError::UnexpectedStatus { expected: 0, got: 2 }));
    }

    #[test]
    fn test_get_setting() {
        let mut transport = ScriptedTransport::new();
        transport.push_response(frame(0, 0));
        let mut report = frame(StatusType::SETTINGS_REPORT, 0);
        report[30] = 0x02;
        transport.push_response(report);

        assert_eq!(get_setting(&mut transport, 0x70, &[]).unwrap(), Some(0x02));
        assert_eq!(
            transport.written(),
            &[
                vec![0x1B, 0x69, 0x53],
                vec![0x1B, 0x69, 0x61, 0x01],
                vec![0x1B, 0x69, 0x55, 0x70, 0x01],
            ]
        );
    }

    #[test]
    fn test_configure_power_off_delay_series_30() {
        let mut transport = ScriptedTransport::new();
        let mut idle = frame(0, 0);
        idle[3] = 0x30;
        // series probe, write confirmation, get_setting precheck, settings report,
        // final idle check
        transport.push_response(idle.clone());
        transport.push_response(idle.clone());
        transport.push_response(idle);
        let mut report = frame(StatusType::SETTINGS_REPORT, 0);
        report[30] = 4;
        transport.push_response(report);

        transport.push_response(frame(0, 0));

        let value = configure(&mut transport, SettingKey::PowerOffDelay, Some(4)).unwrap();
        assert_eq!(value, Some(4));
        // idle check after the change
        assert_eq!(transport.written().last(), Some(&vec![0x1B, 0x69, 0x53]));
        assert_eq!(transport.pending_responses(), 0);
        assert!(transport
            .written()
            .contains(&vec![0x1B, 0x69, 0x55, 0x41, 0x00, 0x00, 0x04]));
        assert!(transport
            .written()
            .contains(&vec![0x1B, 0x69, 0x55, 0x41, 0x01, 0x00]));
    }

    #[test]
    fn test_write_setting_rejected() {
        let mut transport = ScriptedTransport::new();
        let mut f = frame(0x02, 0);
        f[8] = 0x01;
        transport.push_response(f);

        let err = write_setting(&mut transport, 0x70, &[0x01]).unwrap_err();
        assert!(matches!(
            err,
            QlError::UnexpectedStatus {
                expected: 0x00,
                got: 0x02
            }
        ));
    }

    #[test]
    fn test_setting_key_parse() {
        assert_eq!(SettingKey::parse("auto-power-on").unwrap(), SettingKey::AutoPowerOn);
        assert!(SettingKey::parse("volume").is_err());
    }

    #[test]
    fn test_send_success() {
        let mut transport = ScriptedTransport::new();
        transport.push_response(frame(6, 1));
        transport.push_response(frame(1, 1));
        transport.push_response(frame(6, 0));

        let report = send(&mut transport, &[0x1B, 0x40], true).unwrap();
        assert_eq!(report.outcome, SendOutcome::Printed);
        assert!(report.did_print);
        assert!(report.ready_for_next_job);
        assert_eq!(transport.pending_responses(), 0);
    }

    #[test]
    fn test_send_error_frame() {
        let mut transport = ScriptedTransport::new();
        let mut f = frame(2, 0);
        f[8] = 0x01;
        transport.push_response(f);

        let report = send(&mut transport, &[0x1B, 0x40], true).unwrap();
        assert_eq!(report.outcome, SendOutcome::Error);
        assert!(!report.did_print);
        assert_eq!(report.printer_state.unwrap().errors, vec!["No media when printing"]);
    }

    #[test]
    fn test_send_non_blocking() {
        let mut transport = ScriptedTransport::new();
        transport.push_response(frame(1, 1));
        let report = send(&mut transport, &[0x1A], false).unwrap();
        assert_eq!(report.outcome, SendOutcome::Sent);
        assert_eq!(transport.pending_responses(), 1);
    }
}
