//! The event bridge: one cooperative task that multiplexes the external input
//! source against the kernel event stream of a [UhidSession].
//!
//! The two waits (next input change, next kernel event) are raced with
//! `tokio::select!` so that neither source can starve the other, and every
//! write to the device file happens from this task, in issue order. No second
//! task ever touches the session handle.

use std::future::Future;

use nix::libc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::gamepad::{GamepadLayout, GamepadState, InputChange};
use crate::report::{self, CodecError, OutputReport};
use crate::uhid::{SessionError, SessionEvent, SessionState, UhidIo, UhidSession};

/// Possible errors for a running bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Codec failures indicate a misconfiguration that would recur
    /// identically; they stop the bridge instead of being retried.
    #[error("report codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("uhid session error: {0}")]
    Session(#[from] SessionError),
}

/// An external producer of gamepad state changes. Anything that can suspend
/// until its next change satisfies the role; the bridge is agnostic to the
/// origin (physical controller, network, synthetic).
pub trait InputSource {
    /// Suspend until the next state change. `None` means the source is
    /// exhausted and the bridge should shut down.
    fn next_change(&mut self) -> impl Future<Output = Option<InputChange>> + Send;
}

/// [InputSource] adapter over a tokio channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<InputChange>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<InputChange>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

impl InputSource for ChannelSource {
    async fn next_change(&mut self) -> Option<InputChange> {
        self.rx.recv().await
    }
}

/// Orchestrator owning the session, the input source, and the current
/// gamepad state.
pub struct Bridge<S: InputSource, T: UhidIo> {
    session: UhidSession<T>,
    source: S,
    layout: GamepadLayout,
    state: GamepadState,
    last_report: Option<Vec<u8>>,
    output_tx: Option<mpsc::Sender<OutputReport>>,
    shutdown: CancellationToken,
}

impl<S: InputSource, T: UhidIo> Bridge<S, T> {
    pub fn new(
        session: UhidSession<T>,
        source: S,
        layout: GamepadLayout,
        shutdown: CancellationToken,
    ) -> Self {
        let state = GamepadState::new(&layout);
        Self {
            session,
            source,
            layout,
            state,
            last_report: None,
            output_tx: None,
            shutdown,
        }
    }

    /// Deliver decoded output reports (rumble) to the given channel.
    pub fn with_output_reports(mut self, tx: mpsc::Sender<OutputReport>) -> Self {
        self.output_tx = Some(tx);
        self
    }

    /// Run until shutdown, source exhaustion, kernel STOP, or an error. The
    /// session is destroyed on every exit path so the kernel-side device
    /// never outlives the bridge.
    pub async fn run(mut self) -> Result<(), BridgeError> {
        let result = self.run_inner().await;
        if let Err(e) = self.session.destroy() {
            log::warn!("failed to destroy uhid session: {e}");
        }
        result
    }

    async fn run_inner(&mut self) -> Result<(), BridgeError> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    log::info!("shutdown requested, stopping bridge");
                    return Ok(());
                }
                change = self.source.next_change() => {
                    let Some(change) = change else {
                        log::info!("input source exhausted, stopping bridge");
                        return Ok(());
                    };
                    self.handle_change(change)?;
                }
                event = self.session.next_event() => {
                    if !self.handle_event(event?)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_change(&mut self, change: InputChange) -> Result<(), BridgeError> {
        log::trace!("input change: {change:?}");
        // A reset is always delivered, even when the encoded bytes happen to
        // match the previous report.
        let force = matches!(change, InputChange::Reset);
        if !self.state.apply(&self.layout, &change) {
            log::warn!("input change does not match the declared layout: {change:?}");
            return Ok(());
        }
        self.flush_state(force)
    }

    /// Encode the current state and send it, unless no consumer is reading
    /// the device. State keeps tracking while unread; missed transitions are
    /// not queued and are never replayed.
    fn flush_state(&mut self, force: bool) -> Result<(), BridgeError> {
        let report = report::encode_input(&self.state, &self.layout)?;
        if self.session.state() != SessionState::Opened {
            log::trace!("no consumer reading the device, dropping report");
            return Ok(());
        }
        if !force && self.last_report.as_deref() == Some(report.as_slice()) {
            return Ok(());
        }
        self.session.send_input(&report)?;
        self.last_report = Some(report);
        Ok(())
    }

    /// Dispatch one kernel event. Returns `false` when the bridge should
    /// stop.
    fn handle_event(&mut self, event: SessionEvent) -> Result<bool, BridgeError> {
        match event {
            SessionEvent::Start => {
                log::debug!("kernel acknowledged the device");
            }
            SessionEvent::Open => {
                log::debug!("a consumer opened the device");
                // A fresh consumer gets the current state once, not a backlog.
                self.flush_state(true)?;
            }
            SessionEvent::Close => {
                log::debug!("the last consumer closed the device");
                self.last_report = None;
            }
            SessionEvent::Stop => {
                log::info!("kernel stopped the device");
                return Ok(false);
            }
            SessionEvent::Output { data } => {
                log::trace!("output report: {data:?}");
                if !self.layout.rumble {
                    log::debug!("ignoring output report, layout declares no output fields");
                } else {
                    match report::decode_output(&data, &self.layout) {
                        Ok(output) => self.forward_output(output),
                        Err(e) => log::warn!("undecodable output report: {e}"),
                    }
                }
            }
            SessionEvent::GetReport {
                id,
                report_number,
                report_type,
            } => {
                log::trace!("GET_REPORT id={id} rnum={report_number} rtype={report_type:?}");
                if report_number == 0 {
                    let report = report::encode_input(&self.state, &self.layout)?;
                    self.session.reply_get_report(id, 0, &report)?;
                } else {
                    // Reply explicitly so the requester fails fast instead of
                    // waiting out the kernel timeout.
                    self.session
                        .reply_get_report(id, libc::EINVAL as u16, &[])?;
                }
            }
            SessionEvent::SetReport {
                id,
                report_number,
                report_type,
                data,
            } => {
                log::trace!(
                    "SET_REPORT id={id} rnum={report_number} rtype={report_type:?} data={data:?}"
                );
                if report_number == 0 && self.layout.rumble {
                    match report::decode_output(&data, &self.layout) {
                        Ok(output) => {
                            self.forward_output(output);
                            self.session.reply_set_report(id, 0)?;
                        }
                        Err(e) => {
                            log::warn!("undecodable SET_REPORT payload: {e}");
                            self.session.reply_set_report(id, libc::EINVAL as u16)?;
                        }
                    }
                } else {
                    self.session.reply_set_report(id, libc::EINVAL as u16)?;
                }
            }
        }
        Ok(true)
    }

    fn forward_output(&self, output: OutputReport) {
        log::trace!("rumble: {output:?}");
        let Some(tx) = self.output_tx.as_ref() else {
            return;
        };
        if let Err(e) = tx.try_send(output) {
            log::warn!("output report receiver is lagging, dropping: {e}");
        }
    }
}
