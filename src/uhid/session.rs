//! One UHID session: the CREATE2/INPUT2/DESTROY exchange with the kernel and
//! the stream of kernel-originated events, over a single device file handle.

use std::collections::HashSet;
use std::io;

use thiserror::Error;
use uhid_virt::{Bus, CreateParams, InputEvent, OutputEvent, StreamError, UHID_EVENT_SIZE};

use crate::config::DeviceIdentity;
use crate::descriptor::ReportDescriptor;

use super::io::UhidIo;

/// Possible errors for a UHID session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("kernel rejected device creation: {0}")]
    DeviceCreate(io::Error),
    #[error("device has not received START yet")]
    NotStarted,
    #[error("session already received STOP or DESTROY")]
    SessionClosed,
    #[error("session is destroyed, the event stream has terminated")]
    SessionTerminated,
    #[error("no outstanding request with id {0}")]
    StaleRequestId(u32),
    #[error("i/o error on uhid device: {0}")]
    Io(#[from] io::Error),
}

/// Session lifecycle, driven by kernel events and [UhidSession::destroy].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// CREATE2 sent, START not yet received.
    Created,
    /// Kernel acknowledged the device; input may be sent.
    Started,
    /// A consumer is reading the device.
    Opened,
    /// Started, but no consumer is reading.
    Closed,
    /// Kernel stopped the device.
    Stopped,
    /// DESTROY sent; the session is finished.
    Destroyed,
}

/// A kernel-originated event on the session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Answer to CREATE2; the device is ready for input.
    Start,
    /// The device was stopped kernel-side.
    Stop,
    /// A consumer started reading the device.
    Open,
    /// The last consumer stopped reading the device.
    Close,
    /// Raw output report sent host-to-device.
    Output { data: Vec<u8> },
    /// GET_REPORT request; must be answered via [UhidSession::reply_get_report].
    GetReport {
        id: u32,
        report_number: u8,
        report_type: uhid_virt::ReportType,
    },
    /// SET_REPORT request; must be answered via [UhidSession::reply_set_report].
    SetReport {
        id: u32,
        report_number: u8,
        report_type: uhid_virt::ReportType,
        data: Vec<u8>,
    },
}

/// One kernel UHID device, exclusively owning its transport for the session
/// lifetime. Dropping the session destroys the kernel-side device if
/// [UhidSession::destroy] was not called first.
pub struct UhidSession<T: UhidIo> {
    io: T,
    state: SessionState,
    pending_get: HashSet<u32>,
    pending_set: HashSet<u32>,
}

impl<T: UhidIo> UhidSession<T> {
    /// Register the virtual device by sending CREATE2 over the transport.
    pub fn create(
        mut io: T,
        identity: &DeviceIdentity,
        descriptor: &ReportDescriptor,
    ) -> Result<Self, SessionError> {
        let params = CreateParams {
            name: identity.name.clone(),
            phys: String::new(),
            uniq: String::new(),
            bus: Bus::USB,
            vendor: identity.vendor_id as u32,
            product: identity.product_id as u32,
            version: identity.version,
            country: 0,
            rd_data: descriptor.as_bytes().to_vec(),
        };
        let event: [u8; UHID_EVENT_SIZE] = InputEvent::Create(params).into();
        io.write_event(&event).map_err(SessionError::DeviceCreate)?;
        log::debug!(
            "sent CREATE2 for {} ({:04x}:{:04x})",
            identity.name,
            identity.vendor_id,
            identity.product_id
        );

        Ok(Self {
            io,
            state: SessionState::Created,
            pending_get: HashSet::new(),
            pending_set: HashSet::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Send one input report to the kernel as an INPUT2 event.
    pub fn send_input(&mut self, report: &[u8]) -> Result<(), SessionError> {
        match self.state {
            SessionState::Created => return Err(SessionError::NotStarted),
            SessionState::Stopped | SessionState::Destroyed => {
                return Err(SessionError::SessionClosed)
            }
            _ => (),
        }
        let event: [u8; UHID_EVENT_SIZE] = InputEvent::Input { data: report }.into();
        self.io.write_event(&event)?;
        Ok(())
    }

    /// Suspend until the kernel writes the next event record, tracking the
    /// session lifecycle as events arrive. Unknown record types are skipped.
    /// After [UhidSession::destroy] the stream terminates with
    /// [SessionError::SessionTerminated].
    pub async fn next_event(&mut self) -> Result<SessionEvent, SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::SessionTerminated);
        }
        loop {
            let buf = self.io.read_event().await?;
            let event = match OutputEvent::try_from(buf) {
                Ok(event) => event,
                Err(StreamError::UnknownEventType(ty)) => {
                    log::debug!("ignoring unknown uhid event type {ty}");
                    continue;
                }
                Err(StreamError::Io(e)) => return Err(SessionError::Io(e)),
            };

            return Ok(match event {
                OutputEvent::Start { dev_flags: _ } => {
                    log::debug!("device started");
                    if self.state == SessionState::Created {
                        self.state = SessionState::Started;
                    }
                    SessionEvent::Start
                }
                OutputEvent::Stop => {
                    log::debug!("device stopped");
                    self.state = SessionState::Stopped;
                    SessionEvent::Stop
                }
                OutputEvent::Open => {
                    self.state = SessionState::Opened;
                    SessionEvent::Open
                }
                OutputEvent::Close => {
                    if self.state == SessionState::Opened {
                        self.state = SessionState::Closed;
                    }
                    SessionEvent::Close
                }
                OutputEvent::Output { data } => SessionEvent::Output { data },
                OutputEvent::GetReport {
                    id,
                    report_number,
                    report_type,
                } => {
                    self.pending_get.insert(id);
                    SessionEvent::GetReport {
                        id,
                        report_number,
                        report_type,
                    }
                }
                OutputEvent::SetReport {
                    id,
                    report_number,
                    report_type,
                    data,
                } => {
                    self.pending_set.insert(id);
                    SessionEvent::SetReport {
                        id,
                        report_number,
                        report_type,
                        data,
                    }
                }
            });
        }
    }

    /// Answer a pending GET_REPORT request. The id must match an outstanding
    /// request; ids are answered at most once.
    pub fn reply_get_report(&mut self, id: u32, err: u16, data: &[u8]) -> Result<(), SessionError> {
        if !self.pending_get.remove(&id) {
            return Err(SessionError::StaleRequestId(id));
        }
        let event: [u8; UHID_EVENT_SIZE] = InputEvent::GetReportReply { id, err, data: data.to_vec() }.into();
        self.io.write_event(&event)?;
        Ok(())
    }

    /// Answer a pending SET_REPORT request.
    pub fn reply_set_report(&mut self, id: u32, err: u16) -> Result<(), SessionError> {
        if !self.pending_set.remove(&id) {
            return Err(SessionError::StaleRequestId(id));
        }
        let event: [u8; UHID_EVENT_SIZE] = InputEvent::SetReportReply { id, err }.into();
        self.io.write_event(&event)?;
        Ok(())
    }

    /// Send DESTROY and finish the session. Safe to call more than once.
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Destroyed {
            return Ok(());
        }
        let event: [u8; UHID_EVENT_SIZE] = InputEvent::Destroy.into();
        self.io.write_event(&event)?;
        self.state = SessionState::Destroyed;
        log::debug!("sent DESTROY");
        Ok(())
    }
}

impl<T: UhidIo> Drop for UhidSession<T> {
    fn drop(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        let event: [u8; UHID_EVENT_SIZE] = InputEvent::Destroy.into();
        if let Err(e) = self.io.write_event(&event) {
            log::warn!("failed to destroy uhid device on drop: {e}");
        }
    }
}
