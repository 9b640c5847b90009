//! In-memory [UhidIo] used by session and bridge tests.
//!
//! Kernel-to-driver records are built by hand against the kernel UAPI layout
//! (`linux/uhid.h`, packed little-endian structs), and records written by the
//! driver are parsed the same way. This doubles as a byte-for-byte check that
//! what goes over the wire matches the UAPI, independent of the codec that
//! produced it.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uhid_virt::UHID_EVENT_SIZE;

use super::io::UhidIo;

// Event type tags from linux/uhid.h.
pub const UHID_DESTROY: u32 = 1;
pub const UHID_START: u32 = 2;
pub const UHID_STOP: u32 = 3;
pub const UHID_OPEN: u32 = 4;
pub const UHID_CLOSE: u32 = 5;
pub const UHID_OUTPUT: u32 = 6;
pub const UHID_GET_REPORT: u32 = 9;
pub const UHID_GET_REPORT_REPLY: u32 = 10;
pub const UHID_CREATE2: u32 = 11;
pub const UHID_INPUT2: u32 = 12;
pub const UHID_SET_REPORT: u32 = 13;
pub const UHID_SET_REPORT_REPLY: u32 = 14;

/// Report types from linux/uhid.h.
pub const UHID_FEATURE_REPORT: u8 = 0;
pub const UHID_OUTPUT_REPORT: u8 = 1;
pub const UHID_INPUT_REPORT: u8 = 2;

const DATA_MAX: usize = 4096;

fn event(ty: u32) -> [u8; UHID_EVENT_SIZE] {
    let mut buf = [0u8; UHID_EVENT_SIZE];
    buf[0..4].copy_from_slice(&ty.to_le_bytes());
    buf
}

pub fn start_event() -> [u8; UHID_EVENT_SIZE] {
    // uhid_start_req: u64 dev_flags, all zero.
    event(UHID_START)
}

pub fn stop_event() -> [u8; UHID_EVENT_SIZE] {
    event(UHID_STOP)
}

pub fn open_event() -> [u8; UHID_EVENT_SIZE] {
    event(UHID_OPEN)
}

pub fn close_event() -> [u8; UHID_EVENT_SIZE] {
    event(UHID_CLOSE)
}

/// uhid_output_req: u8 data[4096], u16 size, u8 rtype.
pub fn output_event(data: &[u8]) -> [u8; UHID_EVENT_SIZE] {
    let mut buf = event(UHID_OUTPUT);
    buf[4..4 + data.len()].copy_from_slice(data);
    buf[4 + DATA_MAX..4 + DATA_MAX + 2].copy_from_slice(&(data.len() as u16).to_le_bytes());
    buf[4 + DATA_MAX + 2] = UHID_OUTPUT_REPORT;
    buf
}

/// uhid_get_report_req: u32 id, u8 rnum, u8 rtype.
pub fn get_report_event(id: u32, rnum: u8, rtype: u8) -> [u8; UHID_EVENT_SIZE] {
    let mut buf = event(UHID_GET_REPORT);
    buf[4..8].copy_from_slice(&id.to_le_bytes());
    buf[8] = rnum;
    buf[9] = rtype;
    buf
}

/// uhid_set_report_req: u32 id, u8 rnum, u8 rtype, u16 size, u8 data[4096].
pub fn set_report_event(id: u32, rnum: u8, rtype: u8, data: &[u8]) -> [u8; UHID_EVENT_SIZE] {
    let mut buf = event(UHID_SET_REPORT);
    buf[4..8].copy_from_slice(&id.to_le_bytes());
    buf[8] = rnum;
    buf[9] = rtype;
    buf[10..12].copy_from_slice(&(data.len() as u16).to_le_bytes());
    buf[12..12 + data.len()].copy_from_slice(data);
    buf
}

/// A record the driver wrote to the (mock) device file, decoded per UAPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrittenEvent {
    Create2 {
        name: String,
        vendor: u32,
        product: u32,
        version: u32,
        rd_data: Vec<u8>,
    },
    Input2(Vec<u8>),
    GetReportReply {
        id: u32,
        err: u16,
        data: Vec<u8>,
    },
    SetReportReply {
        id: u32,
        err: u16,
    },
    Destroy,
    Unknown(u32),
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub fn parse_written(buf: &[u8; UHID_EVENT_SIZE]) -> WrittenEvent {
    match u32_at(buf, 0) {
        // uhid_create2_req: u8 name[128], u8 phys[64], u8 uniq[64], u16
        // rd_size, u16 bus, u32 vendor, u32 product, u32 version, u32
        // country, u8 rd_data[4096].
        UHID_CREATE2 => {
            let name_bytes = &buf[4..132];
            let name_len = name_bytes.iter().position(|b| *b == 0).unwrap_or(128);
            let rd_size = u16_at(buf, 260) as usize;
            WrittenEvent::Create2 {
                name: String::from_utf8_lossy(&name_bytes[..name_len]).to_string(),
                vendor: u32_at(buf, 264),
                product: u32_at(buf, 268),
                version: u32_at(buf, 272),
                rd_data: buf[280..280 + rd_size].to_vec(),
            }
        }
        // uhid_input2_req: u16 size, u8 data[4096].
        UHID_INPUT2 => {
            let size = u16_at(buf, 4) as usize;
            WrittenEvent::Input2(buf[6..6 + size].to_vec())
        }
        // uhid_get_report_reply_req: u32 id, u16 err, u16 size, u8 data[4096].
        UHID_GET_REPORT_REPLY => {
            let size = u16_at(buf, 10) as usize;
            WrittenEvent::GetReportReply {
                id: u32_at(buf, 4),
                err: u16_at(buf, 8),
                data: buf[12..12 + size].to_vec(),
            }
        }
        // uhid_set_report_reply_req: u32 id, u16 err.
        UHID_SET_REPORT_REPLY => WrittenEvent::SetReportReply {
            id: u32_at(buf, 4),
            err: u16_at(buf, 8),
        },
        UHID_DESTROY => WrittenEvent::Destroy,
        other => WrittenEvent::Unknown(other),
    }
}

/// Test-side handle: queues kernel events and inspects what the driver wrote.
#[derive(Clone)]
pub struct MockKernel {
    tx: mpsc::UnboundedSender<[u8; UHID_EVENT_SIZE]>,
    written: Arc<Mutex<Vec<[u8; UHID_EVENT_SIZE]>>>,
}

impl MockKernel {
    /// Queue one kernel-to-driver event record.
    pub fn send(&self, event: [u8; UHID_EVENT_SIZE]) {
        self.tx.send(event).expect("mock transport dropped");
    }

    /// All records written by the driver so far, decoded.
    pub fn written(&self) -> Vec<WrittenEvent> {
        self.written
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .map(parse_written)
            .collect()
    }

    /// Decoded records written since the last call.
    pub fn take_written(&self) -> Vec<WrittenEvent> {
        self.written
            .lock()
            .expect("mock lock poisoned")
            .drain(..)
            .map(|buf| parse_written(&buf))
            .collect()
    }
}

/// Driver-side transport backed by the mock kernel.
pub struct MockUhidIo {
    rx: mpsc::UnboundedReceiver<[u8; UHID_EVENT_SIZE]>,
    written: Arc<Mutex<Vec<[u8; UHID_EVENT_SIZE]>>>,
}

pub fn mock_pair() -> (MockKernel, MockUhidIo) {
    let (tx, rx) = mpsc::unbounded_channel();
    let written = Arc::new(Mutex::new(Vec::new()));
    (
        MockKernel {
            tx,
            written: written.clone(),
        },
        MockUhidIo { rx, written },
    )
}

impl UhidIo for MockUhidIo {
    async fn read_event(&mut self) -> io::Result<[u8; UHID_EVENT_SIZE]> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "mock kernel closed"))
    }

    fn write_event(&mut self, event: &[u8; UHID_EVENT_SIZE]) -> io::Result<()> {
        self.written
            .lock()
            .expect("mock lock poisoned")
            .push(*event);
        Ok(())
    }
}
