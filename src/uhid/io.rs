//! Non-blocking transport over the `/dev/uhid` character device.
//!
//! The kernel exchanges fixed-size event records on the device file; reads are
//! driven by readiness through [AsyncFd] so a pending read can be raced
//! against other event sources without a dedicated reader thread.

use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tokio::io::unix::AsyncFd;
use uhid_virt::UHID_EVENT_SIZE;

/// Default path of the UHID character device.
pub const UHID_DEVICE_PATH: &str = "/dev/uhid";

/// A transport carrying whole UHID event records. Writes are synchronous
/// (`/dev/uhid` consumes a full record per write without blocking); reads
/// suspend until the kernel produces the next record.
pub trait UhidIo {
    /// Suspend until the next full event record arrives.
    ///
    /// Cancellation-safe: the only suspension point is the readiness wait, so
    /// dropping the future never discards a partially read record.
    fn read_event(&mut self) -> impl Future<Output = io::Result<[u8; UHID_EVENT_SIZE]>> + Send;

    /// Write one full event record.
    fn write_event(&mut self, event: &[u8; UHID_EVENT_SIZE]) -> io::Result<()>;
}

/// [UhidIo] implementation over the real `/dev/uhid` device file.
pub struct UhidFile {
    fd: AsyncFd<File>,
}

impl UhidFile {
    /// Open `/dev/uhid` read/write in non-blocking mode.
    pub fn open() -> io::Result<Self> {
        Self::open_path(Path::new(UHID_DEVICE_PATH))
    }

    pub fn open_path(path: &Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            fd: AsyncFd::new(file)?,
        })
    }
}

impl UhidIo for UhidFile {
    async fn read_event(&mut self) -> io::Result<[u8; UHID_EVENT_SIZE]> {
        let mut buf = [0u8; UHID_EVENT_SIZE];
        loop {
            let mut guard = self.fd.readable_mut().await?;
            match guard.try_io(|inner| inner.get_mut().read(&mut buf)) {
                Ok(Ok(n)) if n == UHID_EVENT_SIZE => return Ok(buf),
                Ok(Ok(n)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short uhid read: {n} bytes"),
                    ))
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(e),
                // Spurious readiness; wait again.
                Err(_would_block) => continue,
            }
        }
    }

    fn write_event(&mut self, event: &[u8; UHID_EVENT_SIZE]) -> io::Result<()> {
        loop {
            match self.fd.get_mut().write(event) {
                Ok(n) if n == event.len() => return Ok(()),
                Ok(n) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short uhid write: {n} bytes"),
                    ))
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
