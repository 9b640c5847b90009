//! Kernel UHID plumbing: the non-blocking device-file transport and the
//! session protocol built on top of it.

pub mod io;
#[cfg(test)]
pub mod mock;
pub mod session;

pub use io::{UhidFile, UhidIo, UHID_DEVICE_PATH};
pub use session::{SessionError, SessionEvent, SessionState, UhidSession};
