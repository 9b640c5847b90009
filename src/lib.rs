//! Virtual USB HID gamepad driver built on the Linux UHID subsystem.
//!
//! The crate registers a virtual gamepad with the kernel through `/dev/uhid`,
//! translates application-level input changes into fixed-layout HID input
//! reports, and services kernel-originated GET_REPORT/SET_REPORT/OUTPUT
//! requests and lifecycle events, all from one cooperative task:
//!
//! - [gamepad]: control layout and state model
//! - [descriptor]: HID report descriptor generation
//! - [report]: input/output report codec
//! - [uhid]: the device-file transport and session protocol
//! - [bridge]: the orchestrator multiplexing input source and kernel events
//! - [config]: device identity and layout configuration

pub mod bridge;
pub mod config;
pub mod descriptor;
pub mod gamepad;
pub mod report;
pub mod uhid;

#[cfg(test)]
mod report_test;
