//! HID report codec: packs [GamepadState] snapshots into input report bytes
//! and decodes kernel-originated output reports. Pure, no I/O.
//!
//! Field layout follows HID convention: the button bitfield first (bit 0 of
//! byte 0 is button 1), zero-filled pad bits up to the next byte boundary,
//! then one little-endian signed 16-bit value per axis.

use thiserror::Error;

use crate::gamepad::{GamepadLayout, GamepadState};

/// One encoded input report.
pub type InputReport = Vec<u8>;

/// Size in bytes of the rumble output report.
pub const OUTPUT_REPORT_LEN: usize = 2;

/// Errors encoding or decoding reports.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A state value does not fit the field declared for it. Reports are
    /// validated up front; an overflow produces no output bytes at all.
    #[error("{field} value {value} outside {min}..={max}")]
    FieldOverflow {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },
    /// A report buffer does not have the size the layout requires.
    #[error("report is {len} bytes, layout requires {expected}")]
    BadLength { len: usize, expected: usize },
    /// The state carries a different number of axes than the layout declares.
    #[error("state has {got} axes, layout declares {expected}")]
    AxisCountMismatch { got: usize, expected: usize },
    /// The layout declares no output report.
    #[error("layout declares no output report")]
    NoOutputFields,
}

/// Decoded values of one rumble output report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputReport {
    pub rumble_left: u8,
    pub rumble_right: u8,
}

/// Encode a state snapshot into input report bytes.
///
/// Every field is range-checked before any byte is produced; values outside
/// their declared range fail with [CodecError::FieldOverflow] rather than
/// being truncated into a corrupt report.
pub fn encode_input(
    state: &GamepadState,
    layout: &GamepadLayout,
) -> Result<InputReport, CodecError> {
    if state.axes.len() != layout.axes.len() {
        return Err(CodecError::AxisCountMismatch {
            got: state.axes.len(),
            expected: layout.axes.len(),
        });
    }
    if layout.button_count < 64 && state.buttons >> layout.button_count != 0 {
        let highest = 64 - state.buttons.leading_zeros();
        return Err(CodecError::FieldOverflow {
            field: "button".to_string(),
            value: highest as i64,
            min: 1,
            max: layout.button_count as i64,
        });
    }
    for (spec, value) in layout.axes.iter().zip(&state.axes) {
        if *value < spec.min || *value > spec.max {
            return Err(CodecError::FieldOverflow {
                field: format!("axis {:?}", spec.usage),
                value: *value as i64,
                min: spec.min as i64,
                max: spec.max as i64,
            });
        }
    }

    let mut report = Vec::with_capacity(layout.input_report_len());
    for byte in 0..layout.button_bytes() {
        report.push((state.buttons >> (byte * 8)) as u8);
    }
    for value in &state.axes {
        report.extend_from_slice(&(*value as i16).to_le_bytes());
    }
    Ok(report)
}

/// Decode input report bytes back into a state snapshot. Exact inverse of
/// [encode_input] for any representable state.
pub fn decode_input(bytes: &[u8], layout: &GamepadLayout) -> Result<GamepadState, CodecError> {
    let expected = layout.input_report_len();
    if bytes.len() != expected {
        return Err(CodecError::BadLength {
            len: bytes.len(),
            expected,
        });
    }

    let mut buttons: u64 = 0;
    for (byte, value) in bytes[..layout.button_bytes()].iter().enumerate() {
        buttons |= (*value as u64) << (byte * 8);
    }
    if layout.button_count < 64 {
        // Pad bits carry no data.
        buttons &= (1u64 << layout.button_count) - 1;
    }

    let axes = bytes[layout.button_bytes()..]
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as i32)
        .collect();

    Ok(GamepadState { buttons, axes })
}

/// Decode a kernel-originated output report into rumble values.
///
/// hidraw prepends a zero report-ID byte when the descriptor declares no
/// report IDs; a 3-byte payload with a leading zero is accepted and stripped.
pub fn decode_output(bytes: &[u8], layout: &GamepadLayout) -> Result<OutputReport, CodecError> {
    if !layout.rumble {
        return Err(CodecError::NoOutputFields);
    }
    let data = match bytes {
        [0, rest @ ..] if rest.len() == OUTPUT_REPORT_LEN => rest,
        _ => bytes,
    };
    if data.len() != OUTPUT_REPORT_LEN {
        return Err(CodecError::BadLength {
            len: bytes.len(),
            expected: OUTPUT_REPORT_LEN,
        });
    }
    Ok(OutputReport {
        rumble_left: data[0],
        rumble_right: data[1],
    })
}
