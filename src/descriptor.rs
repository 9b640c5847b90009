//! HID report descriptor generation.
//!
//! The descriptor is produced from the same [GamepadLayout] the report codec
//! packs from, which keeps the advertised field layout and the actual report
//! bytes in lockstep. Output is deterministic: identical layouts always yield
//! byte-identical descriptors.

use thiserror::Error;

use crate::gamepad::{GamepadLayout, MAX_BUTTONS};

/// Errors building a report descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

/// An immutable HID report descriptor byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDescriptor(Vec<u8>);

impl ReportDescriptor {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Short item prefixes with the two size bits cleared.
const USAGE_PAGE: u8 = 0x04;
const LOGICAL_MINIMUM: u8 = 0x14;
const LOGICAL_MAXIMUM: u8 = 0x24;
const REPORT_SIZE: u8 = 0x74;
const REPORT_COUNT: u8 = 0x94;
const USAGE: u8 = 0x08;
const USAGE_MINIMUM: u8 = 0x18;
const USAGE_MAXIMUM: u8 = 0x28;
const INPUT: u8 = 0x80;
const OUTPUT: u8 = 0x90;
const COLLECTION: u8 = 0xA0;
const END_COLLECTION: u8 = 0xC0;

// Usage pages and usages.
const PAGE_GENERIC_DESKTOP: u32 = 0x01;
const PAGE_BUTTON: u32 = 0x09;
const PAGE_VENDOR: u32 = 0xFF00;
const USAGE_GAMEPAD: u32 = 0x05;
const COLLECTION_APPLICATION: u32 = 0x01;

// Main item flags.
const DATA_VAR_ABS: u32 = 0x02;
const CONST_VAR_ABS: u32 = 0x03;

/// Append a short item carrying an unsigned value (usages, counts, flags).
fn push_unsigned(desc: &mut Vec<u8>, prefix: u8, value: u32) {
    if value <= 0xFF {
        desc.push(prefix | 1);
        desc.push(value as u8);
    } else if value <= 0xFFFF {
        desc.push(prefix | 2);
        desc.extend_from_slice(&(value as u16).to_le_bytes());
    } else {
        desc.push(prefix | 3);
        desc.extend_from_slice(&value.to_le_bytes());
    }
}

/// Append a short item carrying a signed value (logical minimum/maximum).
/// HID sign-extends item data, so 255 must be emitted as two bytes.
fn push_signed(desc: &mut Vec<u8>, prefix: u8, value: i32) {
    if (-128..=127).contains(&value) {
        desc.push(prefix | 1);
        desc.push(value as i8 as u8);
    } else if (-32768..=32767).contains(&value) {
        desc.push(prefix | 2);
        desc.extend_from_slice(&(value as i16).to_le_bytes());
    } else {
        desc.push(prefix | 3);
        desc.extend_from_slice(&value.to_le_bytes());
    }
}

fn validate(layout: &GamepadLayout) -> Result<(), DescriptorError> {
    if layout.button_count == 0 && layout.axes.is_empty() {
        return Err(DescriptorError::InvalidLayout(
            "layout declares no controls".to_string(),
        ));
    }
    if layout.button_count > MAX_BUTTONS {
        return Err(DescriptorError::InvalidLayout(format!(
            "{} buttons declared, at most {} supported",
            layout.button_count, MAX_BUTTONS
        )));
    }
    for spec in &layout.axes {
        if spec.min >= spec.max {
            return Err(DescriptorError::InvalidLayout(format!(
                "axis {:?} range {}..={} is empty",
                spec.usage, spec.min, spec.max
            )));
        }
        if spec.min < i16::MIN as i32 || spec.max > i16::MAX as i32 {
            return Err(DescriptorError::InvalidLayout(format!(
                "axis {:?} range {}..={} does not fit a 16-bit field",
                spec.usage, spec.min, spec.max
            )));
        }
    }
    Ok(())
}

/// Build the report descriptor advertised at device creation.
///
/// Buttons are emitted as 1-bit variable fields padded to the next byte
/// boundary, followed by one signed 16-bit field per axis and, when rumble is
/// enabled, a 2-byte vendor-page output report.
pub fn build_descriptor(layout: &GamepadLayout) -> Result<ReportDescriptor, DescriptorError> {
    validate(layout)?;

    let mut desc = Vec::new();
    push_unsigned(&mut desc, USAGE_PAGE, PAGE_GENERIC_DESKTOP);
    push_unsigned(&mut desc, USAGE, USAGE_GAMEPAD);
    push_unsigned(&mut desc, COLLECTION, COLLECTION_APPLICATION);

    if layout.button_count > 0 {
        push_unsigned(&mut desc, USAGE_PAGE, PAGE_BUTTON);
        push_unsigned(&mut desc, USAGE_MINIMUM, 1);
        push_unsigned(&mut desc, USAGE_MAXIMUM, layout.button_count as u32);
        push_signed(&mut desc, LOGICAL_MINIMUM, 0);
        push_signed(&mut desc, LOGICAL_MAXIMUM, 1);
        push_unsigned(&mut desc, REPORT_SIZE, 1);
        push_unsigned(&mut desc, REPORT_COUNT, layout.button_count as u32);
        push_unsigned(&mut desc, INPUT, DATA_VAR_ABS);

        let pad_bits = layout.button_bytes() as u32 * 8 - layout.button_count as u32;
        if pad_bits > 0 {
            push_unsigned(&mut desc, REPORT_SIZE, 1);
            push_unsigned(&mut desc, REPORT_COUNT, pad_bits);
            push_unsigned(&mut desc, INPUT, CONST_VAR_ABS);
        }
    }

    if !layout.axes.is_empty() {
        push_unsigned(&mut desc, USAGE_PAGE, PAGE_GENERIC_DESKTOP);
        // Axes with the same logical range share one main item.
        let mut start = 0;
        while start < layout.axes.len() {
            let range = (layout.axes[start].min, layout.axes[start].max);
            let mut end = start + 1;
            while end < layout.axes.len()
                && (layout.axes[end].min, layout.axes[end].max) == range
            {
                end += 1;
            }
            push_signed(&mut desc, LOGICAL_MINIMUM, range.0);
            push_signed(&mut desc, LOGICAL_MAXIMUM, range.1);
            for spec in &layout.axes[start..end] {
                push_unsigned(&mut desc, USAGE, spec.usage.usage_id() as u32);
            }
            push_unsigned(&mut desc, REPORT_SIZE, 16);
            push_unsigned(&mut desc, REPORT_COUNT, (end - start) as u32);
            push_unsigned(&mut desc, INPUT, DATA_VAR_ABS);
            start = end;
        }
    }

    if layout.rumble {
        push_unsigned(&mut desc, USAGE_PAGE, PAGE_VENDOR);
        push_unsigned(&mut desc, USAGE, 0x01);
        push_signed(&mut desc, LOGICAL_MINIMUM, 0);
        push_signed(&mut desc, LOGICAL_MAXIMUM, 255);
        push_unsigned(&mut desc, REPORT_SIZE, 8);
        push_unsigned(&mut desc, REPORT_COUNT, 2);
        push_unsigned(&mut desc, OUTPUT, DATA_VAR_ABS);
    }

    desc.push(END_COLLECTION);
    Ok(ReportDescriptor(desc))
}
